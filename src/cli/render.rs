use std::collections::HashMap;

use crate::models::{Granularity, Report, RepositoryOutcome, RunEvent};

/// 状态事件的单行描述
pub fn format_event(event: &RunEvent) -> String {
    format!("[{}] {}", event.at.format("%H:%M:%S"), event.state)
}

/// 报告的 JSON 输出
pub fn render_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// 报告的文本输出
pub fn render_text(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("=== GitHub 提交分析报告 ===\n\n");
    output.push_str(&format!("运行: {}\n", report.run_id));
    output.push_str(&format!("状态: {}\n", report.final_state));
    if let Some(user) = &report.user {
        match &user.name {
            Some(name) => output.push_str(&format!("用户: {} ({})\n", user.login, name)),
            None => output.push_str(&format!("用户: {}\n", user.login)),
        }
    }
    output.push_str(&format!(
        "耗时: {:.1}s\n\n",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    ));

    if !report.repositories.is_empty() {
        output.push_str("仓库:\n");
        for outcome in &report.repositories {
            match outcome {
                RepositoryOutcome::Completed { summary } => output.push_str(&format!(
                    "  ✅ {}: {} 个提交\n",
                    summary.repository_id,
                    summary.commit_count()
                )),
                RepositoryOutcome::Partial { summary, reason } => output.push_str(&format!(
                    "  ⚠️  {}: {} 个提交（不完整: {}）\n",
                    summary.repository_id,
                    summary.commit_count(),
                    reason
                )),
                RepositoryOutcome::Failed { repository_id, error } => {
                    output.push_str(&format!("  ❌ {}: {}\n", repository_id, error))
                }
            }
        }
        let degraded = report.degraded_repositories();
        if !degraded.is_empty() {
            output.push_str(&format!(
                "  结果不完整: {}/{} 个仓库 ({})\n",
                degraded.len(),
                report.repositories.len(),
                degraded.join(", ")
            ));
        }
        output.push('\n');
    }

    let stats = &report.activity.stats;
    output.push_str("活动统计:\n");
    output.push_str(&format!("  提交总数: {}\n", stats.total_commits));
    output.push_str(&format!("  变更行数: {}\n", stats.total_lines_changed));
    output.push_str(&format!(
        "  活跃天数: {} / {} ({:.0}%)\n",
        stats.active_days,
        stats.span_days,
        stats.active_day_ratio * 100.0
    ));
    if let Some(streak) = &stats.longest_streak {
        output.push_str(&format!(
            "  最长连续: {} 天 ({} ~ {})\n",
            streak.length, streak.start, streak.end
        ));
    }
    if let Some(streak) = &stats.current_streak {
        output.push_str(&format!("  最近连续: {} 天 (至 {})\n", streak.length, streak.end));
    }
    if let Some(day) = stats.busiest_day {
        output.push_str(&format!("  最活跃日: {}\n", day));
    }

    let years: Vec<_> = report.activity.buckets_at(Granularity::Year).collect();
    if !years.is_empty() {
        output.push_str("\n按年:\n");
        for bucket in years {
            output.push_str(&format!(
                "  {}: {} 个提交, {} 个仓库\n",
                bucket.period,
                bucket.commit_count,
                bucket.active_repositories.len()
            ));
        }
    }

    let months: Vec<_> = report.activity.buckets_at(Granularity::Month).collect();
    if !months.is_empty() {
        output.push_str("\n按月（最近 12 个月）:\n");
        for bucket in months.iter().rev().take(12).rev() {
            output.push_str(&format!(
                "  {}: {} 个提交, {} 行\n",
                bucket.period, bucket.commit_count, bucket.lines_changed
            ));
        }
    }

    let quality = &report.quality;
    output.push_str("\n提交信息质量:\n");
    output.push_str(&format!(
        "  conventional: {}, descriptive: {}, vague: {}, empty-like: {}\n",
        quality.conventional, quality.descriptive, quality.vague, quality.empty_like
    ));
    output.push_str(&format!("  平均分: {:.1}\n", quality.average_score));
    if quality.enhanced > 0 || quality.ai_unavailable > 0 {
        output.push_str(&format!(
            "  AI 建议: {} 条, 不可用: {} 条\n",
            quality.enhanced, quality.ai_unavailable
        ));
    }

    let subjects: HashMap<(&str, &str), &str> = report
        .succeeded()
        .flat_map(|summary| {
            summary
                .commits
                .iter()
                .map(move |c| ((summary.repository_id.as_str(), c.hash()), c.subject()))
        })
        .collect();

    let suggestions: Vec<_> = report
        .verdicts
        .iter()
        .filter_map(|v| v.suggestion().map(|s| (v, s)))
        .collect();
    if !suggestions.is_empty() {
        output.push_str("\n改写建议:\n");
        for (verdict, suggestion) in suggestions {
            let short_hash: String = verdict.commit_hash.chars().take(7).collect();
            let subject = subjects
                .get(&(verdict.repository_id.as_str(), verdict.commit_hash.as_str()))
                .copied()
                .unwrap_or("");
            output.push_str(&format!(
                "  {}@{} [{} {}] {}\n    → {}\n",
                verdict.repository_id,
                short_hash,
                verdict.category,
                verdict.score,
                subject,
                suggestion.lines().collect::<Vec<_>>().join("\n      ")
            ));
        }
    }

    output
}
