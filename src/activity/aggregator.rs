use chrono::NaiveDate;

use super::streak::{latest_streak, longest_streak};
use crate::models::{
    ActivityBucket, ActivityReport, ActivityStats, BucketKey, BucketMap, CommitRecord, Granularity,
    RepositorySummary,
};

/// 按日/月/年分桶
///
/// 结果只依赖输入集合，与输入顺序无关；跨仓库的相同 hash 各自计数。
pub fn aggregate<'a, I>(commits: I) -> BucketMap
where
    I: IntoIterator<Item = (&'a str, &'a CommitRecord)>,
{
    let mut buckets = BucketMap::new();

    for (repository_id, commit) in commits {
        let day = commit.day();
        for granularity in Granularity::ALL {
            let key = BucketKey::new(granularity, day);
            let bucket = buckets
                .entry(key)
                .or_insert_with_key(ActivityBucket::empty);
            bucket.commit_count += 1;
            bucket.lines_changed += commit.lines_changed();
            bucket.active_repositories.insert(repository_id.to_string());
        }
    }

    buckets
}

/// 单个仓库的分桶
pub fn aggregate_summary(summary: &RepositorySummary) -> BucketMap {
    let repository_id = summary.repository_id.as_str();
    aggregate(summary.commits.iter().map(|commit| (repository_id, commit)))
}

/// 合并两个桶映射，计数相加、仓库集合取并集
pub fn merge_buckets(into: &mut BucketMap, other: BucketMap) {
    for (key, bucket) in other {
        match into.get_mut(&key) {
            Some(existing) => {
                existing.commit_count += bucket.commit_count;
                existing.lines_changed += bucket.lines_changed;
                existing.active_repositories.extend(bucket.active_repositories);
            }
            None => {
                into.insert(key, bucket);
            }
        }
    }
}

/// 从日粒度桶计算汇总统计
pub fn compute_stats(buckets: &BucketMap) -> ActivityStats {
    let day_buckets: Vec<(NaiveDate, &ActivityBucket)> = buckets
        .values()
        .filter(|bucket| bucket.granularity == Granularity::Day)
        .filter_map(|bucket| {
            NaiveDate::parse_from_str(&bucket.period, "%Y-%m-%d")
                .ok()
                .map(|date| (date, bucket))
        })
        .collect();

    if day_buckets.is_empty() {
        return ActivityStats::default();
    }

    // BTreeMap 已按周期升序
    let days: Vec<NaiveDate> = day_buckets.iter().map(|(date, _)| *date).collect();
    let first = days[0];
    let last = days[days.len() - 1];
    let span_days = ((last - first).num_days() + 1) as u32;
    let active_days = days.len() as u32;

    ActivityStats {
        total_commits: day_buckets.iter().map(|(_, b)| b.commit_count).sum(),
        total_lines_changed: day_buckets.iter().map(|(_, b)| b.lines_changed).sum(),
        active_days,
        span_days,
        active_day_ratio: active_days as f64 / span_days as f64,
        longest_streak: longest_streak(&days),
        current_streak: latest_streak(&days),
        busiest_day: day_buckets
            .iter()
            .max_by_key(|(_, bucket)| bucket.commit_count)
            .map(|(date, _)| *date),
    }
}

/// 分桶并计算统计
pub fn summarize<'a, I>(commits: I) -> ActivityReport
where
    I: IntoIterator<Item = (&'a str, &'a CommitRecord)>,
{
    report_from_buckets(aggregate(commits))
}

pub fn report_from_buckets(buckets: BucketMap) -> ActivityReport {
    let stats = compute_stats(&buckets);
    ActivityReport { buckets, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn commit(hash: &str, y: i32, m: u32, d: u32, lines: u32) -> CommitRecord {
        CommitRecord::new(hash, "mona", Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(), "msg")
            .with_stats(1, lines, 0)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let report = summarize(std::iter::empty());
        assert!(report.buckets.is_empty());
        assert_eq!(report.stats.longest_streak_days(), 0);
        assert_eq!(report.stats.active_day_ratio, 0.0);
        assert_eq!(report.stats.total_commits, 0);
    }

    #[test]
    fn test_three_commits_scenario() {
        let commits = [
            commit("a", 2024, 1, 1, 10),
            commit("b", 2024, 1, 2, 5),
            commit("c", 2024, 1, 4, 1),
        ];
        let report = summarize(commits.iter().map(|c| ("octo/repo", c)));

        let day_buckets: Vec<_> = report.buckets_at(Granularity::Day).collect();
        assert_eq!(day_buckets.len(), 3);
        assert!(day_buckets.iter().all(|b| b.commit_count == 1));

        let january = report.bucket(&BucketKey::month(day(2024, 1, 1))).unwrap();
        assert_eq!(january.commit_count, 3);
        assert_eq!(january.lines_changed, 16);

        let streak = report.stats.longest_streak.unwrap();
        assert_eq!(streak.length, 2);
        assert_eq!(streak.start, day(2024, 1, 1));
        assert_eq!(streak.end, day(2024, 1, 2));

        assert_eq!(report.stats.active_days, 3);
        assert_eq!(report.stats.span_days, 4);
        assert!((report.stats.active_day_ratio - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_order_independence() {
        let commits = vec![
            commit("a", 2024, 3, 1, 1),
            commit("b", 2023, 12, 31, 2),
            commit("c", 2024, 3, 1, 3),
            commit("d", 2024, 1, 15, 4),
        ];
        let forward = summarize(commits.iter().map(|c| ("r/one", c)));
        let backward = summarize(commits.iter().rev().map(|c| ("r/one", c)));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_cross_repository_duplicates_count_independently() {
        let shared = commit("same", 2024, 5, 5, 2);
        let report = summarize([("a/one", &shared), ("b/two", &shared)]);

        let bucket = report.bucket(&BucketKey::day(day(2024, 5, 5))).unwrap();
        assert_eq!(bucket.commit_count, 2);
        assert_eq!(bucket.active_repositories.len(), 2);
    }

    #[test]
    fn test_day_counts_sum_to_month_and_year() {
        let commits = [
            commit("a", 2024, 1, 1, 1),
            commit("b", 2024, 1, 1, 1),
            commit("c", 2024, 1, 20, 1),
            commit("d", 2024, 2, 3, 1),
            commit("e", 2023, 7, 3, 1),
        ];
        let buckets = aggregate(commits.iter().map(|c| ("r/x", c)));

        for month in buckets.values().filter(|b| b.granularity == Granularity::Month) {
            let month_key = month.key();
            let day_sum: u64 = buckets
                .values()
                .filter(|b| b.granularity == Granularity::Day && b.key().parent().as_ref() == Some(&month_key))
                .map(|b| b.commit_count)
                .sum();
            assert_eq!(day_sum, month.commit_count, "month {}", month.period);
        }

        assert_eq!(buckets[&BucketKey::year(day(2024, 1, 1))].commit_count, 4);
        assert_eq!(buckets[&BucketKey::year(day(2023, 1, 1))].commit_count, 1);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let one = [commit("a", 2024, 1, 1, 1), commit("b", 2024, 1, 2, 2)];
        let two = [commit("c", 2024, 1, 2, 3)];

        let mut merged = aggregate(one.iter().map(|c| ("r/one", c)));
        merge_buckets(&mut merged, aggregate(two.iter().map(|c| ("r/two", c))));

        let single = aggregate(
            one.iter()
                .map(|c| ("r/one", c))
                .chain(two.iter().map(|c| ("r/two", c))),
        );
        assert_eq!(merged, single);
    }

    #[test]
    fn test_busiest_day_and_latest_streak() {
        let commits = [
            commit("a", 2024, 1, 1, 1),
            commit("b", 2024, 1, 1, 1),
            commit("c", 2024, 1, 8, 1),
            commit("d", 2024, 1, 9, 1),
        ];
        let report = summarize(commits.iter().map(|c| ("r/x", c)));
        assert_eq!(report.stats.busiest_day, Some(day(2024, 1, 1)));

        let current = report.stats.current_streak.unwrap();
        assert_eq!(current.start, day(2024, 1, 8));
        assert_eq!(current.length, 2);
    }

    #[test]
    fn test_aggregate_summary_uses_repository_id() {
        let summary = RepositorySummary::new("octo/repo", vec![commit("a", 2024, 1, 1, 1)], false);
        let buckets = aggregate_summary(&summary);
        let bucket = &buckets[&BucketKey::day(day(2024, 1, 1))];
        assert!(bucket.active_repositories.contains("octo/repo"));
    }
}
