use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, ValueEnum};

/// 报告输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "git-analyzer",
    version,
    about = "GitHub 提交活动统计与提交信息质量分析",
    long_about = "git-analyzer 使用个人访问令牌读取 GitHub 提交历史，按日/月/年统计活动，并对提交信息进行质量评估，可选通过 AI 生成改写建议。令牌从 GITHUB_TOKEN 或 GIT_ANALYZER_GITHUB_TOKEN 读取。"
)]
pub struct Args {
    /// 要分析的仓库（owner/name），可重复；不指定时分析全部可访问仓库
    #[arg(short, long = "repo", value_name = "OWNER/NAME")]
    pub repositories: Vec<String>,

    /// 只统计该时间之后的提交（RFC3339 或 YYYY-MM-DD）
    #[arg(short, long, value_parser = parse_since)]
    pub since: Option<DateTime<Utc>>,

    /// 只统计该 GitHub 用户的提交
    #[arg(short, long)]
    pub author: Option<String>,

    /// 同时抓取的仓库数
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// 每个仓库最多读取的页数
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// 不调用 AI，只做本地评分
    #[arg(long, default_value_t = false)]
    pub no_ai: bool,

    /// 包含 fork 仓库
    #[arg(long, default_value_t = false)]
    pub include_forks: bool,

    /// 查询每个提交的增删行数（每个提交一次额外请求）
    #[arg(long, default_value_t = false)]
    pub with_stats: bool,

    /// AI provider (gemini, ollama, openai, deepseek)
    #[arg(short = 'P', long)]
    pub provider: Option<String>,

    /// AI model
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// 输出调试日志
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// 解析 `--since`：RFC3339 时间，或按 UTC 零点解释的日期
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{}', expected RFC3339 or YYYY-MM-DD", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_since_date() {
        let since = parse_since("2024-01-15").unwrap();
        assert_eq!(since, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_since_rfc3339() {
        let since = parse_since("2024-01-15T10:00:00+02:00").unwrap();
        assert_eq!(since, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_since_invalid() {
        assert!(parse_since("last week").is_err());
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "git-analyzer",
            "--repo",
            "octo/one",
            "-r",
            "octo/two",
            "--since",
            "2024-01-01",
            "--no-ai",
            "--format",
            "json",
            "-j",
            "8",
        ]);
        assert_eq!(args.repositories, vec!["octo/one", "octo/two"]);
        assert!(args.since.is_some());
        assert!(args.no_ai);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.concurrency, Some(8));
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["git-analyzer"]);
        assert!(args.repositories.is_empty());
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.provider.is_none());
    }
}
