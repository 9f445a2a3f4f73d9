//! 提交活动聚合：纯函数，不访问网络。

pub mod aggregator;
pub mod streak;

pub use aggregator::{aggregate, aggregate_summary, compute_stats, merge_buckets, report_from_buckets, summarize};
pub use streak::{latest_streak, longest_streak};
