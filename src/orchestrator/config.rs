use chrono::{DateTime, Utc};
use std::time::Duration;

/// 编排器配置
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// 同时抓取的仓库数
    pub concurrency: usize,
    /// 单个仓库遇到速率限制后的最大重试次数
    pub max_rate_limit_retries: u32,
    /// 超过该等待时间的速率限制不再重试，仓库记为失败
    pub max_rate_limit_wait: Duration,
    /// 未指定仓库列表时是否包含 fork
    pub include_forks: bool,
    pub since: Option<DateTime<Utc>>,
    /// 显式指定的 owner/name 列表；为空时分析全部可访问仓库
    pub repositories: Vec<String>,
    pub enable_ai: bool,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_rate_limit_retries: 3,
            max_rate_limit_wait: Duration::from_secs(15 * 60),
            include_forks: false,
            since: None,
            repositories: Vec::new(),
            enable_ai: true,
            event_capacity: 64,
        }
    }
}
