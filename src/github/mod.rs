use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::Result;
use crate::models::{RepositoryDescriptor, UserProfile};

pub mod fetcher;
pub mod http;
pub mod token;

pub use fetcher::{FetchConfig, GitHubFetcher};
pub use http::GitHubHttpClient;
pub use token::SecretToken;

/// 分页结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 下一页页码，None 表示已到末页
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next_page: None }
    }

    pub fn with_next(items: Vec<T>, next_page: u32) -> Self {
        Self {
            items,
            next_page: Some(next_page),
        }
    }
}

/// 提交列表查询参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitQuery {
    pub since: Option<DateTime<Utc>>,
    /// 按 GitHub 登录名过滤作者
    pub author: Option<String>,
    pub per_page: u32,
}

/// GitHub 返回的提交（已解析，未规范化）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub message: String,
    pub author_name: Option<String>,
    pub author_login: Option<String>,
    pub authored_at: Option<DateTime<Utc>>,
    pub committed_at: Option<DateTime<Utc>>,
}

/// 单个提交的文件变更统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub files_changed: u32,
    pub additions: u32,
    pub deletions: u32,
}

/// GitHub 协作方接口
///
/// 只负责单页请求；分页、上限与规范化由 [`GitHubFetcher`] 处理。
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// 令牌所属用户资料；不支持时返回 None
    async fn current_user(&self, _token: &SecretToken) -> Result<Option<UserProfile>> {
        Ok(None)
    }

    /// 列出令牌所属用户可访问的仓库
    async fn list_repositories(
        &self,
        token: &SecretToken,
        page: u32,
        per_page: u32,
    ) -> Result<Page<RepositoryDescriptor>>;

    /// 列出仓库提交（新的在前）
    async fn list_commits(
        &self,
        token: &SecretToken,
        repository: &str,
        query: &CommitQuery,
        page: u32,
    ) -> Result<Page<RawCommit>>;

    /// 查询单个提交的变更统计
    async fn commit_stats(&self, token: &SecretToken, repository: &str, sha: &str) -> Result<CommitStats>;
}
