use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{CommitQuery, GitHubApi, RawCommit, SecretToken};
use crate::infrastructure::{AnalysisError, Result};
use crate::models::{CommitRecord, RepositoryDescriptor, RepositorySummary, UserProfile};

/// GitHub 单页最大条数
pub const MAX_PER_PAGE: u32 = 100;

/// 抓取配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// 每个仓库最多读取的页数，达到上限时结果标记为不完整
    pub max_pages: u32,
    pub per_page: u32,
    /// 是否逐个查询提交的文件变更统计
    pub include_stats: bool,
    /// 作者登录名过滤
    pub author: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            per_page: MAX_PER_PAGE,
            include_stats: false,
            author: None,
        }
    }
}

/// 负责分页、上限检查与规范化的抓取器
#[derive(Clone)]
pub struct GitHubFetcher {
    api: Arc<dyn GitHubApi>,
    config: FetchConfig,
}

impl GitHubFetcher {
    pub fn new(api: Arc<dyn GitHubApi>, config: FetchConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn per_page(&self) -> u32 {
        self.config.per_page.clamp(1, MAX_PER_PAGE)
    }

    /// 令牌所属用户资料
    pub async fn fetch_profile(&self, token: &SecretToken) -> Result<Option<UserProfile>> {
        ensure_token(token)?;
        self.api.current_user(token).await
    }

    /// 列出可访问的仓库；超过分页上限时截断并记录警告
    pub async fn fetch_repositories(&self, token: &SecretToken) -> Result<Vec<RepositoryDescriptor>> {
        ensure_token(token)?;

        let mut repositories = Vec::new();
        let mut page = 1;
        let mut pages_read = 0;

        loop {
            let result = self.api.list_repositories(token, page, self.per_page()).await?;
            pages_read += 1;
            repositories.extend(result.items);

            match result.next_page {
                Some(next) if pages_read < self.config.max_pages => page = next,
                Some(_) => {
                    warn!(pages_read, "Repository listing truncated at page cap");
                    break;
                }
                None => break,
            }
        }

        info!(count = repositories.len(), "Fetched repository list");
        Ok(repositories)
    }

    /// 抓取仓库提交，作者过滤使用配置值
    pub async fn fetch_commits(
        &self,
        token: &SecretToken,
        repository_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<RepositorySummary> {
        let author = self.config.author.clone();
        self.fetch_commits_by(token, repository_id, since, author.as_deref()).await
    }

    /// 抓取仓库提交
    ///
    /// 达到分页上限或首页之后出现网络错误时返回已获取部分并设置 `is_partial`；
    /// 认证失败、速率限制和仓库不存在直接返回错误。
    pub async fn fetch_commits_by(
        &self,
        token: &SecretToken,
        repository_id: &str,
        since: Option<DateTime<Utc>>,
        author: Option<&str>,
    ) -> Result<RepositorySummary> {
        ensure_token(token)?;
        ensure_repository_id(repository_id)?;
        if let Some(since) = since {
            if since >= Utc::now() {
                return Err(AnalysisError::invalid_input(format!(
                    "since must be in the past, got {}",
                    since.to_rfc3339()
                )));
            }
        }

        let query = CommitQuery {
            since,
            author: author.map(str::to_string),
            per_page: self.per_page(),
        };

        let mut commits = Vec::new();
        let mut is_partial = false;
        let mut page = 1;
        let mut pages_read = 0u32;

        loop {
            match self.api.list_commits(token, repository_id, &query, page).await {
                Ok(result) => {
                    pages_read += 1;
                    commits.extend(result.items.into_iter().filter_map(|raw| normalize(repository_id, raw)));

                    match result.next_page {
                        Some(_) if pages_read >= self.config.max_pages => {
                            warn!(repository = repository_id, pages_read, "Commit pagination stopped at page cap");
                            is_partial = true;
                            break;
                        }
                        Some(next) => page = next,
                        None => break,
                    }
                }
                Err(e @ AnalysisError::TransportFailure { .. }) if pages_read > 0 => {
                    warn!(repository = repository_id, page, error = %e, "Commit page failed, keeping partial result");
                    is_partial = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if self.config.include_stats {
            let complete = self.attach_stats(token, repository_id, &mut commits).await?;
            is_partial |= !complete;
        }

        debug!(repository = repository_id, commits = commits.len(), pages_read, is_partial, "Fetched commits");
        Ok(RepositorySummary::new(repository_id, commits, is_partial).with_pages(pages_read))
    }

    /// 查询每个提交的统计；单个失败时保留 0 并返回 false
    async fn attach_stats(
        &self,
        token: &SecretToken,
        repository_id: &str,
        commits: &mut [CommitRecord],
    ) -> Result<bool> {
        let mut complete = true;

        for commit in commits.iter_mut() {
            let result = self.api.commit_stats(token, repository_id, commit.hash()).await;
            match result {
                Ok(stats) => {
                    *commit = commit
                        .clone()
                        .with_stats(stats.files_changed, stats.additions, stats.deletions);
                }
                Err(e @ AnalysisError::AuthenticationFailed { .. }) | Err(e @ AnalysisError::RateLimited { .. }) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(repository = repository_id, sha = commit.hash(), error = %e, "Commit stats unavailable");
                    complete = false;
                }
            }
        }

        Ok(complete)
    }
}

fn ensure_token(token: &SecretToken) -> Result<()> {
    if token.is_empty() {
        return Err(AnalysisError::invalid_input("GitHub token must not be empty"));
    }
    Ok(())
}

fn ensure_repository_id(repository_id: &str) -> Result<()> {
    match repository_id.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(()),
        _ => Err(AnalysisError::invalid_input(format!(
            "repository id must be owner/name, got '{}'",
            repository_id
        ))),
    }
}

/// 原始提交转为 CommitRecord；缺少时间戳的提交被丢弃
fn normalize(repository_id: &str, raw: RawCommit) -> Option<CommitRecord> {
    let timestamp = match raw.authored_at.or(raw.committed_at) {
        Some(ts) => ts,
        None => {
            debug!(repository = repository_id, sha = %raw.sha, "Skipping commit without timestamp");
            return None;
        }
    };

    let author = raw
        .author_name
        .filter(|name| !name.trim().is_empty())
        .or(raw.author_login)
        .unwrap_or_else(|| "unknown".to_string());

    Some(CommitRecord::new(raw.sha, author, timestamp, raw.message))
}
