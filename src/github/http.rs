use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{CommitQuery, CommitStats, GitHubApi, Page, RawCommit, SecretToken};
use crate::infrastructure::{AnalysisError, Result};
use crate::models::{RepositoryDescriptor, UserProfile};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("git-analyzer/", env!("CARGO_PKG_VERSION"));

/// 未给出重置时间时的默认等待
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ApiUser {
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
    #[serde(default)]
    followers: u32,
    #[serde(default)]
    following: u32,
}

#[derive(Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Deserialize)]
struct ApiRepository {
    name: String,
    full_name: String,
    owner: ApiOwner,
    default_branch: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    author: Option<ApiCommitUser>,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiSignature>,
    committer: Option<ApiSignature>,
}

#[derive(Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiCommitUser {
    login: Option<String>,
}

#[derive(Deserialize)]
struct ApiCommitWithStats {
    stats: Option<ApiStats>,
    #[serde(default)]
    files: Vec<serde::de::IgnoredAny>,
}

#[derive(Deserialize)]
struct ApiStats {
    additions: u32,
    deletions: u32,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
}

impl From<ApiRepository> for RepositoryDescriptor {
    fn from(repo: ApiRepository) -> Self {
        RepositoryDescriptor {
            id: repo.full_name,
            name: repo.name,
            owner: repo.owner.login,
            default_branch: repo.default_branch,
            private: repo.private,
            fork: repo.fork,
            pushed_at: repo.pushed_at,
        }
    }
}

impl From<ApiCommit> for RawCommit {
    fn from(api: ApiCommit) -> Self {
        let (author_name, authored_at) = match api.commit.author {
            Some(sig) => (sig.name, sig.date),
            None => (None, None),
        };
        RawCommit {
            sha: api.sha,
            message: api.commit.message,
            author_name,
            author_login: api.author.and_then(|a| a.login),
            authored_at,
            committed_at: api.commit.committer.and_then(|c| c.date),
        }
    }
}

/// 基于 reqwest 的 GitHub REST v3 客户端
pub struct GitHubHttpClient {
    client: Client,
    base_url: String,
}

impl GitHubHttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AnalysisError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, token: &SecretToken, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "GitHub request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(query)
            .send()
            .await?;

        Ok(response)
    }

    async fn error_from(response: reqwest::Response, repository: Option<&str>) -> AnalysisError {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &headers, &body, repository, Utc::now().timestamp())
    }
}

#[async_trait]
impl GitHubApi for GitHubHttpClient {
    async fn current_user(&self, token: &SecretToken) -> Result<Option<UserProfile>> {
        let response = self.send(token, "/user", &[]).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, None).await);
        }

        let user: ApiUser = response.json().await?;
        Ok(Some(UserProfile {
            login: user.login,
            name: user.name,
            avatar_url: user.avatar_url,
            followers: user.followers,
            following: user.following,
        }))
    }

    async fn list_repositories(
        &self,
        token: &SecretToken,
        page: u32,
        per_page: u32,
    ) -> Result<Page<RepositoryDescriptor>> {
        let query = [
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
            ("sort", "pushed".to_string()),
        ];
        let response = self.send(token, "/user/repos", &query).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, None).await);
        }

        let next_page = next_page_from(response.headers());
        let repos: Vec<ApiRepository> = response.json().await?;

        Ok(Page {
            items: repos.into_iter().map(RepositoryDescriptor::from).collect(),
            next_page,
        })
    }

    async fn list_commits(
        &self,
        token: &SecretToken,
        repository: &str,
        query: &CommitQuery,
        page: u32,
    ) -> Result<Page<RawCommit>> {
        let mut params = vec![
            ("per_page", query.per_page.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(since) = query.since {
            params.push(("since", since.to_rfc3339()));
        }
        if let Some(author) = &query.author {
            params.push(("author", author.clone()));
        }

        let path = format!("/repos/{}/commits", repository);
        let response = self.send(token, &path, &params).await?;

        // 空仓库返回 409 "Git Repository is empty"
        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(repository, "Repository is empty");
            return Ok(Page::last(Vec::new()));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response, Some(repository)).await);
        }

        let next_page = next_page_from(response.headers());
        let commits: Vec<ApiCommit> = response.json().await?;

        Ok(Page {
            items: commits.into_iter().map(RawCommit::from).collect(),
            next_page,
        })
    }

    async fn commit_stats(&self, token: &SecretToken, repository: &str, sha: &str) -> Result<CommitStats> {
        let path = format!("/repos/{}/commits/{}", repository, sha);
        let response = self.send(token, &path, &[]).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response, Some(repository)).await);
        }

        let detail: ApiCommitWithStats = response.json().await?;
        let (additions, deletions) = detail
            .stats
            .map(|s| (s.additions, s.deletions))
            .unwrap_or((0, 0));

        Ok(CommitStats {
            files_changed: detail.files.len() as u32,
            additions,
            deletions,
        })
    }
}

/// 从 `Link` 头中解析 rel="next" 的页码
fn next_page_from(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_page(link)
}

pub(crate) fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        let is_next = sections.any(|s| s.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }

        let url = Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

/// 将非 2xx 响应映射为错误类型
pub(crate) fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    repository: Option<&str>,
    now: i64,
) -> AnalysisError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => AnalysisError::authentication(message),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => match rate_limit_delay(headers, now) {
            Some(delay) => AnalysisError::rate_limited(delay),
            None if status == StatusCode::TOO_MANY_REQUESTS => AnalysisError::rate_limited(DEFAULT_RATE_LIMIT_WAIT),
            None => AnalysisError::transport(format!("GitHub API forbidden: {}", message)),
        },
        StatusCode::NOT_FOUND => match repository {
            Some(repo) => AnalysisError::not_found(repo),
            None => AnalysisError::transport(format!("GitHub API not found: {}", message)),
        },
        _ => AnalysisError::transport(format!("GitHub API error {}: {}", status, message)),
    }
}

fn rate_limit_delay(headers: &HeaderMap, now: i64) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs.max(1)));
    }

    if header("x-ratelimit-remaining") == Some("0") {
        let wait = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|reset| Duration::from_secs((reset - now).max(1) as u64))
            .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
        return Some(wait);
    }

    None
}
