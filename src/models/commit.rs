use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 单个提交的规范化表示
///
/// 构造后不可变，字段只能通过访问器读取。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    hash: String,
    author: String,
    timestamp: DateTime<Utc>,
    message: String,
    files_changed: u32,
    insertions: u32,
    deletions: u32,
}

impl CommitRecord {
    pub fn new(
        hash: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            author: author.into(),
            timestamp,
            message: message.into(),
            files_changed: 0,
            insertions: 0,
            deletions: 0,
        }
    }

    /// 附加文件变更统计
    pub fn with_stats(mut self, files_changed: u32, insertions: u32, deletions: u32) -> Self {
        self.files_changed = files_changed;
        self.insertions = insertions;
        self.deletions = deletions;
        self
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 提交所在的 UTC 日历日
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 提交消息的第一行
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn files_changed(&self) -> u32 {
        self.files_changed
    }

    pub fn insertions(&self) -> u32 {
        self.insertions
    }

    pub fn deletions(&self) -> u32 {
        self.deletions
    }

    pub fn lines_changed(&self) -> u64 {
        self.insertions as u64 + self.deletions as u64
    }
}

/// 仓库描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// `owner/name` 形式的完整名称
    pub id: String,
    pub name: String,
    pub owner: String,
    pub default_branch: Option<String>,
    pub private: bool,
    pub fork: bool,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl RepositoryDescriptor {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        Self {
            id: format!("{}/{}", owner, name),
            name,
            owner,
            default_branch: None,
            private: false,
            fork: false,
            pushed_at: None,
        }
    }
}

/// 单个仓库的提交抓取结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub repository_id: String,
    /// 按时间升序排列
    pub commits: Arc<[CommitRecord]>,
    pub fetched_at: DateTime<Utc>,
    /// 因错误或分页上限提前停止
    pub is_partial: bool,
    pub pages_fetched: u32,
}

impl RepositorySummary {
    /// 构造摘要，提交按时间升序（同一时刻按 hash）排序
    pub fn new(repository_id: impl Into<String>, mut commits: Vec<CommitRecord>, is_partial: bool) -> Self {
        commits.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.hash.cmp(&b.hash))
        });

        Self {
            repository_id: repository_id.into(),
            commits: commits.into(),
            fetched_at: Utc::now(),
            is_partial,
            pages_fetched: 0,
        }
    }

    pub fn with_pages(mut self, pages_fetched: u32) -> Self {
        self.pages_fetched = pages_fetched;
        self
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// 令牌所属用户的公开资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub followers: u32,
    pub following: u32,
}
