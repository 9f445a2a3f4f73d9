use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::ActivityReport;
use super::commit::{RepositorySummary, UserProfile};
use super::quality::{EnhancementStatus, QualityCategory, QualityVerdict};
use crate::infrastructure::AnalysisError;

/// 分析运行的状态机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    FetchingRepos,
    FetchingCommits { repository: String },
    Aggregating,
    ScoringMessages,
    Assembling,
    Done,
    PartiallyCompleted,
    Failed { cause: String },
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Done | RunState::PartiallyCompleted | RunState::Failed { .. } | RunState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::FetchingRepos => "fetching_repos",
            RunState::FetchingCommits { .. } => "fetching_commits",
            RunState::Aggregating => "aggregating",
            RunState::ScoringMessages => "scoring_messages",
            RunState::Assembling => "assembling",
            RunState::Done => "done",
            RunState::PartiallyCompleted => "partially_completed",
            RunState::Failed { .. } => "failed",
            RunState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::FetchingCommits { repository } => write!(f, "fetching_commits({})", repository),
            RunState::Failed { cause } => write!(f, "failed: {}", cause),
            other => f.write_str(other.name()),
        }
    }
}

/// 推送给展示层的状态事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    pub state: RunState,
    pub at: DateTime<Utc>,
}

/// 单个仓库的处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepositoryOutcome {
    Completed { summary: RepositorySummary },
    /// 有数据但不完整（分页上限或中途出错）
    Partial { summary: RepositorySummary, reason: String },
    Failed { repository_id: String, error: AnalysisError },
}

impl RepositoryOutcome {
    pub fn repository_id(&self) -> &str {
        match self {
            RepositoryOutcome::Completed { summary } => &summary.repository_id,
            RepositoryOutcome::Partial { summary, .. } => &summary.repository_id,
            RepositoryOutcome::Failed { repository_id, .. } => repository_id,
        }
    }

    pub fn summary(&self) -> Option<&RepositorySummary> {
        match self {
            RepositoryOutcome::Completed { summary } | RepositoryOutcome::Partial { summary, .. } => Some(summary),
            RepositoryOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RepositoryOutcome::Failed { .. })
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, RepositoryOutcome::Completed { .. })
    }
}

/// 各类别计数与平均分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub conventional: usize,
    pub descriptive: usize,
    pub vague: usize,
    pub empty_like: usize,
    pub average_score: f64,
    pub enhanced: usize,
    pub ai_unavailable: usize,
}

impl QualitySummary {
    pub fn from_verdicts(verdicts: &[QualityVerdict]) -> Self {
        let mut summary = QualitySummary::default();
        let mut total_score = 0u64;

        for verdict in verdicts {
            match verdict.category {
                QualityCategory::Conventional => summary.conventional += 1,
                QualityCategory::Descriptive => summary.descriptive += 1,
                QualityCategory::Vague => summary.vague += 1,
                QualityCategory::EmptyLike => summary.empty_like += 1,
            }
            match verdict.enhancement {
                EnhancementStatus::Enhanced => summary.enhanced += 1,
                EnhancementStatus::Unavailable { .. } => summary.ai_unavailable += 1,
                _ => {}
            }
            total_score += verdict.score as u64;
        }

        if !verdicts.is_empty() {
            summary.average_score = total_score as f64 / verdicts.len() as f64;
        }
        summary
    }
}

/// 一次分析运行的最终报告，组装后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub final_state: RunState,
    /// 令牌所属用户，API 不提供时为空
    #[serde(default)]
    pub user: Option<UserProfile>,
    pub repositories: Vec<RepositoryOutcome>,
    pub activity: ActivityReport,
    pub verdicts: Vec<QualityVerdict>,
    pub quality: QualitySummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    pub fn succeeded(&self) -> impl Iterator<Item = &RepositorySummary> {
        self.repositories.iter().filter_map(|o| o.summary())
    }

    /// 失败或不完整的仓库 id
    pub fn degraded_repositories(&self) -> Vec<&str> {
        self.repositories
            .iter()
            .filter(|o| o.is_degraded())
            .map(|o| o.repository_id())
            .collect()
    }

    pub fn failed_repositories(&self) -> Vec<&str> {
        self.repositories
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.repository_id())
            .collect()
    }

    pub fn verdict_for(&self, commit_hash: &str) -> Option<&QualityVerdict> {
        self.verdicts.iter().find(|v| v.commit_hash == commit_hash)
    }
}
