use std::fmt;

use serde::{Deserialize, Serialize};

/// 提交消息质量类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityCategory {
    /// 符合 Conventional Commits: `type(scope): subject`
    Conventional,
    Descriptive,
    Vague,
    EmptyLike,
}

impl QualityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCategory::Conventional => "conventional",
            QualityCategory::Descriptive => "descriptive",
            QualityCategory::Vague => "vague",
            QualityCategory::EmptyLike => "empty-like",
        }
    }
}

impl fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI 改写建议的获取状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnhancementStatus {
    /// 未请求（不需要或超出调用预算）
    NotRequested,
    Enhanced,
    /// AI 服务失败，保留本地评分
    Unavailable { reason: String },
    /// 运行取消，未发起调用
    Skipped,
}

/// 单条提交消息的质量评估
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub commit_hash: String,
    pub repository_id: String,
    pub score: u8,
    pub category: QualityCategory,
    suggestion: Option<String>,
    pub enhancement: EnhancementStatus,
}

impl QualityVerdict {
    pub fn new(score: u8, category: QualityCategory) -> Self {
        Self {
            commit_hash: String::new(),
            repository_id: String::new(),
            score: score.min(100),
            category,
            suggestion: None,
            enhancement: EnhancementStatus::NotRequested,
        }
    }

    pub fn for_commit(mut self, repository_id: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        self.repository_id = repository_id.into();
        self.commit_hash = commit_hash.into();
        self
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// 是否允许携带建议：非 conventional 或分数低于阈值
    pub fn accepts_suggestion(&self, threshold: u8) -> bool {
        self.category != QualityCategory::Conventional || self.score < threshold
    }

    /// 附加建议；不满足条件时返回 false 且不修改
    pub fn attach_suggestion(&mut self, suggestion: String, threshold: u8) -> bool {
        if !self.accepts_suggestion(threshold) {
            return false;
        }
        self.suggestion = Some(suggestion);
        self.enhancement = EnhancementStatus::Enhanced;
        true
    }

    pub fn mark_unavailable(&mut self, reason: impl Into<String>) {
        self.suggestion = None;
        self.enhancement = EnhancementStatus::Unavailable {
            reason: reason.into(),
        };
    }

    pub fn mark_skipped(&mut self) {
        self.suggestion = None;
        self.enhancement = EnhancementStatus::Skipped;
    }
}
