//! 提交消息质量分析：本地启发式分类与 AI 改写建议。

pub mod classifier;
pub mod enhancer;

pub use classifier::{
    CommitClassifier, QualityConfig, COMMIT_TYPES, DEFAULT_DESCRIPTIVE_VERBS, DEFAULT_FILLER_TOKENS,
};
pub use enhancer::{clean_suggestion, CommitEnhancer};
