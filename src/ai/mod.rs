//! AI 提供商：为低质量提交信息生成改写建议。

pub mod http;
pub mod prompt;
pub mod provider;
pub mod providers;

pub use prompt::{load_review_template, PromptBuilder, PromptTemplate};
pub use provider::{AIProvider, ProviderConfig, ProviderFactory};
