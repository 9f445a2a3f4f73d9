use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// 分析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error("GitHub 认证失败: {message}")]
    AuthenticationFailed { message: String },

    #[error("GitHub 速率限制, {:.1}s 后重试", wait_secs(retry_after))]
    RateLimited { retry_after: Duration },

    #[error("仓库不存在: {repository}")]
    RepositoryNotFound { repository: String },

    #[error("网络错误: {message}")]
    TransportFailure { message: String },

    #[error("AI 服务不可用: {provider} - {message}")]
    AiUnavailable { provider: String, message: String },

    #[error("输入无效: {message}")]
    InvalidInput { message: String },

    #[error("配置错误: {message}")]
    Configuration { message: String },

    #[error("运行已取消")]
    Cancelled,
}

impl AnalysisError {
    /// 致命错误会终止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::AuthenticationFailed { .. } | AnalysisError::Configuration { .. }
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalysisError::AuthenticationFailed { .. } => ErrorSeverity::Critical,
            AnalysisError::Configuration { .. } => ErrorSeverity::Critical,
            AnalysisError::RepositoryNotFound { .. } => ErrorSeverity::High,
            AnalysisError::TransportFailure { .. } => ErrorSeverity::Medium,
            AnalysisError::RateLimited { .. } => ErrorSeverity::Medium,
            AnalysisError::InvalidInput { .. } => ErrorSeverity::Medium,
            AnalysisError::AiUnavailable { .. } => ErrorSeverity::Low,
            AnalysisError::Cancelled => ErrorSeverity::Low,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::AuthenticationFailed { .. } => ErrorCategory::Security,
            AnalysisError::RateLimited { .. } => ErrorCategory::Throttling,
            AnalysisError::RepositoryNotFound { .. } => ErrorCategory::Data,
            AnalysisError::TransportFailure { .. } => ErrorCategory::Network,
            AnalysisError::AiUnavailable { .. } => ErrorCategory::ExternalService,
            AnalysisError::InvalidInput { .. } => ErrorCategory::Data,
            AnalysisError::Configuration { .. } => ErrorCategory::Configuration,
            AnalysisError::Cancelled => ErrorCategory::Internal,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        AnalysisError::AuthenticationFailed {
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        AnalysisError::RateLimited { retry_after }
    }

    pub fn not_found(repository: impl Into<String>) -> Self {
        AnalysisError::RepositoryNotFound {
            repository: repository.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AnalysisError::TransportFailure {
            message: message.into(),
        }
    }

    pub fn ai_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::AiUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AnalysisError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AnalysisError::Configuration {
            message: message.into(),
        }
    }
}

/// 向上取整到 0.1 秒，避免亚秒等待显示为 0
fn wait_secs(duration: &Duration) -> f64 {
    (duration.as_millis() as f64 / 100.0).ceil() / 10.0
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Throttling,
    ExternalService,
    Data,
    Security,
    Internal,
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            AnalysisError::transport(format!("failed to decode response: {}", err))
        } else {
            AnalysisError::transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::transport(format!("failed to parse response: {}", err))
    }
}
