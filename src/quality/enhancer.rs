use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ai::{AIProvider, PromptBuilder, ProviderConfig};
use crate::infrastructure::{AnalysisError, CancellationToken, Result};
use crate::models::QualityVerdict;

static WRAPPING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A```[a-zA-Z]*[ \t]*\n?(.*?)\n?\s*```\z").unwrap());

/// 去除首尾空白；整段回复被单个代码块包裹时去掉代码块标记，其余内容原样保留
pub fn clean_suggestion(response: &str) -> String {
    let trimmed = response.trim();
    let inner = WRAPPING_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.contains("```"));

    inner.unwrap_or(trimmed).trim().to_owned()
}

/// 通过 AI 提供商为提交消息生成改写建议
pub struct CommitEnhancer {
    provider: Arc<dyn AIProvider>,
    provider_config: ProviderConfig,
    prompts: PromptBuilder,
    types: Vec<String>,
    timeout: Duration,
}

impl CommitEnhancer {
    pub fn new(provider: Arc<dyn AIProvider>, provider_config: ProviderConfig, timeout: Duration) -> Self {
        Self {
            provider,
            provider_config,
            prompts: PromptBuilder::new(),
            types: crate::quality::COMMIT_TYPES.iter().map(|t| t.to_string()).collect(),
            timeout,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// 请求改写建议
    ///
    /// 调用前检查取消；调用受 `timeout` 限制并与取消信号竞争。
    /// 提供商错误、超时与空响应都映射为 `AiUnavailable`。
    pub async fn enhance(&self, message: &str, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let name = self.provider.name();
        let prompt = self
            .prompts
            .build_review_prompt(message, &self.types)
            .map_err(|e| AnalysisError::ai_unavailable(name, e.to_string()))?;

        let call = tokio::time::timeout(self.timeout, self.provider.generate(&prompt, &self.provider_config));

        tokio::select! {
            _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = call => match result {
                Err(_) => Err(AnalysisError::ai_unavailable(
                    name,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                )),
                Ok(Err(e)) => Err(AnalysisError::ai_unavailable(name, e.to_string())),
                Ok(Ok(response)) => {
                    let suggestion = clean_suggestion(&response);
                    if suggestion.is_empty() {
                        Err(AnalysisError::ai_unavailable(name, "empty response"))
                    } else {
                        Ok(suggestion)
                    }
                }
            },
        }
    }

    /// 为 verdict 获取建议并写回
    ///
    /// 失败时只记录 enhancement 状态，不改变 category 与 score。
    pub async fn enhance_verdict(
        &self,
        verdict: &mut QualityVerdict,
        message: &str,
        threshold: u8,
        cancel: &CancellationToken,
    ) -> Option<AnalysisError> {
        if !verdict.accepts_suggestion(threshold) {
            return None;
        }

        match self.enhance(message, cancel).await {
            Ok(suggestion) => {
                debug!(commit = %verdict.commit_hash, "AI suggestion attached");
                verdict.attach_suggestion(suggestion, threshold);
                None
            }
            Err(AnalysisError::Cancelled) => {
                verdict.mark_skipped();
                Some(AnalysisError::Cancelled)
            }
            Err(e) => {
                warn!(commit = %verdict.commit_hash, error = %e, "AI enhancement unavailable");
                verdict.mark_unavailable(e.to_string());
                Some(e)
            }
        }
    }
}
