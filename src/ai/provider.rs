use anyhow::Result;
use async_trait::async_trait;

use super::providers::{GeminiProvider, OllamaProvider, OpenAICompatibleProvider};

/// AI 提供商配置
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: String::from("gemini-1.5-flash-latest"),
            api_key: None,
            api_url: String::from("https://generativelanguage.googleapis.com/v1beta"),
            timeout_secs: 20,
            temperature: 0.7,
            max_output_tokens: 256,
        }
    }
}

impl ProviderConfig {
    /// 指定提供商的默认模型与地址
    pub fn for_provider(name: &str) -> Self {
        let base = Self::default();
        match name.to_lowercase().as_str() {
            "ollama" => Self {
                model: String::from("llama3"),
                api_url: String::from("http://localhost:11434/api/generate"),
                timeout_secs: 60,
                ..base
            },
            "openai" => Self {
                model: String::from("gpt-4o-mini"),
                api_url: String::from("https://api.openai.com/v1/chat/completions"),
                ..base
            },
            "deepseek" => Self {
                model: String::from("deepseek-chat"),
                api_url: String::from("https://api.deepseek.com/v1/chat/completions"),
                ..base
            },
            _ => base,
        }
    }
}

/// AI 提供商接口
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// 提供商名称，用于日志和错误信息
    fn name(&self) -> &str;

    /// 生成响应（非流式）
    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String>;
}

/// AI 提供商工厂
pub struct ProviderFactory;

impl ProviderFactory {
    /// 根据名称创建提供商
    pub fn create(name: &str) -> Result<Box<dyn AIProvider>> {
        match name.to_lowercase().as_str() {
            "gemini" => Ok(Box::new(GeminiProvider::new())),
            "ollama" => Ok(Box::new(OllamaProvider::new())),
            "openai" => Ok(Box::new(OpenAICompatibleProvider::new("openai"))),
            "deepseek" => Ok(Box::new(OpenAICompatibleProvider::new("deepseek"))),
            _ => anyhow::bail!("Unknown AI provider: {}", name),
        }
    }

    /// 获取所有支持的提供商列表
    pub fn list_providers() -> Vec<&'static str> {
        vec!["gemini", "ollama", "openai", "deepseek"]
    }

    /// 提供商是否需要 API key
    pub fn requires_api_key(name: &str) -> bool {
        !name.eq_ignore_ascii_case("ollama")
    }
}
