use crate::ai::http::shared_client;
use crate::ai::provider::{AIProvider, ProviderConfig};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama 请求结构
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama 选项
#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: i32,
}

/// Ollama 响应结构
#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// Ollama 本地 AI 提供商，不需要 API key
pub struct OllamaProvider {
    client: &'static Client,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: shared_client(),
        }
    }
}

#[async_trait]
impl AIProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let request = OllamaRequest {
            model: &config.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: config.temperature,
                top_p: 1.0,
                num_predict: config.max_output_tokens as i32,
            },
        };

        let response = self
            .client
            .post(&config.api_url)
            .json(&request)
            .timeout(Duration::from_secs(config.timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama request failed: {} - {}", status, text);
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_request_serialization() {
        let request = OllamaRequest {
            model: "llama3",
            prompt: "review this",
            stream: false,
            options: OllamaOptions {
                temperature: 0.7,
                top_p: 1.0,
                num_predict: 256,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"llama3\""));
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"num_predict\":256"));
    }

    #[test]
    fn test_ollama_response_deserialization() {
        let json = r#"{"model":"llama3","response":"docs: update README","done":true}"#;
        let response: OllamaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.response, "docs: update README");
    }
}
