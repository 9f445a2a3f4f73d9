pub mod gemini;
pub mod ollama;
pub mod openai_compat;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAICompatibleProvider;
