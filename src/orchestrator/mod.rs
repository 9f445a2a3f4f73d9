//! 分析运行编排：状态机、并发抓取、速率限制暂停与取消。

pub mod config;
pub mod gate;
pub mod runner;

pub use config::OrchestratorConfig;
pub use gate::RateLimitGate;
pub use runner::Orchestrator;
