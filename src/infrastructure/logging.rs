use std::io;
use std::sync::Mutex;
use std::time::Instant;

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    pub include_file_location: bool,
    pub include_thread_names: bool,
    pub include_span_events: bool,
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            include_file_location: false,
            include_thread_names: false,
            include_span_events: false,
            filter: None,
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读的格式
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式
    Json,
}

impl LogFormat {
    /// 解析 pretty / compact / json，大小写不敏感
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    /// 报告走 stdout 时日志默认写 stderr
    Stderr,
    File(String),
}

impl LogOutput {
    /// stdout / stderr，其他值视为日志文件路径
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "stdout" => LogOutput::Stdout,
            "stderr" | "" => LogOutput::Stderr,
            _ => LogOutput::File(value.to_string()),
        }
    }
}

/// 设置日志系统
pub fn setup_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = if let Some(filter) = &config.filter {
        EnvFilter::try_new(filter)?
    } else {
        EnvFilter::from_default_env()
            .add_directive(format!("git_analyzer={}", config.level).parse()?)
    };

    let fmt_layer = match &config.output {
        LogOutput::Stdout => create_fmt_layer(&config, io::stdout),
        LogOutput::Stderr => create_fmt_layer(&config, io::stderr),
        LogOutput::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            create_fmt_layer(&config, Mutex::new(file))
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn create_fmt_layer<S, W>(config: &LoggingConfig, make_writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let mut layer = fmt::layer::<S>()
        .with_writer(make_writer)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(config.include_thread_names)
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_file_location)
        .with_line_number(config.include_file_location);

    if config.include_span_events {
        layer = layer.with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
    }

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// 分析运行跟踪
///
/// 每次运行生成一个 run_id，开始与结束时各记录一条结构化日志。
pub struct RunTracker {
    run_id: String,
    start_time: Instant,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, "Analysis run started");

        Self {
            run_id,
            start_time: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_stage(&self, stage: &str) {
        tracing::debug!(
            run_id = %self.run_id,
            stage,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "Run stage changed"
        );
    }

    pub fn complete(self, state: &str, succeeded: usize, failed: usize) {
        let duration = self.start_time.elapsed();
        tracing::info!(
            run_id = %self.run_id,
            state,
            succeeded,
            failed,
            duration_ms = duration.as_millis() as u64,
            "Analysis run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(!config.include_file_location);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!(LogOutput::parse("Stdout"), LogOutput::Stdout);
        assert_eq!(LogOutput::parse("stderr"), LogOutput::Stderr);
        assert_eq!(
            LogOutput::parse(" logs/run.log "),
            LogOutput::File("logs/run.log".to_string())
        );
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            filter: Some("git_analyzer=notalevel".to_string()),
            ..LoggingConfig::default()
        };
        assert!(setup_logging(config).is_err());
    }

    #[test]
    fn test_run_tracker_creation() {
        let tracker = RunTracker::new();
        assert!(!tracker.run_id().is_empty());
        assert!(uuid::Uuid::parse_str(tracker.run_id()).is_ok());
        tracker.complete("Done", 3, 0);
    }
}
