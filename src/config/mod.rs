use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::ai::{ProviderConfig, ProviderFactory};
use crate::github::{FetchConfig, SecretToken};
use crate::infrastructure::{AnalysisError, LogFormat, LogOutput, LoggingConfig, Result};
use crate::orchestrator::OrchestratorConfig;
use crate::quality::QualityConfig;

const ENV_PREFIX: &str = "GIT_ANALYZER_";

/// 运行配置
///
/// 加载顺序：默认值 → `.env` 文件 → `GIT_ANALYZER_*` 环境变量 → 命令行参数。
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<SecretToken>,
    pub github_api_url: String,
    pub request_timeout_secs: u64,
    pub ai_provider: String,
    pub ai_model: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_url: Option<String>,
    /// 自定义提交评审提示词模板文件
    pub prompt_file: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub quality: QualityConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
    /// 加载阶段的告警，日志初始化后由调用方输出
    load_warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: crate::github::http::DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            ai_provider: "gemini".to_string(),
            ai_model: None,
            ai_api_key: None,
            ai_url: None,
            prompt_file: None,
            fetch: FetchConfig::default(),
            quality: QualityConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            logging: LoggingConfig::default(),
            load_warnings: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config::default();

        #[cfg(not(test))]
        config.load_from_env_file();
        config.load_from_env();

        config
    }

    pub fn load_from_env_file(&mut self) {
        if let Ok(home) = env::var("HOME") {
            let user_env_path = PathBuf::from(home).join(".git-analyzer").join(".env");
            if user_env_path.exists() {
                if let Err(e) = self.load_from_file(&user_env_path) {
                    self.load_warnings.push(format!("Ignoring user env file: {}", e));
                }
            }
        }

        dotenvy::dotenv().ok();
    }

    /// 直接读取指定 `.env` 文件中的键值，不写入进程环境变量
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| AnalysisError::config(format!("cannot read {}: {}", path.display(), e)))?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| AnalysisError::config(format!("invalid line in {}: {}", path.display(), e)))?;
            values.insert(key, value);
        }

        self.load_from_vars(|key| values.get(key).cloned());
        Ok(())
    }

    pub fn load_from_env(&mut self) {
        self.load_from_vars(|key| env::var(key).ok());
    }

    /// 从任意键值来源加载；无法解析的值保留原值并记入 [`Config::take_warnings`]
    pub fn load_from_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let var = |name: &str| present(&format!("{}{}", ENV_PREFIX, name));
        let mut warnings = Vec::new();

        // GITHUB_ACCESS_TOKEN / GEMINI_API_TOKEN 兼容旧版 .env
        if let Some(token) = var("GITHUB_TOKEN")
            .or_else(|| present("GITHUB_TOKEN"))
            .or_else(|| present("GITHUB_ACCESS_TOKEN"))
        {
            self.github_token = Some(SecretToken::new(token));
        }
        if let Some(url) = var("GITHUB_API_URL") {
            self.github_api_url = url;
        }
        parse_into(var("REQUEST_TIMEOUT"), "REQUEST_TIMEOUT", &mut self.request_timeout_secs, &mut warnings);

        if let Some(provider) = var("AI_PROVIDER") {
            self.ai_provider = provider.trim().to_lowercase();
        }
        if let Some(model) = var("AI_MODEL") {
            self.ai_model = Some(model);
        }
        if let Some(url) = var("AI_URL") {
            self.ai_url = Some(url);
        }
        if let Some(path) = var("PROMPT_FILE") {
            self.prompt_file = Some(PathBuf::from(path));
        }
        if let Some(key) = var("AI_API_KEY") {
            self.ai_api_key = Some(key);
        } else if self.ai_provider == "gemini" {
            if let Some(key) = present("GEMINI_API_KEY").or_else(|| present("GEMINI_API_TOKEN")) {
                self.ai_api_key = Some(key);
            }
        }

        parse_into(var("MAX_PAGES"), "MAX_PAGES", &mut self.fetch.max_pages, &mut warnings);
        parse_into(var("PER_PAGE"), "PER_PAGE", &mut self.fetch.per_page, &mut warnings);
        parse_into(var("WITH_STATS"), "WITH_STATS", &mut self.fetch.include_stats, &mut warnings);
        if let Some(author) = var("AUTHOR") {
            self.fetch.author = Some(author);
        }

        parse_into(var("CONCURRENCY"), "CONCURRENCY", &mut self.orchestrator.concurrency, &mut warnings);
        parse_into(
            var("MAX_RATE_LIMIT_RETRIES"),
            "MAX_RATE_LIMIT_RETRIES",
            &mut self.orchestrator.max_rate_limit_retries,
            &mut warnings,
        );
        parse_into(var("INCLUDE_FORKS"), "INCLUDE_FORKS", &mut self.orchestrator.include_forks, &mut warnings);
        parse_into(var("ENABLE_AI"), "ENABLE_AI", &mut self.orchestrator.enable_ai, &mut warnings);
        if let Some(repositories) = var("REPOSITORIES") {
            self.orchestrator.repositories = repositories
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }

        parse_into(var("QUALITY_THRESHOLD"), "QUALITY_THRESHOLD", &mut self.quality.threshold, &mut warnings);
        parse_into(
            var("MIN_DESCRIPTIVE_LENGTH"),
            "MIN_DESCRIPTIVE_LENGTH",
            &mut self.quality.min_descriptive_length,
            &mut warnings,
        );
        parse_into(var("MAX_ENHANCEMENTS"), "MAX_ENHANCEMENTS", &mut self.quality.max_enhancements, &mut warnings);
        let mut ai_timeout = self.quality.ai_timeout.as_secs();
        parse_into(var("AI_TIMEOUT"), "AI_TIMEOUT", &mut ai_timeout, &mut warnings);
        self.quality.ai_timeout = Duration::from_secs(ai_timeout);

        parse_into(var("LOG_LEVEL"), "LOG_LEVEL", &mut self.logging.level, &mut warnings);
        if let Some(format) = var("LOG_FORMAT") {
            match LogFormat::parse(&format) {
                Some(format) => self.logging.format = format,
                None => warnings.push(invalid_value("LOG_FORMAT", &format)),
            }
        }
        if let Some(output) = var("LOG_OUTPUT") {
            self.logging.output = LogOutput::parse(&output);
        }
        if let Some(filter) = var("LOG_FILTER") {
            self.logging.filter = Some(filter);
        }
        parse_into(
            var("LOG_FILE_LOCATION"),
            "LOG_FILE_LOCATION",
            &mut self.logging.include_file_location,
            &mut warnings,
        );
        parse_into(
            var("LOG_THREAD_NAMES"),
            "LOG_THREAD_NAMES",
            &mut self.logging.include_thread_names,
            &mut warnings,
        );
        parse_into(
            var("LOG_SPAN_EVENTS"),
            "LOG_SPAN_EVENTS",
            &mut self.logging.include_span_events,
            &mut warnings,
        );

        self.load_warnings.extend(warnings);
    }

    /// 取出加载阶段积累的告警
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.load_warnings)
    }

    pub fn update_from_args(&mut self, args: &crate::cli::args::Args) {
        // 命令行参数优先级最高
        if !args.repositories.is_empty() {
            self.orchestrator.repositories = args.repositories.clone();
        }
        if args.since.is_some() {
            self.orchestrator.since = args.since;
        }
        if let Some(author) = &args.author {
            self.fetch.author = Some(author.clone());
        }
        if let Some(concurrency) = args.concurrency {
            self.orchestrator.concurrency = concurrency;
        }
        if let Some(max_pages) = args.max_pages {
            self.fetch.max_pages = max_pages;
        }
        if args.no_ai {
            self.orchestrator.enable_ai = false;
        }
        if args.include_forks {
            self.orchestrator.include_forks = true;
        }
        if args.with_stats {
            self.fetch.include_stats = true;
        }
        if let Some(provider) = &args.provider {
            self.ai_provider = provider.trim().to_lowercase();
        }
        if let Some(model) = &args.model {
            self.ai_model = Some(model.clone());
        }
        if args.verbose {
            self.logging.level = Level::DEBUG;
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.github_token {
            Some(token) if !token.is_empty() => {}
            _ => {
                return Err(AnalysisError::config(
                    "GitHub token is required. Set GITHUB_TOKEN or GIT_ANALYZER_GITHUB_TOKEN in the environment or .env file",
                ))
            }
        }

        if self.orchestrator.concurrency == 0 {
            return Err(AnalysisError::config("concurrency must be at least 1"));
        }
        if self.fetch.max_pages == 0 {
            return Err(AnalysisError::config("max_pages must be at least 1"));
        }
        if !(1..=crate::github::fetcher::MAX_PER_PAGE).contains(&self.fetch.per_page) {
            return Err(AnalysisError::config("per_page must be within 1..=100"));
        }
        if self.quality.threshold > 100 {
            return Err(AnalysisError::config("quality threshold must be within 0..=100"));
        }
        if let Some(bad) = self
            .orchestrator
            .repositories
            .iter()
            .find(|r| r.split('/').filter(|part| !part.is_empty()).count() != 2)
        {
            return Err(AnalysisError::config(format!(
                "repository must be owner/name, got '{}'",
                bad
            )));
        }

        if self.orchestrator.enable_ai {
            if self.quality.ai_timeout.is_zero() {
                return Err(AnalysisError::config("AI timeout must be at least 1 second"));
            }
            if !ProviderFactory::list_providers().contains(&self.ai_provider.as_str()) {
                return Err(AnalysisError::config(format!(
                    "Unsupported AI provider: {}",
                    self.ai_provider
                )));
            }
            if ProviderFactory::requires_api_key(&self.ai_provider) && self.ai_api_key.is_none() {
                return Err(AnalysisError::config(format!(
                    "{} API key is required but not set. Set GIT_ANALYZER_AI_API_KEY or pass --no-ai",
                    self.ai_provider
                )));
            }
        }

        Ok(())
    }

    /// 当前提供商的请求配置
    pub fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::for_provider(&self.ai_provider);
        if let Some(model) = &self.ai_model {
            config.model = model.clone();
        }
        if let Some(url) = &self.ai_url {
            config.api_url = url.clone();
        }
        config.api_key = self.ai_api_key.clone();
        config.timeout_secs = self.quality.ai_timeout.as_secs().max(1);
        config
    }

    pub fn logging_config(&self) -> LoggingConfig {
        self.logging.clone()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_into<T: FromStr>(value: Option<String>, name: &str, target: &mut T, warnings: &mut Vec<String>) {
    if let Some(value) = value {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warnings.push(invalid_value(name, &value)),
        }
    }
}

fn invalid_value(name: &str, value: &str) -> String {
    format!("Ignoring invalid value for {}{}: {}", ENV_PREFIX, name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::Args;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# local settings").unwrap();
        writeln!(file, "GIT_ANALYZER_GITHUB_TOKEN=ghp_from_file").unwrap();
        writeln!(file, "GIT_ANALYZER_QUALITY_THRESHOLD=70").unwrap();
        writeln!(file, "GIT_ANALYZER_WITH_STATS=true").unwrap();

        let mut config = Config::default();
        config.load_from_file(file.path()).unwrap();

        assert_eq!(config.github_token.unwrap().expose(), "ghp_from_file");
        assert_eq!(config.quality.threshold, 70);
        assert!(config.fetch.include_stats);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        let err = config.load_from_file(&dir.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration { .. }));
    }

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        config.load_from_vars(|key| vars.get(key).cloned());
        config
    }

    fn valid() -> Config {
        let mut config = load(&[("GITHUB_TOKEN", "ghp_test"), ("GEMINI_API_KEY", "g-key")]);
        config.orchestrator.repositories = vec!["octo/repo".to_string()];
        config
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]);
        assert!(config.github_token.is_none());
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.ai_provider, "gemini");
        assert_eq!(config.fetch.max_pages, 10);
        assert_eq!(config.orchestrator.concurrency, 4);
        assert_eq!(config.quality.threshold, 60);
        assert_eq!(config.quality.ai_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_config_from_vars() {
        let config = load(&[
            ("GIT_ANALYZER_GITHUB_TOKEN", "ghp_prefixed"),
            ("GITHUB_TOKEN", "ghp_plain"),
            ("GIT_ANALYZER_AI_PROVIDER", "Ollama"),
            ("GIT_ANALYZER_MAX_PAGES", "3"),
            ("GIT_ANALYZER_CONCURRENCY", "2"),
            ("GIT_ANALYZER_INCLUDE_FORKS", "true"),
            ("GIT_ANALYZER_REPOSITORIES", "a/one, b/two,,"),
            ("GIT_ANALYZER_AI_TIMEOUT", "5"),
            ("GIT_ANALYZER_LOG_FORMAT", "json"),
            ("GIT_ANALYZER_LOG_LEVEL", "debug"),
            ("GIT_ANALYZER_PROMPT_FILE", "prompts/review.txt"),
        ]);

        assert_eq!(config.github_token.unwrap().expose(), "ghp_prefixed");
        assert_eq!(config.ai_provider, "ollama");
        assert_eq!(config.fetch.max_pages, 3);
        assert_eq!(config.orchestrator.concurrency, 2);
        assert!(config.orchestrator.include_forks);
        assert_eq!(config.orchestrator.repositories, vec!["a/one", "b/two"]);
        assert_eq!(config.quality.ai_timeout, Duration::from_secs(5));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, Level::DEBUG);
        assert_eq!(config.prompt_file, Some(PathBuf::from("prompts/review.txt")));
    }

    #[test]
    fn test_logging_from_vars() {
        let config = load(&[
            ("GIT_ANALYZER_LOG_OUTPUT", "/tmp/git-analyzer.log"),
            ("GIT_ANALYZER_LOG_SPAN_EVENTS", "true"),
            ("GIT_ANALYZER_LOG_THREAD_NAMES", "true"),
            ("GIT_ANALYZER_LOG_FILE_LOCATION", "true"),
            ("GIT_ANALYZER_LOG_FILTER", "git_analyzer=trace"),
        ]);

        let logging = config.logging_config();
        assert_eq!(logging.output, LogOutput::File("/tmp/git-analyzer.log".to_string()));
        assert!(logging.include_span_events);
        assert!(logging.include_thread_names);
        assert!(logging.include_file_location);
        assert_eq!(logging.filter.as_deref(), Some("git_analyzer=trace"));

        let config = load(&[("GIT_ANALYZER_LOG_OUTPUT", "STDOUT")]);
        assert_eq!(config.logging.output, LogOutput::Stdout);
    }

    #[test]
    fn test_legacy_token_names() {
        let config = load(&[("GITHUB_ACCESS_TOKEN", "ghp_legacy"), ("GEMINI_API_TOKEN", "g-legacy")]);
        assert_eq!(config.github_token.unwrap().expose(), "ghp_legacy");
        assert_eq!(config.ai_api_key.as_deref(), Some("g-legacy"));

        let config = load(&[("GITHUB_TOKEN", "ghp_current"), ("GITHUB_ACCESS_TOKEN", "ghp_legacy")]);
        assert_eq!(config.github_token.unwrap().expose(), "ghp_current");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("GIT_ANALYZER_MAX_PAGES", "many"),
            ("GIT_ANALYZER_ENABLE_AI", "maybe"),
            ("GIT_ANALYZER_LOG_FORMAT", "xml"),
        ]);
        assert_eq!(config.fetch.max_pages, 10);
        assert!(config.orchestrator.enable_ai);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_invalid_values_reported_as_warnings() {
        let mut config = load(&[
            ("GIT_ANALYZER_CONCURRENCY", "lots"),
            ("GIT_ANALYZER_LOG_FORMAT", "xml"),
        ]);

        let warnings = config.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("GIT_ANALYZER_CONCURRENCY") && w.contains("lots")));
        assert!(config.take_warnings().is_empty());
    }

    #[test]
    fn test_invalid_file_value_reported_as_warning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "GIT_ANALYZER_MAX_PAGES=abc").unwrap();

        let mut config = Config::default();
        config.load_from_file(file.path()).unwrap();
        assert_eq!(config.take_warnings().len(), 1);
    }

    #[test]
    fn test_gemini_key_fallback_only_for_gemini() {
        let config = load(&[("GEMINI_API_KEY", "g-key")]);
        assert_eq!(config.ai_api_key.as_deref(), Some("g-key"));

        let config = load(&[("GEMINI_API_KEY", "g-key"), ("GIT_ANALYZER_AI_PROVIDER", "openai")]);
        assert!(config.ai_api_key.is_none());
    }

    #[test]
    fn test_update_from_args() {
        let mut config = valid();
        let args = Args {
            repositories: vec!["x/y".to_string()],
            concurrency: Some(9),
            max_pages: Some(2),
            no_ai: true,
            with_stats: true,
            provider: Some("OpenAI".to_string()),
            verbose: true,
            ..Args::default()
        };
        config.update_from_args(&args);

        assert_eq!(config.orchestrator.repositories, vec!["x/y"]);
        assert_eq!(config.orchestrator.concurrency, 9);
        assert_eq!(config.fetch.max_pages, 2);
        assert!(!config.orchestrator.enable_ai);
        assert!(config.fetch.include_stats);
        assert_eq!(config.ai_provider, "openai");
        assert_eq!(config.logging.level, Level::DEBUG);
    }

    #[test]
    fn test_config_validation() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.github_token = None;
        assert!(matches!(config.validate(), Err(AnalysisError::Configuration { .. })));

        let mut config = valid();
        config.ai_api_key = None;
        assert!(config.validate().is_err());
        config.orchestrator.enable_ai = false;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.ai_provider = "ollama".to_string();
        config.ai_api_key = None;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.ai_provider = "unsupported".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.orchestrator.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.quality.ai_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.orchestrator.enable_ai = false;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.orchestrator.repositories = vec!["not-a-repo".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_config() {
        let mut config = valid();
        config.ai_model = Some("gemini-1.5-pro".to_string());
        let provider = config.provider_config();
        assert_eq!(provider.model, "gemini-1.5-pro");
        assert_eq!(provider.api_key.as_deref(), Some("g-key"));
        assert_eq!(provider.timeout_secs, 20);
    }
}
