use regex::Regex;
use std::time::Duration;

use crate::infrastructure::{AnalysisError, Result};
use crate::models::{QualityCategory, QualityVerdict};

/// 默认的无信息词
pub const DEFAULT_FILLER_TOKENS: &[&str] = &[
    "wip", "fix", "update", "updates", "changes", "misc", "stuff", "test", "tmp", "temp", ".", "-",
    "commit", "save", "minor", "asdf", "done", "final",
];

/// Conventional Commits 类型
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// 描述性提交常见的动词原形
pub const DEFAULT_DESCRIPTIVE_VERBS: &[&str] = &[
    "add", "allow", "bump", "change", "clean", "convert", "correct", "create", "delete", "disable",
    "document", "drop", "enable", "ensure", "expose", "extract", "fix", "handle", "implement",
    "improve", "introduce", "make", "merge", "migrate", "move", "optimize", "prevent", "reduce",
    "refactor", "remove", "rename", "replace", "restructure", "revert", "rewrite", "simplify",
    "split", "support", "update", "upgrade", "use", "validate",
];

/// 提交质量评估配置
#[derive(Debug, Clone, PartialEq)]
pub struct QualityConfig {
    /// 低于该分数的提交需要 AI 建议
    pub threshold: u8,
    pub min_descriptive_length: usize,
    pub min_descriptive_words: usize,
    /// Conventional 长度加分的主题上限
    pub max_subject_length: usize,
    pub conventional_base_score: u8,
    pub filler_tokens: Vec<String>,
    pub descriptive_verbs: Vec<String>,
    pub conventional_types: Vec<String>,
    pub ai_timeout: Duration,
    /// 每次运行最多调用 AI 的次数
    pub max_enhancements: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: 60,
            min_descriptive_length: 20,
            min_descriptive_words: 3,
            max_subject_length: 72,
            conventional_base_score: 80,
            filler_tokens: to_strings(DEFAULT_FILLER_TOKENS),
            descriptive_verbs: to_strings(DEFAULT_DESCRIPTIVE_VERBS),
            conventional_types: to_strings(COMMIT_TYPES),
            ai_timeout: Duration::from_secs(20),
            max_enhancements: 50,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// 本地启发式提交消息分类器，不访问网络
#[derive(Debug, Clone)]
pub struct CommitClassifier {
    config: QualityConfig,
    conventional: Regex,
}

impl CommitClassifier {
    pub fn new(config: QualityConfig) -> Result<Self> {
        if config.conventional_types.is_empty() {
            return Err(AnalysisError::config("conventional_types must not be empty"));
        }
        if config.threshold > 100 || config.conventional_base_score > 100 {
            return Err(AnalysisError::config("quality scores must be within 0..=100"));
        }

        let types = config
            .conventional_types
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let conventional = Regex::new(&format!(r"^(?:{})(?:\([^)]*\))?!?:\s+\S", types))
            .map_err(|e| AnalysisError::config(format!("invalid conventional pattern: {}", e)))?;

        Ok(Self { config, conventional })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// 对提交消息评分与归类；纯函数，结果只依赖消息文本
    pub fn classify(&self, message: &str) -> QualityVerdict {
        let trimmed = message.trim();
        let subject = trimmed.lines().next().unwrap_or("").trim();
        let has_body = trimmed.lines().skip(1).any(|line| !line.trim().is_empty());

        if subject.is_empty() {
            return QualityVerdict::new(0, QualityCategory::EmptyLike);
        }

        let lowered = subject.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();

        if tokens.iter().all(|token| self.is_filler(token)) {
            let score = if has_body { 10 } else { 5 };
            return QualityVerdict::new(score, QualityCategory::EmptyLike);
        }

        let subject_len = subject.chars().count();

        if self.conventional.is_match(subject) {
            let mut score = self.config.conventional_base_score as u32;
            if has_body {
                score += 10;
            }
            if subject_len <= self.config.max_subject_length {
                score += 10;
            }
            return QualityVerdict::new(score.min(100) as u8, QualityCategory::Conventional);
        }

        let first_word = tokens
            .first()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .unwrap_or("");

        if subject_len >= self.config.min_descriptive_length
            && tokens.len() >= self.config.min_descriptive_words
            && self.is_verb_like(first_word)
        {
            let extra_words = (tokens.len() - self.config.min_descriptive_words).min(5) as u32;
            let mut score = 60 + extra_words * 3;
            if has_body {
                score += 10;
            }
            return QualityVerdict::new(score.min(85) as u8, QualityCategory::Descriptive);
        }

        let score = 20 + (subject_len.min(50) / 2) as u32;
        QualityVerdict::new(score.min(45) as u8, QualityCategory::Vague)
    }

    /// 是否需要 AI 建议
    pub fn needs_enhancement(&self, verdict: &QualityVerdict) -> bool {
        verdict.accepts_suggestion(self.config.threshold)
    }

    fn is_filler(&self, token: &str) -> bool {
        if self.config.filler_tokens.iter().any(|f| f == token) {
            return true;
        }
        let stripped = token.trim_matches(|c: char| !c.is_alphanumeric());
        stripped.is_empty() || self.config.filler_tokens.iter().any(|f| f == stripped)
    }

    /// 动词原形或其 s/es/ed/d/ing 变形
    fn is_verb_like(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        let known = |candidate: &str| self.config.descriptive_verbs.iter().any(|v| v == candidate);
        if known(word) {
            return true;
        }

        for suffix in ["ing", "es", "ed", "s", "d"] {
            if let Some(stem) = word.strip_suffix(suffix) {
                if known(stem) {
                    return true;
                }
                // handling -> handle, moved -> move
                if suffix == "ing" && known(&format!("{}e", stem)) {
                    return true;
                }
            }
        }

        // dropped -> drop, splitting -> split
        for suffix in ["ed", "ing"] {
            if let Some(stem) = word.strip_suffix(suffix) {
                let bytes = stem.as_bytes();
                let n = bytes.len();
                if stem.is_ascii() && n >= 2 && bytes[n - 1] == bytes[n - 2] && known(&stem[..n - 1]) {
                    return true;
                }
            }
        }

        false
    }
}
