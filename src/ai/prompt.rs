use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

pub const REVIEW_TEMPLATE_NAME: &str = "commit_review";

const COMMIT_REVIEW_TEMPLATE: &str = r#"As an expert programmer and code reviewer, analyze the following Git commit message.
Provide brief, actionable feedback on its clarity, conciseness, and adherence to
the conventional commit format (e.g., `<type>(<scope>): <subject>`, allowed types: {{types}}).
If the message can be improved, suggest a better version.

Commit Message:
{{message}}

Your analysis:"#;

/// 提示词模板
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub template: String,
    pub variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        let mut variables: Vec<String> = VARIABLE_PATTERN
            .captures_iter(&template)
            .map(|cap| cap[1].to_string())
            .collect();
        variables.dedup();

        Self {
            name: name.into(),
            template,
            variables,
        }
    }

    /// 渲染模板，缺少变量时报错
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String> {
        let mut result = self.template.clone();

        for var in &self.variables {
            let value = values
                .get(var.as_str())
                .ok_or_else(|| anyhow::anyhow!("Missing variable: {}", var))?;
            result = result.replace(&format!("{{{{{}}}}}", var), value);
        }

        Ok(result)
    }
}

/// 从文件读取提交评审模板，模板必须引用 `{{message}}`
pub fn load_review_template(path: &Path) -> Result<PromptTemplate> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read prompt file {}: {}", path.display(), e))?;
    let template = PromptTemplate::new(REVIEW_TEMPLATE_NAME, text);
    if !template.variables.iter().any(|v| v == "message") {
        anyhow::bail!("Prompt file {} does not reference {{{{message}}}}", path.display());
    }
    Ok(template)
}

/// 提示词构建器
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: HashMap<String, PromptTemplate>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            REVIEW_TEMPLATE_NAME.to_string(),
            PromptTemplate::new(REVIEW_TEMPLATE_NAME, COMMIT_REVIEW_TEMPLATE),
        );
        Self { templates }
    }

    /// 覆盖或新增模板
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.templates.insert(template.name.clone(), template);
        self
    }

    /// 构建提交信息改写提示词
    pub fn build_review_prompt(&self, message: &str, types: &[String]) -> Result<String> {
        let template = self
            .templates
            .get(REVIEW_TEMPLATE_NAME)
            .ok_or_else(|| anyhow::anyhow!("Commit review template not found"))?;

        let mut values = HashMap::new();
        values.insert("message", message.trim().to_string());
        values.insert("types", types.join(", "));

        template.render(&values)
    }
}
