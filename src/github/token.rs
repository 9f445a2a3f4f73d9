use std::fmt;

/// GitHub 个人访问令牌
///
/// 只在运行期间保存在内存中：不实现 Serialize，Debug/Display 输出脱敏。
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// 取出原始值，仅用于构造请求头
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for SecretToken {
    fn from(value: &str) -> Self {
        SecretToken::new(value)
    }
}

impl From<String> for SecretToken {
    fn from(value: String) -> Self {
        SecretToken::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let token = SecretToken::new("ghp_supersecret");
        assert_eq!(format!("{:?}", token), "SecretToken(***)");
        assert_eq!(token.to_string(), "***");
        assert_eq!(token.expose(), "ghp_supersecret");
    }

    #[test]
    fn test_token_trimmed_and_empty() {
        assert!(SecretToken::new("   ").is_empty());
        assert_eq!(SecretToken::from(" abc \n").expose(), "abc");
    }
}
