use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_USER_ID_LEN: usize = 128;

/// 投票者・投稿者などユーザーの識別子。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("UserId cannot be empty".to_string());
        }
        if trimmed.len() > MAX_USER_ID_LEN {
            return Err(format!("UserId exceeds {MAX_USER_ID_LEN} bytes"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err("UserId cannot contain whitespace".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
