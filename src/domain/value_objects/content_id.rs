use serde::{Deserialize, Serialize};
use std::fmt;

/// スレッド・コメントの識別子（UUID 文字列）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// 既存の識別子文字列から `ContentId` を生成する。
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("ContentId cannot be empty".to_string());
        }
        let parsed = uuid::Uuid::parse_str(trimmed)
            .map_err(|err| format!("Invalid ContentId format: {err}"))?;
        Ok(Self(parsed.hyphenated().to_string()))
    }

    /// 新規 ContentId を生成する。
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0
    }
}
