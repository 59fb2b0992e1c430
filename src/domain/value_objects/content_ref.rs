use super::ContentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 投票対象となるコンテンツの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Thread,
    Comment,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Thread => "thread",
            ContentType::Comment => "comment",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(ContentType::Thread),
            "comment" => Ok(ContentType::Comment),
            other => Err(format!("Unknown content type: {other}")),
        }
    }
}

/// 種別付きのコンテンツ参照。投票台帳とスコア計算はこの単位で扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: ContentId,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: ContentId) -> Self {
        Self {
            content_type,
            content_id,
        }
    }

    pub fn thread(content_id: ContentId) -> Self {
        Self::new(ContentType::Thread, content_id)
    }

    pub fn comment(content_id: ContentId) -> Self {
        Self::new(ContentType::Comment, content_id)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}
