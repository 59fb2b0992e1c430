use crate::domain::value_objects::{BotFlags, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustBand {
    Trusted,
    Neutral,
    Suspicious,
}

impl TrustBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => TrustBand::Trusted,
            50..=79 => TrustBand::Neutral,
            _ => TrustBand::Suspicious,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrustBand::Trusted => "Trusted",
            TrustBand::Neutral => "Neutral",
            TrustBand::Suspicious => "Suspicious",
        }
    }
}

impl fmt::Display for TrustBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// ユーザーの信頼度と Bot 判定。`is_bot` と `trust_score` は独立に導出される
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustProfile {
    pub user_id: UserId,
    pub flags: BotFlags,
    pub trust_score: u8,
    pub bot_score: u8,
    pub is_bot: bool,
    pub last_evaluated: DateTime<Utc>,
}

impl TrustProfile {
    pub fn band(&self) -> TrustBand {
        TrustBand::from_score(self.trust_score)
    }
}

/// 信頼スコアの入力（モデレーション履歴など）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustFactors {
    pub account_age_days: u32,
    pub verified_email: bool,
    pub verified_phone: bool,
    pub positive_interactions: u32,
    pub negative_interactions: u32,
    pub moderator_warnings: u32,
    pub successful_reports: u32,
    pub false_reports: u32,
}

/// 外部のアクティビティカウンタから集めた評価材料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvidence {
    pub posts_last_hour: u32,
    pub total_posts: u32,
    pub short_posts: u32,
    /// 直近の投稿本文（重複・リンク判定に使う）
    pub recent_contents: Vec<String>,
    pub votes_last_hour: u32,
    /// 直近の投票のうち最も多く投票した相手への割合 (0.0..=1.0)
    pub top_vote_target_share: f64,
    pub votes_considered: u32,
    pub trust_factors: TrustFactors,
}
