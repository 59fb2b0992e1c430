use crate::domain::value_objects::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// レベル 2〜5 に到達する累積 XP
pub const LEVEL_THRESHOLDS: [i64; 4] = [100, 500, 2_000, 5_000];
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSourceType {
    ThreadCreated,
    CommentCreated,
    UpvoteReceived,
    DownvoteReceived,
    Voted,
    DailyLogin,
    ModerateAction,
    ReportValidated,
    ElectionParticipation,
}

impl XpSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            XpSourceType::ThreadCreated => "thread_created",
            XpSourceType::CommentCreated => "comment_created",
            XpSourceType::UpvoteReceived => "upvote_received",
            XpSourceType::DownvoteReceived => "downvote_received",
            XpSourceType::Voted => "voted",
            XpSourceType::DailyLogin => "daily_login",
            XpSourceType::ModerateAction => "moderate_action",
            XpSourceType::ReportValidated => "report_validated",
            XpSourceType::ElectionParticipation => "election_participation",
        }
    }

    /// アクションごとの既定付与量
    pub fn default_amount(&self) -> i64 {
        match self {
            XpSourceType::ThreadCreated => 10,
            XpSourceType::CommentCreated => 5,
            XpSourceType::UpvoteReceived => 2,
            XpSourceType::DownvoteReceived => -1,
            XpSourceType::Voted => 1,
            XpSourceType::DailyLogin => 1,
            XpSourceType::ModerateAction => 15,
            XpSourceType::ReportValidated => 5,
            XpSourceType::ElectionParticipation => 20,
        }
    }
}

impl fmt::Display for XpSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XpSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread_created" => Ok(XpSourceType::ThreadCreated),
            "comment_created" => Ok(XpSourceType::CommentCreated),
            "upvote_received" => Ok(XpSourceType::UpvoteReceived),
            "downvote_received" => Ok(XpSourceType::DownvoteReceived),
            "voted" => Ok(XpSourceType::Voted),
            "daily_login" => Ok(XpSourceType::DailyLogin),
            "moderate_action" => Ok(XpSourceType::ModerateAction),
            "report_validated" => Ok(XpSourceType::ReportValidated),
            "election_participation" => Ok(XpSourceType::ElectionParticipation),
            other => Err(format!("Unknown XP source type: {other}")),
        }
    }
}

/// 追記専用の XP 取引
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: String,
    pub user_id: UserId,
    pub amount: i64,
    pub reason: String,
    pub source_type: Option<XpSourceType>,
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl XpTransaction {
    pub fn new(
        user_id: UserId,
        amount: i64,
        reason: impl Into<String>,
        source_type: Option<XpSourceType>,
        source_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            amount,
            reason: reason.into(),
            source_type,
            source_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpState {
    pub user_id: UserId,
    pub xp: i64,
    pub level: u8,
}

/// 付与の結果。`new_level` はレベルが上がったときだけ `Some`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub xp: i64,
    pub level: u8,
    pub new_level: Option<u8>,
}

impl XpState {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            xp: 0,
            level: MIN_LEVEL,
        }
    }

    /// 付与を反映する。XP は 0 未満にならず、確定済みのレベルは下がらない
    pub fn apply(&mut self, amount: i64) -> XpAward {
        self.xp = self.xp.saturating_add(amount).max(0);
        let computed = level_for_xp(self.xp);
        let new_level = (computed > self.level).then_some(computed);
        self.level = self.level.max(computed);

        XpAward {
            xp: self.xp,
            level: self.level,
            new_level,
        }
    }

    pub fn progress(&self) -> LevelProgress {
        LevelProgress {
            xp: self.xp,
            level: self.level,
            next_level_xp: next_level_xp(self.level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub xp: i64,
    pub level: u8,
    pub next_level_xp: Option<i64>,
}

pub fn level_for_xp(xp: i64) -> u8 {
    let reached = LEVEL_THRESHOLDS
        .iter()
        .take_while(|threshold| xp >= **threshold)
        .count();
    MIN_LEVEL + reached as u8
}

/// 次のレベルに必要な累積 XP。最大レベルでは `None`
pub fn next_level_xp(level: u8) -> Option<i64> {
    if level < MIN_LEVEL {
        return LEVEL_THRESHOLDS.first().copied();
    }
    LEVEL_THRESHOLDS.get(usize::from(level - MIN_LEVEL)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> XpState {
        XpState::new(UserId::new("xp-user").unwrap())
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(499), 2);
        assert_eq!(level_for_xp(500), 3);
        assert_eq!(level_for_xp(2_000), 4);
        assert_eq!(level_for_xp(5_000), 5);
        assert_eq!(level_for_xp(1_000_000), 5);
    }

    #[test]
    fn next_level_thresholds() {
        assert_eq!(next_level_xp(1), Some(100));
        assert_eq!(next_level_xp(2), Some(500));
        assert_eq!(next_level_xp(3), Some(2_000));
        assert_eq!(next_level_xp(4), Some(5_000));
        assert_eq!(next_level_xp(5), None);
    }

    #[test]
    fn crossing_a_threshold_reports_new_level() {
        let mut xp = state();
        xp.xp = 95;
        let award = xp.apply(10);
        assert_eq!(award.xp, 105);
        assert_eq!(award.new_level, Some(2));

        let award = xp.apply(10);
        assert_eq!(award.new_level, None);
        assert_eq!(award.level, 2);
    }

    #[test]
    fn negative_awards_floor_at_zero_and_never_demote() {
        let mut xp = state();
        xp.apply(120);
        let award = xp.apply(-500);
        assert_eq!(award.xp, 0);
        assert_eq!(award.level, 2);
        assert_eq!(award.new_level, None);

        // 同じレベルに戻っても再通知しない
        let award = xp.apply(150);
        assert_eq!(award.new_level, None);
    }

    #[test]
    fn source_type_defaults() {
        assert_eq!(XpSourceType::ThreadCreated.default_amount(), 10);
        assert_eq!(XpSourceType::DownvoteReceived.default_amount(), -1);
        assert_eq!(
            "election_participation".parse::<XpSourceType>().unwrap(),
            XpSourceType::ElectionParticipation
        );
    }
}
