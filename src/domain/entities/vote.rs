use crate::domain::value_objects::{ContentRef, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" | "upvote" => Ok(VoteType::Up),
            "down" | "downvote" => Ok(VoteType::Down),
            other => Err(format!("Unknown vote type: {other}")),
        }
    }
}

/// (voter, content) ごとの投票状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    #[default]
    NoVote,
    Upvoted,
    Downvoted,
}

impl VoteState {
    pub fn from_vote(vote: Option<VoteType>) -> Self {
        match vote {
            None => VoteState::NoVote,
            Some(VoteType::Up) => VoteState::Upvoted,
            Some(VoteType::Down) => VoteState::Downvoted,
        }
    }

    /// 状態が保持する投票行。`NoVote` は行なし
    pub fn vote_type(&self) -> Option<VoteType> {
        match self {
            VoteState::NoVote => None,
            VoteState::Upvoted => Some(VoteType::Up),
            VoteState::Downvoted => Some(VoteType::Down),
        }
    }

    /// 同じ投票を続けて行うとトグルで `NoVote` に戻る
    pub fn apply(self, vote: VoteType) -> VoteTransition {
        let (up_delta, down_delta, new_state) = match (self, vote) {
            (VoteState::NoVote, VoteType::Up) => (1, 0, VoteState::Upvoted),
            (VoteState::Upvoted, VoteType::Up) => (-1, 0, VoteState::NoVote),
            (VoteState::NoVote, VoteType::Down) => (0, 1, VoteState::Downvoted),
            (VoteState::Downvoted, VoteType::Down) => (0, -1, VoteState::NoVote),
            (VoteState::Upvoted, VoteType::Down) => (-1, 1, VoteState::Downvoted),
            (VoteState::Downvoted, VoteType::Up) => (1, -1, VoteState::Upvoted),
        };

        VoteTransition {
            previous_state: self,
            up_delta,
            down_delta,
            new_state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTransition {
    pub previous_state: VoteState,
    pub up_delta: i32,
    pub down_delta: i32,
    pub new_state: VoteState,
}

impl VoteTransition {
    pub fn is_switch(&self) -> bool {
        self.up_delta != 0 && self.down_delta != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: UserId,
    pub content: ContentRef,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteStats {
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
    pub user_vote: Option<VoteType>,
}

/// 推移を集計する期間
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendTimeframe {
    Day,
    #[default]
    Week,
    Month,
}

impl TrendTimeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }
}

/// 推移のバケット幅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendInterval {
    Hour,
    #[default]
    Day,
}

impl TrendInterval {
    fn millis(&self) -> i64 {
        match self {
            Self::Hour => 60 * 60 * 1000,
            Self::Day => 24 * 60 * 60 * 1000,
        }
    }

    /// `at` を含むバケットの開始時刻 (UTC 基準)
    pub fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.millis();
        let start = at.timestamp_millis().div_euclid(width) * width;
        DateTime::from_timestamp_millis(start).unwrap_or(at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTrendPoint {
    pub timestamp: DateTime<Utc>,
    pub upvotes: u32,
    pub downvotes: u32,
    /// このバケットまでの (upvotes - downvotes) の累計
    pub cumulative_score: i64,
}

/// 投票を `interval` 幅のバケットに分け、古い順に累計スコア付きで返す。
/// 投票の無いバケットは出力しない
pub fn vote_trends(votes: &[Vote], interval: TrendInterval) -> Vec<VoteTrendPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, (u32, u32)> = BTreeMap::new();
    for vote in votes {
        let bucket = buckets
            .entry(interval.bucket_start(vote.created_at))
            .or_default();
        match vote.vote_type {
            VoteType::Up => bucket.0 = bucket.0.saturating_add(1),
            VoteType::Down => bucket.1 = bucket.1.saturating_add(1),
        }
    }

    let mut cumulative_score = 0i64;
    buckets
        .into_iter()
        .map(|(timestamp, (upvotes, downvotes))| {
            cumulative_score += i64::from(upvotes) - i64::from(downvotes);
            VoteTrendPoint {
                timestamp,
                upvotes,
                downvotes,
                cumulative_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(votes: &[VoteType]) -> (VoteState, i32, i32) {
        votes
            .iter()
            .fold((VoteState::NoVote, 0, 0), |(state, up, down), vote| {
                let t = state.apply(*vote);
                (t.new_state, up + t.up_delta, down + t.down_delta)
            })
    }

    #[test]
    fn transition_table_matches_ledger_rules() {
        use VoteState::*;
        use VoteType::*;
        let cases = [
            (NoVote, Up, 1, 0, Upvoted),
            (Upvoted, Up, -1, 0, NoVote),
            (NoVote, Down, 0, 1, Downvoted),
            (Downvoted, Down, 0, -1, NoVote),
            (Upvoted, Down, -1, 1, Downvoted),
            (Downvoted, Up, 1, -1, Upvoted),
        ];
        for (from, vote, up, down, to) in cases {
            let t = from.apply(vote);
            assert_eq!((t.up_delta, t.down_delta, t.new_state), (up, down, to));
            assert_eq!(t.previous_state, from);
        }
    }

    #[test]
    fn repeated_vote_toggles_back_to_no_vote() {
        assert_eq!(run(&[VoteType::Up, VoteType::Up]), (VoteState::NoVote, 0, 0));
        assert_eq!(
            run(&[VoteType::Up, VoteType::Up, VoteType::Up]),
            (VoteState::Upvoted, 1, 0)
        );
    }

    #[test]
    fn switch_moves_one_vote_between_counters() {
        let t = VoteState::Upvoted.apply(VoteType::Down);
        assert!(t.is_switch());
        assert_eq!((t.up_delta, t.down_delta), (-1, 1));
    }

    #[test]
    fn counters_never_go_negative_along_any_sequence() {
        use VoteType::*;
        let sequence = [Up, Down, Down, Up, Up, Down, Up, Up];
        let mut state = VoteState::NoVote;
        let (mut up, mut down) = (0i32, 0i32);
        for vote in sequence {
            let t = state.apply(vote);
            up += t.up_delta;
            down += t.down_delta;
            state = t.new_state;
            assert!(up >= 0 && down >= 0);
            assert_eq!(
                (up, down),
                match state {
                    VoteState::NoVote => (0, 0),
                    VoteState::Upvoted => (1, 0),
                    VoteState::Downvoted => (0, 1),
                }
            );
        }
    }

    fn vote_at(vote_type: VoteType, at: &str) -> Vote {
        let at = DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc);
        Vote {
            voter_id: UserId::new("trend-voter").unwrap(),
            content: ContentRef::thread(crate::domain::value_objects::ContentId::random()),
            vote_type,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn trends_bucket_by_interval_with_running_score() {
        use VoteType::*;
        let votes = [
            vote_at(Up, "2026-10-01T09:15:00Z"),
            vote_at(Down, "2026-10-02T10:00:00Z"),
            vote_at(Up, "2026-10-01T23:59:59Z"),
            vote_at(Down, "2026-10-02T10:30:00Z"),
            vote_at(Down, "2026-10-04T00:00:00Z"),
        ];

        let daily = vote_trends(&votes, TrendInterval::Day);
        let summary: Vec<_> = daily
            .iter()
            .map(|p| (p.timestamp.to_rfc3339(), p.upvotes, p.downvotes, p.cumulative_score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("2026-10-01T00:00:00+00:00".to_string(), 2, 0, 2),
                ("2026-10-02T00:00:00+00:00".to_string(), 0, 2, 0),
                ("2026-10-04T00:00:00+00:00".to_string(), 0, 1, -1),
            ]
        );

        let hourly = vote_trends(&votes, TrendInterval::Hour);
        assert_eq!(hourly.len(), 4);
        assert_eq!(hourly[2].timestamp.to_rfc3339(), "2026-10-02T10:00:00+00:00");
        assert_eq!((hourly[2].downvotes, hourly[2].cumulative_score), (2, 0));
    }

    #[test]
    fn trends_of_no_votes_are_empty() {
        assert!(vote_trends(&[], TrendInterval::Hour).is_empty());
        assert_eq!(TrendTimeframe::default().duration(), Duration::days(7));
    }
}
