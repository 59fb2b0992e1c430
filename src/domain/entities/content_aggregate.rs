use crate::domain::scoring::ContentScores;
use crate::domain::value_objects::ContentRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// コンテンツごとの投票集計と派生スコア
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAggregate {
    pub content: ContentRef,
    pub upvotes: u32,
    pub downvotes: u32,
    pub hot_score: f64,
    pub wilson_score: f64,
    pub controversy_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl ContentAggregate {
    pub fn new(content: ContentRef, created_at: DateTime<Utc>) -> Self {
        let scores = ContentScores::compute(0, 0, created_at, u32::MAX);
        Self {
            content,
            upvotes: 0,
            downvotes: 0,
            hot_score: scores.hot_score,
            wilson_score: scores.wilson_score,
            controversy_score: None,
            created_at,
            last_activity_at: created_at,
        }
    }

    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    pub fn total_votes(&self) -> u32 {
        self.upvotes.saturating_add(self.downvotes)
    }

    pub fn scores(&self, controversy_min_votes: u32) -> ContentScores {
        ContentScores::compute(
            self.upvotes,
            self.downvotes,
            self.created_at,
            controversy_min_votes,
        )
    }

    pub fn with_scores(mut self, scores: ContentScores) -> Self {
        self.hot_score = scores.hot_score;
        self.wilson_score = scores.wilson_score;
        self.controversy_score = scores.controversy_score;
        self
    }
}
