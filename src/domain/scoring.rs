//! ホットスコア・Wilson スコア・論争度スコアの純粋関数。
//!
//! いずれも入力が同じなら常に同じ値を返すので、投票直後の同期再計算と
//! バッチスイープによる再計算は置き換え可能。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ホットスコアの基準時刻 (2005-12-08T06:00:00Z)
pub const HOT_EPOCH_MILLIS: i64 = 1_134_021_600_000;
/// 投票 1 桁分と同じ重みを持つ経過秒数
pub const HOT_DECAY_SECONDS: f64 = 45_000.0;
/// 95% 信頼区間
pub const WILSON_Z_95: f64 = 1.96;

/// 経過時間と票の大きさ（対数）を組み合わせた時間減衰スコア
pub fn hot_score(upvotes: u32, downvotes: u32, created_at: DateTime<Utc>) -> f64 {
    let score = i64::from(upvotes) - i64::from(downvotes);
    let order = (score.unsigned_abs().max(1) as f64).log10();
    let sign = score.signum() as f64;
    let seconds = (created_at.timestamp_millis() - HOT_EPOCH_MILLIS) as f64 / 1000.0;

    sign * order + seconds / HOT_DECAY_SECONDS
}

/// 二項比率の信頼区間下限 (z = 1.96)
pub fn wilson_score(upvotes: u32, downvotes: u32) -> f64 {
    wilson_score_with_z(upvotes, downvotes, WILSON_Z_95)
}

pub fn wilson_score_with_z(upvotes: u32, downvotes: u32, z: f64) -> f64 {
    let n = f64::from(upvotes) + f64::from(downvotes);
    if n == 0.0 {
        return 0.0;
    }

    let p = f64::from(upvotes) / n;
    let z2 = z * z;
    let centre = p + z2 / (2.0 * n);
    let margin = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt();

    ((centre - margin) / (1.0 + z2 / n)).clamp(0.0, 1.0)
}

/// 総投票数が `min_votes` 未満なら `None`
pub fn controversy_score(upvotes: u32, downvotes: u32, min_votes: u32) -> Option<f64> {
    let total = u64::from(upvotes) + u64::from(downvotes);
    if total == 0 || total < u64::from(min_votes) {
        return None;
    }
    let total = total as f64;
    let margin = (f64::from(upvotes) - f64::from(downvotes)).abs();
    Some(total * (1.0 - margin / total))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentScores {
    pub hot_score: f64,
    pub wilson_score: f64,
    pub controversy_score: Option<f64>,
}

impl ContentScores {
    pub fn compute(
        upvotes: u32,
        downvotes: u32,
        created_at: DateTime<Utc>,
        controversy_min_votes: u32,
    ) -> Self {
        Self {
            hot_score: hot_score(upvotes, downvotes, created_at),
            wilson_score: wilson_score(upvotes, downvotes),
            controversy_score: controversy_score(upvotes, downvotes, controversy_min_votes),
        }
    }
}
