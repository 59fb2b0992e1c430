use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Bot 判定に使う独立したシグナル。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BotSignal {
    RapidPosting,
    RepetitiveContent,
    LinkSpamming,
    VoteManipulation,
    AccountAnomalies,
}

impl BotSignal {
    pub const ALL: [BotSignal; 5] = [
        BotSignal::RapidPosting,
        BotSignal::RepetitiveContent,
        BotSignal::LinkSpamming,
        BotSignal::VoteManipulation,
        BotSignal::AccountAnomalies,
    ];

    /// 既存スキーマの `bot_flags` 列とのビット対応
    pub fn bit(&self) -> u32 {
        match self {
            BotSignal::RapidPosting => 1,
            BotSignal::RepetitiveContent => 2,
            BotSignal::LinkSpamming => 4,
            BotSignal::VoteManipulation => 8,
            BotSignal::AccountAnomalies => 16,
        }
    }

    /// bot score への寄与
    pub fn weight(&self) -> u32 {
        match self {
            BotSignal::RapidPosting => 25,
            BotSignal::RepetitiveContent => 25,
            BotSignal::LinkSpamming => 20,
            BotSignal::VoteManipulation => 30,
            BotSignal::AccountAnomalies => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BotSignal::RapidPosting => "rapid-posting",
            BotSignal::RepetitiveContent => "repetitive-content",
            BotSignal::LinkSpamming => "link-spamming",
            BotSignal::VoteManipulation => "vote-manipulation",
            BotSignal::AccountAnomalies => "account-anomalies",
        }
    }
}

impl fmt::Display for BotSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 名前付きシグナルの集合。ビットマスクへの変換はストレージ境界でのみ行う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotFlags(BTreeSet<BotSignal>);

impl BotFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signal: BotSignal) -> bool {
        self.0.insert(signal)
    }

    pub fn remove(&mut self, signal: BotSignal) -> bool {
        self.0.remove(&signal)
    }

    pub fn contains(&self, signal: BotSignal) -> bool {
        self.0.contains(&signal)
    }

    pub fn union(&self, other: &BotFlags) -> BotFlags {
        BotFlags(self.0.union(&other.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = BotSignal> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bitmask(&self) -> u32 {
        self.0.iter().fold(0, |mask, signal| mask | signal.bit())
    }

    /// 未知のビットは無視する
    pub fn from_bitmask(mask: u32) -> Self {
        BotFlags(
            BotSignal::ALL
                .into_iter()
                .filter(|signal| mask & signal.bit() != 0)
                .collect(),
        )
    }
}

impl FromIterator<BotSignal> for BotFlags {
    fn from_iter<I: IntoIterator<Item = BotSignal>>(iter: I) -> Self {
        BotFlags(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmask_matches_legacy_layout() {
        let flags: BotFlags = [BotSignal::RapidPosting, BotSignal::VoteManipulation]
            .into_iter()
            .collect();
        assert_eq!(flags.to_bitmask(), 9);
        assert_eq!(BotFlags::from_bitmask(9), flags);
        assert_eq!(BotFlags::from_bitmask(31).len(), 5);
        assert!(BotFlags::from_bitmask(64).is_empty());
    }

    #[test]
    fn union_does_not_duplicate_signals() {
        let a: BotFlags = [BotSignal::LinkSpamming].into_iter().collect();
        let b: BotFlags = [BotSignal::LinkSpamming, BotSignal::AccountAnomalies]
            .into_iter()
            .collect();
        let merged = a.union(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.union(&b), merged);
    }
}
