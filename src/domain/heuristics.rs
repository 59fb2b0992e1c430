//! Bot 判定シグナルと信頼スコアの算出。
//!
//! シグナルは集合として扱い、同じ証拠で再評価しても二重計上しない。

use crate::domain::entities::{ActivityEvidence, TrustFactors, TrustProfile};
use crate::domain::value_objects::{BotFlags, BotSignal, UserId};
use crate::shared::config::TrustConfig;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const MIN_SAMPLES_FOR_REPETITION: usize = 3;
const MIN_VOTES_FOR_CONCENTRATION: u32 = 10;
const NEW_ACCOUNT_POST_BURST: u32 = 20;
const MIN_POSTS_FOR_SHORT_RATIO: u32 = 10;
const SHORT_POST_RATIO: f64 = 0.8;
const BASE_TRUST: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicThresholds {
    pub bot_score_threshold: u8,
    pub rapid_posts_per_hour: u32,
    pub duplicate_ratio: f64,
    pub links_per_post: f64,
    pub votes_per_hour: u32,
    pub vote_target_share: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self::from(&TrustConfig::default())
    }
}

impl From<&TrustConfig> for HeuristicThresholds {
    fn from(config: &TrustConfig) -> Self {
        Self {
            bot_score_threshold: config.bot_score_threshold,
            rapid_posts_per_hour: config.rapid_posts_per_hour,
            duplicate_ratio: config.duplicate_ratio,
            links_per_post: config.links_per_post,
            votes_per_hour: config.votes_per_hour,
            vote_target_share: config.vote_target_share,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BotHeuristics {
    thresholds: HeuristicThresholds,
}

impl BotHeuristics {
    pub fn new(thresholds: HeuristicThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &HeuristicThresholds {
        &self.thresholds
    }

    /// 証拠から検出されたシグナル
    pub fn detect(&self, evidence: &ActivityEvidence) -> BotFlags {
        let mut flags = BotFlags::new();
        let t = &self.thresholds;

        if evidence.posts_last_hour >= t.rapid_posts_per_hour {
            flags.insert(BotSignal::RapidPosting);
        }

        if evidence.recent_contents.len() >= MIN_SAMPLES_FOR_REPETITION
            && duplicate_ratio(&evidence.recent_contents) >= t.duplicate_ratio
        {
            flags.insert(BotSignal::RepetitiveContent);
        }

        if !evidence.recent_contents.is_empty() {
            let links: usize = evidence
                .recent_contents
                .iter()
                .map(|content| count_links(content))
                .sum();
            let per_post = links as f64 / evidence.recent_contents.len() as f64;
            if per_post >= t.links_per_post {
                flags.insert(BotSignal::LinkSpamming);
            }
        }

        let concentrated = evidence.votes_considered >= MIN_VOTES_FOR_CONCENTRATION
            && evidence.top_vote_target_share >= t.vote_target_share;
        if evidence.votes_last_hour >= t.votes_per_hour || concentrated {
            flags.insert(BotSignal::VoteManipulation);
        }

        let factors = &evidence.trust_factors;
        let new_account_burst =
            factors.account_age_days < 1 && evidence.total_posts >= NEW_ACCOUNT_POST_BURST;
        let mostly_short = evidence.total_posts >= MIN_POSTS_FOR_SHORT_RATIO
            && f64::from(evidence.short_posts) / f64::from(evidence.total_posts)
                >= SHORT_POST_RATIO;
        if new_account_burst || mostly_short {
            flags.insert(BotSignal::AccountAnomalies);
        }

        flags
    }

    /// 有効なシグナルの重みの合計（100 で頭打ち）
    pub fn bot_score(&self, flags: &BotFlags) -> u8 {
        flags.iter().map(|signal| signal.weight()).sum::<u32>().min(100) as u8
    }

    pub fn is_bot(&self, bot_score: u8) -> bool {
        bot_score >= self.thresholds.bot_score_threshold
    }

    /// シグナルとは独立に、信頼要因だけから 0..=100 を算出する
    pub fn trust_score(&self, factors: &TrustFactors) -> u8 {
        let mut score = BASE_TRUST;
        score += f64::from((factors.account_age_days / 10).min(20));
        if factors.verified_email {
            score += 5.0;
        }
        if factors.verified_phone {
            score += 5.0;
        }

        let interactions =
            u64::from(factors.positive_interactions) + u64::from(factors.negative_interactions);
        if interactions > 0 {
            let net = f64::from(factors.positive_interactions)
                - f64::from(factors.negative_interactions);
            score += 15.0 * net / interactions as f64;
        }

        score += f64::from(factors.successful_reports.saturating_mul(2).min(10));
        score -= f64::from(factors.false_reports.saturating_mul(3).min(15));
        score -= f64::from(factors.moderator_warnings.saturating_mul(10).min(40));

        score.round().clamp(0.0, 100.0) as u8
    }

    /// 既存のフラグと検出結果の和集合で新しいプロファイルを作る
    pub fn evaluate(
        &self,
        user_id: UserId,
        previous: Option<&TrustProfile>,
        evidence: &ActivityEvidence,
        evaluated_at: DateTime<Utc>,
    ) -> TrustProfile {
        let detected = self.detect(evidence);
        let flags = match previous {
            Some(profile) => profile.flags.union(&detected),
            None => detected,
        };
        let bot_score = self.bot_score(&flags);

        TrustProfile {
            user_id,
            trust_score: self.trust_score(&evidence.trust_factors),
            is_bot: self.is_bot(bot_score),
            bot_score,
            flags,
            last_evaluated: evaluated_at,
        }
    }
}

/// 正規化した本文の SHA-256
pub fn content_fingerprint(content: &str) -> [u8; 32] {
    let normalized = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&digest);
    fingerprint
}

pub fn duplicate_ratio(contents: &[String]) -> f64 {
    if contents.is_empty() {
        return 0.0;
    }
    let unique: HashSet<[u8; 32]> = contents.iter().map(|c| content_fingerprint(c)).collect();
    1.0 - unique.len() as f64 / contents.len() as f64
}

fn count_links(content: &str) -> usize {
    content.matches("http://").count() + content.matches("https://").count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn quiet_account_has_no_flags() {
        let heuristics = BotHeuristics::default();
        let evidence = ActivityEvidence {
            posts_last_hour: 1,
            total_posts: 12,
            recent_contents: vec!["first thought".into(), "another idea".into()],
            ..Default::default()
        };
        assert!(heuristics.detect(&evidence).is_empty());
    }

    #[test]
    fn detects_each_signal_independently() {
        let heuristics = BotHeuristics::default();

        let rapid = ActivityEvidence {
            posts_last_hour: 15,
            ..Default::default()
        };
        assert!(heuristics.detect(&rapid).contains(BotSignal::RapidPosting));

        let repetitive = ActivityEvidence {
            recent_contents: vec![
                "Buy now".into(),
                "buy   NOW".into(),
                "buy now".into(),
                "hello".into(),
            ],
            ..Default::default()
        };
        let flags = heuristics.detect(&repetitive);
        assert!(flags.contains(BotSignal::RepetitiveContent));
        assert_eq!(flags.len(), 1);

        let links = ActivityEvidence {
            recent_contents: vec![
                "https://a.example https://b.example http://c.example".into(),
                "see https://d.example https://e.example https://f.example".into(),
            ],
            ..Default::default()
        };
        assert!(heuristics.detect(&links).contains(BotSignal::LinkSpamming));

        let votes = ActivityEvidence {
            votes_considered: 40,
            top_vote_target_share: 0.9,
            ..Default::default()
        };
        assert!(heuristics.detect(&votes).contains(BotSignal::VoteManipulation));

        let anomalies = ActivityEvidence {
            total_posts: 25,
            ..Default::default()
        };
        assert!(
            heuristics
                .detect(&anomalies)
                .contains(BotSignal::AccountAnomalies)
        );
    }

    #[test]
    fn re_evaluating_same_evidence_is_a_fixed_point() {
        let heuristics = BotHeuristics::default();
        let evidence = ActivityEvidence {
            posts_last_hour: 30,
            votes_last_hour: 120,
            ..Default::default()
        };
        let first = heuristics.evaluate(user(), None, &evidence, now());
        let second = heuristics.evaluate(user(), Some(&first), &evidence, now());

        assert_eq!(first.flags, second.flags);
        assert_eq!(first.bot_score, second.bot_score);
        assert_eq!(second.bot_score, 55);
        assert!(second.is_bot);
    }

    #[test]
    fn bot_classification_is_independent_of_trust() {
        let heuristics = BotHeuristics::default();

        // 信頼度は低いが Bot シグナルは 1 つだけ
        let low_trust_human = ActivityEvidence {
            votes_last_hour: 100,
            trust_factors: TrustFactors {
                moderator_warnings: 1,
                negative_interactions: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let profile = heuristics.evaluate(user(), None, &low_trust_human, now());
        assert!(profile.flags.contains(BotSignal::VoteManipulation));
        assert!(profile.trust_score < 50);
        assert_eq!(profile.band().label(), "Suspicious");
        assert_eq!(profile.bot_score, 30);
        assert!(!profile.is_bot);

        // 信頼度は高いがシグナルが重なっている
        let trusted_bot = ActivityEvidence {
            posts_last_hour: 50,
            votes_last_hour: 500,
            trust_factors: TrustFactors {
                account_age_days: 400,
                verified_email: true,
                verified_phone: true,
                positive_interactions: 30,
                ..Default::default()
            },
            ..Default::default()
        };
        let profile = heuristics.evaluate(user(), None, &trusted_bot, now());
        assert!(profile.trust_score >= 80);
        assert!(profile.is_bot);
    }

    #[test]
    fn trust_score_is_clamped() {
        let heuristics = BotHeuristics::default();
        let best = TrustFactors {
            account_age_days: 10_000,
            verified_email: true,
            verified_phone: true,
            positive_interactions: 100,
            successful_reports: 100,
            ..Default::default()
        };
        assert_eq!(heuristics.trust_score(&best), 100);

        let worst = TrustFactors {
            negative_interactions: 50,
            moderator_warnings: 10,
            false_reports: 10,
            ..Default::default()
        };
        assert_eq!(heuristics.trust_score(&worst), 0);
        assert_eq!(heuristics.trust_score(&TrustFactors::default()), 50);
    }

    #[test]
    fn trust_score_handles_saturated_counters() {
        let heuristics = BotHeuristics::default();
        let saturated = TrustFactors {
            account_age_days: u32::MAX,
            positive_interactions: u32::MAX,
            negative_interactions: u32::MAX,
            moderator_warnings: u32::MAX,
            successful_reports: u32::MAX,
            false_reports: u32::MAX,
            ..Default::default()
        };
        // 50 + 20 + 0 + 10 - 15 - 40
        assert_eq!(heuristics.trust_score(&saturated), 25);

        let reports_only = TrustFactors {
            successful_reports: u32::MAX,
            ..Default::default()
        };
        assert_eq!(heuristics.trust_score(&reports_only), 60);

        let praised = TrustFactors {
            positive_interactions: u32::MAX,
            negative_interactions: 1,
            ..Default::default()
        };
        assert_eq!(heuristics.trust_score(&praised), 65);
    }

    #[test]
    fn duplicate_ratio_ignores_case_and_spacing() {
        let contents = vec!["Hello  World".to_string(), "hello world".to_string()];
        assert_eq!(duplicate_ratio(&contents), 0.5);
        assert_eq!(duplicate_ratio(&[]), 0.0);
    }
}
