use crate::application::ports::repositories::{ProfileMerge, TrustProfileRepository};
use crate::domain::entities::{ActivityEvidence, TrustProfile};
use crate::domain::heuristics::{BotHeuristics, HeuristicThresholds};
use crate::domain::value_objects::{BotSignal, UserId};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::retry::with_timeout;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct TrustService {
    profiles: Arc<dyn TrustProfileRepository>,
    heuristics: BotHeuristics,
    store_timeout: Duration,
}

impl TrustService {
    pub fn new(profiles: Arc<dyn TrustProfileRepository>, config: &AppConfig) -> Self {
        Self {
            profiles,
            heuristics: BotHeuristics::new(HeuristicThresholds::from(&config.trust)),
            store_timeout: config.database.store_timeout(),
        }
    }

    /// 保存済みのフラグと合わせて評価する。保存はしない
    pub async fn evaluate(
        &self,
        user_id: &str,
        evidence: &ActivityEvidence,
    ) -> Result<TrustProfile, AppError> {
        let user_id = parse_user(user_id)?;
        let previous = self.load(&user_id).await?;
        Ok(self
            .heuristics
            .evaluate(user_id, previous.as_ref(), evidence, Utc::now()))
    }

    /// 評価結果をプロファイルとして保存する。
    ///
    /// 読み出し・和集合・保存は 1 つの書き込みトランザクションで行うので、
    /// 同じユーザーを同時に評価してもフラグは失われない。
    pub async fn evaluate_bot_status(
        &self,
        user_id: &str,
        evidence: &ActivityEvidence,
    ) -> Result<TrustProfile, AppError> {
        let user_id = parse_user(user_id)?;
        let was_bot = AtomicBool::new(false);
        let evaluated_at = Utc::now();

        let merge = |previous: Option<TrustProfile>| -> Result<TrustProfile, AppError> {
            was_bot.store(
                previous.as_ref().is_some_and(|profile| profile.is_bot),
                Ordering::Relaxed,
            );
            Ok(self
                .heuristics
                .evaluate(user_id.clone(), previous.as_ref(), evidence, evaluated_at))
        };
        let profile = self.update(&user_id, &merge).await?;

        if profile.is_bot && !was_bot.load(Ordering::Relaxed) {
            tracing::warn!(
                target: "forum::trust",
                user_id = %user_id,
                bot_score = profile.bot_score,
                flags = ?profile.flags,
                "account classified as bot"
            );
        } else {
            tracing::debug!(
                target: "forum::trust",
                user_id = %user_id,
                trust_score = profile.trust_score,
                bot_score = profile.bot_score,
                "trust profile evaluated"
            );
        }

        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<TrustProfile>, AppError> {
        let user_id = parse_user(user_id)?;
        self.load(&user_id).await
    }

    /// モデレーターの確認後にフラグを外す
    pub async fn clear_flag(
        &self,
        user_id: &str,
        signal: BotSignal,
    ) -> Result<TrustProfile, AppError> {
        let user_id = parse_user(user_id)?;
        let cleared_at = Utc::now();

        let merge = |previous: Option<TrustProfile>| -> Result<TrustProfile, AppError> {
            let mut profile = previous
                .ok_or_else(|| AppError::NotFound(format!("Trust profile for {user_id}")))?;
            if profile.flags.remove(signal) {
                profile.bot_score = self.heuristics.bot_score(&profile.flags);
                profile.is_bot = self.heuristics.is_bot(profile.bot_score);
                profile.last_evaluated = cleared_at;
            }
            Ok(profile)
        };
        let profile = self.update(&user_id, &merge).await?;

        tracing::info!(
            target: "forum::trust",
            user_id = %user_id,
            signal = %signal,
            bot_score = profile.bot_score,
            "bot flag cleared"
        );

        Ok(profile)
    }

    async fn load(&self, user_id: &UserId) -> Result<Option<TrustProfile>, AppError> {
        with_timeout(
            self.store_timeout,
            "get_trust_profile",
            self.profiles.get_profile(user_id),
        )
        .await
    }

    async fn update(
        &self,
        user_id: &UserId,
        merge: ProfileMerge<'_>,
    ) -> Result<TrustProfile, AppError> {
        with_timeout(
            self.store_timeout,
            "update_trust_profile",
            self.profiles.update_profile(user_id, merge),
        )
        .await
    }
}

fn parse_user(user_id: &str) -> Result<UserId, AppError> {
    UserId::new(user_id.trim()).map_err(AppError::ValidationError)
}
