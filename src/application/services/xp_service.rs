use super::subscription_manager::{ForumEvent, SubscriptionManager, Topic};
use crate::application::ports::repositories::XpRepository;
use crate::domain::entities::xp::{MAX_LEVEL, MIN_LEVEL};
use crate::domain::entities::{LevelProgress, XpAward, XpSourceType, XpState, XpTransaction};
use crate::domain::value_objects::UserId;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;

pub struct XpService {
    xp: Arc<dyn XpRepository>,
    subscriptions: Option<Arc<SubscriptionManager>>,
    store_timeout: Duration,
}

impl XpService {
    pub fn new(xp: Arc<dyn XpRepository>, config: &AppConfig) -> Self {
        Self {
            xp,
            subscriptions: None,
            store_timeout: config.database.store_timeout(),
        }
    }

    pub fn with_subscriptions(mut self, subscriptions: Arc<SubscriptionManager>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    /// XP を付与する。レベルが上がったときだけ `new_level` が返る
    pub async fn award_xp(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        source_type: Option<XpSourceType>,
        source_id: Option<&str>,
    ) -> Result<XpAward, AppError> {
        let user_id = parse_user(user_id)?;
        if amount == 0 {
            return Err(AppError::ValidationError(
                "XP amount must be non-zero".to_string(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationError(
                "XP reason is required".to_string(),
            ));
        }

        let transaction = XpTransaction::new(
            user_id.clone(),
            amount,
            reason,
            source_type,
            source_id.map(str::to_string),
        );
        let award = with_timeout(
            self.store_timeout,
            "apply_xp_transaction",
            self.xp.apply_transaction(&transaction),
        )
        .await?;

        tracing::debug!(
            target: "forum::xp",
            user_id = %user_id,
            amount,
            xp = award.xp,
            level = award.level,
            "xp awarded"
        );

        if let Some(level) = award.new_level {
            tracing::info!(target: "forum::xp", user_id = %user_id, level, "level up");
            if let Some(subscriptions) = &self.subscriptions {
                subscriptions
                    .publish(
                        &Topic::User(user_id.clone()),
                        ForumEvent::LevelUp {
                            user_id: user_id.clone(),
                            level,
                        },
                    )
                    .await;
            }
        }

        Ok(award)
    }

    /// 既定の付与量で付与する
    pub async fn award_for_action(
        &self,
        user_id: &str,
        source_type: XpSourceType,
        source_id: Option<&str>,
    ) -> Result<XpAward, AppError> {
        self.award_xp(
            user_id,
            source_type.default_amount(),
            source_type.as_str(),
            Some(source_type),
            source_id,
        )
        .await
    }

    pub async fn get_progress(&self, user_id: &str) -> Result<LevelProgress, AppError> {
        let user_id = parse_user(user_id)?;
        Ok(self.load_state(user_id).await?.progress())
    }

    /// 記録の無いユーザーはレベル 1 として扱う
    pub async fn has_level(&self, user_id: &str, required_level: u8) -> Result<bool, AppError> {
        let required_level = parse_level(required_level)?;
        let user_id = parse_user(user_id)?;
        Ok(self.load_state(user_id).await?.level >= required_level)
    }

    /// `level` ちょうどのユーザーを XP の多い順に返す
    pub async fn list_users_by_level(
        &self,
        level: u8,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpState>, AppError> {
        let level = parse_level(level)?;
        with_timeout(
            self.store_timeout,
            "list_xp_states_by_level",
            self.xp.list_states_by_level(level, limit, offset),
        )
        .await
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpTransaction>, AppError> {
        let user_id = parse_user(user_id)?;
        with_timeout(
            self.store_timeout,
            "list_xp_transactions",
            self.xp.list_transactions(&user_id, limit, offset),
        )
        .await
    }

    async fn load_state(&self, user_id: UserId) -> Result<XpState, AppError> {
        Ok(with_timeout(
            self.store_timeout,
            "get_xp_state",
            self.xp.get_state(&user_id),
        )
        .await?
        .unwrap_or_else(|| XpState::new(user_id)))
    }
}

fn parse_level(level: u8) -> Result<u8, AppError> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return Err(AppError::ValidationError(format!(
            "Level must be between {MIN_LEVEL} and {MAX_LEVEL}"
        )));
    }
    Ok(level)
}

fn parse_user(user_id: &str) -> Result<UserId, AppError> {
    UserId::new(user_id.trim()).map_err(AppError::ValidationError)
}
