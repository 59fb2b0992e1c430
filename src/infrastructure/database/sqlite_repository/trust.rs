use super::SqliteRepository;
use super::mapper::{timestamp, user_id};
use super::queries::{SELECT_TRUST_PROFILE, TOUCH_TRUST_PROFILE, UPSERT_TRUST_PROFILE};
use crate::application::ports::repositories::{ProfileMerge, TrustProfileRepository};
use crate::domain::entities::TrustProfile;
use crate::domain::value_objects::{BotFlags, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct TrustProfileRow {
    user_id: String,
    flags: i64,
    trust_score: i64,
    bot_score: i64,
    is_bot: bool,
    last_evaluated: i64,
}

impl TrustProfileRow {
    fn into_domain(self) -> Result<TrustProfile, AppError> {
        let score = |value: i64, field: &str| {
            u8::try_from(value)
                .ok()
                .filter(|score| *score <= 100)
                .ok_or_else(|| AppError::Serialization(format!("Invalid {field}: {value}")))
        };
        let mask = u32::try_from(self.flags)
            .map_err(|_| AppError::Serialization(format!("Invalid flags: {}", self.flags)))?;

        Ok(TrustProfile {
            user_id: user_id(&self.user_id)?,
            flags: BotFlags::from_bitmask(mask),
            trust_score: score(self.trust_score, "trust_score")?,
            bot_score: score(self.bot_score, "bot_score")?,
            is_bot: self.is_bot,
            last_evaluated: timestamp(self.last_evaluated)?,
        })
    }
}

#[async_trait]
impl TrustProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<TrustProfile>, AppError> {
        let row = sqlx::query_as::<_, TrustProfileRow>(SELECT_TRUST_PROFILE)
            .bind(user_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(TrustProfileRow::into_domain).transpose()
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        merge: ProfileMerge<'_>,
    ) -> Result<TrustProfile, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query(TOUCH_TRUST_PROFILE)
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        let previous = sqlx::query_as::<_, TrustProfileRow>(SELECT_TRUST_PROFILE)
            .bind(user_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(TrustProfileRow::into_domain)
            .transpose()?;

        let profile = merge(previous)?;
        if &profile.user_id != user_id {
            return Err(AppError::ValidationError(format!(
                "Trust profile for {} cannot be stored under {user_id}",
                profile.user_id
            )));
        }

        sqlx::query(UPSERT_TRUST_PROFILE)
            .bind(profile.user_id.as_str())
            .bind(i64::from(profile.flags.to_bitmask()))
            .bind(i64::from(profile.trust_score))
            .bind(i64::from(profile.bot_score))
            .bind(profile.is_bot)
            .bind(profile.last_evaluated.timestamp_millis())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(profile)
    }
}
