use super::SqliteRepository;
use super::mapper::{timestamp, user_id};
use super::queries::{
    ENSURE_XP_STATE, INSERT_XP_TRANSACTION, SELECT_XP_STATE, SELECT_XP_STATES_BY_LEVEL,
    SELECT_XP_TRANSACTIONS, UPDATE_XP_STATE,
};
use crate::application::ports::repositories::XpRepository;
use crate::domain::entities::{XpAward, XpSourceType, XpState, XpTransaction};
use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct XpStateRow {
    user_id: String,
    xp: i64,
    level: i64,
}

impl XpStateRow {
    fn into_domain(self) -> Result<XpState, AppError> {
        let level = u8::try_from(self.level)
            .map_err(|_| AppError::Serialization(format!("Invalid level: {}", self.level)))?;
        Ok(XpState {
            user_id: user_id(&self.user_id)?,
            xp: self.xp,
            level,
        })
    }
}

#[derive(Debug, FromRow)]
struct XpTransactionRow {
    id: String,
    user_id: String,
    amount: i64,
    reason: String,
    source_type: Option<String>,
    source_id: Option<String>,
    created_at: i64,
}

impl XpTransactionRow {
    fn into_domain(self) -> Result<XpTransaction, AppError> {
        let source_type = self
            .source_type
            .as_deref()
            .map(str::parse::<XpSourceType>)
            .transpose()
            .map_err(AppError::Serialization)?;

        Ok(XpTransaction {
            id: self.id,
            user_id: user_id(&self.user_id)?,
            amount: self.amount,
            reason: self.reason,
            source_type,
            source_id: self.source_id,
            created_at: timestamp(self.created_at)?,
        })
    }
}

#[async_trait]
impl XpRepository for SqliteRepository {
    async fn apply_transaction(&self, transaction: &XpTransaction) -> Result<XpAward, AppError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query(ENSURE_XP_STATE)
            .bind(transaction.user_id.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let mut state = sqlx::query_as::<_, XpStateRow>(SELECT_XP_STATE)
            .bind(transaction.user_id.as_str())
            .fetch_one(&mut *tx)
            .await?
            .into_domain()?;
        let award = state.apply(transaction.amount);

        sqlx::query(UPDATE_XP_STATE)
            .bind(state.user_id.as_str())
            .bind(state.xp)
            .bind(i64::from(state.level))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_XP_TRANSACTION)
            .bind(&transaction.id)
            .bind(transaction.user_id.as_str())
            .bind(transaction.amount)
            .bind(&transaction.reason)
            .bind(transaction.source_type.map(|source| source.as_str()))
            .bind(transaction.source_id.as_deref())
            .bind(transaction.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(award)
    }

    async fn get_state(&self, user_id: &UserId) -> Result<Option<XpState>, AppError> {
        let row = sqlx::query_as::<_, XpStateRow>(SELECT_XP_STATE)
            .bind(user_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(XpStateRow::into_domain).transpose()
    }

    async fn list_states_by_level(
        &self,
        level: u8,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpState>, AppError> {
        let rows = sqlx::query_as::<_, XpStateRow>(SELECT_XP_STATES_BY_LEVEL)
            .bind(i64::from(level))
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(XpStateRow::into_domain).collect()
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpTransaction>, AppError> {
        let rows = sqlx::query_as::<_, XpTransactionRow>(SELECT_XP_TRANSACTIONS)
            .bind(user_id.as_str())
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(XpTransactionRow::into_domain).collect()
    }
}
