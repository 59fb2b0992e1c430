use super::SqliteRepository;
use super::mapper::AggregateRow;
use super::queries::{
    INSERT_AGGREGATE, RECONCILE_AGGREGATE_COUNTS, SELECT_AGGREGATE, SELECT_CONTROVERSIAL,
    SELECT_HOT, SELECT_MOST_UPVOTED, SELECT_RECENTLY_ACTIVE_AGGREGATES, UPDATE_AGGREGATE_SCORES,
};
use crate::application::ports::repositories::{ContentAggregateRepository, RankingQuery};
use crate::domain::entities::ContentAggregate;
use crate::domain::scoring::ContentScores;
use crate::domain::value_objects::ContentRef;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
impl ContentAggregateRepository for SqliteRepository {
    async fn register_content(&self, aggregate: &ContentAggregate) -> Result<(), AppError> {
        sqlx::query(INSERT_AGGREGATE)
            .bind(aggregate.content.content_type.as_str())
            .bind(aggregate.content.content_id.as_str())
            .bind(i64::from(aggregate.upvotes))
            .bind(i64::from(aggregate.downvotes))
            .bind(aggregate.hot_score)
            .bind(aggregate.wilson_score)
            .bind(aggregate.controversy_score)
            .bind(aggregate.created_at.timestamp_millis())
            .bind(aggregate.last_activity_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;

        Ok(())
    }

    async fn get_aggregate(
        &self,
        content: &ContentRef,
    ) -> Result<Option<ContentAggregate>, AppError> {
        let row = sqlx::query_as::<_, AggregateRow>(SELECT_AGGREGATE)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(AggregateRow::into_domain).transpose()
    }

    async fn update_scores(
        &self,
        aggregate: &ContentAggregate,
        scores: &ContentScores,
    ) -> Result<bool, AppError> {
        let content = &aggregate.content;
        let result = sqlx::query(UPDATE_AGGREGATE_SCORES)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .bind(scores.hot_score)
            .bind(scores.wilson_score)
            .bind(scores.controversy_score)
            .bind(i64::from(aggregate.upvotes))
            .bind(i64::from(aggregate.downvotes))
            .execute(self.pool.get_pool())
            .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query(SELECT_AGGREGATE)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(content.to_string()));
        }
        Ok(false)
    }

    async fn list_recently_active(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let rows = sqlx::query_as::<_, AggregateRow>(SELECT_RECENTLY_ACTIVE_AGGREGATES)
            .bind(since.timestamp_millis())
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(AggregateRow::into_domain).collect()
    }

    async fn reconcile_counts(&self, content: &ContentRef) -> Result<ContentAggregate, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let result = sqlx::query(RECONCILE_AGGREGATE_COUNTS)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(content.to_string()));
        }

        let row = sqlx::query_as::<_, AggregateRow>(SELECT_AGGREGATE)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.into_domain()
    }

    async fn list_most_upvoted(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let rows = sqlx::query_as::<_, AggregateRow>(SELECT_MOST_UPVOTED)
            .bind(query.content_type.as_str())
            .bind(query.since.map(|since| since.timestamp_millis()))
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(AggregateRow::into_domain).collect()
    }

    async fn list_controversial(
        &self,
        query: &RankingQuery,
        min_votes: u32,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let rows = sqlx::query_as::<_, AggregateRow>(SELECT_CONTROVERSIAL)
            .bind(query.content_type.as_str())
            .bind(query.since.map(|since| since.timestamp_millis()))
            .bind(i64::from(min_votes))
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(AggregateRow::into_domain).collect()
    }

    async fn list_hot(
        &self,
        query: &RankingQuery,
        min_hot: f64,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let rows = sqlx::query_as::<_, AggregateRow>(SELECT_HOT)
            .bind(query.content_type.as_str())
            .bind(query.since.map(|since| since.timestamp_millis()))
            .bind(min_hot)
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(AggregateRow::into_domain).collect()
    }
}
