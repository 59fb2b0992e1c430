use super::SqliteRepository;
use super::mapper::{AggregateRow, content_id, timestamp, user_id};
use super::queries::{
    APPLY_VOTE_DELTA, DELETE_VOTE, INSERT_VOTE, SELECT_AGGREGATE, SELECT_COMMENT_THREAD_ID,
    SELECT_CONTENT_VOTES_SINCE, SELECT_USER_VOTES, SELECT_VOTE, TOUCH_AGGREGATE, UPDATE_VOTE_TYPE,
};
use crate::application::ports::repositories::{VoteOutcome, VoteRepository};
use crate::domain::entities::{Vote, VoteState, VoteType};
use crate::domain::value_objects::{ContentRef, ContentType, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct VoteRow {
    voter_id: String,
    content_type: String,
    content_id: String,
    vote_type: String,
    created_at: i64,
    updated_at: i64,
}

impl VoteRow {
    fn into_domain(self) -> Result<Vote, AppError> {
        let content_type: ContentType = self
            .content_type
            .parse()
            .map_err(AppError::Serialization)?;
        let vote_type: VoteType = self.vote_type.parse().map_err(AppError::Serialization)?;

        Ok(Vote {
            voter_id: user_id(&self.voter_id)?,
            content: ContentRef::new(content_type, content_id(&self.content_id)?),
            vote_type,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[async_trait]
impl VoteRepository for SqliteRepository {
    async fn apply_vote(
        &self,
        voter: &UserId,
        content: &ContentRef,
        vote: VoteType,
    ) -> Result<VoteOutcome, AppError> {
        let content_type = content.content_type.as_str();
        let content_id = content.content_id.as_str();
        let now = Utc::now().timestamp_millis();

        let mut tx = self.pool.get_pool().begin().await?;

        // 最初の文で書き込みロックを取り、同時投票の更新消失を防ぐ
        let touched = sqlx::query(TOUCH_AGGREGATE)
            .bind(content_type)
            .bind(content_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound(content.to_string()));
        }

        let existing = sqlx::query_as::<_, VoteRow>(SELECT_VOTE)
            .bind(voter.as_str())
            .bind(content_type)
            .bind(content_id)
            .fetch_optional(&mut *tx)
            .await?;
        let previous = match existing {
            Some(row) => Some(row.into_domain()?.vote_type),
            None => None,
        };

        let transition = VoteState::from_vote(previous).apply(vote);
        match (previous, transition.new_state.vote_type()) {
            (None, Some(new_vote)) => {
                sqlx::query(INSERT_VOTE)
                    .bind(voter.as_str())
                    .bind(content_type)
                    .bind(content_id)
                    .bind(new_vote.as_str())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
            (Some(_), Some(new_vote)) => {
                sqlx::query(UPDATE_VOTE_TYPE)
                    .bind(voter.as_str())
                    .bind(content_type)
                    .bind(content_id)
                    .bind(new_vote.as_str())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
            (Some(_), None) => {
                sqlx::query(DELETE_VOTE)
                    .bind(voter.as_str())
                    .bind(content_type)
                    .bind(content_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (None, None) => {}
        }

        sqlx::query(APPLY_VOTE_DELTA)
            .bind(content_type)
            .bind(content_id)
            .bind(i64::from(transition.up_delta))
            .bind(i64::from(transition.down_delta))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let aggregate = sqlx::query_as::<_, AggregateRow>(SELECT_AGGREGATE)
            .bind(content_type)
            .bind(content_id)
            .fetch_one(&mut *tx)
            .await?
            .into_domain()?;

        let thread_id = match content.content_type {
            ContentType::Thread => Some(content.content_id.clone()),
            ContentType::Comment => {
                let thread: Option<String> = sqlx::query_scalar(SELECT_COMMENT_THREAD_ID)
                    .bind(content_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                thread.as_deref().map(super::mapper::content_id).transpose()?
            }
        };

        tx.commit().await?;

        Ok(VoteOutcome {
            transition,
            aggregate,
            thread_id,
        })
    }

    async fn get_vote(
        &self,
        voter: &UserId,
        content: &ContentRef,
    ) -> Result<Option<Vote>, AppError> {
        let row = sqlx::query_as::<_, VoteRow>(SELECT_VOTE)
            .bind(voter.as_str())
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(VoteRow::into_domain).transpose()
    }

    async fn list_user_votes(
        &self,
        voter: &UserId,
        content_type: Option<ContentType>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Vote>, AppError> {
        let rows = sqlx::query_as::<_, VoteRow>(SELECT_USER_VOTES)
            .bind(voter.as_str())
            .bind(content_type.map(|content_type| content_type.as_str()))
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(VoteRow::into_domain).collect()
    }

    async fn list_content_votes_since(
        &self,
        content: &ContentRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<Vote>, AppError> {
        let rows = sqlx::query_as::<_, VoteRow>(SELECT_CONTENT_VOTES_SINCE)
            .bind(content.content_type.as_str())
            .bind(content.content_id.as_str())
            .bind(since.timestamp_millis())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(VoteRow::into_domain).collect()
    }
}
