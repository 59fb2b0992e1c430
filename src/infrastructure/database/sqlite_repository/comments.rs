use super::SqliteRepository;
use super::mapper::{CommentRecord, CommentRowRecord, counter, descendant_pattern};
use super::queries::{
    COUNT_CHILD_COMMENTS, DELETE_SUBTREE_AGGREGATES, DELETE_SUBTREE_COMMENTS,
    DELETE_SUBTREE_IDEMPOTENCY_KEYS, DELETE_SUBTREE_VOTES, INSERT_AGGREGATE, INSERT_COMMENT,
    INSERT_IDEMPOTENCY_KEY, SELECT_COMMENT_BY_ID, SELECT_COMMENT_STATS,
    SELECT_COMMENTS_BY_IDS_PREFIX, SELECT_IDEMPOTENT_COMMENT_ID, SELECT_SUBTREE_COMMENT_ROWS,
    SELECT_THREAD_COMMENT_ROWS, SOFT_DELETE_COMMENT, TOUCH_AGGREGATE, TOUCH_COMMENT,
    TOUCH_LIVE_COMMENT, UPDATE_COMMENT_CONTENT,
};
use crate::application::ports::repositories::{CommentRepository, NewComment};
use crate::domain::constants::REMOVED_COMMENT_PLACEHOLDER;
use crate::domain::entities::{Comment, CommentRow, CommentStats, ContentAggregate};
use crate::domain::value_objects::{ContentId, ContentRef, ContentType};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

#[derive(Debug, FromRow)]
struct CommentStatsRow {
    upvotes: i64,
    downvotes: i64,
    wilson_score: f64,
    reply_count: i64,
    total_descendants: i64,
}

async fn fetch_comment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Comment>, AppError> {
    let record = sqlx::query_as::<_, CommentRecord>(SELECT_COMMENT_BY_ID)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    record.map(CommentRecord::into_domain).transpose()
}

#[async_trait]
impl CommentRepository for SqliteRepository {
    async fn create_comment(&self, new_comment: &NewComment) -> Result<Comment, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        // 親（ルートならスレッド）の行を更新して書き込みロックを先に取る
        let locked = match &new_comment.parent_id {
            Some(parent_id) => sqlx::query(TOUCH_LIVE_COMMENT)
                .bind(parent_id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
            None => sqlx::query(TOUCH_AGGREGATE)
                .bind(ContentType::Thread.as_str())
                .bind(new_comment.thread_id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
        } > 0;

        if let Some(key) = &new_comment.idempotency_key {
            let existing: Option<String> = sqlx::query_scalar(SELECT_IDEMPOTENT_COMMENT_ID)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(existing_id) = existing
                && let Some(comment) = fetch_comment(&mut tx, &existing_id).await?
            {
                tx.rollback().await?;
                tracing::debug!(
                    target: "forum::comments",
                    comment_id = %comment.id,
                    "idempotent replay"
                );
                return Ok(comment);
            }
        }

        let comment = match &new_comment.parent_id {
            Some(parent_id) => {
                let parent = match fetch_comment(&mut tx, parent_id.as_str()).await? {
                    Some(parent) if locked => parent,
                    _ => return Err(AppError::ParentNotFound(parent_id.to_string())),
                };
                parent.ensure_can_reply(&new_comment.thread_id)?;
                Comment::new_reply(
                    &parent,
                    new_comment.author_id.clone(),
                    new_comment.content.clone(),
                )
            }
            None => {
                if !locked {
                    return Err(AppError::NotFound(format!(
                        "Thread {}",
                        new_comment.thread_id
                    )));
                }
                Comment::new_root(
                    new_comment.thread_id.clone(),
                    new_comment.author_id.clone(),
                    new_comment.content.clone(),
                )
            }
        };

        let created_at = comment.created_at.timestamp_millis();
        sqlx::query(INSERT_COMMENT)
            .bind(comment.id.as_str())
            .bind(comment.thread_id.as_str())
            .bind(comment.parent_id.as_ref().map(ContentId::as_str))
            .bind(comment.author_id.as_str())
            .bind(comment.path.encode())
            .bind(i64::from(comment.depth()))
            .bind(&comment.content)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        let aggregate =
            ContentAggregate::new(ContentRef::comment(comment.id.clone()), comment.created_at);
        sqlx::query(INSERT_AGGREGATE)
            .bind(ContentType::Comment.as_str())
            .bind(comment.id.as_str())
            .bind(0_i64)
            .bind(0_i64)
            .bind(aggregate.hot_score)
            .bind(aggregate.wilson_score)
            .bind(aggregate.controversy_score)
            .bind(created_at)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        if let Some(key) = &new_comment.idempotency_key {
            sqlx::query(INSERT_IDEMPOTENCY_KEY)
                .bind(key)
                .bind(comment.id.as_str())
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(comment)
    }

    async fn get_comment(&self, id: &ContentId) -> Result<Option<Comment>, AppError> {
        let mut conn = self.pool.get_pool().acquire().await?;
        fetch_comment(&mut conn, id.as_str()).await
    }

    async fn get_comments_by_ids(&self, ids: &[ContentId]) -> Result<Vec<Comment>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COMMENTS_BY_IDS_PREFIX);
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let records: Vec<CommentRecord> = builder
            .build_query_as()
            .fetch_all(self.pool.get_pool())
            .await?;

        records.into_iter().map(CommentRecord::into_domain).collect()
    }

    async fn list_thread_rows(
        &self,
        thread_id: &ContentId,
        max_depth: u32,
        limit: u32,
    ) -> Result<Vec<CommentRow>, AppError> {
        let records = sqlx::query_as::<_, CommentRowRecord>(SELECT_THREAD_COMMENT_ROWS)
            .bind(thread_id.as_str())
            .bind(i64::from(max_depth))
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        records
            .into_iter()
            .map(CommentRowRecord::into_domain)
            .collect()
    }

    async fn list_subtree_rows(
        &self,
        root: &Comment,
        max_depth: u32,
    ) -> Result<Vec<CommentRow>, AppError> {
        let records = sqlx::query_as::<_, CommentRowRecord>(SELECT_SUBTREE_COMMENT_ROWS)
            .bind(root.thread_id.as_str())
            .bind(root.path.encode())
            .bind(descendant_pattern(&root.path))
            .bind(i64::from(max_depth))
            .fetch_all(self.pool.get_pool())
            .await?;

        records
            .into_iter()
            .map(CommentRowRecord::into_domain)
            .collect()
    }

    async fn update_content(&self, id: &ContentId, content: &str) -> Result<Comment, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let result = sqlx::query(UPDATE_COMMENT_CONTENT)
            .bind(id.as_str())
            .bind(content)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {id}")));
        }

        let comment = fetch_comment(&mut tx, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn soft_delete(&self, id: &ContentId) -> Result<Comment, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let result = sqlx::query(SOFT_DELETE_COMMENT)
            .bind(id.as_str())
            .bind(REMOVED_COMMENT_PLACEHOLDER)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {id}")));
        }

        let comment = fetch_comment(&mut tx, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn hard_delete(&self, id: &ContentId, cascade: bool) -> Result<u64, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let touched = sqlx::query(TOUCH_COMMENT)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {id}")));
        }

        let comment = fetch_comment(&mut tx, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))?;

        if !cascade {
            let children: i64 = sqlx::query_scalar(COUNT_CHILD_COMMENTS)
                .bind(id.as_str())
                .fetch_one(&mut *tx)
                .await?;
            if children > 0 {
                return Err(AppError::HasChildren(format!(
                    "Comment {id} has {children} replies"
                )));
            }
        }

        let path = comment.path.encode();
        let pattern = descendant_pattern(&comment.path);
        for statement in [
            DELETE_SUBTREE_VOTES,
            DELETE_SUBTREE_AGGREGATES,
            DELETE_SUBTREE_IDEMPOTENCY_KEYS,
        ] {
            sqlx::query(statement)
                .bind(&path)
                .bind(&pattern)
                .execute(&mut *tx)
                .await?;
        }
        let removed = sqlx::query(DELETE_SUBTREE_COMMENTS)
            .bind(&path)
            .bind(&pattern)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed)
    }

    async fn get_comment_stats(&self, id: &ContentId) -> Result<Option<CommentStats>, AppError> {
        let row = sqlx::query_as::<_, CommentStatsRow>(SELECT_COMMENT_STATS)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|row| {
            Ok(CommentStats {
                upvotes: counter(row.upvotes, "upvotes")?,
                downvotes: counter(row.downvotes, "downvotes")?,
                wilson_score: row.wilson_score,
                reply_count: counter(row.reply_count, "reply_count")?,
                total_descendants: counter(row.total_descendants, "total_descendants")?,
            })
        })
        .transpose()
    }
}
