use crate::domain::entities::{Comment, CommentRow, ContentAggregate};
use crate::domain::value_objects::{CommentPath, ContentId, ContentRef, ContentType, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;

pub(super) fn timestamp(millis: i64) -> Result<DateTime<Utc>, AppError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AppError::Serialization(format!("Invalid timestamp: {millis}")))
}

pub(super) fn counter(value: i64, field: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Serialization(format!("Invalid {field} counter: {value}")))
}

pub(super) fn content_id(value: &str) -> Result<ContentId, AppError> {
    ContentId::new(value).map_err(AppError::Serialization)
}

pub(super) fn user_id(value: &str) -> Result<UserId, AppError> {
    UserId::new(value).map_err(AppError::Serialization)
}

/// LIKE で子孫を拾うためのパターン。UUID には `%` と `_` が現れない
pub(super) fn descendant_pattern(path: &CommentPath) -> String {
    format!("{}.%", path.encode())
}

#[derive(Debug, FromRow)]
pub(super) struct AggregateRow {
    content_type: String,
    content_id: String,
    upvotes: i64,
    downvotes: i64,
    hot_score: f64,
    wilson_score: f64,
    controversy_score: Option<f64>,
    created_at: i64,
    last_activity_at: i64,
}

impl AggregateRow {
    pub(super) fn into_domain(self) -> Result<ContentAggregate, AppError> {
        let content_type: ContentType = self
            .content_type
            .parse()
            .map_err(AppError::Serialization)?;

        Ok(ContentAggregate {
            content: ContentRef::new(content_type, content_id(&self.content_id)?),
            upvotes: counter(self.upvotes, "upvotes")?,
            downvotes: counter(self.downvotes, "downvotes")?,
            hot_score: self.hot_score,
            wilson_score: self.wilson_score,
            controversy_score: self.controversy_score,
            created_at: timestamp(self.created_at)?,
            last_activity_at: timestamp(self.last_activity_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct CommentRecord {
    id: String,
    thread_id: String,
    parent_id: Option<String>,
    author_id: String,
    path: String,
    depth: i64,
    content: String,
    is_removed: bool,
    created_at: i64,
    updated_at: i64,
}

impl CommentRecord {
    pub(super) fn into_domain(self) -> Result<Comment, AppError> {
        let path = CommentPath::decode(&self.path).map_err(AppError::Serialization)?;
        if i64::from(path.depth()) != self.depth {
            return Err(AppError::Serialization(format!(
                "Comment {} depth {} does not match its path",
                self.id, self.depth
            )));
        }

        Ok(Comment {
            id: content_id(&self.id)?,
            thread_id: content_id(&self.thread_id)?,
            parent_id: self.parent_id.as_deref().map(content_id).transpose()?,
            author_id: user_id(&self.author_id)?,
            path,
            content: self.content,
            is_removed: self.is_removed,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct CommentRowRecord {
    #[sqlx(flatten)]
    comment: CommentRecord,
    upvotes: i64,
    downvotes: i64,
    wilson_score: f64,
}

impl CommentRowRecord {
    pub(super) fn into_domain(self) -> Result<CommentRow, AppError> {
        Ok(CommentRow {
            comment: self.comment.into_domain()?,
            upvotes: counter(self.upvotes, "upvotes")?,
            downvotes: counter(self.downvotes, "downvotes")?,
            wilson_score: self.wilson_score,
        })
    }
}
