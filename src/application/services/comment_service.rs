use super::subscription_manager::{ForumEvent, SubscriptionManager, Topic};
use crate::application::ports::repositories::{CommentRepository, NewComment};
use crate::domain::comment_tree::{CommentNode, build_tree, prune_removed};
use crate::domain::constants::MAX_COMMENT_DEPTH;
use crate::domain::entities::{Comment, CommentSort, CommentStats, DeleteMode};
use crate::domain::value_objects::{ContentId, UserId};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::retry::{RetryPolicy, with_timeout};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    subscriptions: Option<Arc<SubscriptionManager>>,
    retry: RetryPolicy,
    store_timeout: Duration,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, config: &AppConfig) -> Self {
        Self {
            comments,
            subscriptions: None,
            retry: RetryPolicy::from_config(&config.retry),
            store_timeout: config.database.store_timeout(),
        }
    }

    pub fn with_subscriptions(mut self, subscriptions: Arc<SubscriptionManager>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    /// コメントを作成する。
    ///
    /// `idempotency_key` を渡した場合のみ一時的なエラーで再試行し、
    /// 同じキーの再送には最初に作成したコメントを返す。
    pub async fn create_comment(
        &self,
        thread_id: &str,
        parent_id: Option<&str>,
        author_id: &str,
        content: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Comment, AppError> {
        let author_id = author_id.trim();
        if author_id.is_empty() {
            return Err(AppError::Unauthorized(
                "A signed-in author is required".to_string(),
            ));
        }

        let new_comment = NewComment {
            thread_id: parse_id(thread_id)?,
            parent_id: parent_id.map(parse_id).transpose()?,
            author_id: UserId::new(author_id).map_err(AppError::ValidationError)?,
            content: Comment::validate_content(content)?,
            idempotency_key: idempotency_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        };

        let retry = if new_comment.idempotency_key.is_some() {
            self.retry
        } else {
            RetryPolicy::none()
        };

        let comment = retry
            .run("create_comment", || {
                with_timeout(
                    self.store_timeout,
                    "create_comment",
                    self.comments.create_comment(&new_comment),
                )
            })
            .await?;

        tracing::info!(
            target: "forum::comments",
            comment_id = %comment.id,
            thread_id = %comment.thread_id,
            depth = comment.depth(),
            "comment created"
        );

        if let Some(subscriptions) = &self.subscriptions {
            subscriptions
                .publish(
                    &Topic::Thread(comment.thread_id.clone()),
                    ForumEvent::CommentCreated {
                        thread_id: comment.thread_id.clone(),
                        comment_id: comment.id.clone(),
                        parent_id: comment.parent_id.clone(),
                        author_id: comment.author_id.clone(),
                        depth: comment.depth(),
                    },
                )
                .await;
        }

        Ok(comment)
    }

    pub async fn get_comment(&self, comment_id: &str) -> Result<Comment, AppError> {
        let id = parse_id(comment_id)?;
        self.load(&id).await
    }

    /// スレッドのコメントツリー。
    ///
    /// `include_removed` が偽なら生きた返信を持たない墓標を除く。
    /// 生きた返信を持つ墓標は形を保つために常に残る。
    pub async fn get_thread_comments(
        &self,
        thread_id: &str,
        sort: CommentSort,
        max_depth: u32,
        limit: u32,
        include_removed: bool,
    ) -> Result<Vec<CommentNode>, AppError> {
        let thread_id = parse_id(thread_id)?;
        let rows = with_timeout(
            self.store_timeout,
            "list_thread_rows",
            self.comments
                .list_thread_rows(&thread_id, max_depth.min(MAX_COMMENT_DEPTH), limit),
        )
        .await?;

        let tree = build_tree(rows, sort);
        Ok(if include_removed {
            tree
        } else {
            prune_removed(tree)
        })
    }

    /// 投稿者による本文の編集。削除済みのコメントは編集できない
    pub async fn update_comment(
        &self,
        comment_id: &str,
        editor_id: &str,
        content: &str,
    ) -> Result<Comment, AppError> {
        let id = parse_id(comment_id)?;
        let editor_id = editor_id.trim();
        if editor_id.is_empty() {
            return Err(AppError::Unauthorized(
                "A signed-in author is required".to_string(),
            ));
        }
        let editor = UserId::new(editor_id).map_err(AppError::ValidationError)?;
        let content = Comment::validate_content(content)?;

        self.load(&id).await?.ensure_editable_by(&editor)?;
        let comment = with_timeout(
            self.store_timeout,
            "update_comment",
            self.comments.update_content(&id, &content),
        )
        .await?;

        tracing::info!(
            target: "forum::comments",
            comment_id = %comment.id,
            thread_id = %comment.thread_id,
            "comment edited"
        );

        if let Some(subscriptions) = &self.subscriptions {
            subscriptions
                .publish(
                    &Topic::Thread(comment.thread_id.clone()),
                    ForumEvent::CommentEdited {
                        thread_id: comment.thread_id.clone(),
                        comment_id: comment.id.clone(),
                    },
                )
                .await;
        }

        Ok(comment)
    }

    /// `comment_id` を根とし、その下 `depth_window` 段までのサブツリー
    pub async fn get_comment_subtree(
        &self,
        comment_id: &str,
        depth_window: u32,
        sort: CommentSort,
    ) -> Result<CommentNode, AppError> {
        let id = parse_id(comment_id)?;
        let root = self.load(&id).await?;
        let max_depth = root.depth().saturating_add(depth_window).min(MAX_COMMENT_DEPTH);

        let rows = with_timeout(
            self.store_timeout,
            "list_subtree_rows",
            self.comments.list_subtree_rows(&root, max_depth),
        )
        .await?;

        build_tree(rows, sort)
            .into_iter()
            .find(|node| node.id() == &id)
            .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))
    }

    /// ルートから `comment_id` 自身までのコメント列
    pub async fn get_ancestor_chain(&self, comment_id: &str) -> Result<Vec<Comment>, AppError> {
        let id = parse_id(comment_id)?;
        let comment = self.load(&id).await?;
        let segments = comment.path.segments().to_vec();

        let found = with_timeout(
            self.store_timeout,
            "get_comments_by_ids",
            self.comments.get_comments_by_ids(&segments),
        )
        .await?;

        let mut by_id: HashMap<ContentId, Comment> = found
            .into_iter()
            .map(|comment| (comment.id.clone(), comment))
            .collect();
        Ok(segments
            .iter()
            .filter_map(|segment| by_id.remove(segment))
            .collect())
    }

    /// 削除した件数を返す
    pub async fn delete_comment(&self, comment_id: &str, mode: DeleteMode) -> Result<u64, AppError> {
        let id = parse_id(comment_id)?;
        let comment = self.load(&id).await?;

        let removed = match mode {
            DeleteMode::Soft => {
                with_timeout(
                    self.store_timeout,
                    "soft_delete",
                    self.comments.soft_delete(&id),
                )
                .await?;
                1
            }
            DeleteMode::Hard | DeleteMode::HardCascade => {
                with_timeout(
                    self.store_timeout,
                    "hard_delete",
                    self.comments
                        .hard_delete(&id, mode == DeleteMode::HardCascade),
                )
                .await?
            }
        };

        tracing::info!(
            target: "forum::comments",
            comment_id = %id,
            mode = ?mode,
            removed,
            "comment deleted"
        );

        if let Some(subscriptions) = &self.subscriptions {
            subscriptions
                .publish(
                    &Topic::Thread(comment.thread_id.clone()),
                    ForumEvent::CommentRemoved {
                        thread_id: comment.thread_id,
                        comment_id: id,
                        hard: mode != DeleteMode::Soft,
                    },
                )
                .await;
        }

        Ok(removed)
    }

    pub async fn get_comment_stats(&self, comment_id: &str) -> Result<CommentStats, AppError> {
        let id = parse_id(comment_id)?;
        with_timeout(
            self.store_timeout,
            "get_comment_stats",
            self.comments.get_comment_stats(&id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))
    }

    async fn load(&self, id: &ContentId) -> Result<Comment, AppError> {
        with_timeout(
            self.store_timeout,
            "get_comment",
            self.comments.get_comment(id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))
    }
}

fn parse_id(value: &str) -> Result<ContentId, AppError> {
    ContentId::new(value).map_err(AppError::ValidationError)
}
