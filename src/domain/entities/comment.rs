use crate::domain::constants::{
    MAX_COMMENT_DEPTH, MAX_COMMENT_LENGTH, REMOVED_COMMENT_PLACEHOLDER,
};
use crate::domain::value_objects::{CommentPath, ContentId, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// スレッドに属するコメント。path は作成後に変化しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: ContentId,
    pub thread_id: ContentId,
    pub parent_id: Option<ContentId>,
    pub author_id: UserId,
    pub path: CommentPath,
    pub content: String,
    pub is_removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// ルートコメントを作成する
    pub fn new_root(thread_id: ContentId, author_id: UserId, content: String) -> Self {
        let id = ContentId::random();
        let now = Utc::now();
        Self {
            path: CommentPath::root(id.clone()),
            id,
            thread_id,
            parent_id: None,
            author_id,
            content,
            is_removed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// `parent` への返信を作成する。深さ検証は呼び出し側で行う
    pub fn new_reply(parent: &Comment, author_id: UserId, content: String) -> Self {
        let id = ContentId::random();
        let now = Utc::now();
        Self {
            path: parent.path.child(id.clone()),
            id,
            thread_id: parent.thread_id.clone(),
            parent_id: Some(parent.id.clone()),
            author_id,
            content,
            is_removed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn depth(&self) -> u32 {
        self.path.depth()
    }

    /// `thread_id` のスレッドでこのコメントに返信できるか
    pub fn ensure_can_reply(&self, thread_id: &ContentId) -> Result<(), AppError> {
        if self.is_removed {
            return Err(AppError::ParentNotFound(self.id.to_string()));
        }
        if &self.thread_id != thread_id {
            return Err(AppError::ValidationError(format!(
                "Parent comment {} belongs to another thread",
                self.id
            )));
        }
        let depth = self.depth() + 1;
        if depth > MAX_COMMENT_DEPTH {
            return Err(AppError::DepthExceeded {
                depth,
                max_depth: MAX_COMMENT_DEPTH,
            });
        }
        Ok(())
    }

    /// 本文を編集できるのは削除されていないコメントの投稿者だけ
    pub fn ensure_editable_by(&self, editor: &UserId) -> Result<(), AppError> {
        if self.is_removed {
            return Err(AppError::NotFound(format!("Comment {}", self.id)));
        }
        if &self.author_id != editor {
            return Err(AppError::Unauthorized(format!(
                "Only the author can edit comment {}",
                self.id
            )));
        }
        Ok(())
    }

    /// 本文の検証。前後の空白は取り除く
    pub fn validate_content(content: &str) -> Result<String, AppError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationError(
                "Comment content is required".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppError::ValidationError(format!(
                "Comment content exceeds {MAX_COMMENT_LENGTH} characters"
            )));
        }
        Ok(trimmed.to_string())
    }

    /// 墓標化。path と子は保持する
    pub fn tombstone(&mut self) {
        self.is_removed = true;
        self.content = REMOVED_COMMENT_PLACEHOLDER.to_string();
        self.updated_at = Utc::now();
    }
}

/// ツリー構築・並べ替えに使う投票集計付きの行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub comment: Comment,
    pub upvotes: u32,
    pub downvotes: u32,
    pub wilson_score: f64,
}

impl CommentRow {
    pub fn engagement(&self) -> u32 {
        self.upvotes.saturating_add(self.downvotes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSort {
    #[default]
    Best,
    New,
    Controversial,
}

impl CommentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Best => "best",
            CommentSort::New => "new",
            CommentSort::Controversial => "controversial",
        }
    }
}

impl fmt::Display for CommentSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(CommentSort::Best),
            "new" => Ok(CommentSort::New),
            "controversial" => Ok(CommentSort::Controversial),
            other => Err(format!("Unknown comment sort: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    #[default]
    Soft,
    /// 子がある場合は `HasChildren` で拒否
    Hard,
    /// サブツリー全体を削除
    HardCascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommentStats {
    pub upvotes: u32,
    pub downvotes: u32,
    pub wilson_score: f64,
    pub reply_count: u32,
    pub total_descendants: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> UserId {
        UserId::new("author-1").unwrap()
    }

    #[test]
    fn reply_path_ends_with_own_id_after_parent() {
        let root = Comment::new_root(ContentId::random(), author(), "root".into());
        let reply = Comment::new_reply(&root, author(), "reply".into());

        assert_eq!(root.depth(), 0);
        assert_eq!(reply.depth(), 1);
        assert_eq!(reply.path.parent(), Some(&root.id));
        assert_eq!(reply.path.leaf(), &reply.id);
        assert_eq!(reply.parent_id.as_ref(), Some(&root.id));
        assert_eq!(reply.thread_id, root.thread_id);
    }

    #[test]
    fn tombstone_blanks_content_but_keeps_path() {
        let mut comment = Comment::new_root(ContentId::random(), author(), "hello".into());
        let path = comment.path.clone();
        comment.tombstone();
        assert!(comment.is_removed);
        assert_eq!(comment.content, REMOVED_COMMENT_PLACEHOLDER);
        assert_eq!(comment.path, path);
    }

    #[test]
    fn reply_depth_limit() {
        let thread_id = ContentId::random();
        let mut parent = Comment::new_root(thread_id.clone(), author(), "0".into());
        for _ in 0..MAX_COMMENT_DEPTH {
            assert!(parent.ensure_can_reply(&thread_id).is_ok());
            parent = Comment::new_reply(&parent, author(), "next".into());
        }

        assert_eq!(parent.depth(), MAX_COMMENT_DEPTH);
        assert_eq!(
            parent.ensure_can_reply(&thread_id),
            Err(AppError::DepthExceeded {
                depth: 11,
                max_depth: 10
            })
        );
    }

    #[test]
    fn reply_rejects_removed_or_foreign_parent() {
        let thread_id = ContentId::random();
        let mut parent = Comment::new_root(thread_id.clone(), author(), "p".into());
        assert!(matches!(
            parent.ensure_can_reply(&ContentId::random()),
            Err(AppError::ValidationError(_))
        ));
        parent.tombstone();
        assert!(matches!(
            parent.ensure_can_reply(&thread_id),
            Err(AppError::ParentNotFound(_))
        ));
    }

    #[test]
    fn content_validation() {
        assert_eq!(Comment::validate_content("  hi  ").unwrap(), "hi");
        assert!(Comment::validate_content("   ").is_err());
        assert!(Comment::validate_content(&"a".repeat(MAX_COMMENT_LENGTH)).is_ok());
        assert!(Comment::validate_content(&"a".repeat(MAX_COMMENT_LENGTH + 1)).is_err());
    }

    #[test]
    fn only_the_author_edits_a_live_comment() {
        let mut comment = Comment::new_root(ContentId::random(), author(), "draft".into());
        assert!(comment.ensure_editable_by(&author()).is_ok());
        assert!(matches!(
            comment.ensure_editable_by(&UserId::new("someone-else").unwrap()),
            Err(AppError::Unauthorized(_))
        ));
        comment.tombstone();
        assert!(matches!(
            comment.ensure_editable_by(&author()),
            Err(AppError::NotFound(_))
        ));
    }
}
