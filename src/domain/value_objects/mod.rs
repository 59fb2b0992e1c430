pub mod bot_flags;
pub mod comment_path;
pub mod content_id;
pub mod content_ref;
pub mod user_id;

pub use bot_flags::{BotFlags, BotSignal};
pub use comment_path::CommentPath;
pub use content_id::ContentId;
pub use content_ref::{ContentRef, ContentType};
pub use user_id::UserId;
