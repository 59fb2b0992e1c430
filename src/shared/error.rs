use thiserror::Error;

// SQLite の BUSY / LOCKED 系の拡張コード
const SQLITE_RETRYABLE_CODES: [&str; 6] = ["5", "6", "261", "262", "517", "773"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Maximum nesting depth exceeded: depth {depth} > {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },

    #[error("Parent comment not found: {0}")]
    ParentNotFound(String),

    #[error("Comment has replies: {0}")]
    HasChildren(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transient store error: {0}")]
    TransientStore(String),

    #[error("Permanent store error: {0}")]
    PermanentStore(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// 呼び出し側がバックオフ付きで再試行してよいエラーかどうか
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStore(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::DepthExceeded { .. } => "depth_exceeded",
            AppError::ParentNotFound(_) => "parent_not_found",
            AppError::HasChildren(_) => "has_children",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::TransientStore(_) => "transient_store_error",
            AppError::PermanentStore(_) => "permanent_store_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    pub fn timeout(operation: &str) -> Self {
        AppError::TransientStore(format!("{operation} timed out"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Protocol(_) => {
                AppError::TransientStore(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(db_err.message().to_string());
                }
                let retryable = db_err
                    .code()
                    .is_some_and(|code| SQLITE_RETRYABLE_CODES.iter().any(|known| *known == code));
                if retryable {
                    AppError::TransientStore(db_err.message().to_string())
                } else {
                    AppError::PermanentStore(db_err.message().to_string())
                }
            }
            _ => AppError::PermanentStore(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::PermanentStore(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(AppError::TransientStore("busy".into()).is_retryable());
        assert!(!AppError::PermanentStore("constraint".into()).is_retryable());
        assert!(!AppError::Conflict("dup".into()).is_retryable());
        assert!(
            !AppError::DepthExceeded {
                depth: 11,
                max_depth: 10
            }
            .is_retryable()
        );
    }

    #[test]
    fn pool_timeout_is_classified_as_transient() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "transient_store_error");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
