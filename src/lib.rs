//! Friksi フォーラムのランキング・投票・スレッド型コメントエンジン。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::services::{
    CommentService, ScoringService, SubscriptionManager, TrustService, VoteService, XpService,
};
pub use infrastructure::database::{ConnectionPool, SqliteRepository};
pub use infrastructure::jobs::ScoreRefreshJob;
pub use shared::{AppConfig, AppError, Result};
pub use state::ForumState;

/// ログ設定の初期化
///
/// `RUST_LOG` が未設定の場合は `friksi_core=debug,info` を使う。
/// 既に global subscriber が設定済みなら何もしない。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "friksi_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
