use crate::application::services::{
    CommentService, ScoringService, SubscriptionManager, TrustService, VoteService, XpService,
};
use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
use crate::infrastructure::jobs::ScoreRefreshJob;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 設定からストア・サービス・購読管理を組み立てる
pub struct ForumState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub subscriptions: Arc<SubscriptionManager>,
    pub scoring: Arc<ScoringService>,
    pub votes: Arc<VoteService>,
    pub comments: Arc<CommentService>,
    pub trust: Arc<TrustService>,
    pub xp: Arc<XpService>,
    pub score_refresh: Arc<ScoreRefreshJob>,
}

impl ForumState {
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::Configuration)?;
        let pool = ConnectionPool::from_config(&config.database).await?;
        Self::with_pool(config, pool).await
    }

    /// `FRIKSI_*` 環境変数で上書きした設定から組み立てる
    pub async fn from_env() -> Result<Self, AppError> {
        Self::new(AppConfig::from_env()).await
    }

    /// 既存のプールで初期化する。マイグレーションはここで適用する
    pub async fn with_pool(config: AppConfig, pool: ConnectionPool) -> Result<Self, AppError> {
        let repository = Arc::new(SqliteRepository::new(pool.clone()));
        repository.initialize().await?;

        let subscriptions = Arc::new(SubscriptionManager::new());
        let scoring = Arc::new(ScoringService::new(repository.clone(), &config));
        let votes = Arc::new(
            VoteService::new(repository.clone(), scoring.clone(), &config)
                .with_subscriptions(subscriptions.clone()),
        );
        let comments = Arc::new(
            CommentService::new(repository.clone(), &config)
                .with_subscriptions(subscriptions.clone()),
        );
        let trust = Arc::new(TrustService::new(repository.clone(), &config));
        let xp = Arc::new(
            XpService::new(repository, &config).with_subscriptions(subscriptions.clone()),
        );
        let score_refresh = Arc::new(ScoreRefreshJob::new(scoring.clone(), &config.scoring));

        Ok(Self {
            config,
            pool,
            subscriptions,
            scoring,
            votes,
            comments,
            trust,
            xp,
            score_refresh,
        })
    }

    /// 設定で有効な場合のみ定期スイープを起動する
    pub fn start_score_refresh(&self) -> Option<JoinHandle<()>> {
        if !self.config.scoring.sweep_enabled {
            return None;
        }
        let interval =
            Duration::from_secs(self.config.scoring.sweep_interval_minutes.saturating_mul(60));
        tracing::info!(
            target: "forum::scoring",
            interval_minutes = self.config.scoring.sweep_interval_minutes,
            window_hours = self.config.scoring.sweep_window_hours,
            "score refresh sweep scheduled"
        );
        Some(Arc::clone(&self.score_refresh).spawn(interval))
    }
}
