use crate::application::services::ScoringService;
use crate::shared::config::ScoringConfig;
use crate::shared::error::AppError;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

const MAX_WINDOW_HOURS: u64 = 24 * 365 * 10;

/// 最近動きのあったコンテンツの counters を投票行と突き合わせ、スコアを再計算する
pub struct ScoreRefreshJob {
    scoring: Arc<ScoringService>,
    window_hours: u64,
    batch_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRefreshRunStats {
    pub scanned: u64,
    pub refreshed: u64,
    pub drift_corrected: u64,
    pub failed: u64,
    pub window_start_millis: i64,
}

impl ScoreRefreshJob {
    pub fn new(scoring: Arc<ScoringService>, config: &ScoringConfig) -> Self {
        Self {
            scoring,
            window_hours: config.sweep_window_hours,
            batch_size: config.sweep_batch_size.max(1),
        }
    }

    pub async fn run_once(&self) -> Result<ScoreRefreshRunStats, AppError> {
        let started = Instant::now();
        let result = self.execute_once().await;
        let duration_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

        match &result {
            Ok(stats) => tracing::info!(
                target: "forum::scoring",
                scanned = stats.scanned,
                refreshed = stats.refreshed,
                drift_corrected = stats.drift_corrected,
                failed = stats.failed,
                window_start_millis = stats.window_start_millis,
                duration_ms,
                "score refresh sweep completed"
            ),
            Err(err) => tracing::error!(
                target: "forum::scoring",
                error = %err,
                duration_ms,
                "score refresh sweep failed"
            ),
        }

        result
    }

    async fn execute_once(&self) -> Result<ScoreRefreshRunStats, AppError> {
        let hours = self.window_hours.min(MAX_WINDOW_HOURS) as i64;
        let since = Utc::now() - Duration::hours(hours);
        let candidates = self
            .scoring
            .list_recently_active(since, self.batch_size)
            .await?;

        let mut stats = ScoreRefreshRunStats {
            scanned: candidates.len() as u64,
            refreshed: 0,
            drift_corrected: 0,
            failed: 0,
            window_start_millis: since.timestamp_millis(),
        };

        for before in candidates {
            match self.scoring.reconcile(&before.content).await {
                Ok(after) => {
                    stats.refreshed += 1;
                    if (after.upvotes, after.downvotes) != (before.upvotes, before.downvotes) {
                        stats.drift_corrected += 1;
                        tracing::warn!(
                            target: "forum::scoring",
                            content = %after.content,
                            stored_upvotes = before.upvotes,
                            stored_downvotes = before.downvotes,
                            upvotes = after.upvotes,
                            downvotes = after.downvotes,
                            "vote counters drifted, reconciled"
                        );
                    }
                }
                // 対象が途中で削除された場合などは次回に回す
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(
                        target: "forum::scoring",
                        content = %before.content,
                        error = %err,
                        "score refresh skipped"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// `interval` ごとに `run_once` を繰り返すタスクを起動する
    pub fn spawn(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // 失敗は run_once 内で記録済み
                let _ = self.run_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ContentId, ContentRef, ContentType};
    use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
    use crate::shared::config::AppConfig;

    #[tokio::test]
    async fn sweep_reconciles_drifted_counters() {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(pool.clone()));
        let config = AppConfig::default();
        let scoring = Arc::new(ScoringService::new(repository, &config));

        let thread_id = ContentId::random();
        scoring
            .register_content(ContentType::Thread, thread_id.as_str(), Utc::now())
            .await
            .unwrap();

        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO votes (voter_id, content_type, content_id, vote_type, created_at, updated_at)
             VALUES ('a', 'thread', ?1, 'up', ?2, ?2), ('b', 'thread', ?1, 'up', ?2, ?2)",
        )
        .bind(thread_id.as_str())
        .bind(now)
        .execute(pool.get_pool())
        .await
        .unwrap();
        // 集計行だけが壊れた状態を作る
        sqlx::query("UPDATE content_aggregates SET downvotes = 7 WHERE content_id = ?1")
            .bind(thread_id.as_str())
            .execute(pool.get_pool())
            .await
            .unwrap();

        let job = ScoreRefreshJob::new(scoring.clone(), &config.scoring);
        let stats = job.run_once().await.unwrap();
        assert_eq!(stats.scanned, 1);
        assert_eq!(stats.drift_corrected, 1);
        assert_eq!(stats.failed, 0);

        let aggregate = scoring
            .get_aggregate(&ContentRef::thread(thread_id))
            .await
            .unwrap();
        assert_eq!((aggregate.upvotes, aggregate.downvotes), (2, 0));
        assert!(aggregate.wilson_score > 0.0);

        // 2 回目は何も変わらない
        let again = job.run_once().await.unwrap();
        assert_eq!(again.drift_corrected, 0);
    }
}
