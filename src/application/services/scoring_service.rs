use crate::application::ports::repositories::{ContentAggregateRepository, RankingQuery};
use crate::domain::constants::DEFAULT_MIN_HOT_SCORE;
use crate::domain::entities::ContentAggregate;
use crate::domain::scoring::ContentScores;
use crate::domain::value_objects::{ContentId, ContentRef, ContentType};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::retry::with_timeout;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const MAX_SCORE_WRITE_ATTEMPTS: usize = 3;

pub struct ScoringService {
    aggregates: Arc<dyn ContentAggregateRepository>,
    controversy_min_votes: u32,
    store_timeout: Duration,
}

impl ScoringService {
    pub fn new(aggregates: Arc<dyn ContentAggregateRepository>, config: &AppConfig) -> Self {
        Self {
            aggregates,
            controversy_min_votes: config.scoring.controversy_min_votes,
            store_timeout: config.database.store_timeout(),
        }
    }

    pub fn controversy_min_votes(&self) -> u32 {
        self.controversy_min_votes
    }

    /// スレッドの集計行を登録する（スレッド自体の作成は上位層の責務）
    pub async fn register_content(
        &self,
        content_type: ContentType,
        content_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ContentAggregate, AppError> {
        let content_id = ContentId::new(content_id).map_err(AppError::ValidationError)?;
        let aggregate = ContentAggregate::new(ContentRef::new(content_type, content_id), created_at);

        with_timeout(
            self.store_timeout,
            "register_content",
            self.aggregates.register_content(&aggregate),
        )
        .await?;

        tracing::debug!(target: "forum::scoring", content = %aggregate.content, "content registered");
        Ok(aggregate)
    }

    pub async fn get_aggregate(&self, content: &ContentRef) -> Result<ContentAggregate, AppError> {
        with_timeout(
            self.store_timeout,
            "get_aggregate",
            self.aggregates.get_aggregate(content),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(content.to_string()))
    }

    /// 現在の counters から全スコアを再計算して保存する。何度実行しても同じ結果になる
    pub async fn recompute_scores(
        &self,
        content: &ContentRef,
    ) -> Result<ContentAggregate, AppError> {
        let aggregate = self.get_aggregate(content).await?;
        self.store_scores(aggregate).await
    }

    /// 投票行から counters を数え直してからスコアを再計算する
    pub async fn reconcile(&self, content: &ContentRef) -> Result<ContentAggregate, AppError> {
        let aggregate = with_timeout(
            self.store_timeout,
            "reconcile_counts",
            self.aggregates.reconcile_counts(content),
        )
        .await?;
        self.store_scores(aggregate).await
    }

    pub async fn list_recently_active(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        with_timeout(
            self.store_timeout,
            "list_recently_active",
            self.aggregates.list_recently_active(since, limit),
        )
        .await
    }

    pub async fn most_upvoted(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        with_timeout(
            self.store_timeout,
            "list_most_upvoted",
            self.aggregates.list_most_upvoted(query),
        )
        .await
    }

    /// `min_votes` 未満のコンテンツは対象外
    pub async fn controversial(
        &self,
        query: &RankingQuery,
        min_votes: Option<u32>,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let min_votes = min_votes.unwrap_or(self.controversy_min_votes);
        with_timeout(
            self.store_timeout,
            "list_controversial",
            self.aggregates.list_controversial(query, min_votes),
        )
        .await
    }

    /// 保存済みのホットスコア順。`min_hot` を省くと既定の下限を使う
    pub async fn hot(
        &self,
        query: &RankingQuery,
        min_hot: Option<f64>,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        let min_hot = min_hot.unwrap_or(DEFAULT_MIN_HOT_SCORE);
        with_timeout(
            self.store_timeout,
            "list_hot",
            self.aggregates.list_hot(query, min_hot),
        )
        .await
    }

    /// 読み出した counters から計算したスコアを保存する。保存までに投票が入った場合は
    /// 読み直して計算し直し、古い counters のスコアで上書きしない
    async fn store_scores(
        &self,
        mut aggregate: ContentAggregate,
    ) -> Result<ContentAggregate, AppError> {
        for _ in 0..MAX_SCORE_WRITE_ATTEMPTS {
            let scores: ContentScores = aggregate.scores(self.controversy_min_votes);
            let stored = with_timeout(
                self.store_timeout,
                "update_scores",
                self.aggregates.update_scores(&aggregate, &scores),
            )
            .await?;

            if stored {
                tracing::trace!(
                    target: "forum::scoring",
                    content = %aggregate.content,
                    hot = scores.hot_score,
                    wilson = scores.wilson_score,
                    "scores recomputed"
                );
                return Ok(aggregate.with_scores(scores));
            }
            aggregate = self.get_aggregate(&aggregate.content).await?;
        }

        // 後続の投票の再計算に任せる
        tracing::debug!(
            target: "forum::scoring",
            content = %aggregate.content,
            "score write superseded by newer votes"
        );
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::repositories::VoteRepository;
    use crate::domain::entities::VoteType;
    use crate::domain::scoring::wilson_score;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::database::{ConnectionPool, SqliteRepository};

    async fn setup() -> (Arc<SqliteRepository>, ScoringService, ContentRef) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(pool));
        let scoring = ScoringService::new(repository.clone(), &AppConfig::default());
        let thread_id = ContentId::random();
        scoring
            .register_content(ContentType::Thread, thread_id.as_str(), Utc::now())
            .await
            .unwrap();
        (repository, scoring, ContentRef::thread(thread_id))
    }

    async fn upvote(repository: &SqliteRepository, voter: &str, content: &ContentRef) {
        repository
            .apply_vote(&UserId::new(voter).unwrap(), content, VoteType::Up)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_counters_do_not_overwrite_scores() {
        let (repository, scoring, content) = setup().await;
        upvote(&repository, "alice", &content).await;
        let stale = scoring.get_aggregate(&content).await.unwrap();
        upvote(&repository, "bob", &content).await;

        let written = repository
            .update_scores(&stale, &stale.scores(scoring.controversy_min_votes()))
            .await
            .unwrap();
        assert!(!written);

        let fresh = scoring.recompute_scores(&content).await.unwrap();
        assert_eq!((fresh.upvotes, fresh.downvotes), (2, 0));
        assert_eq!(fresh.wilson_score, wilson_score(2, 0));
        let stored = scoring.get_aggregate(&content).await.unwrap();
        assert_eq!(stored.wilson_score, wilson_score(2, 0));
    }

    #[tokio::test]
    async fn score_write_for_missing_content_is_not_found() {
        let (repository, scoring, _) = setup().await;
        let ghost = ContentAggregate::new(ContentRef::thread(ContentId::random()), Utc::now());

        let result = repository
            .update_scores(&ghost, &ghost.scores(scoring.controversy_min_votes()))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn hot_listing_orders_by_stored_hot_score() {
        let (repository, scoring, older) = setup().await;
        let newer_id = ContentId::random();
        scoring
            .register_content(ContentType::Thread, newer_id.as_str(), Utc::now())
            .await
            .unwrap();
        let newer = ContentRef::thread(newer_id);
        let stale_id = ContentId::random();
        scoring
            .register_content(
                ContentType::Thread,
                stale_id.as_str(),
                DateTime::from_timestamp_millis(crate::domain::scoring::HOT_EPOCH_MILLIS).unwrap(),
            )
            .await
            .unwrap();

        for voter in ["alice", "bob", "carol"] {
            upvote(&repository, voter, &older).await;
        }
        for content in [&older, &newer] {
            scoring.recompute_scores(content).await.unwrap();
        }

        let query = RankingQuery::new(ContentType::Thread, 10);
        let hot = scoring.hot(&query, None).await.unwrap();
        // 基準時刻に作られた未投票スレッドはホットスコア 0 なので既定の下限で除かれる
        assert_eq!(hot.len(), 2);
        assert_eq!(hot[0].content, older);
        assert!(hot[0].hot_score > hot[1].hot_score);

        let everything = scoring.hot(&query, Some(f64::MIN)).await.unwrap();
        assert_eq!(everything.len(), 3);
        assert_eq!(everything[2].content.content_id, stale_id);
    }
}
