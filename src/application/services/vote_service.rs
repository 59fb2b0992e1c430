use super::scoring_service::ScoringService;
use super::subscription_manager::{ForumEvent, SubscriptionManager, Topic};
use crate::application::ports::repositories::{RankingQuery, VoteOutcome, VoteRepository};
use crate::domain::entities::{
    ContentAggregate, TrendInterval, TrendTimeframe, Vote, VoteStats, VoteTrendPoint, VoteType,
    vote_trends,
};
use crate::domain::value_objects::{ContentId, ContentRef, ContentType, UserId};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::retry::{RetryPolicy, with_timeout};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub struct VoteService {
    votes: Arc<dyn VoteRepository>,
    scoring: Arc<ScoringService>,
    subscriptions: Option<Arc<SubscriptionManager>>,
    retry: RetryPolicy,
    store_timeout: Duration,
    refresh_on_vote: bool,
}

impl VoteService {
    pub fn new(
        votes: Arc<dyn VoteRepository>,
        scoring: Arc<ScoringService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            votes,
            scoring,
            subscriptions: None,
            retry: RetryPolicy::from_config(&config.retry),
            store_timeout: config.database.store_timeout(),
            refresh_on_vote: config.scoring.refresh_on_vote,
        }
    }

    pub fn with_subscriptions(mut self, subscriptions: Arc<SubscriptionManager>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 投票を記録する。同じ投票を繰り返すと取り消しになる
    pub async fn cast_vote(
        &self,
        voter_id: Option<&str>,
        content_type: ContentType,
        content_id: &str,
        vote_type: VoteType,
    ) -> Result<VoteOutcome, AppError> {
        let voter = parse_voter(voter_id)?;
        let content = parse_content(content_type, content_id)?;

        let mut outcome = self
            .retry
            .run("cast_vote", || {
                with_timeout(
                    self.store_timeout,
                    "cast_vote",
                    self.votes.apply_vote(&voter, &content, vote_type),
                )
            })
            .await?;

        tracing::info!(
            target: "forum::votes",
            voter = %voter,
            content = %content,
            vote = %vote_type,
            up_delta = outcome.transition.up_delta,
            down_delta = outcome.transition.down_delta,
            new_state = ?outcome.transition.new_state,
            "vote applied"
        );

        if self.refresh_on_vote {
            // 投票はコミット済み。スコア更新に失敗しても定期スイープで収束する
            match self.scoring.recompute_scores(&content).await {
                Ok(aggregate) => outcome.aggregate = aggregate,
                Err(err) => tracing::warn!(
                    target: "forum::votes",
                    content = %content,
                    error = %err,
                    "score refresh after vote failed"
                ),
            }
        }

        self.publish(&voter, &outcome).await;
        Ok(outcome)
    }

    pub async fn get_vote_stats(
        &self,
        content_type: ContentType,
        content_id: &str,
        voter_id: Option<&str>,
    ) -> Result<VoteStats, AppError> {
        let content = parse_content(content_type, content_id)?;
        let aggregate = self.scoring.get_aggregate(&content).await?;

        let user_vote = match voter_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                let voter = UserId::new(id).map_err(AppError::ValidationError)?;
                with_timeout(
                    self.store_timeout,
                    "get_vote",
                    self.votes.get_vote(&voter, &content),
                )
                .await?
                .map(|vote| vote.vote_type)
            }
            None => None,
        };

        Ok(VoteStats {
            upvotes: aggregate.upvotes,
            downvotes: aggregate.downvotes,
            score: aggregate.score(),
            user_vote,
        })
    }

    /// 新しい順の投票履歴
    pub async fn get_user_votes(
        &self,
        voter_id: &str,
        content_type: Option<ContentType>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Vote>, AppError> {
        let voter = parse_voter(Some(voter_id))?;
        with_timeout(
            self.store_timeout,
            "list_user_votes",
            self.votes.list_user_votes(&voter, content_type, limit, offset),
        )
        .await
    }

    pub async fn get_most_upvoted(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        self.scoring.most_upvoted(query).await
    }

    pub async fn get_controversial(
        &self,
        query: &RankingQuery,
        min_votes: Option<u32>,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        self.scoring.controversial(query, min_votes).await
    }

    pub async fn get_hot(
        &self,
        query: &RankingQuery,
        min_hot: Option<f64>,
    ) -> Result<Vec<ContentAggregate>, AppError> {
        self.scoring.hot(query, min_hot).await
    }

    /// `timeframe` 内の投票を `interval` ごとに集計した推移
    pub async fn get_vote_trends(
        &self,
        content_type: ContentType,
        content_id: &str,
        timeframe: TrendTimeframe,
        interval: TrendInterval,
    ) -> Result<Vec<VoteTrendPoint>, AppError> {
        let content = parse_content(content_type, content_id)?;
        self.scoring.get_aggregate(&content).await?;

        let since = Utc::now() - timeframe.duration();
        let votes = with_timeout(
            self.store_timeout,
            "list_content_votes_since",
            self.votes.list_content_votes_since(&content, since),
        )
        .await?;
        Ok(vote_trends(&votes, interval))
    }

    async fn publish(&self, voter: &UserId, outcome: &VoteOutcome) {
        let (Some(subscriptions), Some(thread_id)) =
            (self.subscriptions.as_ref(), outcome.thread_id.as_ref())
        else {
            return;
        };

        let event = ForumEvent::VoteCast {
            content: outcome.aggregate.content.clone(),
            voter_id: voter.clone(),
            new_state: outcome.transition.new_state,
            upvotes: outcome.aggregate.upvotes,
            downvotes: outcome.aggregate.downvotes,
        };
        subscriptions
            .publish(&Topic::Thread(thread_id.clone()), event)
            .await;
    }
}

fn parse_voter(voter_id: Option<&str>) -> Result<UserId, AppError> {
    let voter_id = voter_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Unauthorized("A signed-in voter is required".to_string()))?;
    UserId::new(voter_id).map_err(AppError::ValidationError)
}

fn parse_content(content_type: ContentType, content_id: &str) -> Result<ContentRef, AppError> {
    let content_id = ContentId::new(content_id).map_err(AppError::ValidationError)?;
    Ok(ContentRef::new(content_type, content_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::VoteState;
    use crate::infrastructure::database::{ConnectionPool, SqliteRepository};
    use async_trait::async_trait;
    use chrono::DateTime;
    use mockall::{Sequence, mock, predicate::*};

    async fn setup() -> (VoteService, ContentRef) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(pool));
        let config = AppConfig::default();
        let scoring = Arc::new(ScoringService::new(repository.clone(), &config));
        let thread_id = ContentId::random();
        scoring
            .register_content(ContentType::Thread, thread_id.as_str(), Utc::now())
            .await
            .unwrap();
        let service = VoteService::new(repository, scoring, &config);
        (service, ContentRef::thread(thread_id))
    }

    #[tokio::test]
    async fn toggle_and_switch_keep_counters_exact() {
        let (service, content) = setup().await;
        let id = content.content_id.as_str();

        let first = service
            .cast_vote(Some("alice"), ContentType::Thread, id, VoteType::Up)
            .await
            .unwrap();
        assert_eq!(first.transition.new_state, VoteState::Upvoted);
        assert_eq!((first.aggregate.upvotes, first.aggregate.downvotes), (1, 0));
        assert!(first.aggregate.wilson_score > 0.0);

        let switched = service
            .cast_vote(Some("alice"), ContentType::Thread, id, VoteType::Down)
            .await
            .unwrap();
        assert_eq!((switched.transition.up_delta, switched.transition.down_delta), (-1, 1));
        assert_eq!((switched.aggregate.upvotes, switched.aggregate.downvotes), (0, 1));

        let toggled = service
            .cast_vote(Some("alice"), ContentType::Thread, id, VoteType::Down)
            .await
            .unwrap();
        assert_eq!(toggled.transition.new_state, VoteState::NoVote);

        let stats = service
            .get_vote_stats(ContentType::Thread, id, Some("alice"))
            .await
            .unwrap();
        assert_eq!((stats.upvotes, stats.downvotes, stats.score), (0, 0, 0));
        assert_eq!(stats.user_vote, None);
        assert!(
            service
                .get_user_votes("alice", None, 10, 0)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn trends_reflect_current_votes_in_window() {
        let (service, content) = setup().await;
        let id = content.content_id.as_str();
        let votes = [
            ("alice", VoteType::Up),
            ("bob", VoteType::Up),
            ("carol", VoteType::Down),
        ];
        for (voter, vote) in votes {
            service
                .cast_vote(Some(voter), ContentType::Thread, id, vote)
                .await
                .unwrap();
        }
        // 取り消した投票は推移に残らない
        service
            .cast_vote(Some("bob"), ContentType::Thread, id, VoteType::Up)
            .await
            .unwrap();

        let trends = service
            .get_vote_trends(ContentType::Thread, id, TrendTimeframe::Day, TrendInterval::Day)
            .await
            .unwrap();
        let up: u32 = trends.iter().map(|p| p.upvotes).sum();
        let down: u32 = trends.iter().map(|p| p.downvotes).sum();
        assert_eq!((up, down), (1, 1));
        assert_eq!(trends.last().map(|p| p.cumulative_score), Some(0));

        let missing = service
            .get_vote_trends(
                ContentType::Thread,
                ContentId::random().as_str(),
                TrendTimeframe::Week,
                TrendInterval::Hour,
            )
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejects_anonymous_and_unknown_content() {
        let (service, content) = setup().await;

        let anonymous = service
            .cast_vote(None, ContentType::Thread, content.content_id.as_str(), VoteType::Up)
            .await;
        assert!(matches!(anonymous, Err(AppError::Unauthorized(_))));

        let blank = service
            .cast_vote(Some("  "), ContentType::Thread, content.content_id.as_str(), VoteType::Up)
            .await;
        assert!(matches!(blank, Err(AppError::Unauthorized(_))));

        let missing = service
            .cast_vote(
                Some("alice"),
                ContentType::Thread,
                ContentId::random().as_str(),
                VoteType::Up,
            )
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let malformed = service
            .cast_vote(Some("alice"), ContentType::Thread, "not-an-id", VoteType::Up)
            .await;
        assert!(matches!(malformed, Err(AppError::ValidationError(_))));
    }

    mock! {
        pub VoteRepo {}

        #[async_trait]
        impl VoteRepository for VoteRepo {
            async fn apply_vote(&self, voter: &UserId, content: &ContentRef, vote: VoteType) -> Result<VoteOutcome, AppError>;
            async fn get_vote(&self, voter: &UserId, content: &ContentRef) -> Result<Option<Vote>, AppError>;
            async fn list_user_votes(&self, voter: &UserId, content_type: Option<ContentType>, limit: u32, offset: u32) -> Result<Vec<Vote>, AppError>;
            async fn list_content_votes_since(&self, content: &ContentRef, since: DateTime<Utc>) -> Result<Vec<Vote>, AppError>;
        }
    }

    async fn service_with(votes: MockVoteRepo) -> VoteService {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(pool));
        let mut config = AppConfig::default();
        config.scoring.refresh_on_vote = false;
        let scoring = Arc::new(ScoringService::new(repository, &config));

        VoteService::new(Arc::new(votes), scoring, &config).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    fn upvoted(content: &ContentRef) -> VoteOutcome {
        VoteOutcome {
            transition: VoteState::NoVote.apply(VoteType::Up),
            aggregate: ContentAggregate::new(content.clone(), Utc::now()),
            thread_id: None,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let content = ContentRef::thread(ContentId::random());
        let mut votes = MockVoteRepo::new();
        let mut seq = Sequence::new();
        votes
            .expect_apply_vote()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(AppError::TransientStore("database is locked".into())));
        let expected = content.clone();
        votes
            .expect_apply_vote()
            .with(always(), eq(content.clone()), eq(VoteType::Up))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(upvoted(&expected)));
        let service = service_with(votes).await;

        let outcome = service
            .cast_vote(Some("bob"), ContentType::Thread, content.content_id.as_str(), VoteType::Up)
            .await
            .unwrap();
        assert_eq!(outcome.transition.new_state, VoteState::Upvoted);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_limit() {
        let content = ContentRef::thread(ContentId::random());
        let mut votes = MockVoteRepo::new();
        votes
            .expect_apply_vote()
            .times(3)
            .returning(|_, _, _| Err(AppError::TransientStore("database is locked".into())));
        let service = service_with(votes).await;

        let result = service
            .cast_vote(Some("bob"), ContentType::Thread, content.content_id.as_str(), VoteType::Up)
            .await;
        assert!(matches!(result, Err(AppError::TransientStore(_))));
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let content = ContentRef::thread(ContentId::random());
        let mut votes = MockVoteRepo::new();
        votes
            .expect_apply_vote()
            .times(1)
            .returning(|_, _, _| Err(AppError::PermanentStore("constraint failed".into())));
        let service = service_with(votes).await;

        let result = service
            .cast_vote(Some("bob"), ContentType::Thread, content.content_id.as_str(), VoteType::Down)
            .await;
        assert!(matches!(result, Err(AppError::PermanentStore(_))));
    }
}
