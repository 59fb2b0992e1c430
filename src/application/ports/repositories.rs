use crate::domain::entities::{
    Comment, CommentRow, CommentStats, ContentAggregate, TrustProfile, Vote, VoteTransition,
    VoteType, XpAward, XpState, XpTransaction,
};
use crate::domain::scoring::ContentScores;
use crate::domain::value_objects::{ContentId, ContentRef, ContentType, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 保存済みプロファイル（無ければ `None`）から次のプロファイルを作る
pub type ProfileMerge<'a> =
    &'a (dyn Fn(Option<TrustProfile>) -> Result<TrustProfile, AppError> + Send + Sync);

/// ランキング一覧の検索条件
#[derive(Debug, Clone)]
pub struct RankingQuery {
    pub content_type: ContentType,
    pub since: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl RankingQuery {
    pub fn new(content_type: ContentType, limit: u32) -> Self {
        Self {
            content_type,
            since: None,
            limit,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    pub aggregate: ContentAggregate,
    /// 対象が属するスレッド。スレッドへの投票ならそのスレッド自身
    pub thread_id: Option<ContentId>,
}

#[async_trait]
pub trait ContentAggregateRepository: Send + Sync {
    /// 既に登録済みなら `Conflict`
    async fn register_content(&self, aggregate: &ContentAggregate) -> Result<(), AppError>;
    async fn get_aggregate(&self, content: &ContentRef)
    -> Result<Option<ContentAggregate>, AppError>;
    /// `aggregate` の counters が保存値と一致する場合のみスコアを書き込む。
    /// 読み出し後に投票が入っていれば `false`
    async fn update_scores(
        &self,
        aggregate: &ContentAggregate,
        scores: &ContentScores,
    ) -> Result<bool, AppError>;
    async fn list_recently_active(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ContentAggregate>, AppError>;
    /// 投票行から counters を数え直す。更新後の集計を返す
    async fn reconcile_counts(&self, content: &ContentRef) -> Result<ContentAggregate, AppError>;
    async fn list_most_upvoted(
        &self,
        query: &RankingQuery,
    ) -> Result<Vec<ContentAggregate>, AppError>;
    async fn list_controversial(
        &self,
        query: &RankingQuery,
        min_votes: u32,
    ) -> Result<Vec<ContentAggregate>, AppError>;
    /// 保存済みの `hot_score` が `min_hot` 以上のものをホットスコア順に返す
    async fn list_hot(
        &self,
        query: &RankingQuery,
        min_hot: f64,
    ) -> Result<Vec<ContentAggregate>, AppError>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// 投票行の書き込みと集計の差分を 1 トランザクションでコミットする
    async fn apply_vote(
        &self,
        voter: &UserId,
        content: &ContentRef,
        vote: VoteType,
    ) -> Result<VoteOutcome, AppError>;
    async fn get_vote(
        &self,
        voter: &UserId,
        content: &ContentRef,
    ) -> Result<Option<Vote>, AppError>;
    async fn list_user_votes(
        &self,
        voter: &UserId,
        content_type: Option<ContentType>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Vote>, AppError>;
    /// `since` 以降に作成された投票を作成順に返す
    async fn list_content_votes_since(
        &self,
        content: &ContentRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<Vote>, AppError>;
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub thread_id: ContentId,
    pub parent_id: Option<ContentId>,
    pub author_id: UserId,
    pub content: String,
    pub idempotency_key: Option<String>,
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// 親の検証・path の確定・集計行の作成を 1 トランザクションで行う
    async fn create_comment(&self, new_comment: &NewComment) -> Result<Comment, AppError>;
    async fn get_comment(&self, id: &ContentId) -> Result<Option<Comment>, AppError>;
    async fn get_comments_by_ids(&self, ids: &[ContentId]) -> Result<Vec<Comment>, AppError>;
    /// path 順。`limit` で切り詰めても祖先は欠けない
    async fn list_thread_rows(
        &self,
        thread_id: &ContentId,
        max_depth: u32,
        limit: u32,
    ) -> Result<Vec<CommentRow>, AppError>;
    async fn list_subtree_rows(
        &self,
        root: &Comment,
        max_depth: u32,
    ) -> Result<Vec<CommentRow>, AppError>;
    /// 削除済みのコメントは `NotFound`
    async fn update_content(&self, id: &ContentId, content: &str) -> Result<Comment, AppError>;
    async fn soft_delete(&self, id: &ContentId) -> Result<Comment, AppError>;
    /// 削除した件数を返す。`cascade` でなければ子がある場合 `HasChildren`
    async fn hard_delete(&self, id: &ContentId, cascade: bool) -> Result<u64, AppError>;
    async fn get_comment_stats(&self, id: &ContentId) -> Result<Option<CommentStats>, AppError>;
}

#[async_trait]
pub trait TrustProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<TrustProfile>, AppError>;
    /// 書き込みロックを取った上で保存済みプロファイルを読み、`merge` の結果を保存する。
    /// 同じユーザーへの同時評価は直列化される
    async fn update_profile(
        &self,
        user_id: &UserId,
        merge: ProfileMerge<'_>,
    ) -> Result<TrustProfile, AppError>;
}

#[async_trait]
pub trait XpRepository: Send + Sync {
    /// 取引の追記と状態の更新を 1 トランザクションで行う
    async fn apply_transaction(&self, transaction: &XpTransaction) -> Result<XpAward, AppError>;
    async fn get_state(&self, user_id: &UserId) -> Result<Option<XpState>, AppError>;
    /// XP の多い順
    async fn list_states_by_level(
        &self,
        level: u8,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpState>, AppError>;
    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<XpTransaction>, AppError>;
}
