pub mod comment;
pub mod content_aggregate;
pub mod trust_profile;
pub mod vote;
pub mod xp;

pub use comment::{Comment, CommentRow, CommentSort, CommentStats, DeleteMode};
pub use content_aggregate::ContentAggregate;
pub use trust_profile::{ActivityEvidence, TrustBand, TrustFactors, TrustProfile};
pub use vote::{
    TrendInterval, TrendTimeframe, Vote, VoteState, VoteStats, VoteTransition, VoteTrendPoint,
    VoteType, vote_trends,
};
pub use xp::{LevelProgress, XpAward, XpSourceType, XpState, XpTransaction};
