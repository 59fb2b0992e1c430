pub mod comment_service;
pub mod scoring_service;
pub mod subscription_manager;
pub mod trust_service;
pub mod vote_service;
pub mod xp_service;

pub use comment_service::CommentService;
pub use scoring_service::ScoringService;
pub use subscription_manager::{ForumEvent, Subscription, SubscriptionManager, Topic};
pub use trust_service::TrustService;
pub use vote_service::VoteService;
pub use xp_service::XpService;
