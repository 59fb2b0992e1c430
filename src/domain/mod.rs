pub mod comment_tree;
pub mod constants;
pub mod entities;
pub mod heuristics;
pub mod scoring;
pub mod value_objects;

pub use comment_tree::{CommentNode, build_tree, flatten, prune_removed};
pub use heuristics::{BotHeuristics, HeuristicThresholds};
pub use scoring::ContentScores;
