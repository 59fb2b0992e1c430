pub mod score_refresh_job;

pub use score_refresh_job::{ScoreRefreshJob, ScoreRefreshRunStats};
