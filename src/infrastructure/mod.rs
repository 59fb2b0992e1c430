pub mod database;
pub mod jobs;
