use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scoring: ScoringConfig,
    pub trust: TrustConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// 1 回のストア呼び出しに許す時間（ミリ秒）
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub refresh_on_vote: bool,
    pub controversy_min_votes: u32,
    pub sweep_enabled: bool,
    pub sweep_interval_minutes: u64,
    pub sweep_window_hours: u64,
    pub sweep_batch_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    pub bot_score_threshold: u8,
    pub rapid_posts_per_hour: u32,
    pub duplicate_ratio: f64,
    pub links_per_post: f64,
    pub votes_per_hour: u32,
    pub vote_target_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/friksi.db".to_string(),
                max_connections: 5,
                connection_timeout: 30,
                store_timeout_ms: 5_000,
            },
            scoring: ScoringConfig::default(),
            trust: TrustConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            refresh_on_vote: true,
            controversy_min_votes: 5,
            sweep_enabled: true,
            sweep_interval_minutes: 15,
            sweep_window_hours: 24 * 7,
            sweep_batch_size: 500,
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            bot_score_threshold: 50,
            rapid_posts_per_hour: 10,
            duplicate_ratio: 0.5,
            links_per_post: 3.0,
            votes_per_hour: 60,
            vote_target_share: 0.8,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

impl DatabaseConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FRIKSI_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("FRIKSI_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u32(&v)
        {
            cfg.database.max_connections = value.max(1);
        }
        if let Ok(v) = std::env::var("FRIKSI_STORE_TIMEOUT_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.database.store_timeout_ms = value.max(1);
        }

        // スコア再計算
        if let Ok(v) = std::env::var("FRIKSI_SCORING_REFRESH_ON_VOTE") {
            cfg.scoring.refresh_on_vote = parse_bool(&v, cfg.scoring.refresh_on_vote);
        }
        if let Ok(v) = std::env::var("FRIKSI_CONTROVERSY_MIN_VOTES")
            && let Some(value) = parse_u32(&v)
        {
            cfg.scoring.controversy_min_votes = value;
        }
        if let Ok(v) = std::env::var("FRIKSI_SWEEP_ENABLED") {
            cfg.scoring.sweep_enabled = parse_bool(&v, cfg.scoring.sweep_enabled);
        }
        if let Ok(v) = std::env::var("FRIKSI_SWEEP_INTERVAL_MINUTES")
            && let Some(value) = parse_u64(&v)
        {
            cfg.scoring.sweep_interval_minutes = value.max(1);
        }
        if let Ok(v) = std::env::var("FRIKSI_SWEEP_WINDOW_HOURS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.scoring.sweep_window_hours = value.max(1);
        }

        // Bot 判定
        if let Ok(v) = std::env::var("FRIKSI_BOT_SCORE_THRESHOLD")
            && let Some(value) = parse_u32(&v)
        {
            cfg.trust.bot_score_threshold = value.min(100) as u8;
        }
        if let Ok(v) = std::env::var("FRIKSI_RAPID_POSTS_PER_HOUR")
            && let Some(value) = parse_u32(&v)
        {
            cfg.trust.rapid_posts_per_hour = value.max(1);
        }
        if let Ok(v) = std::env::var("FRIKSI_DUPLICATE_RATIO")
            && let Some(value) = parse_f64(&v)
        {
            cfg.trust.duplicate_ratio = value.clamp(0.0, 1.0);
        }

        // リトライ
        if let Ok(v) = std::env::var("FRIKSI_RETRY_MAX_ATTEMPTS")
            && let Some(value) = parse_u32(&v)
        {
            cfg.retry.max_attempts = value.max(1);
        }
        if let Ok(v) = std::env::var("FRIKSI_RETRY_BASE_DELAY_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.retry.base_delay_ms = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.database.store_timeout_ms == 0 {
            return Err("Database store_timeout_ms must be greater than 0".to_string());
        }
        if self.scoring.sweep_enabled {
            if self.scoring.sweep_interval_minutes == 0 {
                return Err("Scoring sweep_interval_minutes must be greater than 0".to_string());
            }
            if self.scoring.sweep_window_hours == 0 {
                return Err("Scoring sweep_window_hours must be greater than 0".to_string());
            }
        }
        if self.trust.bot_score_threshold > 100 {
            return Err("Trust bot_score_threshold must be within 0..=100".to_string());
        }
        if !(0.0..=1.0).contains(&self.trust.duplicate_ratio)
            || !(0.0..=1.0).contains(&self.trust.vote_target_share)
        {
            return Err("Trust ratios must be within 0.0..=1.0".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("Retry max_attempts must be greater than 0".to_string());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err("Retry base_delay_ms must not exceed max_delay_ms".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
