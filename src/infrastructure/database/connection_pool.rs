use crate::shared::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ConnectionPool {
    pool: Arc<SqlitePool>,
}

impl ConnectionPool {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_options(database_url, 5, Duration::from_secs(30)).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        Self::with_options(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.connection_timeout),
        )
        .await
    }

    pub async fn with_options(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(target: "forum::database", url = database_url, "database connected");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// テスト用のインメモリ DB。接続が切れると消えるため 1 本を保持し続ける
    pub async fn from_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
