mod models;

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
pub use models::{unix_timestamp, Model, Target, ThrottleLog};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

pub const DB_FILE_NAME: &str = "guardian_ns.db";

#[derive(Debug, Clone)]
pub struct SqliteDb {
    connection_pool: SqlitePool,
}

impl SqliteDb {
    /// Opens (or creates) the DB file inside `data_dir`
    pub async fn new(data_dir: &Path) -> anyhow::Result<Self> {
        // Ensure that all directories exist
        tokio::fs::create_dir_all(data_dir)
            .await
            .context("error while creating the data directory")?;

        let connect_options = SqliteConnectOptions::new()
            .create_if_missing(true)
            .filename(data_dir.join(DB_FILE_NAME));

        let connection_pool = SqlitePoolOptions::new()
            .min_connections(3)
            .max_connections(10)
            .max_lifetime(Duration::from_secs(60 * 60 * 8))
            .connect_with(connect_options)
            .await
            .context("error while opening a connection to SQLite DB")?;

        Ok(SqliteDb { connection_pool })
    }

    /// A private in-memory DB. A single connection is kept alive, as every new connection
    /// would open a separate empty DB.
    pub async fn new_in_memory() -> anyhow::Result<Self> {
        let connection_pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("error while opening an in-memory SQLite DB")?;

        Ok(SqliteDb { connection_pool })
    }

    pub async fn init_tables(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS targets (
                id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                domain TEXT NOT NULL UNIQUE,
                address TEXT NOT NULL
            )",
        )
        .execute(&self.connection_pool)
        .await
        .context("error while initializing the 'targets' table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS throttle_log (
                id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                client TEXT NOT NULL
            )",
        )
        .execute(&self.connection_pool)
        .await
        .context("error while initializing the 'throttle_log' table")?;

        Ok(())
    }

    pub async fn get_connection(&self) -> anyhow::Result<PoolConnection<Sqlite>> {
        self.connection_pool
            .acquire()
            .await
            .context("failed to acquire a connection from pool")
    }

    /// It is the responsibility of the caller to commit the transaction.
    pub async fn begin_transaction(&self) -> anyhow::Result<Transaction<'static, Sqlite>> {
        self.connection_pool
            .begin()
            .await
            .context("failed to start a transaction")
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.connection_pool
    }
}
