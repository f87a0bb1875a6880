use std::net::IpAddr;

use anyhow::Context as _;
use serde::Serialize;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{FromRow, SqliteConnection};

use super::{unix_timestamp, Model};

/// A single rate limited request
#[derive(Debug, Serialize, FromRow, Clone, PartialEq, Eq)]
pub struct ThrottleLog {
    pub id: u32,
    pub timestamp: u32,
    pub client: String,
}

impl ThrottleLog {
    pub fn new(client: IpAddr) -> anyhow::Result<Self> {
        Ok(ThrottleLog {
            id: 0,
            timestamp: unix_timestamp()?,
            client: client.to_string(),
        })
    }
}

impl Model for ThrottleLog {
    const NAME: &'static str = "ThrottleLog";

    async fn bind_and_insert(&self, connection: &mut SqliteConnection) -> anyhow::Result<SqliteQueryResult> {
        sqlx::query("INSERT INTO throttle_log (timestamp, client) VALUES (?1, ?2)")
            .bind(self.timestamp)
            .bind(&self.client)
            .execute(connection)
            .await
            .context("error while inserting a throttle log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteDb;

    #[tokio::test]
    async fn insert_throttle_log() {
        let db = SqliteDb::new_in_memory().await.expect("shouldn't have failed");
        db.init_tables().await.expect("shouldn't have failed");
        let mut connection = db.get_connection().await.expect("shouldn't have failed");

        let log = ThrottleLog::new("192.0.2.7".parse().unwrap()).expect("shouldn't have failed");
        let id = log.insert_into(&mut connection).await.expect("shouldn't have failed");

        let stored: ThrottleLog = sqlx::query_as("SELECT * FROM throttle_log WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *connection)
            .await
            .expect("shouldn't have failed");
        assert_eq!(stored.client, "192.0.2.7");
        assert_eq!(stored.timestamp, log.timestamp);
    }
}
