use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use guardian_ns_db::{Model as _, SqliteDb, ThrottleLog};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, Instant};

const DEFAULT_LOG_CHUNK: usize = 64;
const DB_WRITE_INTERVAL: Duration = Duration::from_secs(5);

/// Receives throttle events from the query path. Implementations must return immediately
pub trait ThrottleSink: Send + Sync {
    fn log_throttle_request(&self, client: IpAddr);
}

impl ThrottleSink for UnboundedSender<ThrottleLog> {
    fn log_throttle_request(&self, client: IpAddr) {
        let log = match ThrottleLog::new(client) {
            Ok(log) => log,
            Err(e) => {
                tracing::debug!(client = %client, "Failed to create a throttle log: {:#}", e);
                return;
            }
        };

        if self.send(log).is_err() {
            tracing::debug!(client = %client, "Throttle logger is gone, dropping the log");
        }
    }
}

/// Collects throttle logs and stores them in batches
pub struct ThrottleLogger {
    db: SqliteDb,
    log_rx: UnboundedReceiver<ThrottleLog>,
}

impl ThrottleLogger {
    pub fn new(log_rx: UnboundedReceiver<ThrottleLog>, db: SqliteDb) -> Self {
        ThrottleLogger { db, log_rx }
    }

    /// Runs until every sender is dropped, then flushes whatever is left
    pub async fn watch_for_logs(mut self) -> anyhow::Result<()> {
        let mut db_write_interval = interval(DB_WRITE_INTERVAL);

        let mut logs = Vec::with_capacity(DEFAULT_LOG_CHUNK);
        loop {
            let shut_down = tokio::select! {
                received_logs = self.log_rx.recv_many(&mut logs, DEFAULT_LOG_CHUNK) => {
                    if received_logs == 0 {
                        tracing::debug!("all log senders were dropped, shutting down the throttle logger");
                        true
                    } else {
                        continue;
                    }
                }
                _ = db_write_interval.tick() => {
                    if logs.is_empty() {
                        continue;
                    }
                    false
                }
            };

            if !logs.is_empty() {
                // A failed batch is dropped, later ones may still make it
                if let Err(e) = self.store(&logs).await {
                    tracing::warn!("Dropped {} throttle logs: {:#}", logs.len(), e);
                }
                logs.clear();
            }

            if shut_down {
                break;
            }
        }

        Ok(())
    }

    async fn store(&self, logs: &[ThrottleLog]) -> anyhow::Result<()> {
        let start = Instant::now();
        let mut tx = self.db.begin_transaction().await?;

        for log in logs {
            log.insert_into(&mut tx)
                .await
                .context("error while adding a throttle log to the txn")?;
        }

        tx.commit()
            .await
            .context("error while inserting collected throttle logs into the DB")?;

        tracing::trace!(
            "Stored {} throttle logs to SQLite in {:.3} seconds",
            logs.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[tokio::test]
    async fn flushes_on_shutdown() {
        let db = SqliteDb::new_in_memory().await.expect("shouldn't have failed");
        db.init_tables().await.expect("shouldn't have failed");

        let (log_tx, log_rx) = unbounded_channel();
        let logger = tokio::spawn(ThrottleLogger::new(log_rx, db.clone()).watch_for_logs());

        let client: IpAddr = "192.0.2.1".parse().unwrap();
        for _ in 0..3 {
            log_tx.log_throttle_request(client);
        }
        drop(log_tx);

        logger
            .await
            .expect("shouldn't have failed")
            .expect("shouldn't have failed");

        let mut connection = db.get_connection().await.expect("shouldn't have failed");
        let logs: Vec<ThrottleLog> = sqlx::query_as("SELECT * FROM throttle_log")
            .fetch_all(&mut *connection)
            .await
            .expect("shouldn't have failed");
        assert_eq!(logs.len(), 3);
        assert!(logs.iter().all(|log| log.client == "192.0.2.1"));
    }

    #[tokio::test]
    async fn keeps_running_after_a_failed_batch() {
        let db = SqliteDb::new_in_memory().await.expect("shouldn't have failed");
        db.init_tables().await.expect("shouldn't have failed");
        sqlx::query(
            "CREATE TRIGGER reject_client BEFORE INSERT ON throttle_log
            WHEN NEW.client = '192.0.2.66'
            BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(db.pool())
        .await
        .expect("shouldn't have failed");

        let (log_tx, log_rx) = unbounded_channel();
        let logger = tokio::spawn(ThrottleLogger::new(log_rx, db.clone()).watch_for_logs());

        log_tx.log_throttle_request("192.0.2.66".parse().unwrap());
        // Let the write interval flush (and fail) the first batch
        tokio::time::sleep(DB_WRITE_INTERVAL + Duration::from_secs(1)).await;

        log_tx.log_throttle_request("192.0.2.1".parse().unwrap());
        drop(log_tx);
        logger
            .await
            .expect("shouldn't have failed")
            .expect("shouldn't have failed");

        let mut connection = db.get_connection().await.expect("shouldn't have failed");
        let logs: Vec<ThrottleLog> = sqlx::query_as("SELECT * FROM throttle_log")
            .fetch_all(&mut *connection)
            .await
            .expect("shouldn't have failed");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].client, "192.0.2.1");
    }

    #[test]
    fn send_to_closed_channel_is_ignored() {
        let (log_tx, log_rx) = unbounded_channel::<ThrottleLog>();
        drop(log_rx);
        log_tx.log_throttle_request("192.0.2.1".parse().unwrap());
    }
}
