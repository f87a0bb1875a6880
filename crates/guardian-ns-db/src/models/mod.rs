mod target;
mod throttle_log;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use serde::Serialize;
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::{FromRow, SqliteConnection};
pub use target::Target;
pub use throttle_log::ThrottleLog;

pub trait Model: Serialize + for<'a> FromRow<'a, SqliteRow> + Sync {
    const NAME: &'static str;

    fn bind_and_insert(
        &self,
        connection: &mut SqliteConnection,
    ) -> impl std::future::Future<Output = anyhow::Result<SqliteQueryResult>> + Send;

    fn insert_into(
        &self,
        connection: &mut SqliteConnection,
    ) -> impl std::future::Future<Output = anyhow::Result<u32>> + Send {
        async {
            let result = self
                .bind_and_insert(connection)
                .await
                .with_context(|| format!("error while inserting a {}", Self::NAME))?;

            if result.rows_affected() != 1 {
                anyhow::bail!(
                    "error while inserting a {}: wrong number of affected rows {}",
                    Self::NAME,
                    result.rows_affected()
                )
            }

            Ok(result.last_insert_rowid() as u32)
        }
    }
}

pub fn unix_timestamp() -> anyhow::Result<u32> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("bug: misconfigured time on the system")?
        .as_secs() as u32)
}
