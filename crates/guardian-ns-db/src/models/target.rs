use anyhow::Context as _;
use guardian_ns_common::normalize_domain;
use serde::Serialize;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use super::{unix_timestamp, Model};

/// A domain → address binding as stored in the DB
#[derive(Debug, Serialize, FromRow, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: u32,
    pub timestamp: u32,
    /// Always stored normalized: lower-case with a trailing dot
    pub domain: String,
    pub address: String,
}

impl Target {
    pub fn new(domain: &str, address: String) -> anyhow::Result<Self> {
        Ok(Target {
            id: 0,
            timestamp: unix_timestamp()?,
            domain: normalize_domain(domain),
            address,
        })
    }

    /// Inserts the target or replaces the address of an existing one with the same domain.
    /// Returns the row id.
    pub async fn upsert(&self, connection: &mut SqliteConnection) -> anyhow::Result<u32> {
        sqlx::query_scalar(
            "INSERT INTO targets (timestamp, domain, address) VALUES (?1, ?2, ?3)
            ON CONFLICT(domain) DO UPDATE SET timestamp = excluded.timestamp, address = excluded.address
            RETURNING id",
        )
        .bind(self.timestamp)
        .bind(&self.domain)
        .bind(&self.address)
        .fetch_one(connection)
        .await
        .with_context(|| format!("error while upserting a {}", Self::NAME))
    }

    pub async fn select_all(connection: &mut SqliteConnection) -> anyhow::Result<Vec<Target>> {
        sqlx::query_as("SELECT * FROM targets")
            .fetch_all(connection)
            .await
            .context("error while selecting all targets")
    }

    /// Returns the deleted targets
    pub async fn delete_by_ids(connection: &mut SqliteConnection, ids: &[u32]) -> anyhow::Result<Vec<Target>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::new("DELETE FROM targets WHERE id IN ");
        query.push_tuples(ids, |mut tup, id| {
            tup.push_bind(*id);
        });
        query.push(" RETURNING *");

        query
            .build_query_as()
            .fetch_all(connection)
            .await
            .context("error while deleting targets")
    }
}

impl Model for Target {
    const NAME: &'static str = "Target";

    async fn bind_and_insert(&self, connection: &mut SqliteConnection) -> anyhow::Result<SqliteQueryResult> {
        sqlx::query("INSERT INTO targets (timestamp, domain, address) VALUES (?1, ?2, ?3)")
            .bind(self.timestamp)
            .bind(&self.domain)
            .bind(&self.address)
            .execute(connection)
            .await
            .context("error while inserting a target")
    }
}
