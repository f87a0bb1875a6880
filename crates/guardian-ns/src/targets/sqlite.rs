use std::collections::HashMap;

use guardian_ns_db::{SqliteDb, Target};

use super::TargetRepository;

/// Serves targets stored in the `targets` table
#[derive(Debug, Clone)]
pub struct SqliteTargetRepository {
    db: SqliteDb,
}

impl SqliteTargetRepository {
    pub fn new(db: SqliteDb) -> Self {
        SqliteTargetRepository { db }
    }
}

impl TargetRepository for SqliteTargetRepository {
    async fn get_targets_list(&self) -> anyhow::Result<HashMap<String, String>> {
        let mut connection = self.db.get_connection().await?;
        let targets = Target::select_all(&mut connection).await?;

        Ok(targets
            .into_iter()
            .map(|target| (target.domain, target.address))
            .collect())
    }
}
