use std::sync::Arc;

use anyhow::Context as _;
use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use super::{TargetRepository, TargetTable};

/// Owns the current [`TargetTable`] and replaces it with fresh versions from the repository.
///
/// Readers grab a snapshot and never wait for a reload. Reloads are serialized, and the
/// repository is queried before anything is published, so a failed reload leaves the previous
/// table in place.
pub struct TargetLoader<R> {
    repository: R,
    table: ArcSwap<TargetTable>,
    reload_lock: Mutex<()>,
}

impl<R: TargetRepository> TargetLoader<R> {
    /// Starts with an empty table, nothing is loaded until the first reload
    pub fn new(repository: R) -> Self {
        TargetLoader {
            repository,
            table: ArcSwap::from_pointee(TargetTable::empty()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Builds a table from the current repository state without publishing it
    pub async fn load(&self) -> anyhow::Result<TargetTable> {
        let records = self
            .repository
            .get_targets_list()
            .await
            .context("failed to get the targets list")?;

        Ok(TargetTable::from_records(records))
    }

    /// Publishes `table` and returns the previous version
    pub fn swap(&self, table: TargetTable) -> Arc<TargetTable> {
        self.table.swap(Arc::new(table))
    }

    /// Loads and publishes a new table. Returns the number of entries in it
    pub async fn reload(&self) -> anyhow::Result<usize> {
        let _guard = self.reload_lock.lock().await;

        let table = self.load().await?;
        let entries = table.len();
        self.swap(table);

        Ok(entries)
    }

    pub fn snapshot(&self) -> Arc<TargetTable> {
        self.table.load_full()
    }
}
