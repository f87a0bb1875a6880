use std::collections::HashMap;
use std::future::Future;

/// The backing store of the target table.
///
/// Returns the complete current mapping of domain names to textual addresses. Keys may come in
/// any case and with or without the trailing dot, the loader normalizes them.
pub trait TargetRepository: Send + Sync {
    fn get_targets_list(&self) -> impl Future<Output = anyhow::Result<HashMap<String, String>>> + Send;
}
