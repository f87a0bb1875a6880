mod domain;
mod target;
mod util;

pub use domain::{is_valid_domain, normalize_domain};
pub use target::{parse_target_address, validate_target, TargetError};
use tokio::sync::oneshot;
pub use util::sha1_checksum;

/// Commands sent to the DNS server by the API server
#[derive(Debug)]
pub enum ServerCommand {
    /// Reload the target table from the DB. Replies with the number of loaded entries
    ReloadTargets(oneshot::Sender<anyhow::Result<usize>>),
}
