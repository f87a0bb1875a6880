mod import;
mod loader;
mod repository;
mod sqlite;
mod table;

pub use import::{import_targets_file, read_checksum, write_checksum, TARGETS_CHECKSUM_FILE};
pub use loader::TargetLoader;
pub use repository::TargetRepository;
pub use sqlite::SqliteTargetRepository;
pub use table::{TargetTable, NTP_OVERRIDE_ADDRESS, NTP_OVERRIDE_DOMAIN};
