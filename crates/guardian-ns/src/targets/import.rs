use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context as _;
use guardian_ns_common::{sha1_checksum, validate_target};
use guardian_ns_db::Target;
use sqlx::SqliteConnection;

/// Name of the file (inside the data dir) that holds the checksum of the last imported targets file
pub const TARGETS_CHECKSUM_FILE: &str = "targets_checksum";

/// Imports `<domain> <ipv4>` lines into the `targets` table.
///
/// Returns the checksum of the file if it was imported, or `None` if it matched
/// `expected_checksum` and was left alone. Existing targets with the same domain get the
/// address from the file.
pub async fn import_targets_file(
    path: &Path,
    connection: &mut SqliteConnection,
    expected_checksum: Option<[u8; 20]>,
) -> anyhow::Result<Option<[u8; 20]>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("error while opening the file {:?}", path))?;

    let file_checksum = sha1_checksum(data.as_bytes());
    if expected_checksum == Some(file_checksum) {
        tracing::debug!(path = ?path, "Checksums matched, no need to import the targets");
        return Ok(None);
    }

    let mut imported = 0;
    for (line_idx, line) in data.lines().enumerate() {
        // Strip comments and surrounding whitespace
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if let Err(e) = import_line(line, connection).await {
            tracing::debug!("Error while processing line {} '{}': {:#}", line_idx + 1, line, e);
            continue;
        }
        imported += 1;
    }

    tracing::info!(path = ?path, "Imported {} targets", imported);

    Ok(Some(file_checksum))
}

async fn import_line(line: &str, connection: &mut SqliteConnection) -> anyhow::Result<()> {
    let mut fields = line.split_whitespace();
    let domain = fields.next().context("missing domain")?;
    let address = fields.next().context("missing address")?;
    if fields.next().is_some() {
        anyhow::bail!("unexpected data after the address");
    }

    let (domain, address) = validate_target(domain, address)?;
    Target::new(&domain, address.to_string())?.upsert(connection).await?;

    Ok(())
}

/// Reads a previously stored checksum. A missing or malformed file is the same as no checksum
pub async fn read_checksum(path: &Path) -> anyhow::Result<Option<[u8; 20]>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("error while reading the checksum file {:?}", path)),
    };

    match <[u8; 20]>::try_from(data.as_slice()) {
        Ok(checksum) => Ok(Some(checksum)),
        Err(_) => {
            tracing::warn!(path = ?path, "Ignoring a malformed checksum file");
            Ok(None)
        }
    }
}

pub async fn write_checksum(path: &Path, checksum: &[u8; 20]) -> anyhow::Result<()> {
    tokio::fs::write(path, checksum)
        .await
        .with_context(|| format!("error while writing the checksum file {:?}", path))
}
