//! Two `tracing` layers:
//!
//! - stdout, filtered by `GNS_LOG` (INFO by default). Events below INFO are printed with their
//!   source location, so `GNS_LOG=guardian_ns=debug` shows where throttling and misses happen.
//! - the log file, filtered by `GNS_LOG_FILE` (everything by default), in the multi-line pretty
//!   format without colors.

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

pub const LOGGING_ENV: &str = "GNS_LOG";
pub const LOGGING_FILE_ENV: &str = "GNS_LOG_FILE";

pub fn setup_logging(log_file_path: &Path) -> anyhow::Result<()> {
    let log_file = open_log_file(log_file_path)?;

    let stdout_layer = layer()
        .with_filter(LevelFilter::INFO)
        .and_then(
            layer()
                .with_line_number(true)
                .with_file(true)
                .with_filter(filter_fn(|metadata| metadata.level() > &LevelFilter::INFO)),
        )
        .with_filter(env_filter(LOGGING_ENV, LevelFilter::INFO));

    let file_layer = layer()
        .pretty()
        .with_writer(log_file)
        .with_ansi(false)
        .with_filter(env_filter(LOGGING_FILE_ENV, LevelFilter::TRACE));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize tracing_subscriber")
}

fn env_filter(env_var: &str, default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default.into())
        .from_env_lossy()
}

/// Appends to the file, creating it and its parent directories when missing
fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create the log directory {:?}", parent))?;
    }

    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open the log file {:?}", path))
}
