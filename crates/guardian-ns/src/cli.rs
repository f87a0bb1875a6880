use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;

use crate::rate_limiter::RateLimitPolicy;

#[derive(Parser, Debug)]
#[command(version, name = "guardian-ns")]
pub struct Args {
    /// File with `<domain> <ipv4>` lines, imported into the DB on startup
    #[arg(long, value_name = "PATH")]
    pub targets_path: Option<PathBuf>,
    /// Where the DB and the import checksum live. Defaults to the user's data directory
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
    #[arg(long, value_name = "CONNECTIONS", default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_parallel_connections: u8,
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1")]
    pub host: IpAddr,
    #[arg(short('p'), long, value_name = "PORT", default_value_t = 53)]
    pub port: u16,
    /// Sustained number of queries per second allowed for a single client
    #[arg(long, value_name = "RATE", default_value_t = 10.0)]
    pub rate_limit_per_sec: f64,
    /// Number of queries a client can send in a burst
    #[arg(long, value_name = "QUERIES", default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit_burst: u32,
    /// How often clients whose rate limit budget has fully refilled are forgotten
    #[arg(long, value_name = "SECONDS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub client_sweep_secs: u64,
    /// Reload targets from the DB periodically
    #[arg(long, value_name = "SECONDS")]
    pub reload_interval_secs: Option<u64>,
    #[arg(long, value_name = "PATH", default_value = "guardian-ns.log")]
    pub log_file: PathBuf,
    #[arg(short('s'), long, default_value_t = false)]
    pub disable_api_server: bool,
    #[arg(long, value_name = "PORT", default_value_t = 3000)]
    pub api_server_port: u16,
}

impl Args {
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        match self.data_dir.as_ref() {
            Some(path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|path| path.join("guardian-ns"))
                .context("failed to find the data directory, use --data-dir"),
        }
    }

    pub fn rate_limit_policy(&self) -> anyhow::Result<RateLimitPolicy> {
        RateLimitPolicy::new(self.rate_limit_per_sec, self.rate_limit_burst).context("invalid rate limit")
    }

    pub fn client_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.client_sweep_secs)
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload_interval_secs.map(Duration::from_secs)
    }
}
