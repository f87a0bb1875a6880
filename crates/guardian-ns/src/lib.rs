mod logging;
pub use logging::setup_logging;
mod connection;
pub use connection::Connection;
mod server;
pub use server::DnsServer;
mod cli;
pub use cli::Args;
mod app;
pub use app::App;
mod reloader;
pub use reloader::Reloader;
pub mod handler;
pub mod rate_limiter;
pub mod targets;
pub mod throttle_logger;
#[cfg(test)]
pub(crate) mod test_utils;

pub use handler::{Query, QueryHandler, ANSWER_TTL};
pub use rate_limiter::{RateLimitPolicy, RateLimiter};
pub use targets::{TargetLoader, TargetRepository, TargetTable};
pub use throttle_logger::{ThrottleLogger, ThrottleSink};
