//! Bike share station occupancy: loads station data from the warehouse, or the live GBFS feed
//! when the warehouse has nothing, and draws it as a map dashboard.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod draw;
pub mod gbfs;
pub mod loader;
pub mod source;
pub mod table;
pub mod warehouse;

pub use config::Config;
pub use dashboard::Dashboard;
pub use loader::{DataOrigin, LoadError, Loaded, StationLoader};
pub use source::{SourceResult, StationSource};

use tracing_subscriber::EnvFilter;

/// Logs to stderr, filtered by `RUST_LOG` and defaulting to `info`
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
