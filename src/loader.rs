//! Loading with fallback: the warehouse is the primary source, the live feed is the backup, and
//! a successful load is reused until the cache ttl runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use station_metrics::StationTable;
use thiserror::Error;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::gbfs::GbfsSource;
use crate::source::{SourceResult, StationSource};
use crate::warehouse::WarehouseSource;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Warehouse,
    LiveFeed,
}

/// A successful load, and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub table: Arc<StationTable>,
    pub origin: DataOrigin,
}

impl Loaded {
    /// The primary source failed and the backup is being shown
    pub fn is_degraded(&self) -> bool {
        self.origin == DataOrigin::LiveFeed
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Unable to load station data from both the warehouse and the live feed. Please try again later.")]
    AllSourcesExhausted { primary: String, backup: String },
}

#[derive(Debug)]
enum LoadState {
    TryWarehouse,
    TryLive { primary_diagnostic: String },
    Succeeded(Loaded),
    Failed(LoadError),
}

pub struct StationLoader<P, B> {
    primary: P,
    backup: B,
    cache: TtlCache<Loaded>,
}

impl<P: StationSource, B: StationSource> StationLoader<P, B> {
    pub fn new(primary: P, backup: B, ttl: Duration) -> StationLoader<P, B> {
        StationLoader {
            primary,
            backup,
            cache: TtlCache::new(ttl),
        }
    }

    /// Returns the cached load if it is still fresh, otherwise runs the sources in order until
    /// one of them has stations. Failed loads are not cached.
    pub fn load(&mut self, now: DateTime<Utc>) -> Result<Loaded, LoadError> {
        if let Some(cached) = self.cache.get(now) {
            tracing::debug!(origin = ?cached.origin, "using cached station data");
            return Ok(cached.clone());
        }

        let mut state = LoadState::TryWarehouse;
        loop {
            state = match state {
                LoadState::TryWarehouse => match self.primary.fetch(now) {
                    SourceResult::Loaded(table) => LoadState::Succeeded(Loaded {
                        table: Arc::new(table),
                        origin: DataOrigin::Warehouse,
                    }),
                    SourceResult::Empty { diagnostic } => {
                        tracing::warn!(
                            primary = self.primary.name(),
                            backup = self.backup.name(),
                            %diagnostic,
                            "primary source failed, falling back"
                        );
                        LoadState::TryLive {
                            primary_diagnostic: diagnostic,
                        }
                    }
                },
                LoadState::TryLive { primary_diagnostic } => match self.backup.fetch(now) {
                    SourceResult::Loaded(table) => LoadState::Succeeded(Loaded {
                        table: Arc::new(table),
                        origin: DataOrigin::LiveFeed,
                    }),
                    SourceResult::Empty { diagnostic } => {
                        LoadState::Failed(LoadError::AllSourcesExhausted {
                            primary: primary_diagnostic,
                            backup: diagnostic,
                        })
                    }
                },
                LoadState::Succeeded(loaded) => {
                    self.cache.put(loaded.clone(), now);
                    return Ok(loaded);
                }
                LoadState::Failed(error) => {
                    tracing::error!(?error, "no source has station data");
                    return Err(error);
                }
            }
        }
    }
}

impl StationLoader<WarehouseSource, GbfsSource> {
    /// The warehouse backed by the live feed, as configured
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let primary = WarehouseSource::new(
            config.warehouse.clone(),
            config.city_timezone,
            config.request_timeout,
        )?;
        let backup = GbfsSource::new(&config.gbfs_base_url, config.request_timeout)?;
        Ok(StationLoader::new(primary, backup, config.cache_ttl))
    }
}
