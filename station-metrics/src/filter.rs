use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::station::StationTable;

/// Keeps stations with at least `min_capacity` docks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityFilter {
    min_capacity: u32,
}

impl CapacityFilter {
    pub const MIN: u32 = 0;
    pub const MAX: u32 = 60;
    pub const DEFAULT: u32 = 10;

    /// Out of range thresholds are clamped to `MIN..=MAX`
    pub fn new(min_capacity: u32) -> CapacityFilter {
        CapacityFilter {
            min_capacity: min_capacity.max(Self::MIN).min(Self::MAX),
        }
    }

    pub fn min_capacity(&self) -> u32 {
        self.min_capacity
    }

    pub fn apply(&self, table: &StationTable) -> StationTable {
        table.filter(|record| record.capacity >= self.min_capacity)
    }
}

impl Default for CapacityFilter {
    fn default() -> CapacityFilter {
        CapacityFilter::new(Self::DEFAULT)
    }
}

/// Headline counts over the stations being shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub stations_shown: usize,
    pub empty_stations: usize,
    pub full_stations: usize,
    pub stations_with_out_of_service_bikes: usize,
    /// Freshest report across every loaded station, not only the shown ones
    pub last_updated: Option<DateTime<Utc>>,
}

impl Summary {
    pub fn new(loaded: &StationTable, shown: &StationTable) -> Summary {
        Summary {
            stations_shown: shown.len(),
            empty_stations: shown.iter().filter(|r| r.num_bikes_available == 0).count(),
            full_stations: shown.iter().filter(|r| r.num_docks_available == 0).count(),
            stations_with_out_of_service_bikes: shown
                .iter()
                .filter(|r| r.out_of_service_bikes > 0)
                .count(),
            last_updated: loaded.last_reported(),
        }
    }

    /// eg. `2024-05-01 12:00:00 UTC`
    pub fn last_updated_label(&self) -> Option<String> {
        self.last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    }
}
