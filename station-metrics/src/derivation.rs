//! Utilization metrics computed from a station's raw counts.
//!
//! Sources are not trusted to be consistent: a station may report zero capacity, or more bikes
//! and docks than it has capacity for. Neither case is allowed to produce a ratio outside
//! `[0, 1]` or a NaN.

use crate::station::{StationRecord, StationTable};

/// Recomputes the derived columns of `record` from its capacity and counts.
///
/// Any derived values already present are ignored, so deriving twice gives the same record.
pub fn derive(record: &StationRecord) -> StationRecord {
    let in_service = record.num_bikes_available as u64 + record.num_docks_available as u64;
    let out_of_service_bikes = (record.capacity as u64).saturating_sub(in_service) as u32;
    StationRecord {
        out_of_service_bikes,
        bike_utilization: ratio(record.num_bikes_available, record.capacity),
        dock_utilization: ratio(record.num_docks_available, record.capacity),
        out_of_service_ratio: ratio(out_of_service_bikes, record.capacity),
        ..record.clone()
    }
}

/// The enriched stage of a table
pub fn enrich(table: &StationTable) -> StationTable {
    table.map(derive)
}

fn ratio(count: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.;
    }
    (count as f64 / capacity as f64).min(1.)
}
