use serde::Serialize;
use station_metrics::{StationRecord, StationTable};

/// The columns of the raw data table, in display order
pub const RAW_TABLE_COLUMNS: [&str; 6] = [
    "name",
    "capacity",
    "num_bikes_available",
    "num_docks_available",
    "out_of_service_bikes",
    "bike_utilization",
];

#[derive(Debug, Serialize)]
pub struct RawTableRow<'r> {
    pub name: &'r str,
    pub capacity: u32,
    pub num_bikes_available: u32,
    pub num_docks_available: u32,
    pub out_of_service_bikes: u32,
    pub bike_utilization: f64,
}

impl<'r> From<&'r StationRecord> for RawTableRow<'r> {
    fn from(record: &'r StationRecord) -> RawTableRow<'r> {
        RawTableRow {
            name: &record.name,
            capacity: record.capacity,
            num_bikes_available: record.num_bikes_available,
            num_docks_available: record.num_docks_available,
            out_of_service_bikes: record.out_of_service_bikes,
            bike_utilization: record.bike_utilization,
        }
    }
}

pub fn raw_rows(table: &StationTable) -> impl Iterator<Item = RawTableRow<'_>> {
    table.iter().map(RawTableRow::from)
}

/// Writes the raw data table as CSV with a header row
pub fn write_csv<W: std::io::Write>(w: W, table: &StationTable) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    for row in raw_rows(table) {
        writer.serialize(row)?;
    }
    if table.is_empty() {
        writer.write_record(RAW_TABLE_COLUMNS)?;
    }
    writer.flush()?;
    Ok(())
}
