//! Today's snapshot of the gold station status table, queried through the Snowflake SQL API.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use station_metrics::{derivation, StationId, StationRecord, StationTable};

use crate::config::WarehouseConfig;
use crate::source::{read_json, Deadline, SourceError, SourceResult, StationSource};

pub const GOLD_QUERY: &str = "SELECT
    station_id,
    station_name AS name,
    latitude AS lat,
    longitude AS lon,
    station_capacity AS capacity,
    num_bikes_available,
    num_docks_available,
    out_of_service_bikes,
    bike_utilization,
    dock_utilization,
    out_of_service_ratio,
    last_reported_utc AS last_reported
FROM divvy_station_status_gold
WHERE ds = ?";

/// Columns the query must return, the derived ones are recomputed rather than read
const GOLD_COLUMNS: [&str; 12] = [
    "STATION_ID",
    "NAME",
    "LAT",
    "LON",
    "CAPACITY",
    "NUM_BIKES_AVAILABLE",
    "NUM_DOCKS_AVAILABLE",
    "OUT_OF_SERVICE_BIKES",
    "BIKE_UTILIZATION",
    "DOCK_UTILIZATION",
    "OUT_OF_SERVICE_RATIO",
    "LAST_REPORTED",
];

pub struct WarehouseSource {
    client: Client,
    config: Option<WarehouseConfig>,
    timezone: Tz,
    timeout: Duration,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    schema: &'a str,
    warehouse: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    bindings: HashMap<&'static str, Binding>,
}

#[derive(Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

type Rows = Vec<Vec<Option<String>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Rows,
    #[serde(default)]
    statement_handle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    row_type: Vec<Column>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Partition {
    #[serde(default)]
    data: Rows,
}

impl WarehouseSource {
    pub fn new(
        config: Option<WarehouseConfig>,
        timezone: Tz,
        timeout: Duration,
    ) -> reqwest::Result<WarehouseSource> {
        Ok(WarehouseSource {
            client: Client::builder().connect_timeout(timeout).build()?,
            config,
            timezone,
            timeout,
        })
    }

    fn try_fetch(&self, now: DateTime<Utc>) -> Result<StationTable, SourceError> {
        let config = self.config.as_ref().ok_or(SourceError::NotConfigured)?;
        let deadline = Deadline::after(self.timeout);
        let ds = partition_date(now, self.timezone);
        let url = statements_url(config);
        tracing::debug!(%url, %ds, "querying gold table");

        let mut bindings = HashMap::new();
        bindings.insert(
            "1",
            Binding {
                kind: "TEXT",
                value: ds,
            },
        );
        let request = StatementRequest {
            statement: GOLD_QUERY,
            timeout: self.timeout.as_secs().max(1),
            database: &config.database,
            schema: &config.schema,
            warehouse: &config.warehouse,
            role: config.role.as_deref(),
            bindings,
        };
        let mut result: ResultSet = read_json(
            &url,
            self.authorized(self.client.post(&url), config)
                .timeout(deadline.remaining()?)
                .json(&request)
                .send(),
        )?;

        let partitions = match &result.result_set_meta_data {
            Some(metadata) => metadata.partition_info.len(),
            None => {
                return Err(SourceError::Pending(
                    result.statement_handle.unwrap_or_default(),
                ))
            }
        };
        if partitions > 1 {
            let handle = result
                .statement_handle
                .clone()
                .ok_or_else(|| SourceError::Schema("partitioned result without a handle".into()))?;
            for partition in 1..partitions {
                let partition_url = format!("{}/{}?partition={}", url, handle, partition);
                let next: Partition = read_json(
                    &partition_url,
                    self.authorized(self.client.get(&partition_url), config)
                        .timeout(deadline.remaining()?)
                        .send(),
                )?;
                result.data.extend(next.data);
            }
        }

        let records = parse_result_set(result)?;
        Ok(derivation::enrich(&StationTable::from_records(records)))
    }

    fn authorized(
        &self,
        request: reqwest::blocking::RequestBuilder,
        config: &WarehouseConfig,
    ) -> reqwest::blocking::RequestBuilder {
        request
            .bearer_auth(&config.token)
            .header("X-Snowflake-Authorization-Token-Type", &config.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

impl StationSource for WarehouseSource {
    fn name(&self) -> &str {
        "warehouse"
    }

    fn fetch(&self, now: DateTime<Utc>) -> SourceResult {
        SourceResult::from_attempt(self.name(), self.try_fetch(now))
    }
}

/// The SQL API endpoint, on the account's default host unless a base url is configured
pub fn statements_url(config: &WarehouseConfig) -> String {
    match &config.base_url {
        Some(base_url) => format!("{}/api/v2/statements", base_url.trim_end_matches('/')),
        None => format!(
            "https://{}.snowflakecomputing.com/api/v2/statements",
            config.account
        ),
    }
}

/// The `ds` partition holding `now`, as a date in the city's time zone
pub fn partition_date(now: DateTime<Utc>, timezone: Tz) -> String {
    now.with_timezone(&timezone)
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

/// Maps result rows to records by column name. A missing column fails the whole result, a row
/// with missing or negative counts or without a readable `last_reported` is dropped.
pub fn parse_result_set(result: ResultSet) -> Result<Vec<StationRecord>, SourceError> {
    let metadata = result
        .result_set_meta_data
        .ok_or_else(|| SourceError::Schema("no result set metadata".into()))?;
    let positions: HashMap<String, usize> = metadata
        .row_type
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name.to_ascii_uppercase(), idx))
        .collect();
    let mut columns = [0usize; GOLD_COLUMNS.len()];
    for (slot, name) in columns.iter_mut().zip(GOLD_COLUMNS.iter()) {
        *slot = *positions
            .get(*name)
            .ok_or_else(|| SourceError::Schema(format!("missing column {}", name)))?;
    }

    let mut records = Vec::with_capacity(result.data.len());
    for row in &result.data {
        match parse_row(row, &columns) {
            Some(record) => records.push(record),
            None => tracing::warn!(row = ?row, "dropping malformed warehouse row"),
        }
    }
    Ok(records)
}

fn parse_row(row: &[Option<String>], columns: &[usize; GOLD_COLUMNS.len()]) -> Option<StationRecord> {
    let [id, name, lat, lon, capacity, bikes, docks, _, _, _, _, last_reported] = *columns;
    let cell = |idx: usize| row.get(idx).and_then(|v| v.as_deref()).map(str::trim);
    let station_id = cell(id).filter(|id| !id.is_empty())?;
    Some(StationRecord::from_counts(
        StationId::new(station_id),
        cell(name).unwrap_or_default().to_owned(),
        (cell(lat)?.parse().ok()?, cell(lon)?.parse().ok()?),
        parse_count(cell(capacity)?)?,
        (parse_count(cell(bikes)?)?, parse_count(cell(docks)?)?),
        parse_timestamp(cell(last_reported)?)?,
    ))
}

/// Snowflake returns numbers as text, `NUMBER` columns may carry a fractional part of zero
fn parse_count(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u32>() {
        return Some(count);
    }
    let float: f64 = value.parse().ok()?;
    if float.fract() == 0. && float >= 0. && float <= u32::MAX as f64 {
        Some(float as u32)
    } else {
        None
    }
}

/// Accepts the SQL API's epoch seconds form (`1714564800.000000000`, optionally followed by a
/// time zone offset in minutes), RFC 3339, or a bare `YYYY-MM-DD HH:MM:SS` taken as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let epoch = value.split_whitespace().next()?;
    if let Ok(seconds) = epoch.parse::<f64>() {
        let whole = seconds.trunc() as i64;
        let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
        return Utc.timestamp_opt(whole, nanos.min(999_999_999)).single();
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}
