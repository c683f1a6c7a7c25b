//! The public GBFS feed, used when the warehouse can't be reached.
//!
//! Only two of the feed's files are needed: `station_information` for where stations are and
//! how big they are, and `station_status` for what is docked right now.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use station_metrics::{derivation, StationId, StationRecord, StationTable};

use crate::source::{read_json, Deadline, SourceError, SourceResult, StationSource};

pub const STATION_INFORMATION: &str = "station_information.json";
pub const STATION_STATUS: &str = "station_status.json";

#[derive(Debug, Deserialize)]
pub struct Feed<T> {
    pub data: FeedData<T>,
}

#[derive(Debug, Deserialize)]
pub struct FeedData<T> {
    pub stations: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct StationInformation {
    pub station_id: StationId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Optional in GBFS, stations without it can't be shown
    #[serde(default)]
    pub capacity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StationStatus {
    pub station_id: StationId,
    #[serde(default)]
    pub num_bikes_available: Option<i64>,
    #[serde(default)]
    pub num_docks_available: Option<i64>,
}

pub struct GbfsSource {
    client: Client,
    base_url: String,
    /// Budget for fetching both files
    timeout: Duration,
}

impl GbfsSource {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<GbfsSource> {
        Ok(GbfsSource {
            client: Client::builder().connect_timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    fn get<T: DeserializeOwned>(&self, file: &str, deadline: &Deadline) -> Result<Vec<T>, SourceError> {
        let url = format!("{}/{}", self.base_url, file);
        tracing::debug!(%url, "fetching gbfs file");
        let feed = read_json(&url, self.client.get(&url).timeout(deadline.remaining()?).send())?;
        Ok(decode_stations(file, feed))
    }

    fn try_fetch(&self, now: DateTime<Utc>) -> Result<StationTable, SourceError> {
        let deadline = Deadline::after(self.timeout);
        let information = self.get(STATION_INFORMATION, &deadline)?;
        let status = self.get(STATION_STATUS, &deadline)?;
        Ok(join(information, status, now))
    }
}

impl StationSource for GbfsSource {
    fn name(&self) -> &str {
        "gbfs"
    }

    fn fetch(&self, now: DateTime<Utc>) -> SourceResult {
        SourceResult::from_attempt(self.name(), self.try_fetch(now))
    }
}

/// Decodes each station entry on its own, so a malformed entry only loses that station
pub fn decode_stations<T: DeserializeOwned>(file: &str, feed: Feed<serde_json::Value>) -> Vec<T> {
    feed.data
        .stations
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(station) => Some(station),
            Err(err) => {
                tracing::warn!(file, %err, "dropping malformed feed entry");
                None
            }
        })
        .collect()
}

/// Inner join of the two feed files on `station_id`, in `station_information` order. Every
/// record is stamped with `now` as the feed's own timestamps are per file, not per station.
pub fn join(
    information: Vec<StationInformation>,
    status: Vec<StationStatus>,
    now: DateTime<Utc>,
) -> StationTable {
    let mut status_by_id: HashMap<StationId, StationStatus> = HashMap::with_capacity(status.len());
    for station in status {
        status_by_id.entry(station.station_id.clone()).or_insert(station);
    }
    let total = information.len();

    let records: Vec<StationRecord> = information
        .into_iter()
        .filter_map(|info| {
            let status = status_by_id.get(&info.station_id)?;
            let counts = (
                count(status.num_bikes_available),
                count(status.num_docks_available),
            );
            match (count(info.capacity), counts) {
                (Some(capacity), (Some(bikes), Some(docks))) => {
                    Some(derivation::derive(&StationRecord::from_counts(
                        info.station_id,
                        info.name,
                        (info.lat, info.lon),
                        capacity,
                        (bikes, docks),
                        now,
                    )))
                }
                _ => {
                    tracing::warn!(
                        station_id = %info.station_id,
                        capacity = ?info.capacity,
                        bikes = ?status.num_bikes_available,
                        docks = ?status.num_docks_available,
                        "dropping station with missing or negative counts"
                    );
                    None
                }
            }
        })
        .collect();

    let joined = records.len();
    let table = StationTable::from_records(records);
    if table.len() < total {
        tracing::debug!(
            stations = total,
            joined,
            kept = table.len(),
            "some stations were dropped from the feed"
        );
    }
    table
}

fn count(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::test::serve;
    use chrono::TimeZone;
    use std::net::SocketAddr;
    use warp::http::StatusCode;
    use warp::{Filter, Reply};

    const INFORMATION: &str = r#"{
        "last_updated": 1714564800,
        "ttl": 60,
        "data": {"stations": [
            {"station_id": "a3a36d9e", "name": "Clark St & Elm St", "lat": 41.902973, "lon": -87.63128, "capacity": 15, "rental_methods": ["KEY"]},
            {"station_id": 13022, "name": "Streeter Dr & Grand Ave", "lat": 41.892278, "lon": -87.612043, "capacity": 47},
            {"station_id": "no-status", "name": "Nowhere", "lat": 41.9, "lon": -87.6, "capacity": 11},
            {"station_id": "no-capacity", "name": "Pop-up", "lat": 41.9, "lon": -87.6},
            {"station_id": "negative", "name": "Broken sensor", "lat": 41.9, "lon": -87.6, "capacity": 20},
            {"station_id": "virtual", "name": "Valet zone", "lon": -87.6, "capacity": 30},
            {"station_id": "typo", "name": "Bad lat", "lat": "41.9", "lon": -87.6, "capacity": 30}
        ]}
    }"#;

    const STATUS: &str = r#"{
        "last_updated": 1714564805,
        "ttl": 60,
        "data": {"stations": [
            {"station_id": "13022", "num_bikes_available": 0, "num_docks_available": 47, "is_renting": 1},
            {"station_id": "a3a36d9e", "num_bikes_available": 10, "num_docks_available": 3},
            {"station_id": "no-capacity", "num_bikes_available": 1, "num_docks_available": 1},
            {"station_id": "negative", "num_bikes_available": -1, "num_docks_available": 4},
            {"station_id": "no-info", "num_bikes_available": 1, "num_docks_available": 1},
            {"station_id": "virtual", "num_bikes_available": 2, "num_docks_available": 28},
            {"station_id": "typo", "num_bikes_available": 2, "num_docks_available": 28},
            {"num_bikes_available": 2, "num_docks_available": 28}
        ]}
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn joined() -> StationTable {
        let information = decode_stations(STATION_INFORMATION, serde_json::from_str(INFORMATION).unwrap());
        let status = decode_stations(STATION_STATUS, serde_json::from_str(STATUS).unwrap());
        join(information, status, now())
    }

    #[test]
    fn inner_join_in_information_order() {
        let table = joined();
        let ids: Vec<_> = table.iter().map(|r| r.station_id.as_str()).collect();
        assert_eq!(ids, vec!["a3a36d9e", "13022"]);
    }

    #[test]
    fn malformed_entries_only_lose_themselves() {
        let information: Vec<StationInformation> =
            decode_stations(STATION_INFORMATION, serde_json::from_str(INFORMATION).unwrap());
        let ids: Vec<_> = information.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["a3a36d9e", "13022", "no-status", "no-capacity", "negative"]);

        let status: Vec<StationStatus> =
            decode_stations(STATION_STATUS, serde_json::from_str(STATUS).unwrap());
        assert_eq!(status.len(), 7);
    }

    #[test]
    fn joined_records_are_enriched_and_stamped() {
        let table = joined();
        let clark = table.get(&StationId::new("a3a36d9e")).unwrap();
        assert_eq!(clark.name, "Clark St & Elm St");
        assert_eq!(clark.capacity, 15);
        assert_eq!(clark.out_of_service_bikes, 2);
        assert!((clark.bike_utilization - 0.667).abs() < 1e-3);
        assert_eq!(clark.last_reported, now());

        let streeter = table.get(&StationId::new("13022")).unwrap();
        assert_eq!(streeter.num_bikes_available, 0);
        assert_eq!(streeter.dock_utilization, 1.);
    }

    #[test]
    fn duplicate_status_keeps_first() {
        let information = vec![StationInformation {
            station_id: StationId::new("1"),
            name: "One".into(),
            lat: 0.,
            lon: 0.,
            capacity: Some(10),
        }];
        let status = vec![
            StationStatus {
                station_id: StationId::new("1"),
                num_bikes_available: Some(4),
                num_docks_available: Some(6),
            },
            StationStatus {
                station_id: StationId::new("1"),
                num_bikes_available: Some(9),
                num_docks_available: Some(1),
            },
        ];
        let table = join(information, status, now());
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().num_bikes_available, 4);
    }

    fn serve_feed(status_code: u16, delay: Duration) -> SocketAddr {
        let file = move |body: &'static str, code: u16| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, warp::Rejection>(
                warp::reply::with_status(body, StatusCode::from_u16(code).unwrap()).into_response(),
            )
        };
        serve(
            warp::path!("gbfs" / "en" / "station_information.json")
                .and_then(move || file(INFORMATION, 200))
                .or(warp::path!("gbfs" / "en" / "station_status.json")
                    .and_then(move || file(STATUS, status_code)))
                .unify()
                .boxed(),
        )
    }

    fn source(base_url: &str, timeout: Duration) -> GbfsSource {
        GbfsSource::new(base_url, timeout).unwrap()
    }

    fn diagnostic(result: SourceResult) -> String {
        match result {
            SourceResult::Empty { diagnostic } => diagnostic,
            SourceResult::Loaded(table) => panic!("expected no stations, got {}", table.len()),
        }
    }

    #[test]
    fn fetches_and_joins_the_feed() {
        let addr = serve_feed(200, Duration::ZERO);
        let result = source(&format!("http://{}/gbfs/en/", addr), Duration::from_secs(5)).fetch(now());
        match result {
            SourceResult::Loaded(table) => {
                let ids: Vec<_> = table.iter().map(|r| r.station_id.as_str()).collect();
                assert_eq!(ids, vec!["a3a36d9e", "13022"]);
            }
            other => panic!("expected stations, got {:?}", other),
        }
    }

    #[test]
    fn error_status_is_empty() {
        let addr = serve_feed(503, Duration::ZERO);
        let result = source(&format!("http://{}/gbfs/en", addr), Duration::from_secs(5)).fetch(now());
        let expected = format!(
            "gbfs: http://{}/gbfs/en/station_status.json responded with 503 Service Unavailable: ",
            addr
        );
        assert!(diagnostic(result).starts_with(&expected));
    }

    #[test]
    fn unreachable_feed_is_empty() {
        let result = source("http://127.0.0.1:1/gbfs/en", Duration::from_secs(1)).fetch(now());
        assert!(diagnostic(result)
            .starts_with("gbfs: request to http://127.0.0.1:1/gbfs/en/station_information.json failed"));
    }

    #[test]
    fn timeout_covers_both_files() {
        // each file alone fits in the budget, the two together don't
        let addr = serve_feed(200, Duration::from_millis(400));
        let result = source(&format!("http://{}/gbfs/en", addr), Duration::from_millis(600)).fetch(now());
        let diagnostic = diagnostic(result);
        assert!(
            diagnostic.contains("station_status.json") || diagnostic.starts_with("gbfs: gave up after"),
            "{}",
            diagnostic
        );
    }

    #[test]
    fn base_url_slash_is_optional() {
        let source = GbfsSource::new("https://example.com/gbfs/en/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.base_url, "https://example.com/gbfs/en");
        assert_eq!(source.name(), "gbfs");
    }
}
