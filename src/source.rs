use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use station_metrics::StationTable;
use thiserror::Error;

/// Something that can produce the current state of every station.
///
/// Sources never fail outright: any problem is reported as [`SourceResult::Empty`] with a
/// description of what went wrong, so the caller only has to decide whether to try elsewhere.
pub trait StationSource {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Loads an enriched table. `now` is the caller's clock.
    fn fetch(&self, now: DateTime<Utc>) -> SourceResult;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    Loaded(StationTable),
    Empty { diagnostic: String },
}

impl SourceResult {
    /// Logs and folds an adapter's internal result
    pub fn from_attempt(source: &str, attempt: Result<StationTable, SourceError>) -> SourceResult {
        match attempt {
            Ok(table) if table.is_empty() => {
                tracing::warn!(source, "source returned no stations");
                SourceResult::Empty {
                    diagnostic: format!("{} returned no stations", source),
                }
            }
            Ok(table) => {
                tracing::info!(source, stations = table.len(), "loaded station data");
                SourceResult::Loaded(table)
            }
            Err(error) => {
                tracing::error!(source, %error, "error loading station data");
                SourceResult::Empty {
                    diagnostic: format!("{}: {}", source, error),
                }
            }
        }
    }
}

/// Why an adapter came back empty handed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not configured")]
    NotConfigured,
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected result shape: {0}")]
    Schema(String),
    #[error("query still running after the timeout, handle {0}")]
    Pending(String),
    #[error("gave up after {0:?}")]
    TimedOut(Duration),
}

/// One time budget shared by every request an adapter makes for a single fetch
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    budget: Duration,
    at: Instant,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Deadline {
        Deadline {
            budget,
            at: Instant::now() + budget,
        }
    }

    /// Timeout for the next request
    pub(crate) fn remaining(&self) -> Result<Duration, SourceError> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left.is_zero() {
            Err(SourceError::TimedOut(self.budget))
        } else {
            Ok(left)
        }
    }
}

/// Checks the status of a sent request and decodes its JSON body
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    url: &str,
    response: reqwest::Result<reqwest::blocking::Response>,
) -> Result<T, SourceError> {
    const MAX_ERROR_BODY: usize = 200;
    let http_error = |source| SourceError::Http {
        url: url.to_owned(),
        source,
    };
    let response = response.map_err(http_error)?;
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().unwrap_or_default();
        if let Some((cut, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
            body.truncate(cut);
        }
        return Err(SourceError::Status {
            url: url.to_owned(),
            status,
            body,
        });
    }
    let bytes = response.bytes().map_err(http_error)?;
    serde_json::from_slice(&bytes).map_err(|source| SourceError::Decode {
        url: url.to_owned(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use chrono::TimeZone;
    use reqwest::blocking::Client;
    use station_metrics::{StationId, StationRecord};
    use std::net::SocketAddr;
    use warp::filters::BoxedFilter;
    use warp::http::StatusCode;
    use warp::reply::Response;
    use warp::{Filter, Reply};

    /// Serves `routes` on an ephemeral local port from its own runtime, so blocking clients can
    /// call it from a plain test
    pub(crate) fn serve(routes: BoxedFilter<(Response,)>) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
                tx.send(addr).unwrap();
                server.await;
            });
        });
        rx.recv().unwrap()
    }

    fn get(url: &str) -> Result<serde_json::Value, SourceError> {
        read_json(url, Client::new().get(url).send())
    }

    fn responses() -> SocketAddr {
        serve(
            warp::path("ok")
                .map(|| warp::reply::json(&serde_json::json!({"a": 1})).into_response())
                .or(warp::path("broken").map(|| {
                    warp::reply::with_status("x".repeat(500), StatusCode::INTERNAL_SERVER_ERROR)
                        .into_response()
                }))
                .unify()
                .or(warp::path("garbled").map(|| "not json".into_response()))
                .unify()
                .boxed(),
        )
    }

    #[test]
    fn json_response() {
        let addr = responses();
        assert_eq!(
            get(&format!("http://{}/ok", addr)).unwrap(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn error_status_body_is_truncated() {
        let addr = responses();
        let url = format!("http://{}/broken", addr);
        match get(&url) {
            Err(SourceError::Status {
                url: failed,
                status,
                body,
            }) => {
                assert_eq!(failed, url);
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "x".repeat(200));
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }

    #[test]
    fn undecodable_body() {
        let addr = responses();
        assert!(matches!(
            get(&format!("http://{}/garbled", addr)),
            Err(SourceError::Decode { .. })
        ));
    }

    #[test]
    fn unreachable_host() {
        assert!(matches!(
            get("http://127.0.0.1:1/station_status.json"),
            Err(SourceError::Http { .. })
        ));
    }

    #[test]
    fn deadline_runs_out() {
        let deadline = Deadline::after(Duration::from_millis(50));
        assert!(deadline.remaining().unwrap() <= Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(60));
        assert!(matches!(
            deadline.remaining(),
            Err(SourceError::TimedOut(budget)) if budget == Duration::from_millis(50)
        ));
    }

    #[test]
    fn empty_table_is_empty_result() {
        assert_eq!(
            SourceResult::from_attempt("gbfs", Ok(StationTable::default())),
            SourceResult::Empty {
                diagnostic: "gbfs returned no stations".into()
            }
        );
    }

    #[test]
    fn error_becomes_diagnostic() {
        assert_eq!(
            SourceResult::from_attempt("warehouse", Err(SourceError::NotConfigured)),
            SourceResult::Empty {
                diagnostic: "warehouse: not configured".into()
            }
        );
    }

    #[test]
    fn table_passes_through() {
        let table = StationTable::from_records(vec![StationRecord::from_counts(
            StationId::new("1"),
            "One".into(),
            (41.9, -87.6),
            10,
            (5, 5),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        )]);
        assert_eq!(
            SourceResult::from_attempt("gbfs", Ok(table.clone())),
            SourceResult::Loaded(table)
        );
    }
}
