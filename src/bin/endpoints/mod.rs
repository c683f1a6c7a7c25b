use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Deserialize;
use station_metrics::tooltip::TooltipTemplate;
use station_metrics::CapacityFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use station_radar::{LoadError, Loaded, StationLoader, StationSource};

mod dashboard_endpoint;
mod stations_endpoint;

pub use dashboard_endpoint::dashboard_route;
pub use stations_endpoint::{stations_csv_route, stations_json_route};

/// What every request needs: the loader and how to draw its result
pub struct App<P, B> {
    loader: Mutex<StationLoader<P, B>>,
    pub map_center: (f64, f64),
    pub tooltip: TooltipTemplate,
}

impl<P, B> App<P, B>
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    pub fn new(loader: StationLoader<P, B>, map_center: (f64, f64)) -> App<P, B> {
        App {
            loader: Mutex::new(loader),
            map_center,
            tooltip: TooltipTemplate::default(),
        }
    }

    /// Runs a load cycle on the blocking pool, one at a time
    pub async fn load(self: Arc<Self>) -> Result<Loaded, LoadFailure> {
        tokio::task::spawn_blocking(move || {
            let mut loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
            loader.load(Utc::now())
        })
        .await
        .map_err(|err| {
            tracing::error!(%err, "load cycle did not finish");
            LoadFailure::Aborted
        })?
        .map_err(LoadFailure::Exhausted)
    }
}

#[derive(Debug)]
pub enum LoadFailure {
    Exhausted(LoadError),
    Aborted,
}

impl LoadFailure {
    pub fn message(&self) -> String {
        match self {
            LoadFailure::Exhausted(err) => err.to_string(),
            LoadFailure::Aborted => "Loading station data failed. Please try again later.".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LoadFailure::Exhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            LoadFailure::Aborted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardOptions {
    pub min_capacity: Option<i64>,
    #[serde(default)]
    pub raw: bool,
}

impl DashboardOptions {
    pub fn filter(&self) -> CapacityFilter {
        match self.min_capacity {
            Some(min_capacity) => CapacityFilter::new(
                min_capacity.clamp(CapacityFilter::MIN as i64, CapacityFilter::MAX as i64) as u32,
            ),
            None => CapacityFilter::default(),
        }
    }
}

pub fn with_data<D: Sync + Send>(
    db: Arc<D>,
) -> impl Filter<Extract = (Arc<D>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || db.clone())
}

pub fn with_status(reply: impl Reply, status: StatusCode) -> Response {
    warp::reply::with_status(reply, status).into_response()
}

pub fn routes<P, B>(
    app: Arc<App<P, B>>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    dashboard_route(app.clone())
        .or(stations_json_route(app.clone()))
        .or(stations_csv_route(app))
}
