use std::sync::Arc;

use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use station_radar::table::write_csv;
use station_radar::{Dashboard, StationSource};

use super::{with_data, with_status, App, DashboardOptions, LoadFailure};

#[derive(Serialize)]
struct FEError {
    error: String,
}

fn json_failure(failure: LoadFailure) -> Response {
    with_status(
        warp::reply::json(&FEError {
            error: failure.message(),
        }),
        failure.status(),
    )
}

async fn stations_json_handler<P, B>(
    options: DashboardOptions,
    app: Arc<App<P, B>>,
) -> Result<Response, warp::Rejection>
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    match app.clone().load().await {
        Ok(loaded) => {
            let dashboard = Dashboard::new(&loaded, options.filter(), false, app.map_center);
            Ok(warp::reply::json(&dashboard.json()).into_response())
        }
        Err(failure) => Ok(json_failure(failure)),
    }
}

async fn stations_csv_handler<P, B>(
    options: DashboardOptions,
    app: Arc<App<P, B>>,
) -> Result<Response, warp::Rejection>
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    let loaded = match app.load().await {
        Ok(loaded) => loaded,
        Err(failure) => return Ok(with_status(failure.message(), failure.status())),
    };
    let shown = options.filter().apply(&loaded.table);
    let mut body = Vec::new();
    match write_csv(&mut body, &shown) {
        Ok(()) => Ok(
            warp::reply::with_header(body, "content-type", "text/csv; charset=utf-8")
                .into_response(),
        ),
        Err(err) => {
            tracing::error!(%err, "failed to write csv");
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

pub fn stations_json_route<P, B>(
    app: Arc<App<P, B>>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    let cors = warp::cors().allow_any_origin();
    warp::path!("stations.json")
        .and(warp::get())
        .and(warp::query::<DashboardOptions>())
        .and(with_data(app))
        .and_then(stations_json_handler::<P, B>)
        .with(cors)
}

pub fn stations_csv_route<P, B>(
    app: Arc<App<P, B>>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    warp::path!("stations.csv")
        .and(warp::get())
        .and(warp::query::<DashboardOptions>())
        .and(with_data(app))
        .and_then(stations_csv_handler::<P, B>)
}

#[cfg(test)]
mod test {
    use super::super::test::{app, stations};
    use super::super::routes;
    use super::*;

    #[tokio::test]
    async fn json_markers_and_summary() {
        let app = app(None, Some(stations()));
        let response = warp::test::request()
            .path("/stations.json?min_capacity=15")
            .reply(&routes(app))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(json["origin"], "live_feed");
        assert_eq!(json["min_capacity"], 15);
        assert_eq!(json["summary"]["stations_shown"], 2);
        assert_eq!(json["summary"]["empty_stations"], 1);
        assert_eq!(json["summary"]["stations_with_out_of_service_bikes"], 1);
        let stations = json["stations"].as_array().unwrap();
        assert_eq!(stations[0]["name"], "Clark St & Elm St");
        assert_eq!(stations[0]["color"], serde_json::json!([204, 170, 170, 200]));
        assert_eq!(stations[0]["radius"], 8);
    }

    #[tokio::test]
    async fn json_when_exhausted() {
        let response = warp::test::request()
            .path("/stations.json")
            .reply(&routes(app(None, None)))
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("Unable to load station data"));
    }

    #[tokio::test]
    async fn csv_raw_table() {
        let response = warp::test::request()
            .path("/stations.csv?min_capacity=20")
            .reply(&routes(app(Some(stations()), None)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
        assert_eq!(
            std::str::from_utf8(response.body()).unwrap(),
            "name,capacity,num_bikes_available,num_docks_available,out_of_service_bikes,bike_utilization\n\
             Canal St,20,0,20,0,0.0\n"
        );
    }
}
