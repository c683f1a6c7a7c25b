use std::fmt;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use station_radar::draw::page::{write_dashboard_to, write_error_page_to};
use station_radar::{Dashboard, StationSource};

use super::{with_data, with_status, App, DashboardOptions};

fn render_html(status: StatusCode, write: impl FnOnce(&mut String) -> fmt::Result) -> Response {
    let mut html = String::new();
    match write(&mut html) {
        Ok(()) => with_status(warp::reply::html(html), status),
        Err(err) => {
            tracing::error!(?err, "failed to render page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn dashboard_handler<P, B>(
    options: DashboardOptions,
    app: Arc<App<P, B>>,
) -> Result<Response, warp::Rejection>
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    let filter = options.filter();
    match app.clone().load().await {
        Ok(loaded) => {
            let dashboard = Dashboard::new(&loaded, filter, options.raw, app.map_center);
            tracing::info!(
                min_capacity = filter.min_capacity(),
                origin = ?dashboard.origin,
                shown = dashboard.summary.stations_shown,
                "dashboard"
            );
            Ok(render_html(StatusCode::OK, |html| {
                write_dashboard_to(html, &dashboard, &app.tooltip)
            }))
        }
        Err(failure) => Ok(render_html(failure.status(), |html| {
            write_error_page_to(html, &failure.message())
        })),
    }
}

pub fn dashboard_route<P, B>(
    app: Arc<App<P, B>>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone
where
    P: StationSource + Send + 'static,
    B: StationSource + Send + 'static,
{
    warp::path::end()
        .and(warp::get())
        .and(warp::query::<DashboardOptions>())
        .and(with_data(app))
        .and_then(dashboard_handler::<P, B>)
}
