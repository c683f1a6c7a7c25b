use std::process;
use std::sync::Arc;

use station_radar::{init_logging, Config, StationLoader};

mod endpoints;

fn main() {
    init_logging();
    let config = match Config::from_default_sources() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            process::exit(1);
        }
    };
    if config.warehouse.is_none() {
        tracing::warn!("warehouse is not configured, the live feed will be used");
    }

    // the blocking http clients have to be created outside the async runtime
    let loader = match StationLoader::from_config(&config) {
        Ok(loader) => loader,
        Err(err) => {
            tracing::error!(%err, "failed to create http clients");
            process::exit(1);
        }
    };
    let app = Arc::new(endpoints::App::new(loader, config.map_center));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(%err, "failed to start runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async {
        tracing::info!(port = config.port, "Starting web server");
        warp::serve(endpoints::routes(app))
            .run(([127, 0, 0, 1], config.port))
            .await;
    });
}
