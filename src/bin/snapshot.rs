use std::io::{self, Write};
use std::process;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use station_metrics::CapacityFilter;

use station_radar::table::write_csv;
use station_radar::{init_logging, Config, Dashboard, StationLoader};

/// Runs one load cycle and prints what the dashboard would show
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Only stations with at least this many docks, clamped to 0..=60
    #[arg(long, default_value_t = CapacityFilter::DEFAULT)]
    min_capacity: u32,
    #[arg(long, value_enum, default_value_t = Format::Summary)]
    format: Format,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Metrics and where the data came from
    Summary,
    /// The raw data table
    Csv,
    /// Map markers and summary
    Json,
}

fn main() {
    init_logging();
    let args = Args::parse();
    let config = match Config::from_default_sources() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            process::exit(1);
        }
    };
    let mut loader = match StationLoader::from_config(&config) {
        Ok(loader) => loader,
        Err(err) => {
            tracing::error!(%err, "failed to create http clients");
            process::exit(1);
        }
    };
    let loaded = match loader.load(Utc::now()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let dashboard = Dashboard::new(
        &loaded,
        CapacityFilter::new(args.min_capacity),
        false,
        config.map_center,
    );
    let stdout = io::stdout();
    let result = match args.format {
        Format::Summary => write_summary(stdout.lock(), &dashboard),
        Format::Csv => write_csv(stdout.lock(), &dashboard.shown).map_err(io::Error::from),
        Format::Json => serde_json::to_writer_pretty(stdout.lock(), &dashboard.json())
            .map_err(io::Error::from),
    };
    if let Err(err) = result {
        tracing::error!(%err, "failed to write snapshot");
        process::exit(1);
    }
}

fn write_summary(mut w: impl Write, dashboard: &Dashboard) -> io::Result<()> {
    if dashboard.is_degraded() {
        writeln!(w, "Using backup data from GBFS API (warehouse data unavailable)")?;
    }
    let summary = &dashboard.summary;
    writeln!(
        w,
        "Showing {} stations with capacity >= {}",
        summary.stations_shown,
        dashboard.filter.min_capacity()
    )?;
    writeln!(w, "Empty Stations: {}", summary.empty_stations)?;
    writeln!(w, "Full Stations: {}", summary.full_stations)?;
    writeln!(
        w,
        "Stations with Out-of-Service Bikes: {}",
        summary.stations_with_out_of_service_bikes
    )?;
    if let Some(last_updated) = summary.last_updated_label() {
        writeln!(w, "Last Updated: {}", last_updated)?;
    }
    Ok(())
}
