use std::fmt::{self, Write};

use station_metrics::encoding::{NO_DATA_COLOR, RADIUS_BY_CAPACITY};
use station_metrics::tooltip::TooltipTemplate;
use station_metrics::CapacityFilter;

use crate::dashboard::Dashboard;
use crate::table::raw_rows;
use crate::write_markup;

pub const TITLE: &str = "Divvy Station Demand Map – Chicago";
pub const DEGRADED_WARNING: &str =
    "⚠️ Using backup data from GBFS API (warehouse data unavailable)";

fn write_head(w: &mut dyn fmt::Write, title: &str) -> fmt::Result {
    writeln!(w, "<!DOCTYPE html>")?;
    write_markup!(w,
        <html lang="en"><head>
            <meta charset="utf-8" />
            <meta name="viewport" content="width=device-width, initial-scale=1" />
            <title>{title}</title>
            <style>!{include_str!("dashboard.css")}</style>
        </head>
    )
}

pub fn write_dashboard_to(
    w: &mut dyn fmt::Write,
    dashboard: &Dashboard,
    tooltip: &TooltipTemplate,
) -> fmt::Result {
    write_head(w, TITLE)?;
    let min_capacity = dashboard.filter.min_capacity();
    write_markup!(w,
        <body>
        <aside>
            <h2>"Filter Stations"</h2>
            <form method="get" action="/" onchange="this.submit()">
                <label for="min_capacity">"Minimum station capacity: "<b>{min_capacity}</b></label>
                <input type="range" id="min_capacity" name="min_capacity"
                    min={CapacityFilter::MIN} max={CapacityFilter::MAX} value={min_capacity} />
    )?;
    if dashboard.show_raw_table {
        write_markup!(w, <p><label><input type="checkbox" name="raw" value="true" checked />" Show raw data table"</label></p>)?;
    } else {
        write_markup!(w, <p><label><input type="checkbox" name="raw" value="true" />" Show raw data table"</label></p>)?;
    }
    write_markup!(w,
                <noscript><button type="submit">"Apply"</button></noscript>
            </form>
    )?;
    if let Some(last_updated) = dashboard.summary.last_updated_label() {
        write_markup!(w, <p><b>"Last Updated"</b>": "{last_updated}</p>)?;
    }
    write_markup!(w,
        </aside>
        <main>
            <h1>"🚲 "{TITLE}</h1>
    )?;
    if dashboard.is_degraded() {
        write_markup!(w, <div class="banner warning">{DEGRADED_WARNING}</div>)?;
    }
    write_markup!(w,
        <p>"Showing "<b>{dashboard.summary.stations_shown}</b>" stations with capacity ≥ "{min_capacity}</p>
    )?;

    dashboard
        .view
        .write_svg_to(w, &dashboard.markers, tooltip)?;
    write_legend(w)?;

    write_markup!(w,
        <div class="metrics">
            <div class="metric"><div>"Empty Stations"</div><div class="value">{dashboard.summary.empty_stations}</div></div>
            <div class="metric"><div>"Full Stations"</div><div class="value">{dashboard.summary.full_stations}</div></div>
            <div class="metric"><div>"Stations with Out-of-Service Bikes"</div><div class="value">{dashboard.summary.stations_with_out_of_service_bikes}</div></div>
        </div>
    )?;

    if dashboard.show_raw_table {
        write_raw_table(w, dashboard)?;
    }
    write_markup!(w, </main></body></html>)
}

fn write_legend(w: &mut dyn fmt::Write) -> fmt::Result {
    write_markup!(w,
        <h3>"🎨 Map Legend"</h3>
        <ul class="legend">
            <li><b>"Black to White Gradient"</b>": base color shows bike utilization (lighter = more bikes available)"</li>
            <li><b>"Red Tint"</b>": out-of-service bikes (more red = more broken bikes)"</li>
            <li><b>"Light Grey"</b>" ("{NO_DATA_COLOR.hex()}"): no bikes docked at all"</li>
            <li><b>"Dot Size"</b>": station capacity in groups"<ul>
    )?;
    for &(min, max, radius) in RADIUS_BY_CAPACITY.iter() {
        let docks = match max {
            Some(max) => format!("{}–{} docks", min, max - 1),
            None => format!("{}+ docks", min),
        };
        write_markup!(w, <li>{radius}" m: "{docks}</li>)?;
    }
    write_markup!(w,
            </ul></li>
            <li><b>"Example"</b>": a station with 10 bikes out of 15 docks is grey if all bikes work, grey with a slight red tint if some are broken, dark red if all are broken"</li>
        </ul>
    )
}

fn write_raw_table(w: &mut dyn fmt::Write, dashboard: &Dashboard) -> fmt::Result {
    write_markup!(w,
        <table class="raw"><thead><tr>
            <th>"Name"</th><th>"Capacity"</th><th>"Bikes Available"</th><th>"Docks Available"</th><th>"Out of Service"</th><th>"Utilization"</th>
        </tr></thead><tbody>
    )?;
    for row in raw_rows(&dashboard.shown) {
        write_markup!(w,
            <tr>
                <td>{row.name}</td><td>{row.capacity}</td><td>{row.num_bikes_available}</td>
                <td>{row.num_docks_available}</td><td>{row.out_of_service_bikes}</td>
                <td>{Percent(row.bike_utilization)}</td>
            </tr>
        )?;
    }
    write_markup!(w, </tbody></table>)
}

struct Percent(f64);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.)
    }
}

/// The page shown instead of the dashboard when there is no data at all
pub fn write_error_page_to(w: &mut dyn fmt::Write, message: &str) -> fmt::Result {
    write_head(w, TITLE)?;
    write_markup!(w,
        <body><main>
            <h1>"🚲 "{TITLE}</h1>
            <div class="banner error">{message}</div>
        </main></body></html>
    )
}
