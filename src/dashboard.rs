//! Everything the dashboard shows for one request, worked out from a load.

use serde::Serialize;
use station_metrics::encoding::markers;
use station_metrics::{CapacityFilter, MapMarker, StationTable, Summary};

use crate::draw::map::MapView;
use crate::loader::{DataOrigin, Loaded};

pub struct Dashboard {
    pub origin: DataOrigin,
    pub filter: CapacityFilter,
    pub show_raw_table: bool,
    /// Loaded stations with at least the filter's capacity
    pub shown: StationTable,
    pub markers: Vec<MapMarker>,
    pub summary: Summary,
    pub view: MapView,
}

impl Dashboard {
    pub fn new(
        loaded: &Loaded,
        filter: CapacityFilter,
        show_raw_table: bool,
        map_center: (f64, f64),
    ) -> Dashboard {
        let shown = filter.apply(&loaded.table);
        let markers = markers(&shown);
        let summary = Summary::new(&loaded.table, &shown);
        let view = MapView::fit(&markers, map_center);
        Dashboard {
            origin: loaded.origin,
            filter,
            show_raw_table,
            shown,
            markers,
            summary,
            view,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.origin == DataOrigin::LiveFeed
    }

    pub fn json(&self) -> DashboardJson<'_> {
        DashboardJson {
            origin: self.origin,
            min_capacity: self.filter.min_capacity(),
            summary: &self.summary,
            stations: &self.markers,
        }
    }
}

/// The dashboard as served to map clients
#[derive(Serialize)]
pub struct DashboardJson<'d> {
    pub origin: DataOrigin,
    pub min_capacity: u32,
    pub summary: &'d Summary,
    pub stations: &'d [MapMarker],
}
