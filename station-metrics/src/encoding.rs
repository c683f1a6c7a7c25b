use serde::{Serialize, Serializer};

use crate::station::{StationRecord, StationTable};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

pub const MARKER_ALPHA: u8 = 200;

/// Stations with neither working nor broken bikes docked
pub const NO_DATA_COLOR: Rgba = Rgba {
    r: 200,
    g: 200,
    b: 200,
    a: 200,
};

/// Half-open capacity ranges `[min, max)` and the marker radius in meters for each, `None` is
/// unbounded.
pub const RADIUS_BY_CAPACITY: [(u32, Option<u32>, u32); 7] = [
    (0, Some(10), 3),
    (10, Some(20), 8),
    (20, Some(30), 15),
    (30, Some(50), 20),
    (50, Some(75), 30),
    (75, Some(100), 40),
    (100, None, 50),
];

const DEFAULT_RADIUS: u32 = 3;

impl Rgba {
    /// `#rrggbb`, the alpha channel is written separately as an opacity
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f64 {
        self.a as f64 / 255.
    }
}

/// Serialised as `[r, g, b, a]`, the shape map layers take for a fill color
impl Serialize for Rgba {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq([self.r, self.g, self.b, self.a].iter())
    }
}

/// Grey scale from black (no bikes) to white (full of bikes), tinted red by the share of the
/// station taken up by out-of-service bikes.
pub fn station_color(record: &StationRecord) -> Rgba {
    if record.num_bikes_available as u64 + record.out_of_service_bikes as u64 == 0 {
        return NO_DATA_COLOR;
    }
    let base = channel(record.bike_utilization);
    let red_boost = channel(record.out_of_service_ratio);
    Rgba {
        r: (base as u16 + red_boost as u16).min(255) as u8,
        g: base,
        b: base,
        a: MARKER_ALPHA,
    }
}

fn channel(ratio: f64) -> u8 {
    (255. * ratio.max(0.).min(1.)).round() as u8
}

pub fn station_radius(capacity: u32) -> u32 {
    RADIUS_BY_CAPACITY
        .iter()
        .find(|(min, max, _)| capacity >= *min && max.map(|max| capacity < max).unwrap_or(true))
        .map(|&(_, _, radius)| radius)
        .unwrap_or(DEFAULT_RADIUS)
}

/// A station as handed to the map, with its color and size resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub lon: f64,
    pub lat: f64,
    pub color: Rgba,
    pub radius: u32,
    pub name: String,
    pub capacity: u32,
    pub num_bikes_available: u32,
    pub num_docks_available: u32,
    pub out_of_service_bikes: u32,
    pub bike_utilization: f64,
}

impl MapMarker {
    pub fn new(record: &StationRecord) -> MapMarker {
        MapMarker {
            lon: record.lon,
            lat: record.lat,
            color: station_color(record),
            radius: station_radius(record.capacity),
            name: record.name.clone(),
            capacity: record.capacity,
            num_bikes_available: record.num_bikes_available,
            num_docks_available: record.num_docks_available,
            out_of_service_bikes: record.out_of_service_bikes,
            bike_utilization: record.bike_utilization,
        }
    }
}

pub fn markers(table: &StationTable) -> Vec<MapMarker> {
    table.iter().map(MapMarker::new).collect()
}
