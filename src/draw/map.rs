use std::fmt::{self, Write};

use geo::{BoundingRect, MultiPoint, Point};
use station_metrics::tooltip::TooltipTemplate;
use station_metrics::MapMarker;

use crate::write_markup;

/// The map is drawn in a square of this many pixels
pub const MAP_SIZE: f64 = 1024.;
const PADDING: f64 = 24.;
/// Marker radii are meters on the ground, but never drawn smaller or larger than this
pub const MARKER_MIN_PIXELS: f64 = 3.;
pub const MARKER_MAX_PIXELS: f64 = 8.;
const METERS_PER_DEGREE: f64 = 111_320.;
/// Smallest area shown, so a single station doesn't fill the whole map
const MIN_SPAN_METERS: f64 = 2_000.;

/// Equirectangular projection of an area around a center point into the map square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    center: Point<f64>,
    /// pixels per meter
    scale: f64,
}

impl MapView {
    /// Fits the view to the markers' bounding box, or centers on `default_center` (lat, lon)
    /// when there are no markers.
    pub fn fit(markers: &[MapMarker], default_center: (f64, f64)) -> MapView {
        let points: MultiPoint<f64> = markers.iter().map(|m| Point::new(m.lon, m.lat)).collect();
        let (center, span) = match points.bounding_rect() {
            Some(rect) => {
                let center = Point::from(rect.center());
                let cos_lat = center.y().to_radians().cos();
                let span = (rect.width() * cos_lat).max(rect.height()) * METERS_PER_DEGREE;
                (center, span)
            }
            None => (Point::new(default_center.1, default_center.0), 0.),
        };
        MapView {
            center,
            scale: (MAP_SIZE - 2. * PADDING) / span.max(MIN_SPAN_METERS),
        }
    }

    /// Pixel coordinates with y growing downwards
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let cos_lat = self.center.y().to_radians().cos();
        let x = (lon - self.center.x()) * cos_lat * METERS_PER_DEGREE;
        let y = (lat - self.center.y()) * METERS_PER_DEGREE;
        (MAP_SIZE / 2. + x * self.scale, MAP_SIZE / 2. - y * self.scale)
    }

    pub fn marker_pixels(&self, radius_meters: u32) -> f64 {
        (radius_meters as f64 * self.scale)
            .max(MARKER_MIN_PIXELS)
            .min(MARKER_MAX_PIXELS)
    }

    pub fn write_svg_to(
        &self,
        w: &mut dyn fmt::Write,
        markers: &[MapMarker],
        tooltip: &TooltipTemplate,
    ) -> fmt::Result {
        write_markup!(w,
            <svg xmlns="http://www.w3.org/2000/svg" viewBox={format!("0 0 {} {}", MAP_SIZE, MAP_SIZE)} class="map" role="img">
            <rect class="ground" width={MAP_SIZE} height={MAP_SIZE} />
            <g class="stations">
        )?;
        for marker in markers {
            let (cx, cy) = self.project(marker.lon, marker.lat);
            write_markup!(w,
                <circle cx={Px(cx)} cy={Px(cy)} r={Px(self.marker_pixels(marker.radius))}
                    fill={marker.color.hex()} fill-opacity={format!("{:.3}", marker.color.opacity())}>
                    <title>{tooltip.render(marker)}</title>
                </circle>
            )?;
        }
        write_markup!(w, </g></svg>)
    }
}

/// A pixel position, to one decimal place
struct Px(f64);

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}
