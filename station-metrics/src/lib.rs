pub mod derivation;
pub mod encoding;
pub mod filter;
pub mod station;
pub mod tooltip;

pub use encoding::{MapMarker, Rgba};
pub use filter::{CapacityFilter, Summary};
pub use station::{StationId, StationRecord, StationTable};
