//! Domain models - core position types, distance and errors
//!
//! This module contains the canonical data types used throughout the system:
//! - `Coordinate` / `PositionSample` - what a location provider reports
//! - `geo` - haversine great-circle distance
//! - `TrackerEvent` - observable output of the proximity tracker
//! - `LocationError` - typed failures of the location engine

pub mod error;
pub mod geo;
pub mod types;

// Re-export commonly used types at module level
pub use error::{LocationError, LocationResult};
pub use geo::{distance_km, haversine_km, EARTH_RADIUS_KM};
pub use types::{Coordinate, PositionOptions, PositionSample, TrackerEvent, TrackerState};
