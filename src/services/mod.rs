//! Services - location engine and application logic
//!
//! This module contains the core business logic services:
//! - `position_source` - One-shot position queries and interval polling
//! - `tracker` - Proximity state machine and tracking session
//! - `car_finder` - Save / find / forget flow around the tracker

pub mod car_finder;
pub mod position_source;
pub mod tracker;

// Re-export commonly used types
pub use car_finder::CarFinder;
pub use position_source::{PolledSample, PositionSource};
pub use tracker::{ProximityTracker, TrackerCommand, TrackingSession};
