//! Shared types for the car finder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A point on the Earth's surface in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite, latitude within ±90 and longitude within ±180
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A single position fix as reported by a location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in metres, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self { coordinate, timestamp, accuracy_m: None }
    }

    /// Sample stamped with the current wall clock
    pub fn now(coordinate: Coordinate) -> Self {
        Self::new(coordinate, Utc::now())
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Options passed to the provider on every one-shot query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the provider may return (zero = fresh fix only)
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: false,
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Proximity tracker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No reference position
    Idle,
    /// Reference position set, not tracking
    Armed,
    /// Poll active
    Tracking,
    /// Within arrival threshold; reference kept until reset
    Arrived,
}

impl TrackerState {
    pub fn as_str(&self) -> &str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Armed => "armed",
            TrackerState::Tracking => "tracking",
            TrackerState::Arrived => "arrived",
        }
    }
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events published to presentation-layer subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    PositionUpdated { coordinate: Coordinate, distance_km: f64 },
    Arrived,
    LocationError { message: String },
}

impl TrackerEvent {
    pub fn as_str(&self) -> &str {
        match self {
            TrackerEvent::PositionUpdated { .. } => "position_updated",
            TrackerEvent::Arrived => "arrived",
            TrackerEvent::LocationError { .. } => "location_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_position_options() {
        let options = PositionOptions::default();
        assert!(!options.enable_high_accuracy);
        assert_eq!(options.timeout, Duration::from_millis(5000));
        assert_eq!(options.maximum_age, Duration::ZERO);
    }

    #[test]
    fn test_sample_serde_skips_missing_accuracy() {
        let sample = PositionSample::now(Coordinate::new(48.8566, 2.3522));
        let json = serde_json::to_string(&sample).unwrap();
        assert!(!json.contains("accuracy_m"));

        let back: PositionSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(45.07, 7.686).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
        assert!(!Coordinate::new(200.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
    }

    #[test]
    fn test_sample_with_accuracy() {
        let sample = PositionSample::now(Coordinate::new(0.0, 0.0)).with_accuracy(12.5);
        assert_eq!(sample.accuracy_m, Some(12.5));
    }
}
