//! Location and tracking errors

use crate::domain::types::{Coordinate, TrackerState};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// Device denied the request, reported an error, or timed out
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("no reference position set")]
    NoReferencePosition,

    /// A single poll tick failed; recovered on the next tick
    #[error("poll tick failed: {0}")]
    PollTransientError(String),

    #[error("cannot {op} while {from}")]
    InvalidTransition { from: TrackerState, op: &'static str },

    /// Non-finite or out of range latitude/longitude
    #[error("invalid coordinate {0}")]
    InvalidCoordinate(Coordinate),
}

impl LocationError {
    /// Underlying device message, if any
    pub fn message(&self) -> String {
        match self {
            LocationError::LocationUnavailable(m) | LocationError::PollTransientError(m) => {
                m.clone()
            }
            other => other.to_string(),
        }
    }
}

pub type LocationResult<T> = Result<T, LocationError>;
