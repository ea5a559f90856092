//! Location provider interface
//!
//! The device location capability sits behind [`LocationProvider`] so the
//! position source can be driven by gpsd, a recorded route, or a test double.

use crate::domain::types::{PositionOptions, PositionSample};
use async_trait::async_trait;
use thiserror::Error;

/// Error reported by the underlying device
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// One-shot position query against a device
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolve the current position. The caller enforces `options.timeout`;
    /// implementations may use it to bound their own I/O as well.
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<PositionSample, ProviderError>;
}
