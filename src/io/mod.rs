//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `provider` - Location provider trait implemented by the device backends
//! - `gpsd` - gpsd JSON protocol client over TCP
//! - `replay` - Recorded route played back fix by fix
//! - `store` - Saved car position (JSON file)

pub mod gpsd;
pub mod provider;
pub mod replay;
pub mod store;

// Re-export commonly used types
pub use gpsd::GpsdProvider;
pub use provider::{LocationProvider, ProviderError};
pub use replay::ReplayProvider;
pub use store::ReferenceStore;
