//! Shared model and utilities for the Hearth bridge core.
//!
//! This crate defines the foundational types used across the workspace:
//! device identifiers, the capability vocabulary, device and event
//! descriptors, the error taxonomy, configuration, and the string
//! matcher backing fuzzy device resolution.

pub mod capability;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod fuzzy;
pub mod ids;
pub mod logging;

pub use capability::Capability;
pub use config::BridgeConfig;
pub use device::{Device, DevicePatch};
pub use error::{Error, ErrorKind, Result};
pub use event::{DeviceEvent, EventValue};
pub use ids::{DeviceId, Platform};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::capability::Capability;
    pub use crate::config::BridgeConfig;
    pub use crate::device::{Device, DevicePatch};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::event::{DeviceEvent, EventValue};
    pub use crate::ids::{DeviceId, Platform};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
