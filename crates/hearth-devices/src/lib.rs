//! Device management for the Hearth bridge.
//!
//! Home of the device registry (primary store plus five secondary
//! indices with exact, alias, and fuzzy resolution) and the platform
//! adapter contract the rest of the core talks through. A scripted
//! adapter for tests lives in [`testing`].

pub mod adapter;
pub mod registry;
pub mod testing;

pub use adapter::{
    with_deadline, CommandReceipt, CommandRequest, DeviceState, DynAdapter, EventRequest,
    Location, PlatformAdapter, Room, Scene, SemanticIndex,
};
pub use registry::{
    DeviceFilter, DeviceRegistry, IndexHealth, MatchType, RegistryStats, Resolution,
};
pub use testing::SimulatedAdapter;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
