//! Event-history querying for the Hearth bridge.
//!
//! Time-range parsing with the platform retention clamp, the query
//! engine over the adapter, connectivity-gap detection, and
//! human-readable event rendering.

pub mod format;
pub mod gaps;
pub mod query;
pub mod timerange;

pub use format::{humanize_event, split_camel_case};
pub use gaps::{detect_gaps, format_duration_ms, largest_gap_ms, EventGap, GapSeverity};
pub use query::{DeviceEventResult, EventQuery, EventQueryEngine, EventQueryMetadata};
pub use timerange::{parse_bound, resolve_range, ResolvedRange};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
