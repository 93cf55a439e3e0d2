//! Diagnostics for the Hearth bridge.
//!
//! The pattern detectors, the per-device diagnostic workflow, the
//! recommendation catalog, and the system-wide status aggregator.
//! Everything emitted here cites observed evidence: a finding without
//! an event or command reference does not leave this crate.

pub mod catalog;
pub mod detectors;
pub mod pattern;
pub mod report;
pub mod status;
pub mod workflow;

pub use catalog::{CatalogEntry, Recommendation, RecommendationCatalog};
pub use detectors::{
    AutomationConflictDetector, AutomationTriggerDetector, BatteryDeclineDetector,
    ConnectivityGapDetector, DetectorChain, DetectorInput, PatternDetector, RapidChangeDetector,
};
pub use pattern::{
    dedup_overlapping, rank, CommandRef, EventRef, Pattern, PatternType, Severity,
};
pub use report::{DiagnosticReport, ReportState};
pub use status::{
    BatteryLevel, BatteryReport, BranchResult, ConnectivityReport, PatternSet,
    PerformanceReport, StatusAggregator, StatusFormat, StatusOutput, StatusRequest,
    SystemStatusReport,
};
pub use workflow::{DiagnosticRequest, DiagnosticWorkflow};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
