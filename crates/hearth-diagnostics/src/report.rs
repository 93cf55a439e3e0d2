//! Diagnostic report shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::ids::DeviceId;
use hearth_events::timerange::ResolvedRange;

use crate::catalog::Recommendation;
use crate::pattern::Pattern;

/// Terminal state of a report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    /// Every phase completed.
    Done,
    /// An adapter failure cut the run short; the report carries the
    /// partial findings and says what is missing.
    DegradedDone,
}

/// Evidence-based findings and recommendations for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub device_id: DeviceId,
    pub device_name: String,
    pub state: ReportState,
    /// The analyzed window; absent when fetching failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ResolvedRange>,
    /// Ranked findings, strongest first.
    pub findings: Vec<Pattern>,
    /// Each recommendation cites at least one finding id.
    pub recommendations: Vec<Recommendation>,
    /// Known platform limitations that applied to this run. Never
    /// empty: retention and automation opacity always apply.
    pub limitations: Vec<String>,
}
