//! Per-device diagnostic workflow.
//!
//! A linear state machine: resolve the device, determine the window,
//! fetch events, run the detectors, correlate with recorded commands,
//! assemble the report. An adapter failure mid-run does not abort:
//! the run transitions to a degraded terminal state and still emits a
//! report carrying whatever evidence was gathered, plus an explicit
//! limitation entry naming what is missing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::config::RETENTION_DAYS_MAX;
use hearth_core::error::Result;
use hearth_commands::CommandTracker;
use hearth_devices::adapter::SemanticIndex;
use hearth_devices::registry::DeviceRegistry;
use hearth_events::query::{EventQuery, EventQueryEngine};

use crate::catalog::{Recommendation, RecommendationCatalog};
use crate::detectors::{DetectorChain, DetectorInput};
use crate::report::{DiagnosticReport, ReportState};

/// Commands slightly older than the window can still explain its
/// first transitions.
const COMMAND_SLACK_SECS: i64 = 30;

/// Phases of one report run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolving,
    Fetching,
    Detecting,
    Assembling,
}

/// Parameters for one diagnostic run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRequest {
    /// Free-form device query: id, name, alias, or a near miss.
    pub query: String,
    /// Window start; defaults to 24 hours before `now`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Window end; defaults to `now`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl DiagnosticRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            start: None,
            end: None,
        }
    }

    pub fn since(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn until(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }
}

/// Orchestrates registry, event engine, detectors, and the command
/// tracker into one report.
pub struct DiagnosticWorkflow {
    registry: Arc<DeviceRegistry>,
    engine: EventQueryEngine,
    tracker: Arc<CommandTracker>,
    catalog: RecommendationCatalog,
    chain: DetectorChain,
    semantic: Option<Arc<dyn SemanticIndex>>,
}

impl DiagnosticWorkflow {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        engine: EventQueryEngine,
        tracker: Arc<CommandTracker>,
        catalog: RecommendationCatalog,
    ) -> Self {
        Self {
            registry,
            engine,
            tracker,
            catalog,
            chain: DetectorChain::standard(),
            semantic: None,
        }
    }

    /// Wire in the optional semantic search collaborator. Resolution
    /// falls back to it only after exact and fuzzy matching miss.
    pub fn with_semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Produce a report for one device. `now` anchors relative window
    /// bounds and the report timestamp.
    pub async fn diagnose(
        &self,
        request: &DiagnosticRequest,
        now: DateTime<Utc>,
    ) -> Result<DiagnosticReport> {
        let mut phase = Phase::Resolving;
        tracing::debug!(query = %request.query, ?phase, "diagnostic run started");

        let device = self.resolve_device(&request.query).await?;

        phase = Phase::Fetching;
        tracing::debug!(device_id = %device.id, ?phase, "resolved, fetching events");
        let mut query = EventQuery::new(device.id.clone());
        query.start = request.start.clone();
        query.end = request.end.clone();
        query.human_readable = false;

        let mut limitations = vec![
            "automation internals of the connected platform are not inspectable; \
             trigger attribution is inferred from event timing"
                .to_string(),
            format!("event history is limited to the last {RETENTION_DAYS_MAX} days"),
        ];
        if device.manufacturer.is_none() {
            limitations.push("manufacturer metadata is unavailable for this device".to_string());
        }

        let fetched = match self.engine.device_events(&query, now).await {
            Ok(result) => result,
            Err(error) if error.is_adapter() => {
                tracing::warn!(device_id = %device.id, %error, "event fetch failed, emitting degraded report");
                limitations.push(format!(
                    "event history could not be retrieved: {error}; findings below are \
                     limited to what was already known"
                ));
                return Ok(DiagnosticReport {
                    generated_at: now,
                    device_id: device.id.clone(),
                    device_name: device.display_name().to_string(),
                    state: ReportState::DegradedDone,
                    range: None,
                    findings: Vec::new(),
                    recommendations: Vec::new(),
                    limitations,
                });
            }
            Err(error) => return Err(error),
        };
        if fetched.range.exceeds_retention {
            limitations.push(
                "the requested window predates the retention limit and was clamped".to_string(),
            );
        }

        phase = Phase::Detecting;
        tracing::debug!(device_id = %device.id, ?phase, events = fetched.events.len(), "running detectors");
        // The engine returned newest-first; detectors want ascending.
        let mut events = fetched.events.clone();
        events.sort_by_key(|event| event.time);
        let commands = self
            .tracker
            .commands_for_device(
                &device.id,
                fetched.range.start - Duration::seconds(COMMAND_SLACK_SECS),
                fetched.range.end,
            )
            .await;
        let findings = self.chain.run(&DetectorInput {
            device: &device,
            events: &events,
            gaps: &fetched.gaps,
            commands: &commands,
        });

        phase = Phase::Assembling;
        tracing::debug!(device_id = %device.id, ?phase, findings = findings.len(), "assembling report");
        let recommendations: Vec<Recommendation> = findings
            .iter()
            .flat_map(|finding| self.catalog.recommend(finding, &device))
            .collect();

        Ok(DiagnosticReport {
            generated_at: now,
            device_id: device.id.clone(),
            device_name: device.display_name().to_string(),
            state: ReportState::Done,
            range: Some(fetched.range),
            findings,
            recommendations,
            limitations,
        })
    }

    async fn resolve_device(&self, query: &str) -> Result<hearth_core::device::Device> {
        if let Some(resolution) = self.registry.resolve(query).await {
            return Ok(resolution.device);
        }
        if let Some(semantic) = &self.semantic {
            match semantic.search(query, 1, 0.5).await {
                Ok(hits) => {
                    for (device_id, score) in hits {
                        if let Some(device) = self.registry.get(&device_id).await {
                            tracing::debug!(%device_id, score, "resolved via semantic index");
                            return Ok(device);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "semantic index unavailable, falling back to registry");
                }
            }
        }
        // Surfaces DeviceNotFound with near matches.
        Ok(self.registry.resolve_required(query).await?.device)
    }
}
