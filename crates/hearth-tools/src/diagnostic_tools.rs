//! Diagnostic report, system status, and failed-command tools.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use hearth_core::capability::Capability;
use hearth_commands::CommandTracker;
use hearth_devices::registry::DeviceRegistry;
use hearth_diagnostics::status::{StatusAggregator, StatusFormat, StatusRequest};
use hearth_diagnostics::workflow::{DiagnosticRequest, DiagnosticWorkflow};
use hearth_diagnostics::Severity;

use crate::error::{Result, ToolError};
use crate::tool::{
    boolean_property, enum_property, integer_property, object_schema, string_property, Tool,
    ToolOutput,
};

// ========== diagnose_device ==========

/// Evidence-based per-device diagnostic report.
pub struct DiagnoseDeviceTool {
    workflow: Arc<DiagnosticWorkflow>,
}

impl DiagnoseDeviceTool {
    pub fn new(workflow: Arc<DiagnosticWorkflow>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl Tool for DiagnoseDeviceTool {
    fn name(&self) -> &str {
        "diagnose_device"
    }

    fn description(&self) -> &str {
        "Analyze a device's recent events for automation triggers, rapid changes, connectivity \
         gaps, battery decline, and automation conflicts, with recommendations"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "device": string_property("Device id, name, or alias"),
                "start": string_property("Analysis window start; default 24h before now"),
                "end": string_property("Analysis window end; default now"),
            }),
            vec!["device"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let mut request =
            DiagnosticRequest::new(args["device"].as_str().unwrap_or_default());
        request.start = args.get("start").and_then(Value::as_str).map(String::from);
        request.end = args.get("end").and_then(Value::as_str).map(String::from);

        match self.workflow.diagnose(&request, Utc::now()).await {
            Ok(report) => {
                let summary = format!(
                    "{}: {} finding(s), {} recommendation(s){}",
                    report.device_name,
                    report.findings.len(),
                    report.recommendations.len(),
                    match report.state {
                        hearth_diagnostics::ReportState::Done => String::new(),
                        hearth_diagnostics::ReportState::DegradedDone =>
                            " (degraded: event history unavailable)".to_string(),
                    }
                );
                Ok(ToolOutput::success(summary, serde_json::to_value(&report)?))
            }
            Err(error) => Ok(ToolOutput::failure("diagnose device", &error)),
        }
    }
}

// ========== system_status ==========

fn severity_names() -> Vec<&'static str> {
    vec!["low", "medium", "high", "critical"]
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

/// System-wide health rollup over a deterministic device sample.
pub struct SystemStatusTool {
    aggregator: Arc<StatusAggregator>,
}

impl SystemStatusTool {
    pub fn new(aggregator: Arc<StatusAggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl Tool for SystemStatusTool {
    fn name(&self) -> &str {
        "system_status"
    }

    fn description(&self) -> &str {
        "Aggregate connectivity, battery, automation, anomaly, and index health across devices"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "scope": string_property("Room name, or 'all' for every device"),
                "capability": enum_property(
                    "Only devices with this capability",
                    &Capability::all().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                ),
                "min_severity": enum_property("Drop findings below this severity", &severity_names()),
                "include_patterns": boolean_property("Include individual findings; default true"),
                "format": enum_property("Output shape; default markdown", &["markdown", "structured"]),
            }),
            vec![],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let request = StatusRequest {
            scope: args.get("scope").and_then(Value::as_str).map(String::from),
            capability: match args.get("capability").and_then(Value::as_str) {
                Some(raw) => Some(Capability::parse(raw).ok_or_else(|| {
                    ToolError::invalid("capability", format!("unknown capability '{raw}'"))
                })?),
                None => None,
            },
            min_severity: match args.get("min_severity").and_then(Value::as_str) {
                Some(raw) => Some(parse_severity(raw).ok_or_else(|| {
                    ToolError::invalid("min_severity", format!("unknown severity '{raw}'"))
                })?),
                None => None,
            },
            include_patterns: args
                .get("include_patterns")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            format: match args.get("format").and_then(Value::as_str) {
                Some("structured") => StatusFormat::Structured,
                _ => StatusFormat::Markdown,
            },
        };

        match self.aggregator.run(&request, Utc::now()).await {
            Ok(output) => {
                let summary = match &output.markdown {
                    Some(markdown) => markdown.clone(),
                    None => format!(
                        "analyzed {} of {} device(s)",
                        output.report.performance.devices_sampled,
                        output.report.performance.devices_total
                    ),
                };
                Ok(ToolOutput::success(summary, serde_json::to_value(&output.report)?))
            }
            Err(error) => Ok(ToolOutput::failure("aggregate system status", &error)),
        }
    }
}

// ========== list_failed_commands ==========

/// Recent failed commands, optionally for one device.
pub struct FailedCommandsTool {
    tracker: Arc<CommandTracker>,
    registry: Arc<DeviceRegistry>,
}

impl FailedCommandsTool {
    pub fn new(tracker: Arc<CommandTracker>, registry: Arc<DeviceRegistry>) -> Self {
        Self { tracker, registry }
    }
}

#[async_trait]
impl Tool for FailedCommandsTool {
    fn name(&self) -> &str {
        "list_failed_commands"
    }

    fn description(&self) -> &str {
        "List recent failed device commands with classified failure kinds, newest first"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "limit": integer_property("Failures to return; default 10", 1, 100),
                "device": string_property("Only failures for this device"),
            }),
            vec![],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(10);

        let device_id = match args.get("device").and_then(Value::as_str) {
            Some(query) => match self.registry.resolve_required(query).await {
                Ok(resolution) => Some(resolution.device.id),
                Err(error) => return Ok(ToolOutput::failure("resolve device", &error)),
            },
            None => None,
        };

        let failures = self.tracker.failed_commands(limit, device_id.as_ref()).await;
        let stats = self.tracker.stats(None, Utc::now()).await;
        Ok(ToolOutput::success(
            format!(
                "{} failed command(s) shown; success rate over the last {}h is {:.0}%",
                failures.len(),
                stats.window_hours,
                stats.success_rate * 100.0
            ),
            serde_json::json!({ "failures": failures, "stats": stats }),
        ))
    }
}
