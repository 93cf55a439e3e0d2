//! Device event history retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use hearth_core::capability::Capability;
use hearth_core::config::EVENT_LIMIT_MAX;
use hearth_devices::registry::DeviceRegistry;
use hearth_events::query::{EventQuery, EventQueryEngine};

use crate::error::{Result, ToolError};
use crate::tool::{
    boolean_property, integer_property, object_schema, string_array_property, string_property,
    Tool, ToolOutput,
};

/// Windowed, filtered event history for one device.
pub struct DeviceEventsTool {
    registry: Arc<DeviceRegistry>,
    engine: EventQueryEngine,
}

impl DeviceEventsTool {
    pub fn new(registry: Arc<DeviceRegistry>, engine: EventQueryEngine) -> Self {
        Self { registry, engine }
    }
}

#[async_trait]
impl Tool for DeviceEventsTool {
    fn name(&self) -> &str {
        "get_device_events"
    }

    fn description(&self) -> &str {
        "Retrieve recent events for a device; windows accept relative tokens (30m, 6h, 2d), \
         ISO-8601 instants, or epoch milliseconds, capped at 7 days of lookback"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "device": string_property("Device id, name, or alias"),
                "start": string_property("Window start; default 24h before now"),
                "end": string_property("Window end; default now"),
                "limit": integer_property("Events to return", 1, EVENT_LIMIT_MAX as i64),
                "oldest_first": boolean_property("Return oldest events first; default newest first"),
                "capabilities": string_array_property("Only events of these capabilities"),
                "attributes": string_array_property("Only events of these attributes"),
                "include_metadata": boolean_property("Include counts, filters, and gap metadata; default true"),
                "human_readable": boolean_property("Include rendered lines and a summary; default true"),
                "location_id": string_property("Platform location hint for the fetch"),
            }),
            vec!["device"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let query_str = args["device"].as_str().unwrap_or_default();
        let resolution = match self.registry.resolve_required(query_str).await {
            Ok(resolution) => resolution,
            Err(error) => return Ok(ToolOutput::failure("resolve device", &error)),
        };
        let device = resolution.device;

        let mut query = EventQuery::new(device.id.clone());
        query.start = args.get("start").and_then(Value::as_str).map(String::from);
        query.end = args.get("end").and_then(Value::as_str).map(String::from);
        query.limit = args.get("limit").and_then(Value::as_u64).map(|v| v as usize);
        query.oldest_first = args
            .get("oldest_first")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        query.location_id = args
            .get("location_id")
            .and_then(Value::as_str)
            .map(String::from);
        query.include_metadata = args
            .get("include_metadata")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        query.human_readable = args
            .get("human_readable")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        if let Some(raw) = args.get("capabilities").and_then(Value::as_array) {
            let mut capabilities = Vec::with_capacity(raw.len());
            for value in raw {
                let name = value.as_str().unwrap_or_default();
                let capability = Capability::parse(name).ok_or_else(|| {
                    ToolError::invalid("capabilities", format!("unknown capability '{name}'"))
                })?;
                capabilities.push(capability);
            }
            query.capabilities = Some(capabilities);
        }
        if let Some(raw) = args.get("attributes").and_then(Value::as_array) {
            query.attributes = Some(
                raw.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            );
        }

        let attempted = format!("fetch events for {}", device.display_name());
        match self.engine.device_events(&query, Utc::now()).await {
            Ok(result) => {
                let summary = result.summary.clone().unwrap_or_else(|| {
                    format!(
                        "{} event(s) for {}",
                        result.events.len(),
                        device.display_name()
                    )
                });
                Ok(ToolOutput::success(
                    summary,
                    serde_json::to_value(&result)?,
                ))
            }
            Err(error) => Ok(ToolOutput::failure(attempted, &error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use hearth_core::config::BridgeConfig;
    use hearth_core::device::Device;
    use hearth_core::event::DeviceEvent;
    use hearth_core::ids::{DeviceId, Platform};
    use hearth_devices::testing::SimulatedAdapter;

    fn id() -> DeviceId {
        DeviceId::new(Platform::Virtual, "sw").unwrap()
    }

    async fn tool_with_events(events: Vec<DeviceEvent>) -> DeviceEventsTool {
        let registry = Arc::new(DeviceRegistry::new());
        registry
            .add(
                Device::new(id(), "Desk Lamp")
                    .unwrap()
                    .with_capability(Capability::Switch),
            )
            .await
            .unwrap();
        let adapter = Arc::new(SimulatedAdapter::new().with_events(id(), events));
        DeviceEventsTool::new(
            registry,
            EventQueryEngine::new(adapter, &BridgeConfig::default()),
        )
    }

    fn recent_events(count: usize) -> Vec<DeviceEvent> {
        (0..count)
            .map(|i| {
                DeviceEvent::new(
                    id(),
                    Utc::now() - Duration::minutes(i as i64 + 1),
                    Capability::Switch,
                    "switch",
                    if i % 2 == 0 { "on" } else { "off" },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_events_retrieved_with_summary() {
        let tool = tool_with_events(recent_events(3)).await;
        let output = tool
            .execute(serde_json::json!({ "device": "Desk Lamp" }))
            .await
            .unwrap();
        assert!(output.success);
        assert!(!output.summary.is_empty());
        assert_eq!(output.data["events"].as_array().unwrap().len(), 3);
        assert!(output.data["metadata"]["total_count"].is_number());
    }

    #[tokio::test]
    async fn test_retention_clamp_flows_through() {
        let tool = tool_with_events(recent_events(1)).await;
        let start = (Utc::now() - Duration::days(30)).to_rfc3339();
        let output = tool
            .execute(serde_json::json!({ "device": "Desk Lamp", "start": start }))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.data["metadata"]["reached_retention_limit"], true);
        assert_eq!(output.data["range"]["exceeds_retention"], true);
    }

    #[tokio::test]
    async fn test_limit_bounds_validated() {
        let tool = tool_with_events(recent_events(1)).await;
        let result = tool
            .execute(serde_json::json!({ "device": "Desk Lamp", "limit": 9999 }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_capability_filter_rejected() {
        let tool = tool_with_events(recent_events(1)).await;
        let result = tool
            .execute(serde_json::json!({
                "device": "Desk Lamp",
                "capabilities": ["warpDrive"],
            }))
            .await;
        assert!(result.is_err());
    }
}
