//! Device listing, status, command execution, and capability checks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use hearth_core::capability::Capability;
use hearth_core::config::BridgeConfig;
use hearth_core::error::Error as CoreError;
use hearth_core::ids::Platform;
use hearth_commands::{CommandAttempt, CommandOutcome, CommandSource, CommandTracker};
use hearth_devices::adapter::{with_deadline, CommandRequest, DynAdapter};
use hearth_devices::registry::{DeviceFilter, DeviceRegistry, Resolution};

use crate::error::{Result, ToolError};
use crate::tool::{
    boolean_property, enum_property, object_schema, string_property, Tool, ToolOutput,
};

fn capability_names() -> Vec<&'static str> {
    Capability::all().iter().map(|c| c.as_str()).collect()
}

fn platform_names() -> Vec<&'static str> {
    Platform::all().iter().map(|p| p.as_str()).collect()
}

fn parse_capability(args: &Value, field: &str) -> Result<Option<Capability>> {
    match args.get(field).and_then(Value::as_str) {
        Some(raw) => Capability::parse(raw)
            .map(Some)
            .ok_or_else(|| ToolError::invalid(field, format!("unknown capability '{raw}'"))),
        None => Ok(None),
    }
}

/// Resolve a device query, shaping misses into failure envelopes.
async fn resolve_or_fail(
    registry: &DeviceRegistry,
    query: &str,
    attempted: &str,
) -> std::result::Result<Resolution, Box<ToolOutput>> {
    match registry.resolve_required(query).await {
        Ok(resolution) => Ok(resolution),
        Err(error) => Err(Box::new(ToolOutput::failure(attempted, &error))),
    }
}

// ========== list_devices ==========

/// Filtered device listing over the registry indices.
pub struct ListDevicesTool {
    registry: Arc<DeviceRegistry>,
}

impl ListDevicesTool {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ListDevicesTool {
    fn name(&self) -> &str {
        "list_devices"
    }

    fn description(&self) -> &str {
        "List known devices, optionally filtered by room, platform, capability, online state, or a name pattern"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "room": string_property("Only devices in this room"),
                "platform": enum_property("Only devices on this platform", &platform_names()),
                "capability": enum_property("Only devices with this capability", &capability_names()),
                "online": boolean_property("Only devices with this reachability"),
                "name_pattern": string_property("Regex applied to display names"),
            }),
            vec![],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let filter = DeviceFilter {
            room: args.get("room").and_then(Value::as_str).map(String::from),
            platform: args
                .get("platform")
                .and_then(Value::as_str)
                .and_then(Platform::parse),
            capability: parse_capability(&args, "capability")?,
            online: args.get("online").and_then(Value::as_bool),
            name_pattern: args
                .get("name_pattern")
                .and_then(Value::as_str)
                .map(String::from),
        };

        match self.registry.find(&filter).await {
            Ok(devices) => {
                let summary = format!("{} device(s) matched", devices.len());
                Ok(ToolOutput::success(
                    summary,
                    serde_json::json!({ "devices": devices, "count": devices.len() }),
                ))
            }
            Err(error) => Ok(ToolOutput::failure("list devices", &error)),
        }
    }
}

// ========== get_device_status ==========

/// Resolve a device and read its last known state.
pub struct DeviceStatusTool {
    registry: Arc<DeviceRegistry>,
    adapter: DynAdapter,
    timeout_ms: u64,
}

impl DeviceStatusTool {
    pub fn new(registry: Arc<DeviceRegistry>, adapter: DynAdapter, config: &BridgeConfig) -> Self {
        Self {
            registry,
            adapter,
            timeout_ms: config.adapter_timeout_ms,
        }
    }
}

#[async_trait]
impl Tool for DeviceStatusTool {
    fn name(&self) -> &str {
        "get_device_status"
    }

    fn description(&self) -> &str {
        "Resolve a device by id, name, or alias and return its current attribute values"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "device": string_property("Device id, name, or alias; fuzzy matching applies"),
            }),
            vec!["device"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let query = args["device"].as_str().unwrap_or_default();

        let resolution = match resolve_or_fail(&self.registry, query, "resolve device").await {
            Ok(resolution) => resolution,
            Err(failure) => return Ok(*failure),
        };
        let device = resolution.device;

        let attempted = format!("read state of {}", device.display_name());
        match with_deadline(self.timeout_ms, self.adapter.get_device_state(&device.id)).await {
            Ok(state) => Ok(ToolOutput::success(
                format!(
                    "{} is {}",
                    device.display_name(),
                    if device.online { "online" } else { "offline" }
                ),
                serde_json::json!({
                    "device": device,
                    "match_type": resolution.match_type,
                    "confidence": resolution.confidence,
                    "state": state,
                }),
            )),
            Err(error) => Ok(ToolOutput::failure(attempted, &error)),
        }
    }
}

// ========== execute_command ==========

/// Validate and send one device command, recording exactly one
/// attempt in the tracker whatever the outcome.
pub struct ExecuteCommandTool {
    registry: Arc<DeviceRegistry>,
    adapter: DynAdapter,
    tracker: Arc<CommandTracker>,
    timeout_ms: u64,
}

impl ExecuteCommandTool {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        adapter: DynAdapter,
        tracker: Arc<CommandTracker>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            registry,
            adapter,
            tracker,
            timeout_ms: config.adapter_timeout_ms,
        }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a capability command on a device, e.g. switch on or lock unlock"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "device": string_property("Device id, name, or alias"),
                "capability": enum_property("Capability the command belongs to", &capability_names()),
                "command": string_property("Command verb, e.g. 'on', 'off', 'setLevel'"),
                "args": property_object(),
            }),
            vec!["device", "capability", "command"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let query = args["device"].as_str().unwrap_or_default();
        let capability = parse_capability(&args, "capability")?
            .ok_or_else(|| ToolError::invalid("capability", "required argument is missing"))?;
        let command = args["command"].as_str().unwrap_or_default().to_string();
        let command_args = args.get("args").filter(|v| !v.is_null()).cloned();

        let resolution = match resolve_or_fail(&self.registry, query, "resolve device").await {
            Ok(resolution) => resolution,
            Err(failure) => return Ok(*failure),
        };
        let device = resolution.device;
        let attempted = format!("execute '{command}' on {}", device.display_name());

        if !device.has_capability(capability) {
            let error = CoreError::CapabilityUnsupported {
                capability: capability.as_str().to_string(),
                available: device
                    .capabilities
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            };
            return Ok(ToolOutput::failure(attempted, &error));
        }
        if !capability.supports_command(&command) {
            let error = CoreError::CommandUnsupported {
                capability: capability.as_str().to_string(),
                command: command.clone(),
                legal: capability.commands().iter().map(|c| c.to_string()).collect(),
            };
            return Ok(ToolOutput::failure(attempted, &error));
        }

        let mut request = CommandRequest::new(device.id.clone(), capability, command.clone());
        if let Some(command_args) = command_args.clone() {
            request = request.with_args(command_args);
        }

        let started_at = Utc::now();
        let started = std::time::Instant::now();
        let result = with_deadline(self.timeout_ms, self.adapter.execute_command(&request)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // Exactly one attempt record per outbound command.
        let (outcome, endpoint) = match &result {
            Ok(receipt) => (CommandOutcome::Success, receipt.endpoint.clone()),
            Err(error) => {
                let endpoint = match error {
                    CoreError::RateLimited { endpoint, .. } => endpoint.clone(),
                    _ => format!("/devices/{}/commands", device.id),
                };
                (CommandOutcome::from_error(error), endpoint)
            }
        };
        let mut attempt = CommandAttempt::new(
            device.id.clone(),
            capability,
            command.clone(),
            started_at,
            duration_ms,
            outcome,
            endpoint,
        )
        .with_source(CommandSource::Llm {
            model: "external".to_string(),
        });
        if let Some(command_args) = command_args {
            attempt = attempt.with_args(command_args);
        }
        let attempt_id = attempt.id.clone();
        self.tracker.record(attempt).await;

        match result {
            Ok(_) => Ok(ToolOutput::success(
                format!("sent '{command}' to {}", device.display_name()),
                serde_json::json!({
                    "device_id": device.id,
                    "capability": capability,
                    "command": command,
                    "attempt_id": attempt_id,
                    "duration_ms": duration_ms,
                }),
            )),
            Err(error) => Ok(ToolOutput::failure(attempted, &error)),
        }
    }
}

fn property_object() -> Value {
    serde_json::json!({
        "type": "object",
        "description": "Command arguments, e.g. {\"level\": 40} for setLevel",
    })
}

// ========== validate_capability ==========

/// Check whether a device supports a capability and, optionally, a
/// command verb, without touching the platform.
pub struct ValidateCapabilityTool {
    registry: Arc<DeviceRegistry>,
}

impl ValidateCapabilityTool {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ValidateCapabilityTool {
    fn name(&self) -> &str {
        "validate_capability"
    }

    fn description(&self) -> &str {
        "Check whether a device declares a capability and whether a command verb is legal for it"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "device": string_property("Device id, name, or alias"),
                "capability": enum_property("Capability to check", &capability_names()),
                "command": string_property("Optional command verb to check"),
            }),
            vec!["device", "capability"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let query = args["device"].as_str().unwrap_or_default();
        let capability = parse_capability(&args, "capability")?
            .ok_or_else(|| ToolError::invalid("capability", "required argument is missing"))?;
        let command = args.get("command").and_then(Value::as_str);

        let resolution = match resolve_or_fail(&self.registry, query, "resolve device").await {
            Ok(resolution) => resolution,
            Err(failure) => return Ok(*failure),
        };
        let device = resolution.device;

        let supported = device.has_capability(capability);
        let command_supported = command.map(|verb| capability.supports_command(verb));
        let legal: Vec<&str> = capability.commands().to_vec();

        let summary = match (supported, command, command_supported) {
            (false, _, _) => format!(
                "{} does not declare {capability}",
                device.display_name()
            ),
            (true, Some(verb), Some(false)) => {
                format!("'{verb}' is not a legal {capability} command")
            }
            (true, Some(verb), _) => {
                format!("{} supports {capability} {verb}", device.display_name())
            }
            (true, None, _) => format!("{} supports {capability}", device.display_name()),
        };

        Ok(ToolOutput::success(
            summary,
            serde_json::json!({
                "device_id": device.id,
                "capability": capability,
                "supported": supported,
                "command_supported": command_supported,
                "legal_commands": legal,
                "declared_capabilities": device.capabilities,
            }),
        ))
    }
}
