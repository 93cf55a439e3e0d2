//! Tool registry and wiring.
//!
//! A static dispatch table: each tool is registered once at startup
//! with its schema and handler; nothing registers tools at runtime.
//! The builder wires tools to explicit component handles, which is
//! the whole dependency story of the tool layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use hearth_core::config::BridgeConfig;
use hearth_commands::{CommandTracker, TokenInfo};
use hearth_devices::adapter::DynAdapter;
use hearth_devices::registry::DeviceRegistry;
use hearth_diagnostics::status::StatusAggregator;
use hearth_diagnostics::workflow::DiagnosticWorkflow;
use hearth_events::query::EventQueryEngine;

use crate::device_tools::{
    DeviceStatusTool, ExecuteCommandTool, ListDevicesTool, ValidateCapabilityTool,
};
use crate::diagnostic_tools::{DiagnoseDeviceTool, FailedCommandsTool, SystemStatusTool};
use crate::error::{Result, ToolError};
use crate::event_tools::DeviceEventsTool;
use crate::system_tools::{ExecuteSceneTool, TestConnectionTool};
use crate::tool::{DynTool, ToolDefinition, ToolOutput};

/// A named call against the registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Result of one call in a parallel batch.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub name: String,
    pub result: Result<ToolOutput>,
}

/// The tool dispatch table.
pub struct ToolRegistry {
    // Sorted map so definition listings are stable.
    tools: BTreeMap<String, DynTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: DynTool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous handler replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<&DynTool> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Wire descriptions for every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Definitions as one JSON document for the external model.
    pub fn definitions_json(&self) -> Value {
        serde_json::json!({ "tools": self.definitions() })
    }

    /// Tools whose name or description contains the keyword.
    pub fn search(&self, keyword: &str) -> Vec<ToolDefinition> {
        let needle = keyword.to_lowercase();
        self.tools
            .values()
            .filter(|tool| {
                tool.name().to_lowercase().contains(&needle)
                    || tool.description().to_lowercase().contains(&needle)
            })
            .map(|tool| tool.definition())
            .collect()
    }

    /// Validate and execute one tool.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.validate_args(&args)?;
        tracing::debug!(tool = name, "executing tool");
        tool.execute(args).await
    }

    /// Execute independent calls concurrently, collecting every
    /// result. One call failing does not cancel the others.
    pub async fn execute_parallel(&self, calls: Vec<ToolCall>) -> Vec<ToolCallResult> {
        let mut tasks = Vec::with_capacity(calls.len());
        for call in calls {
            match self.get(&call.name) {
                Some(tool) => {
                    let tool = tool.clone();
                    tasks.push(tokio::spawn(async move {
                        let result = match tool.validate_args(&call.args) {
                            Ok(()) => tool.execute(call.args).await,
                            Err(error) => Err(error),
                        };
                        ToolCallResult {
                            name: call.name,
                            result,
                        }
                    }));
                }
                None => {
                    let name = call.name.clone();
                    tasks.push(tokio::spawn(async move {
                        ToolCallResult {
                            name: name.clone(),
                            result: Err(ToolError::NotFound(name)),
                        }
                    }));
                }
            }
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(join_error) => results.push(ToolCallResult {
                    name: "<panicked>".to_string(),
                    result: Err(ToolError::Execution(join_error.to_string())),
                }),
            }
        }
        results
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder wiring tools to explicit component handles.
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    /// Add a custom tool.
    pub fn with_tool(mut self, tool: DynTool) -> Self {
        self.registry.register(tool);
        self
    }

    /// Device listing, status, command execution, and capability
    /// validation.
    pub fn with_device_tools(
        self,
        registry: Arc<DeviceRegistry>,
        adapter: DynAdapter,
        tracker: Arc<CommandTracker>,
        config: &BridgeConfig,
    ) -> Self {
        self.with_tool(Arc::new(ListDevicesTool::new(registry.clone())))
            .with_tool(Arc::new(DeviceStatusTool::new(
                registry.clone(),
                adapter.clone(),
                config,
            )))
            .with_tool(Arc::new(ExecuteCommandTool::new(
                registry.clone(),
                adapter,
                tracker,
                config,
            )))
            .with_tool(Arc::new(ValidateCapabilityTool::new(registry)))
    }

    /// Event-history retrieval.
    pub fn with_event_tools(
        self,
        registry: Arc<DeviceRegistry>,
        adapter: DynAdapter,
        config: &BridgeConfig,
    ) -> Self {
        let engine = EventQueryEngine::new(adapter, config);
        self.with_tool(Arc::new(DeviceEventsTool::new(registry, engine)))
    }

    /// Diagnostic report, system status, and failed-command listing.
    pub fn with_diagnostic_tools(
        self,
        workflow: Arc<DiagnosticWorkflow>,
        aggregator: Arc<StatusAggregator>,
        tracker: Arc<CommandTracker>,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        self.with_tool(Arc::new(DiagnoseDeviceTool::new(workflow)))
            .with_tool(Arc::new(SystemStatusTool::new(aggregator)))
            .with_tool(Arc::new(FailedCommandsTool::new(tracker, registry)))
    }

    /// Scene execution and the connection probe.
    pub fn with_system_tools(
        self,
        adapter: DynAdapter,
        tracker: Arc<CommandTracker>,
        token: Option<TokenInfo>,
        config: &BridgeConfig,
    ) -> Self {
        self.with_tool(Arc::new(ExecuteSceneTool::new(adapter.clone(), config)))
            .with_tool(Arc::new(TestConnectionTool::new(
                adapter, tracker, token, config,
            )))
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::tool::{object_schema, string_property, Tool};

    struct NoopTool {
        name: String,
    }

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "Does nothing, successfully"
        }

        fn parameters(&self) -> Value {
            object_schema(
                serde_json::json!({ "note": string_property("Ignored") }),
                vec![],
            )
        }

        async fn execute(&self, _args: Value) -> Result<ToolOutput> {
            Ok(ToolOutput::success("did nothing", Value::Null))
        }
    }

    fn noop(name: &str) -> DynTool {
        Arc::new(NoopTool {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let registry = ToolRegistryBuilder::new().with_tool(noop("noop")).build();
        assert!(registry.has("noop"));
        let output = registry
            .execute("noop", serde_json::json!({}))
            .await
            .unwrap();
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute("ghost", serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_validation_runs_before_execute() {
        let registry = ToolRegistryBuilder::new().with_tool(noop("noop")).build();
        let result = registry
            .execute("noop", serde_json::json!({ "unexpected": 1 }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_execute_parallel_isolates_failures() {
        let registry = ToolRegistryBuilder::new().with_tool(noop("noop")).build();
        let results = registry
            .execute_parallel(vec![
                ToolCall::new("noop", serde_json::json!({})),
                ToolCall::new("ghost", serde_json::json!({})),
            ])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_err());
    }

    #[tokio::test]
    async fn test_definitions_sorted_and_searchable() {
        let registry = ToolRegistryBuilder::new()
            .with_tool(noop("zeta"))
            .with_tool(noop("alpha"))
            .build();
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert_eq!(registry.search("nothing").len(), 2);
        assert_eq!(registry.search("alp").len(), 1);

        let json = registry.definitions_json();
        assert_eq!(json["tools"].as_array().unwrap().len(), 2);
    }
}
