//! The LLM-facing tool surface of the Hearth bridge.
//!
//! Every externally exposed operation is a tool: a JSON-schema input
//! contract, strict validation, a handler over the core components,
//! and a result envelope with a human summary and structured payload.
//! This layer never invents data, never retries, and never strips
//! evidence out of errors.

pub mod device_tools;
pub mod diagnostic_tools;
pub mod error;
pub mod event_tools;
pub mod registry;
pub mod schema;
pub mod system_tools;
pub mod tool;

pub use device_tools::{
    DeviceStatusTool, ExecuteCommandTool, ListDevicesTool, ValidateCapabilityTool,
};
pub use diagnostic_tools::{DiagnoseDeviceTool, FailedCommandsTool, SystemStatusTool};
pub use error::{Result, ToolError};
pub use event_tools::DeviceEventsTool;
pub use registry::{ToolCall, ToolCallResult, ToolRegistry, ToolRegistryBuilder};
pub use system_tools::{ExecuteSceneTool, TestConnectionTool};
pub use tool::{
    boolean_property, enum_property, integer_property, number_property, object_schema, property,
    string_array_property, string_property, DynTool, ErrorDetail, Tool, ToolDefinition,
    ToolOutput,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
