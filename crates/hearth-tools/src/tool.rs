//! Tool trait and result envelopes.
//!
//! Each externally exposed operation is a named tool: a JSON-schema
//! input contract plus an async handler. Results travel in a standard
//! envelope with a human summary and a structured payload; failures
//! carry the classified kind and a detail record, and the summary
//! describes what was attempted and what the platform reported, never
//! a guess at the cause.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearth_core::error::{Error as CoreError, ErrorKind};

use crate::error::{Result, ToolError};
use crate::schema;

/// Classified error payload inside a failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    /// Structured evidence: near matches, legal verbs, retry hints.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl ErrorDetail {
    /// Build the detail payload for a core error, preserving whatever
    /// evidence the error carries.
    pub fn from_core(error: &CoreError) -> Self {
        let detail = match error {
            CoreError::InvalidInput { field, .. } => serde_json::json!({ "field": field }),
            CoreError::DeviceNotFound {
                query,
                near_matches,
            } => serde_json::json!({ "query": query, "near_matches": near_matches }),
            CoreError::Ambiguous { query, candidates } => {
                serde_json::json!({ "query": query, "candidates": candidates })
            }
            CoreError::CapabilityUnsupported {
                capability,
                available,
            } => serde_json::json!({ "capability": capability, "available": available }),
            CoreError::CommandUnsupported {
                capability,
                command,
                legal,
            } => serde_json::json!({ "capability": capability, "command": command, "legal": legal }),
            CoreError::RateLimited {
                endpoint,
                retry_after_secs,
            } => serde_json::json!({ "endpoint": endpoint, "retry_after_secs": retry_after_secs }),
            CoreError::AdapterTimeout(ms) => serde_json::json!({ "timeout_ms": ms }),
            _ => Value::Null,
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            detail,
        }
    }
}

/// The standard result envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    /// Human-readable summary of what happened.
    pub summary: String,
    /// Structured payload for machine consumption.
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ToolOutput {
    /// A success envelope.
    pub fn success(summary: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            data,
            error: None,
        }
    }

    /// A failure envelope for a core error. `attempted` names the
    /// operation, e.g. `"execute 'on' on Desk Lamp"`; the summary
    /// reports the attempt and what the platform said.
    pub fn failure(attempted: impl AsRef<str>, error: &CoreError) -> Self {
        Self {
            success: false,
            summary: format!("could not {}: {error}", attempted.as_ref()),
            data: Value::Null,
            error: Some(ErrorDetail::from_core(error)),
        }
    }
}

/// One tool's wire description, handed to the external model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// A callable operation over the bridge core.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool. Arguments were validated against
    /// [`Tool::parameters`] before this is called.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;

    /// Strict schema validation: required fields, types, enum
    /// domains, numeric bounds, and no unknown fields.
    fn validate_args(&self, args: &Value) -> Result<()> {
        schema::validate(&self.parameters(), args)
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Shared tool handle.
pub type DynTool = Arc<dyn Tool>;

// ========== Schema property helpers ==========

/// An object schema from properties and required field names.
pub fn object_schema(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn property(prop_type: &str, description: &str) -> Value {
    serde_json::json!({
        "type": prop_type,
        "description": description,
    })
}

pub fn string_property(description: &str) -> Value {
    property("string", description)
}

pub fn boolean_property(description: &str) -> Value {
    property("boolean", description)
}

pub fn number_property(description: &str) -> Value {
    property("number", description)
}

/// An integer property with inclusive bounds.
pub fn integer_property(description: &str, minimum: i64, maximum: i64) -> Value {
    serde_json::json!({
        "type": "integer",
        "description": description,
        "minimum": minimum,
        "maximum": maximum,
    })
}

/// A string property restricted to an enumerated domain.
pub fn enum_property(description: &str, values: &[&str]) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description,
        "enum": values,
    })
}

/// An array-of-strings property.
pub fn string_array_property(description: &str) -> Value {
    serde_json::json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo a message back"
        }

        fn parameters(&self) -> Value {
            object_schema(
                serde_json::json!({ "message": string_property("What to echo") }),
                vec!["message"],
            )
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput> {
            let message = args["message"].as_str().unwrap_or_default();
            Ok(ToolOutput::success(
                format!("echoed {} byte(s)", message.len()),
                serde_json::json!({ "message": message }),
            ))
        }
    }

    #[tokio::test]
    async fn test_execute_success_envelope() {
        let output = EchoTool
            .execute(serde_json::json!({"message": "hi"}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.data["message"], "hi");
        assert!(output.error.is_none());
    }

    #[test]
    fn test_validate_missing_required() {
        let result = EchoTool.validate_args(&serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_envelope_carries_evidence() {
        let error = CoreError::CommandUnsupported {
            capability: "switch".into(),
            command: "dim".into(),
            legal: vec!["on".into(), "off".into()],
        };
        let output = ToolOutput::failure("execute 'dim' on Desk Lamp", &error);
        assert!(!output.success);
        assert!(output.summary.contains("execute 'dim' on Desk Lamp"));
        let detail = output.error.unwrap();
        assert_eq!(detail.kind, ErrorKind::CommandUnsupported);
        assert_eq!(detail.detail["legal"][0], "on");
    }

    #[test]
    fn test_definition_shape() {
        let definition = EchoTool.definition();
        assert_eq!(definition.name, "echo");
        assert_eq!(definition.parameters["type"], "object");
    }
}
