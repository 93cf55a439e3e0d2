//! Tool-layer errors.

use hearth_core::error::Error as CoreError;

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Failures of the tool layer itself, as opposed to failures of the
/// operation a tool performed (those travel inside the result
/// envelope).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// No tool registered under the name.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The arguments did not satisfy the tool's schema.
    #[error("invalid argument '{field}': {message}")]
    InvalidArguments {
        field: String,
        message: String,
    },

    /// The tool panicked or hit an internal bug.
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Argument or result (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(error: serde_json::Error) -> Self {
        ToolError::Serialization(error.to_string())
    }
}

impl From<ToolError> for CoreError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::NotFound(name) => CoreError::invalid_input("tool", name),
            ToolError::InvalidArguments { field, message } => {
                CoreError::InvalidInput { field, message }
            }
            ToolError::Execution(message) => CoreError::Internal(message),
            ToolError::Serialization(message) => CoreError::Internal(message),
        }
    }
}
