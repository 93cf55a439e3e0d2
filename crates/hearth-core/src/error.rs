//! Shared error taxonomy for the bridge core.
//!
//! Every component reports failures through this one enum so the tool
//! surface can map them to a stable wire taxonomy without inspecting
//! component internals. Adapter implementations are responsible for
//! translating platform-native error codes into these kinds before they
//! reach the core.

use serde::{Deserialize, Serialize};

/// Result type used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure kinds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A caller-supplied field failed validation.
    #[error("invalid input in field '{field}': {message}")]
    InvalidInput {
        /// Name of the offending field
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// A time range could not be parsed or is inverted.
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// No device matched the query.
    #[error("device not found: '{query}'")]
    DeviceNotFound {
        /// The query that failed to resolve
        query: String,
        /// Names of near matches, best first
        near_matches: Vec<String>,
    },

    /// More than one device or room matched a query that needs exactly one.
    #[error("query '{query}' is ambiguous ({} candidates)", .candidates.len())]
    Ambiguous {
        /// The ambiguous query
        query: String,
        /// All candidates that matched
        candidates: Vec<String>,
    },

    /// The device does not declare the requested capability.
    #[error("capability '{capability}' not supported by device")]
    CapabilityUnsupported {
        /// The requested capability
        capability: String,
        /// Capabilities the device actually declares
        available: Vec<String>,
    },

    /// The capability does not accept the requested command verb.
    #[error("command '{command}' not supported by capability '{capability}'")]
    CommandUnsupported {
        /// The capability addressed
        capability: String,
        /// The rejected command verb
        command: String,
        /// Command verbs the capability accepts
        legal: Vec<String>,
    },

    /// The platform rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The platform throttled the call. Retryable upstream; the core does
    /// not retry.
    #[error("rate limited by endpoint '{endpoint}'")]
    RateLimited {
        /// The throttled endpoint
        endpoint: String,
        /// Platform-declared retry delay, when present
        retry_after_secs: Option<u64>,
    },

    /// An adapter call exceeded its deadline.
    #[error("adapter call timed out after {0}ms")]
    AdapterTimeout(u64),

    /// The platform is unreachable.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Any other adapter-reported failure.
    #[error("adapter error: {0}")]
    AdapterOther(String),

    /// An internal invariant was violated. Always a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable snake_case name of the error kind, used in result envelopes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::InvalidTimeRange(_) => ErrorKind::InvalidTimeRange,
            Error::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Error::Ambiguous { .. } => ErrorKind::Ambiguous,
            Error::CapabilityUnsupported { .. } => ErrorKind::CapabilityUnsupported,
            Error::CommandUnsupported { .. } => ErrorKind::CommandUnsupported,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::AdapterTimeout(_) => ErrorKind::AdapterTimeout,
            Error::AdapterUnavailable(_) => ErrorKind::AdapterUnavailable,
            Error::AdapterOther(_) => ErrorKind::AdapterOther,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure originated in the platform adapter. Adapter
    /// failures degrade reports instead of aborting them.
    pub fn is_adapter(&self) -> bool {
        matches!(
            self,
            Error::AdapterTimeout(_)
                | Error::AdapterUnavailable(_)
                | Error::AdapterOther(_)
                | Error::RateLimited { .. }
                | Error::Unauthorized(_)
        )
    }
}

/// Wire-stable error kind tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidTimeRange,
    DeviceNotFound,
    Ambiguous,
    CapabilityUnsupported,
    CommandUnsupported,
    Unauthorized,
    RateLimited,
    AdapterTimeout,
    AdapterUnavailable,
    AdapterOther,
    Internal,
}

impl ErrorKind {
    /// The snake_case tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidTimeRange => "invalid_time_range",
            ErrorKind::DeviceNotFound => "device_not_found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::CapabilityUnsupported => "capability_unsupported",
            ErrorKind::CommandUnsupported => "command_unsupported",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::AdapterTimeout => "adapter_timeout",
            ErrorKind::AdapterUnavailable => "adapter_unavailable",
            ErrorKind::AdapterOther => "adapter_other",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
