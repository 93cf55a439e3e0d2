//! Command attempt records.
//!
//! Every outbound device command produces exactly one attempt record,
//! success or failure. Failures carry a classified kind derived from
//! the adapter's error so the tracker can aggregate without string
//! matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use hearth_core::capability::Capability;
use hearth_core::error::Error;
use hearth_core::ids::DeviceId;

/// Who asked for a command. Feeds conflict attribution: two opposing
/// commands from different sources within seconds of each other is
/// evidence of dueling automations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandSource {
    /// Direct user interaction.
    User { user_id: String },
    /// The language-model client.
    Llm { model: String },
    /// A platform automation rule.
    Rule { rule_id: String },
    /// A schedule.
    Schedule { schedule_id: String },
    /// The bridge itself (refresh sweeps, health checks).
    System,
}

impl CommandSource {
    /// Stable identifier for equality checks across attempts.
    pub fn id(&self) -> String {
        match self {
            CommandSource::User { user_id } => format!("user:{user_id}"),
            CommandSource::Llm { model } => format!("llm:{model}"),
            CommandSource::Rule { rule_id } => format!("rule:{rule_id}"),
            CommandSource::Schedule { schedule_id } => format!("schedule:{schedule_id}"),
            CommandSource::System => "system".to_string(),
        }
    }
}

/// Classified failure cause, derived from the adapter error shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    NotFound,
    Unauthorized,
    CapabilityUnsupported,
    RateLimited,
    Network,
    Server,
    Unknown,
}

impl FailureKind {
    /// Map a core error onto a failure kind.
    pub fn classify(error: &Error) -> FailureKind {
        match error {
            Error::InvalidInput { .. } | Error::InvalidTimeRange(_) | Error::Ambiguous { .. } => {
                FailureKind::Validation
            }
            Error::DeviceNotFound { .. } => FailureKind::NotFound,
            Error::Unauthorized(_) => FailureKind::Unauthorized,
            Error::CapabilityUnsupported { .. } | Error::CommandUnsupported { .. } => {
                FailureKind::CapabilityUnsupported
            }
            Error::RateLimited { .. } => FailureKind::RateLimited,
            Error::AdapterTimeout(_) | Error::AdapterUnavailable(_) => FailureKind::Network,
            Error::AdapterOther(_) => FailureKind::Server,
            Error::Internal(_) => FailureKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::CapabilityUnsupported => "capability_unsupported",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Network => "network",
            FailureKind::Server => "server",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// Outcome of one command attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    Success,
    Failure {
        kind: FailureKind,
        message: String,
        /// Platform-declared retry delay on rate limits.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
}

impl CommandOutcome {
    /// Build the failure outcome for an adapter error.
    pub fn from_error(error: &Error) -> Self {
        let retry_after_secs = match error {
            Error::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        };
        CommandOutcome::Failure {
            kind: FailureKind::classify(error),
            message: error.to_string(),
            retry_after_secs,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// One recorded outbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAttempt {
    pub id: String,
    pub device_id: DeviceId,
    pub capability: Capability,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: CommandOutcome,
    /// The platform endpoint that served the call.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CommandSource>,
}

impl CommandAttempt {
    /// New attempt with a generated id.
    pub fn new(
        device_id: DeviceId,
        capability: Capability,
        command: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcome: CommandOutcome,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id,
            capability,
            command: command.into(),
            args: None,
            started_at,
            duration_ms,
            outcome,
            endpoint: endpoint.into(),
            source: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// When the platform finished handling the call.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::milliseconds(self.duration_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hearth_core::ids::Platform;

    fn attempt(outcome: CommandOutcome) -> CommandAttempt {
        CommandAttempt::new(
            DeviceId::new(Platform::SmartThings, "d1").unwrap(),
            Capability::Switch,
            "on",
            Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
            120,
            outcome,
            "/devices/d1/commands",
        )
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            FailureKind::classify(&Error::invalid_input("command", "bad verb")),
            FailureKind::Validation
        );
        assert_eq!(
            FailureKind::classify(&Error::DeviceNotFound {
                query: "x".into(),
                near_matches: vec![]
            }),
            FailureKind::NotFound
        );
        assert_eq!(
            FailureKind::classify(&Error::AdapterTimeout(5000)),
            FailureKind::Network
        );
        assert_eq!(
            FailureKind::classify(&Error::AdapterOther("500".into())),
            FailureKind::Server
        );
    }

    #[test]
    fn test_rate_limit_keeps_retry_after() {
        let error = Error::RateLimited {
            endpoint: "/devices".into(),
            retry_after_secs: Some(30),
        };
        match CommandOutcome::from_error(&error) {
            CommandOutcome::Failure {
                kind,
                retry_after_secs,
                ..
            } => {
                assert_eq!(kind, FailureKind::RateLimited);
                assert_eq!(retry_after_secs, Some(30));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_completed_at() {
        let a = attempt(CommandOutcome::Success);
        assert_eq!(
            a.completed_at(),
            a.started_at + chrono::Duration::milliseconds(120)
        );
        assert!(a.is_success());
    }

    #[test]
    fn test_source_ids() {
        assert_eq!(
            CommandSource::Rule {
                rule_id: "r7".into()
            }
            .id(),
            "rule:r7"
        );
        assert_eq!(CommandSource::System.id(), "system");
    }
}
