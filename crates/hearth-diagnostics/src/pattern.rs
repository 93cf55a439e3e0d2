//! Behavioral patterns.
//!
//! A pattern is a typed, scored, severity-tagged description of device
//! behavior inferred from an event sequence. Every pattern cites the
//! evidence it was inferred from; a pattern without evidence never
//! leaves the detector chain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::event::DeviceEvent;
use hearth_core::ids::DeviceId;
use hearth_commands::CommandAttempt;

/// Kinds of detected behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Normal,
    AutomationTrigger,
    RapidChange,
    ConnectivityGap,
    BatteryDecline,
    AutomationConflict,
    Anomaly,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Normal => "normal",
            PatternType::AutomationTrigger => "automation_trigger",
            PatternType::RapidChange => "rapid_change",
            PatternType::ConnectivityGap => "connectivity_gap",
            PatternType::BatteryDecline => "battery_decline",
            PatternType::AutomationConflict => "automation_conflict",
            PatternType::Anomaly => "anomaly",
        }
    }
}

/// Finding severity, ordered `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A citation of one observed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub time: DateTime<Utc>,
    pub attribute: String,
    pub value: String,
}

impl EventRef {
    pub fn from_event(event: &DeviceEvent) -> Self {
        Self {
            time: event.time,
            attribute: event.attribute.clone(),
            value: event.value.to_string(),
        }
    }
}

/// A citation of one recorded command attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRef {
    pub attempt_id: String,
    pub command: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CommandRef {
    pub fn from_attempt(attempt: &CommandAttempt) -> Self {
        Self {
            attempt_id: attempt.id.clone(),
            command: attempt.command.clone(),
            completed_at: attempt.completed_at(),
            source: attempt.source.as_ref().map(|source| source.id()),
        }
    }
}

/// One detected pattern with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub device_id: DeviceId,
    pub pattern_type: PatternType,
    pub description: String,
    pub severity: Severity,
    /// Strength of the signal, `[0, 1]`.
    pub score: f64,
    /// How sure the detector is, `[0, 1]`.
    pub confidence: f64,
    pub evidence: Vec<EventRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_evidence: Vec<CommandRef>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Named values detectors extracted (attribute, count, duration,
    /// battery, rate, ...). Recommendation templates bind these.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

impl Pattern {
    /// Build a pattern with a fresh id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: DeviceId,
        pattern_type: PatternType,
        description: impl Into<String>,
        severity: Severity,
        score: f64,
        confidence: f64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device_id,
            pattern_type,
            description: description.into(),
            severity,
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            command_evidence: Vec::new(),
            started_at,
            ended_at,
            details: HashMap::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<EventRef>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_command_evidence(mut self, command_evidence: Vec<CommandRef>) -> Self {
        self.command_evidence = command_evidence;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Whether the pattern cites at least one event or command.
    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty() || !self.command_evidence.is_empty()
    }

    /// Whether the two patterns are the same type with overlapping
    /// time windows.
    pub fn overlaps(&self, other: &Pattern) -> bool {
        self.pattern_type == other.pattern_type
            && self.device_id == other.device_id
            && self.started_at <= other.ended_at
            && other.started_at <= self.ended_at
    }
}

/// Order findings for consumers: severity first, then score, then
/// recency.
pub fn rank(patterns: &mut [Pattern]) {
    patterns.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.started_at.cmp(&a.started_at))
    });
}

/// Collapse same-type patterns with overlapping windows, keeping the
/// stronger of each pair (severity, then score).
pub fn dedup_overlapping(patterns: Vec<Pattern>) -> Vec<Pattern> {
    let mut kept: Vec<Pattern> = Vec::with_capacity(patterns.len());
    for candidate in patterns {
        let mut absorbed = false;
        for existing in kept.iter_mut() {
            if existing.overlaps(&candidate) {
                let candidate_stronger = (candidate.severity, candidate.score)
                    > (existing.severity, existing.score);
                if candidate_stronger {
                    *existing = candidate.clone();
                }
                absorbed = true;
                break;
            }
        }
        if !absorbed {
            kept.push(candidate);
        }
    }
    kept
}
