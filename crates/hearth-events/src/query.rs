//! Event-history query engine.
//!
//! Resolves a caller's window against the retention clamp, fetches
//! events through the platform adapter under a deadline, applies
//! capability/attribute filters client-side when the platform cannot,
//! detects connectivity gaps, and shapes the result for consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::capability::Capability;
use hearth_core::config::{BridgeConfig, EVENT_LIMIT_MAX};
use hearth_core::error::Result;
use hearth_core::event::DeviceEvent;
use hearth_core::ids::DeviceId;
use hearth_devices::adapter::{with_deadline, DynAdapter, EventRequest};

use crate::format::humanize_event;
use crate::gaps::{detect_gaps, format_duration_ms, largest_gap_ms, EventGap};
use crate::timerange::{resolve_range, ResolvedRange};

fn default_true() -> bool {
    true
}

/// A caller's event-history request. Bounds are raw strings (relative
/// tokens or absolute instants); parsing happens per call against the
/// caller-supplied `now`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQuery {
    pub device_id: DeviceId,
    /// Forwarded to the platform for query efficiency when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Defaults to 24 hours before `now`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Defaults to `now`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Defaults to the configured limit; hard ceiling 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// `false` (the default) returns newest first.
    #[serde(default)]
    pub oldest_first: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default = "default_true")]
    pub human_readable: bool,
}

impl EventQuery {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            location_id: None,
            start: None,
            end: None,
            limit: None,
            oldest_first: false,
            capabilities: None,
            attributes: None,
            include_metadata: true,
            human_readable: true,
        }
    }

    pub fn since(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn until(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    pub fn for_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn for_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Query metadata for consumers and report builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryMetadata {
    /// Events in the window after filtering, before the limit cut.
    pub total_count: usize,
    pub returned_count: usize,
    pub has_more: bool,
    pub reached_retention_limit: bool,
    pub gap_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub largest_gap_ms: Option<i64>,
    /// Human-readable descriptions of the filters that were applied.
    pub applied_filters: Vec<String>,
}

/// The engine's answer: events in the caller's order, gaps from the
/// ascending scan, and optional metadata/rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEventResult {
    pub device_id: DeviceId,
    pub range: ResolvedRange,
    pub events: Vec<DeviceEvent>,
    pub gaps: Vec<EventGap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventQueryMetadata>,
    /// One rendered line per returned event, same order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Event-history query engine over a platform adapter.
#[derive(Clone)]
pub struct EventQueryEngine {
    adapter: DynAdapter,
    default_limit: usize,
    retention_days: i64,
    adapter_timeout_ms: u64,
}

impl EventQueryEngine {
    pub fn new(adapter: DynAdapter, config: &BridgeConfig) -> Self {
        Self {
            adapter,
            default_limit: config.default_event_limit,
            retention_days: config.retention_days,
            adapter_timeout_ms: config.adapter_timeout_ms,
        }
    }

    /// Run a query against a caller-supplied `now`, which also anchors
    /// relative tokens. Production callers pass `Utc::now()`; tests
    /// pin it.
    pub async fn device_events(
        &self,
        query: &EventQuery,
        now: DateTime<Utc>,
    ) -> Result<DeviceEventResult> {
        let range = resolve_range(
            query.start.as_deref(),
            query.end.as_deref(),
            now,
            self.retention_days,
        )?;

        let limit = query
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, EVENT_LIMIT_MAX);

        let request = EventRequest {
            device_id: query.device_id.clone(),
            start: range.start,
            end: range.end,
            capabilities: query.capabilities.clone(),
            attributes: query.attributes.clone(),
            // One extra row tells us whether the window holds more.
            limit: limit + 1,
            oldest_first: query.oldest_first,
            location_id: query.location_id.clone(),
        };

        let raw = with_deadline(self.adapter_timeout_ms, self.adapter.list_events(&request))
            .await?;
        tracing::debug!(
            device_id = %query.device_id,
            fetched = raw.len(),
            start = %range.start,
            end = %range.end,
            "events fetched"
        );

        let mut events = raw;
        if !self.adapter.filters_events_server_side() {
            if let Some(capabilities) = &query.capabilities {
                events.retain(|event| capabilities.contains(&event.capability));
            }
            if let Some(attributes) = &query.attributes {
                events.retain(|event| attributes.iter().any(|a| a == &event.attribute));
            }
        }

        events.sort_by_key(|event| event.time);
        let gaps = detect_gaps(&events);
        let total_count = events.len();

        if !query.oldest_first {
            events.reverse();
        }
        events.truncate(limit);

        let mut applied_filters = Vec::new();
        if let Some(capabilities) = &query.capabilities {
            let names: Vec<&str> = capabilities.iter().map(|c| c.as_str()).collect();
            applied_filters.push(format!("capabilities: {}", names.join(", ")));
        }
        if let Some(attributes) = &query.attributes {
            applied_filters.push(format!("attributes: {}", attributes.join(", ")));
        }

        let largest = largest_gap_ms(&gaps);
        let metadata = query.include_metadata.then(|| EventQueryMetadata {
            total_count,
            returned_count: events.len(),
            has_more: total_count > limit,
            reached_retention_limit: range.exceeds_retention,
            gap_detected: !gaps.is_empty(),
            largest_gap_ms: largest,
            applied_filters,
        });

        let rendered = query
            .human_readable
            .then(|| events.iter().map(humanize_event).collect::<Vec<_>>());
        let summary = query
            .human_readable
            .then(|| build_summary(&query.device_id, &range, total_count, largest));

        Ok(DeviceEventResult {
            device_id: query.device_id.clone(),
            range,
            gaps: if query.include_metadata { gaps } else { Vec::new() },
            events,
            metadata,
            rendered,
            summary,
        })
    }
}

fn build_summary(
    device_id: &DeviceId,
    range: &ResolvedRange,
    total: usize,
    largest_gap_ms: Option<i64>,
) -> String {
    let mut summary = format!(
        "{total} event(s) for {device_id} between {} and {}",
        range.start.to_rfc3339(),
        range.end.to_rfc3339()
    );
    if range.exceeds_retention {
        summary.push_str(" (window clamped to the 7-day retention limit)");
    }
    if let Some(ms) = largest_gap_ms {
        summary.push_str(&format!("; largest silence {}", format_duration_ms(ms)));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    use hearth_core::event::EventValue;
    use hearth_core::ids::Platform;
    use hearth_devices::testing::SimulatedAdapter;

    fn id() -> DeviceId {
        DeviceId::new(Platform::Virtual, "sensor-1").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn switch_events(offsets_minutes: &[i64]) -> Vec<DeviceEvent> {
        offsets_minutes
            .iter()
            .map(|minutes| {
                DeviceEvent::new(
                    id(),
                    now() - Duration::minutes(*minutes),
                    Capability::Switch,
                    "switch",
                    "on",
                )
            })
            .collect()
    }

    fn engine(adapter: SimulatedAdapter) -> EventQueryEngine {
        EventQueryEngine::new(Arc::new(adapter), &BridgeConfig::default())
    }

    #[tokio::test]
    async fn test_newest_first_by_default() {
        let adapter = SimulatedAdapter::new().with_events(id(), switch_events(&[300, 200, 100]));
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()), now())
            .await
            .unwrap();

        assert_eq!(result.events.len(), 3);
        assert!(result.events[0].time > result.events[1].time);
        assert!(result.events[1].time > result.events[2].time);
    }

    #[tokio::test]
    async fn test_oldest_first() {
        let adapter = SimulatedAdapter::new().with_events(id(), switch_events(&[300, 100, 200]));
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()).oldest_first(), now())
            .await
            .unwrap();
        assert!(result.events[0].time < result.events[1].time);
    }

    #[tokio::test]
    async fn test_limit_and_has_more() {
        let adapter = SimulatedAdapter::new()
            .with_events(id(), switch_events(&[50, 40, 30, 20, 10]));
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()).with_limit(2), now())
            .await
            .unwrap();

        assert_eq!(result.events.len(), 2);
        let metadata = result.metadata.unwrap();
        assert!(metadata.has_more);
        assert_eq!(metadata.returned_count, 2);
        // Newest-first keeps the most recent two.
        assert_eq!(result.events[0].time, now() - Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_limit_clamped_to_ceiling() {
        let adapter = SimulatedAdapter::new().with_events(id(), switch_events(&[10]));
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()).with_limit(9999), now())
            .await
            .unwrap();
        assert_eq!(result.events.len(), 1);
    }

    #[tokio::test]
    async fn test_capability_filter_client_side() {
        let mut events = switch_events(&[40, 30]);
        events.push(
            DeviceEvent::new(
                id(),
                now() - Duration::minutes(20),
                Capability::Battery,
                "battery",
                EventValue::Integer(80),
            )
            .with_unit("%"),
        );
        let adapter = SimulatedAdapter::new().with_events(id(), events);
        let result = engine(adapter)
            .device_events(
                &EventQuery::new(id()).for_capabilities(vec![Capability::Battery]),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].capability, Capability::Battery);
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.applied_filters, vec!["capabilities: battery"]);
    }

    #[tokio::test]
    async fn test_retention_clamp_flagged() {
        let adapter = SimulatedAdapter::new().with_events(id(), switch_events(&[60]));
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()).since("30d"), now())
            .await
            .unwrap();

        assert!(result.range.exceeds_retention);
        assert_eq!(result.range.start, now() - Duration::days(7));
        assert!(result.metadata.unwrap().reached_retention_limit);
        // Every returned event is inside the clamped window.
        for event in &result.events {
            assert!(event.time >= result.range.start);
        }
    }

    #[tokio::test]
    async fn test_gap_metadata() {
        // 30 hours of silence in the middle of the window.
        let old = "7d".to_string();
        let events = vec![
            DeviceEvent::new(
                id(),
                now() - Duration::hours(40),
                Capability::Switch,
                "switch",
                "on",
            ),
            DeviceEvent::new(
                id(),
                now() - Duration::hours(10),
                Capability::Switch,
                "switch",
                "off",
            ),
        ];
        let adapter = SimulatedAdapter::new().with_events(id(), events);
        let result = engine(adapter)
            .device_events(&EventQuery::new(id()).since(old), now())
            .await
            .unwrap();

        assert_eq!(result.gaps.len(), 1);
        assert!(result.gaps[0].likely_connectivity_issue);
        let metadata = result.metadata.unwrap();
        assert!(metadata.gap_detected);
        assert_eq!(metadata.largest_gap_ms, Some(30 * 3_600_000));
        assert!(result.summary.unwrap().contains("30h"));
    }

    #[tokio::test]
    async fn test_metadata_suppressed() {
        let adapter = SimulatedAdapter::new().with_events(id(), switch_events(&[10]));
        let mut query = EventQuery::new(id());
        query.include_metadata = false;
        query.human_readable = false;
        let result = engine(adapter).device_events(&query, now()).await.unwrap();
        assert!(result.metadata.is_none());
        assert!(result.rendered.is_none());
        assert!(result.summary.is_none());
        assert!(result.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_timeout_surfaces() {
        let adapter = SimulatedAdapter::new()
            .with_events(id(), switch_events(&[10]))
            .with_latency(std::time::Duration::from_secs(60));
        let config = BridgeConfig {
            adapter_timeout_ms: 20,
            ..Default::default()
        };
        let engine = EventQueryEngine::new(Arc::new(adapter), &config);
        let err = engine
            .device_events(&EventQuery::new(id()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, hearth_core::error::Error::AdapterTimeout(_)));
    }
}
