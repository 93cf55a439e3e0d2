//! End-to-end diagnostic scenarios over the simulated platform.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use hearth_core::capability::Capability;
use hearth_core::config::BridgeConfig;
use hearth_core::device::Device;
use hearth_core::event::DeviceEvent;
use hearth_core::ids::{DeviceId, Platform};
use hearth_commands::CommandTracker;
use hearth_devices::registry::DeviceRegistry;
use hearth_devices::testing::SimulatedAdapter;
use hearth_events::query::EventQueryEngine;

use hearth_diagnostics::{
    DiagnosticRequest, DiagnosticWorkflow, PatternType, RecommendationCatalog, ReportState,
    Severity,
};

fn id(native: &str) -> DeviceId {
    DeviceId::new(Platform::Virtual, native).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
}

async fn registry_with(device: Device) -> Arc<DeviceRegistry> {
    let registry = Arc::new(DeviceRegistry::new());
    registry.add(device).await.unwrap();
    registry
}

fn workflow_over(
    adapter: SimulatedAdapter,
    registry: Arc<DeviceRegistry>,
    tracker: Arc<CommandTracker>,
) -> DiagnosticWorkflow {
    let config = BridgeConfig::default();
    DiagnosticWorkflow::new(
        registry,
        EventQueryEngine::new(Arc::new(adapter), &config),
        tracker,
        RecommendationCatalog::builtin(),
    )
}

#[tokio::test]
async fn uncommanded_switch_cycling_is_an_automation_trigger() {
    let device = Device::new(id("sw"), "Closet Light")
        .unwrap()
        .with_capability(Capability::Switch);
    let registry = registry_with(device).await;

    let base = now() - Duration::hours(1);
    let events = vec![
        DeviceEvent::new(id("sw"), base, Capability::Switch, "switch", "on"),
        DeviceEvent::new(
            id("sw"),
            base + Duration::seconds(3),
            Capability::Switch,
            "switch",
            "off",
        ),
        DeviceEvent::new(
            id("sw"),
            base + Duration::seconds(8),
            Capability::Switch,
            "switch",
            "on",
        ),
    ];
    let adapter = SimulatedAdapter::new().with_events(id("sw"), events);
    let workflow = workflow_over(adapter, registry, Arc::new(CommandTracker::new()));

    let report = workflow
        .diagnose(&DiagnosticRequest::new("Closet Light"), now())
        .await
        .unwrap();

    assert_eq!(report.state, ReportState::Done);
    let trigger = report
        .findings
        .iter()
        .find(|f| f.pattern_type == PatternType::AutomationTrigger)
        .expect("automation trigger finding");
    assert!(trigger.confidence >= 0.95);
    assert_eq!(trigger.severity, Severity::High);
    assert_eq!(trigger.evidence.len(), 3);

    // Three fast toggles are also a rapid change; both findings carry
    // evidence.
    for finding in &report.findings {
        assert!(
            !finding.evidence.is_empty() || !finding.command_evidence.is_empty(),
            "finding without evidence: {:?}",
            finding.pattern_type
        );
    }
}

#[tokio::test]
async fn thirty_hour_silence_is_a_connectivity_gap() {
    let device = Device::new(id("cam"), "Porch Camera")
        .unwrap()
        .with_capability(Capability::MotionSensor);
    let registry = registry_with(device).await;

    let t0 = now() - Duration::hours(40);
    let events = vec![
        DeviceEvent::new(id("cam"), t0, Capability::MotionSensor, "motion", "active"),
        DeviceEvent::new(
            id("cam"),
            t0 + Duration::hours(30),
            Capability::MotionSensor,
            "motion",
            "inactive",
        ),
    ];
    let adapter = SimulatedAdapter::new().with_events(id("cam"), events);
    let workflow = workflow_over(adapter, registry, Arc::new(CommandTracker::new()));

    let report = workflow
        .diagnose(&DiagnosticRequest::new("Porch Camera").since("3d"), now())
        .await
        .unwrap();

    let gap = report
        .findings
        .iter()
        .find(|f| f.pattern_type == PatternType::ConnectivityGap)
        .expect("connectivity gap finding");
    assert_eq!(gap.severity, Severity::High);
    assert!(gap.description.contains("30h"));
    assert_eq!(
        gap.details.get("likely_connectivity_issue").map(String::as_str),
        Some("true")
    );

    // The catalog bound the duration into a recommendation.
    let recommendation = report
        .recommendations
        .iter()
        .find(|r| r.finding_ids.contains(&gap.id))
        .expect("gap recommendation");
    assert!(recommendation.action.contains("30h"));
    assert!(recommendation.action.contains("Porch Camera"));
}

#[tokio::test]
async fn fuzzy_query_reaches_the_right_device() {
    let device = Device::new(id("lamp"), "Living Room Light")
        .unwrap()
        .with_capability(Capability::Switch);
    let registry = registry_with(device).await;
    let adapter = SimulatedAdapter::new();
    let workflow = workflow_over(adapter, registry, Arc::new(CommandTracker::new()));

    // Typo in the query; no events seeded, so the report is quiet.
    let report = workflow
        .diagnose(&DiagnosticRequest::new("Livng Room Light"), now())
        .await
        .unwrap();
    assert_eq!(report.device_name, "Living Room Light");
    assert!(report.findings.is_empty());
    assert!(!report.limitations.is_empty());
}
