//! System-wide status aggregation.
//!
//! Samples a deterministic subset of the registry (the first N devices
//! in insertion order under the caller's filter), fans out five
//! analysis branches in parallel, and never lets one branch's failure
//! take down the others: a failed branch contributes an explicit
//! "unavailable" entry instead. Markdown output is reproducible for
//! the same inputs and registry state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use hearth_core::capability::Capability;
use hearth_core::config::BridgeConfig;
use hearth_core::device::Device;
use hearth_core::error::{Error, Result};
use hearth_core::event::DeviceEvent;
use hearth_core::ids::DeviceId;
use hearth_commands::{CommandAttempt, CommandStats, CommandTracker};
use hearth_devices::adapter::{with_deadline, DynAdapter};
use hearth_devices::registry::{DeviceFilter, DeviceRegistry, IndexHealth, RegistryStats};
use hearth_events::gaps::EventGap;
use hearth_events::query::{EventQuery, EventQueryEngine};

use crate::detectors::{
    AutomationConflictDetector, AutomationTriggerDetector, ConnectivityGapDetector,
    DetectorChain, DetectorInput, PatternDetector,
};
use crate::pattern::{rank, Pattern, PatternType, Severity};

/// Output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFormat {
    #[default]
    Markdown,
    Structured,
}

/// Parameters for one status run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    /// `None` or `"all"` covers every device; otherwise a room name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    /// Findings below this severity are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<Severity>,
    /// When false, only counts are reported, not individual findings.
    #[serde(default = "default_true")]
    pub include_patterns: bool,
    #[serde(default)]
    pub format: StatusFormat,
}

fn default_true() -> bool {
    true
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self {
            scope: None,
            capability: None,
            min_severity: None,
            include_patterns: true,
            format: StatusFormat::Markdown,
        }
    }
}

/// One analysis branch: data, or the reason it is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchResult<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

impl<T> BranchResult<T> {
    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                data: Some(data),
                unavailable: None,
            },
            Err(error) => Self {
                data: None,
                unavailable: Some(error.to_string()),
            },
        }
    }
}

/// A ranked pattern list that keeps its count when the list itself is
/// suppressed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<Pattern>,
}

/// Connectivity branch output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityReport {
    /// Display names of sampled devices the registry marks offline.
    pub offline: Vec<String>,
    pub findings: PatternSet,
    /// Devices whose history fetch failed, with reasons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_failures: Vec<String>,
}

/// One low battery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryLevel {
    pub device: String,
    pub level: f64,
}

/// Battery branch output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatteryReport {
    pub low: Vec<BatteryLevel>,
    /// Battery-capable devices whose state was read.
    pub checked: usize,
    /// Battery-capable devices whose state could not be read.
    pub unreadable: usize,
}

/// Counters for the Performance section. Deliberately free of
/// wall-clock timings so markdown output stays reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub devices_total: usize,
    pub devices_sampled: usize,
    pub events_scanned: usize,
    pub command_stats: CommandStats,
}

/// The structured status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatusReport {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub registry: RegistryStats,
    pub sampled: Vec<DeviceId>,
    pub connectivity: BranchResult<ConnectivityReport>,
    pub battery: BranchResult<BatteryReport>,
    pub automation: BranchResult<PatternSet>,
    pub anomalies: BranchResult<PatternSet>,
    pub index_health: BranchResult<IndexHealth>,
    pub performance: PerformanceReport,
}

/// Aggregator output: the structured report, plus markdown when asked
/// for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOutput {
    pub report: SystemStatusReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

struct Prefetched {
    device: Device,
    events_asc: Vec<DeviceEvent>,
    gaps: Vec<EventGap>,
    commands: Vec<CommandAttempt>,
    fetch_error: Option<String>,
}

/// Fans out the five status branches over a sampled device set.
pub struct StatusAggregator {
    registry: Arc<DeviceRegistry>,
    adapter: DynAdapter,
    engine: EventQueryEngine,
    tracker: Arc<CommandTracker>,
    sample_size: usize,
    adapter_timeout_ms: u64,
}

impl StatusAggregator {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        adapter: DynAdapter,
        tracker: Arc<CommandTracker>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            registry,
            engine: EventQueryEngine::new(adapter.clone(), config),
            adapter,
            tracker,
            sample_size: config.system_status_sample,
            adapter_timeout_ms: config.adapter_timeout_ms,
        }
    }

    /// Run one status aggregation anchored at `now`.
    pub async fn run(&self, request: &StatusRequest, now: DateTime<Utc>) -> Result<StatusOutput> {
        let mut filter = DeviceFilter::new();
        if let Some(scope) = request.scope.as_deref() {
            if !scope.trim().is_empty() && !scope.trim().eq_ignore_ascii_case("all") {
                let room = self
                    .registry
                    .room_by_name(scope)
                    .await?
                    .ok_or_else(|| Error::invalid_input("scope", format!("unknown room '{scope}'")))?;
                filter.room = Some(room);
            }
        }
        filter.capability = request.capability;

        let devices = self.registry.find(&filter).await?;
        let registry_stats = self.registry.stats().await;

        // Deterministic sample: the first N in registry insertion
        // order under the filter. No randomness, so two runs over the
        // same state report the same devices.
        let sample: Vec<Device> = devices.iter().take(self.sample_size).cloned().collect();
        tracing::debug!(
            total = devices.len(),
            sampled = sample.len(),
            "status aggregation started"
        );

        let prefetched = self.prefetch(&sample, now).await;
        let events_scanned = prefetched.iter().map(|p| p.events_asc.len()).sum();

        // Five branches, all-settled: each returns its own Result and
        // a failure in one leaves the others untouched.
        let (connectivity, battery, automation, anomalies, index_health) = tokio::join!(
            self.connectivity_branch(&prefetched),
            self.battery_branch(&sample),
            self.automation_branch(&prefetched),
            self.anomaly_branch(&prefetched),
            self.index_branch(),
        );

        let mut connectivity = BranchResult::from_result(connectivity);
        let mut battery = BranchResult::from_result(battery);
        let mut automation = BranchResult::from_result(automation);
        let mut anomalies = BranchResult::from_result(anomalies);
        let index_health = BranchResult::from_result(index_health);

        // Severity floor, then ranking.
        if let Some(floor) = request.min_severity {
            if let Some(report) = connectivity.data.as_mut() {
                report.findings.patterns.retain(|p| p.severity >= floor);
                report.findings.count = report.findings.patterns.len();
            }
            for set in [automation.data.as_mut(), anomalies.data.as_mut()]
                .into_iter()
                .flatten()
            {
                set.patterns.retain(|p| p.severity >= floor);
                set.count = set.patterns.len();
            }
            if let Some(report) = battery.data.as_mut() {
                // The floor applies to findings; battery levels map to
                // the same ladder the battery detector uses.
                report.low.retain(|entry| battery_severity(entry.level) >= floor);
            }
        }
        for set in [
            connectivity.data.as_mut().map(|r| &mut r.findings),
            automation.data.as_mut(),
            anomalies.data.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            rank(&mut set.patterns);
        }

        let mut report = SystemStatusReport {
            generated_at: now,
            scope: request.scope.clone(),
            registry: registry_stats,
            sampled: sample.iter().map(|device| device.id.clone()).collect(),
            connectivity,
            battery,
            automation,
            anomalies,
            index_health,
            performance: PerformanceReport {
                devices_total: devices.len(),
                devices_sampled: sample.len(),
                events_scanned,
                command_stats: self.tracker.stats(None, now).await,
            },
        };

        let markdown = match request.format {
            StatusFormat::Markdown => Some(render_markdown(&report, request.include_patterns)),
            StatusFormat::Structured => None,
        };
        if !request.include_patterns {
            strip_patterns(&mut report);
        }

        Ok(StatusOutput { report, markdown })
    }

    async fn prefetch(&self, sample: &[Device], now: DateTime<Utc>) -> Vec<Prefetched> {
        let fetches = sample.iter().map(|device| {
            let mut query = EventQuery::new(device.id.clone());
            query.human_readable = false;
            async move {
                let result = self.engine.device_events(&query, now).await;
                (device.clone(), result)
            }
        });
        let mut out = Vec::with_capacity(sample.len());
        for (device, result) in join_all(fetches).await {
            match result {
                Ok(fetched) => {
                    let mut events_asc = fetched.events;
                    events_asc.sort_by_key(|event| event.time);
                    let commands = self
                        .tracker
                        .commands_for_device(&device.id, fetched.range.start, fetched.range.end)
                        .await;
                    out.push(Prefetched {
                        device,
                        events_asc,
                        gaps: fetched.gaps,
                        commands,
                        fetch_error: None,
                    });
                }
                Err(error) => {
                    tracing::warn!(device_id = %device.id, %error, "status prefetch failed");
                    out.push(Prefetched {
                        device,
                        events_asc: Vec::new(),
                        gaps: Vec::new(),
                        commands: Vec::new(),
                        fetch_error: Some(error.to_string()),
                    });
                }
            }
        }
        out
    }

    async fn connectivity_branch(&self, prefetched: &[Prefetched]) -> Result<ConnectivityReport> {
        let detector = ConnectivityGapDetector::new();
        let mut findings = Vec::new();
        let mut fetch_failures = Vec::new();
        let mut offline = Vec::new();
        for item in prefetched {
            if !item.device.online {
                offline.push(item.device.display_name().to_string());
            }
            if let Some(reason) = &item.fetch_error {
                fetch_failures.push(format!("{}: {reason}", item.device.display_name()));
                continue;
            }
            findings.extend(detector.detect(&DetectorInput {
                device: &item.device,
                events: &item.events_asc,
                gaps: &item.gaps,
                commands: &item.commands,
            }));
        }
        Ok(ConnectivityReport {
            offline,
            findings: PatternSet {
                count: findings.len(),
                patterns: findings,
            },
            fetch_failures,
        })
    }

    async fn battery_branch(&self, sample: &[Device]) -> Result<BatteryReport> {
        let battery_devices: Vec<&Device> = sample
            .iter()
            .filter(|device| device.has_capability(Capability::Battery))
            .collect();
        if battery_devices.is_empty() {
            return Ok(BatteryReport {
                low: Vec::new(),
                checked: 0,
                unreadable: 0,
            });
        }

        let reads = battery_devices.iter().map(|device| async move {
            let state = with_deadline(
                self.adapter_timeout_ms,
                self.adapter.get_device_state(&device.id),
            )
            .await;
            (*device, state)
        });

        let mut low = Vec::new();
        let mut checked = 0usize;
        let mut unreadable = 0usize;
        let mut first_error: Option<Error> = None;
        for (device, state) in join_all(reads).await {
            match state {
                Ok(state) => {
                    checked += 1;
                    let level = state
                        .get(&Capability::Battery)
                        .and_then(|attributes| attributes.get("battery"))
                        .and_then(|value| value.as_f64());
                    match level {
                        Some(level) if level < 30.0 => low.push(BatteryLevel {
                            device: device.display_name().to_string(),
                            level,
                        }),
                        Some(_) => {}
                        None => unreadable += 1,
                    }
                }
                Err(error) => {
                    unreadable += 1;
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        // Only a total blackout makes the branch unavailable; partial
        // reads still carry information.
        if checked == 0 {
            if let Some(error) = first_error {
                return Err(error);
            }
        }
        low.sort_by(|a, b| {
            a.level
                .partial_cmp(&b.level)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(BatteryReport {
            low,
            checked,
            unreadable,
        })
    }

    async fn automation_branch(&self, prefetched: &[Prefetched]) -> Result<PatternSet> {
        let trigger = AutomationTriggerDetector::new();
        let conflict = AutomationConflictDetector::new();
        let mut patterns = Vec::new();
        for item in prefetched {
            if item.fetch_error.is_some() {
                continue;
            }
            let input = DetectorInput {
                device: &item.device,
                events: &item.events_asc,
                gaps: &item.gaps,
                commands: &item.commands,
            };
            patterns.extend(trigger.detect(&input));
            patterns.extend(conflict.detect(&input));
        }
        patterns.retain(|pattern| pattern.has_evidence());
        Ok(PatternSet {
            count: patterns.len(),
            patterns,
        })
    }

    async fn anomaly_branch(&self, prefetched: &[Prefetched]) -> Result<PatternSet> {
        let chain = DetectorChain::standard();
        let mut patterns = Vec::new();
        for item in prefetched {
            if item.fetch_error.is_some() {
                continue;
            }
            let found = chain.run(&DetectorInput {
                device: &item.device,
                events: &item.events_asc,
                gaps: &item.gaps,
                commands: &item.commands,
            });
            patterns.extend(
                found
                    .into_iter()
                    .filter(|pattern| pattern.pattern_type != PatternType::Normal),
            );
        }
        Ok(PatternSet {
            count: patterns.len(),
            patterns,
        })
    }

    async fn index_branch(&self) -> Result<IndexHealth> {
        Ok(self.registry.verify_indices().await)
    }
}

fn battery_severity(level: f64) -> Severity {
    if level < 10.0 {
        Severity::Critical
    } else if level < 20.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn strip_patterns(report: &mut SystemStatusReport) {
    if let Some(connectivity) = report.connectivity.data.as_mut() {
        connectivity.findings.patterns.clear();
    }
    for set in [report.automation.data.as_mut(), report.anomalies.data.as_mut()]
        .into_iter()
        .flatten()
    {
        set.patterns.clear();
    }
}

fn pattern_line(pattern: &Pattern) -> String {
    format!(
        "- [{}] {}: {}\n",
        pattern.severity.as_str(),
        pattern.device_id,
        pattern.description
    )
}

fn render_markdown(report: &SystemStatusReport, include_patterns: bool) -> String {
    let mut out = String::new();
    out.push_str("# System Status\n\n");

    out.push_str("## Device Summary\n");
    out.push_str(&format!(
        "- {} device(s): {} online, {} offline, {} room(s)\n",
        report.registry.total, report.registry.online, report.registry.offline, report.registry.rooms
    ));
    if let Some(scope) = &report.scope {
        out.push_str(&format!("- scope: {scope}\n"));
    }
    out.push_str(&format!(
        "- analyzed {} of {} device(s)\n\n",
        report.performance.devices_sampled, report.performance.devices_total
    ));

    out.push_str("## Connectivity\n");
    match (&report.connectivity.data, &report.connectivity.unavailable) {
        (Some(connectivity), _) => {
            for name in &connectivity.offline {
                out.push_str(&format!("- offline: {name}\n"));
            }
            for failure in &connectivity.fetch_failures {
                out.push_str(&format!("- history unavailable for {failure}\n"));
            }
            if connectivity.findings.count == 0 {
                out.push_str("- no connectivity findings\n");
            } else if include_patterns {
                for pattern in &connectivity.findings.patterns {
                    out.push_str(&pattern_line(pattern));
                }
            } else {
                out.push_str(&format!(
                    "- {} connectivity finding(s)\n",
                    connectivity.findings.count
                ));
            }
        }
        (None, Some(reason)) => out.push_str(&format!("- unavailable: {reason}\n")),
        (None, None) => out.push_str("- unavailable\n"),
    }
    out.push('\n');

    out.push_str("## Battery\n");
    match (&report.battery.data, &report.battery.unavailable) {
        (Some(battery), _) => {
            if battery.checked == 0 && battery.unreadable == 0 {
                out.push_str("- no battery-powered devices in sample\n");
            } else {
                for entry in &battery.low {
                    out.push_str(&format!("- {}: {:.0}%\n", entry.device, entry.level));
                }
                out.push_str(&format!(
                    "- checked {} device(s), {} unreadable\n",
                    battery.checked, battery.unreadable
                ));
            }
        }
        (None, Some(reason)) => out.push_str(&format!("- unavailable: {reason}\n")),
        (None, None) => out.push_str("- unavailable\n"),
    }
    out.push('\n');

    for (header, branch) in [
        ("## Automation\n", &report.automation),
        ("## Anomalies\n", &report.anomalies),
    ] {
        out.push_str(header);
        match (&branch.data, &branch.unavailable) {
            (Some(set), _) => {
                if set.count == 0 {
                    out.push_str("- none\n");
                } else if include_patterns {
                    for pattern in &set.patterns {
                        out.push_str(&pattern_line(pattern));
                    }
                } else {
                    out.push_str(&format!("- {} finding(s)\n", set.count));
                }
            }
            (None, Some(reason)) => out.push_str(&format!("- unavailable: {reason}\n")),
            (None, None) => out.push_str("- unavailable\n"),
        }
        out.push('\n');
    }

    out.push_str("## Index Health\n");
    match (&report.index_health.data, &report.index_health.unavailable) {
        (Some(health), _) => {
            if health.consistent {
                out.push_str(&format!(
                    "- consistent: {} device(s), {} name, {} alias, {} room, {} platform, {} capability entries\n",
                    health.devices,
                    health.name_entries,
                    health.alias_entries,
                    health.room_entries,
                    health.platform_entries,
                    health.capability_entries
                ));
            } else {
                for problem in &health.problems {
                    out.push_str(&format!("- PROBLEM: {problem}\n"));
                }
            }
        }
        (None, Some(reason)) => out.push_str(&format!("- unavailable: {reason}\n")),
        (None, None) => out.push_str("- unavailable\n"),
    }
    out.push('\n');

    out.push_str("## Performance\n");
    out.push_str(&format!(
        "- scanned {} event(s) across {} sampled device(s)\n",
        report.performance.events_scanned, report.performance.devices_sampled
    ));
    let stats = &report.performance.command_stats;
    out.push_str(&format!(
        "- commands last {}h: {} total, {} failed ({:.0}% success)\n",
        stats.window_hours,
        stats.total,
        stats.failure,
        stats.success_rate * 100.0
    ));

    out
}
