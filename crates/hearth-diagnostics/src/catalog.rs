//! Recommendation catalog.
//!
//! Recommendations are generated from findings, never free-composed:
//! each catalog entry is a template keyed by pattern type whose
//! placeholders bind to concrete evidence (device name, gap duration,
//! battery level). A template whose substitution would leave any
//! placeholder unbound is dropped rather than emitted half-filled.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::device::Device;
use hearth_core::error::{Error, Result};

use crate::pattern::{Pattern, PatternType};

/// One template, bound to a pattern type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub pattern_type: PatternType,
    /// Template with `{placeholder}` variables.
    pub template: String,
}

/// An action suggestion bound to the findings that justify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    /// Ids of the findings this recommendation cites. Never empty.
    pub finding_ids: Vec<String>,
    pub action: String,
}

/// Static catalog with optional file override.
pub struct RecommendationCatalog {
    entries: HashMap<PatternType, Vec<String>>,
}

impl RecommendationCatalog {
    /// The compiled-in catalog.
    pub fn builtin() -> Self {
        let mut entries: HashMap<PatternType, Vec<String>> = HashMap::new();
        entries.insert(
            PatternType::AutomationTrigger,
            vec![
                "Review the automations that touch {device}: {attribute} changed {count} \
                 time(s) without a command from this bridge."
                    .to_string(),
            ],
        );
        entries.insert(
            PatternType::RapidChange,
            vec![
                "Inspect {device} for a faulty relay or dueling automations; {attribute} \
                 changed {count} times within seconds."
                    .to_string(),
            ],
        );
        entries.insert(
            PatternType::ConnectivityGap,
            vec![
                "Check power and network for {device}; it reported nothing for {duration}."
                    .to_string(),
            ],
        );
        entries.insert(
            PatternType::BatteryDecline,
            vec![
                "Replace the battery in {device}; it is at {battery}% and losing about \
                 {rate}% per day."
                    .to_string(),
            ],
        );
        entries.insert(
            PatternType::AutomationConflict,
            vec![
                "Untangle the controllers of {device}: {attribute} received opposing \
                 commands within seconds of each other."
                    .to_string(),
            ],
        );
        entries.insert(
            PatternType::Anomaly,
            vec!["Review recent activity of {device}; {attribute} behaved outside its usual pattern."
                .to_string()],
        );
        Self { entries }
    }

    /// The catalog an embedder configured: the builtin one, with the
    /// override file applied when `recommendation_catalog_path` is
    /// set.
    pub fn from_config(config: &hearth_core::config::BridgeConfig) -> Result<Self> {
        match &config.recommendation_catalog_path {
            Some(path) => Self::with_overrides(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Builtin catalog with entries replaced, per pattern type, by the
    /// given file. The file is a JSON array of [`CatalogEntry`].
    pub fn with_overrides(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::invalid_input(
                "recommendation_catalog_path",
                format!("could not read catalog: {e}"),
            )
        })?;
        let overrides: Vec<CatalogEntry> = serde_json::from_str(&raw).map_err(|e| {
            Error::invalid_input(
                "recommendation_catalog_path",
                format!("could not parse catalog: {e}"),
            )
        })?;

        let mut catalog = Self::builtin();
        let mut replaced: HashMap<PatternType, Vec<String>> = HashMap::new();
        for entry in overrides {
            replaced
                .entry(entry.pattern_type)
                .or_default()
                .push(entry.template);
        }
        for (pattern_type, templates) in replaced {
            catalog.entries.insert(pattern_type, templates);
        }
        Ok(catalog)
    }

    /// Produce the recommendations a finding supports. Placeholders
    /// bind from the device and the finding's detail map; templates
    /// with an unbound placeholder are dropped.
    pub fn recommend(&self, pattern: &Pattern, device: &Device) -> Vec<Recommendation> {
        let Some(templates) = self.entries.get(&pattern.pattern_type) else {
            return Vec::new();
        };

        let mut vars: HashMap<&str, String> = HashMap::new();
        vars.insert("device", device.display_name().to_string());
        if let Some(room) = &device.room {
            vars.insert("room", room.clone());
        }
        if let Some(manufacturer) = &device.manufacturer {
            vars.insert("manufacturer", manufacturer.clone());
        }
        if let Some(model) = &device.model {
            vars.insert("model", model.clone());
        }
        for (key, value) in &pattern.details {
            vars.insert(key.as_str(), value.clone());
        }

        templates
            .iter()
            .filter_map(|template| {
                let action = substitute(template, &vars)?;
                Some(Recommendation {
                    id: Uuid::new_v4().to_string(),
                    finding_ids: vec![pattern.id.clone()],
                    action,
                })
            })
            .collect()
    }
}

/// Fill `{placeholder}` variables. `None` when any placeholder is
/// missing or binds to an empty string.
fn substitute(template: &str, vars: &HashMap<&str, String>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let name = &after[..close];
        match vars.get(name) {
            Some(value) if !value.trim().is_empty() => out.push_str(value),
            _ => {
                tracing::debug!(placeholder = name, "recommendation dropped: unbound placeholder");
                return None;
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}
