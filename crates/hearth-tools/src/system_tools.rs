//! Scene execution and connection testing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use hearth_core::config::BridgeConfig;
use hearth_core::error::Error as CoreError;
use hearth_commands::{token_status, CommandTracker, TokenInfo};
use hearth_devices::adapter::{with_deadline, DynAdapter, Scene};

use crate::error::Result;
use crate::tool::{object_schema, string_property, Tool, ToolOutput};

// ========== execute_scene ==========

/// Run a platform scene by id or name.
pub struct ExecuteSceneTool {
    adapter: DynAdapter,
    timeout_ms: u64,
}

impl ExecuteSceneTool {
    pub fn new(adapter: DynAdapter, config: &BridgeConfig) -> Self {
        Self {
            adapter,
            timeout_ms: config.adapter_timeout_ms,
        }
    }

    /// Exact id first, then case-insensitive name; several name
    /// matches are ambiguous.
    fn match_scene<'a>(scenes: &'a [Scene], query: &str) -> std::result::Result<&'a Scene, CoreError> {
        if let Some(scene) = scenes.iter().find(|scene| scene.id == query) {
            return Ok(scene);
        }
        let needle = query.trim().to_lowercase();
        let matches: Vec<&Scene> = scenes
            .iter()
            .filter(|scene| scene.name.trim().to_lowercase() == needle)
            .collect();
        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(CoreError::DeviceNotFound {
                query: query.to_string(),
                near_matches: scenes.iter().map(|scene| scene.name.clone()).take(3).collect(),
            }),
            _ => Err(CoreError::Ambiguous {
                query: query.to_string(),
                candidates: matches.iter().map(|scene| scene.id.clone()).collect(),
            }),
        }
    }
}

#[async_trait]
impl Tool for ExecuteSceneTool {
    fn name(&self) -> &str {
        "execute_scene"
    }

    fn description(&self) -> &str {
        "Execute a platform scene by id or exact name"
    }

    fn parameters(&self) -> Value {
        object_schema(
            serde_json::json!({
                "scene": string_property("Scene id or exact scene name"),
            }),
            vec!["scene"],
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let query = args["scene"].as_str().unwrap_or_default();
        let attempted = format!("execute scene '{query}'");

        let scenes = match with_deadline(self.timeout_ms, self.adapter.list_scenes(None)).await {
            Ok(scenes) => scenes,
            Err(error) => return Ok(ToolOutput::failure(&attempted, &error)),
        };
        let scene = match Self::match_scene(&scenes, query) {
            Ok(scene) => scene.clone(),
            Err(error) => return Ok(ToolOutput::failure(&attempted, &error)),
        };

        match with_deadline(self.timeout_ms, self.adapter.execute_scene(&scene.id)).await {
            Ok(()) => Ok(ToolOutput::success(
                format!("executed scene '{}'", scene.name),
                serde_json::json!({ "scene_id": scene.id, "scene_name": scene.name }),
            )),
            Err(error) => Ok(ToolOutput::failure(&attempted, &error)),
        }
    }
}

// ========== test_connection ==========

/// Probe platform reachability, token lifetime, and rate-limit
/// pressure in one call.
pub struct TestConnectionTool {
    adapter: DynAdapter,
    tracker: Arc<CommandTracker>,
    token: Option<TokenInfo>,
    timeout_ms: u64,
}

impl TestConnectionTool {
    pub fn new(
        adapter: DynAdapter,
        tracker: Arc<CommandTracker>,
        token: Option<TokenInfo>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            adapter,
            tracker,
            token,
            timeout_ms: config.adapter_timeout_ms,
        }
    }
}

#[async_trait]
impl Tool for TestConnectionTool {
    fn name(&self) -> &str {
        "test_connection"
    }

    fn description(&self) -> &str {
        "Verify the platform connection and report token expiry and rate-limit pressure"
    }

    fn parameters(&self) -> Value {
        object_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        self.validate_args(&args)?;
        let now = Utc::now();
        let token = self.token.as_ref().map(|token| token_status(token, now));
        let rate_limit = self.tracker.rate_limit_status(None, now).await;

        match with_deadline(self.timeout_ms, self.adapter.list_locations()).await {
            Ok(locations) => {
                let mut summary = format!("connection ok, {} location(s)", locations.len());
                if let Some(token) = &token {
                    if token.expiring_soon {
                        summary.push_str(&format!(", token expires in {}", token.remaining));
                    }
                }
                Ok(ToolOutput::success(
                    summary,
                    serde_json::json!({
                        "locations": locations,
                        "token": token,
                        "rate_limit": rate_limit,
                    }),
                ))
            }
            Err(error) => {
                let mut output = ToolOutput::failure("reach the platform", &error);
                // The probe failed, but expiry and throttling context
                // still helps the caller reason about why.
                output.data = serde_json::json!({
                    "token": token,
                    "rate_limit": rate_limit,
                });
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hearth_devices::testing::SimulatedAdapter;

    fn scene(id: &str, name: &str) -> Scene {
        Scene {
            id: id.into(),
            name: name.into(),
            location_id: None,
        }
    }

    #[tokio::test]
    async fn test_scene_by_name() {
        let adapter = Arc::new(
            SimulatedAdapter::new()
                .with_scene(scene("s1", "Movie Night"))
                .with_scene(scene("s2", "Good Morning")),
        );
        let tool = ExecuteSceneTool::new(adapter.clone(), &BridgeConfig::default());
        let output = tool
            .execute(serde_json::json!({ "scene": "movie night" }))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(adapter.executed_scenes(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_scene_ambiguous_name() {
        let adapter = Arc::new(
            SimulatedAdapter::new()
                .with_scene(scene("s1", "Evening"))
                .with_scene(scene("s2", "Evening")),
        );
        let tool = ExecuteSceneTool::new(adapter, &BridgeConfig::default());
        let output = tool
            .execute(serde_json::json!({ "scene": "Evening" }))
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(
            output.error.unwrap().kind,
            hearth_core::error::ErrorKind::Ambiguous
        );
    }

    #[tokio::test]
    async fn test_connection_probe_reports_token() {
        let adapter = Arc::new(SimulatedAdapter::new().with_location(
            hearth_devices::adapter::Location {
                id: "loc1".into(),
                name: "Home".into(),
            },
        ));
        let token = TokenInfo {
            created_at: Utc::now() - Duration::days(1),
            expires_at: Utc::now() + Duration::minutes(30),
        };
        let tool = TestConnectionTool::new(
            adapter,
            Arc::new(CommandTracker::new()),
            Some(token),
            &BridgeConfig::default(),
        );
        let output = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(output.success);
        assert!(output.summary.contains("token expires in"));
        assert_eq!(output.data["token"]["expiring_soon"], true);
    }

    #[tokio::test]
    async fn test_connection_probe_failure_keeps_context() {
        let adapter = Arc::new(SimulatedAdapter::new().fail_on(
            "list_locations",
            CoreError::Unauthorized("token rejected".into()),
        ));
        let tool = TestConnectionTool::new(
            adapter,
            Arc::new(CommandTracker::new()),
            None,
            &BridgeConfig::default(),
        );
        let output = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(!output.success);
        assert_eq!(
            output.error.unwrap().kind,
            hearth_core::error::ErrorKind::Unauthorized
        );
        assert!(output.data["rate_limit"]["hits"].is_number());
    }
}
