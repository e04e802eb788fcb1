//! Engine configuration with documented constants
//!
//! Every tunable the engine relies on lives here, together with the
//! reasoning behind its default. Configuration is loaded from TOML and
//! passed explicitly to the components that need it.

use crate::core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the simulation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === ROLLOUT LIMITS ===
    /// Hard upper bound on the number of steps a single rollout may request
    ///
    /// Requests above this are rejected before the rollout starts.
    pub max_steps_cap: u64,

    // === CONDITION EVALUATION ===
    /// Tolerance used by `agent_at_position` when the condition omits one
    ///
    /// Continuous agents rarely land exactly on a target, so zero would make
    /// the condition practically unreachable. Half a cell works for both
    /// grid and continuous worlds at the default cell size.
    pub default_tolerance: f64,

    /// Radius of an agent's footprint in continuous worlds
    ///
    /// Used by `collision` and by the blocking check in kinematics.
    pub agent_radius: f64,

    /// Maximum time a custom script may take before it is treated as false
    pub script_timeout_ms: u64,

    // === POLICY ===
    /// Maximum time a remote inference call may take
    pub inference_timeout_ms: u64,

    /// Whether a failed inference call falls back to a random action
    ///
    /// When disabled, the first inference failure fails the rollout.
    pub inference_fallback: bool,

    /// Remote inference endpoint (base URL, without the `/runs/...` suffix)
    pub inference_url: Option<String>,

    /// Environment variable holding the bearer token for the inference endpoint
    pub inference_key_env: String,

    // === SCENE EDITING ===
    /// Reject a second agent in grid environments
    ///
    /// Mirrors the editor convention of a single live agent on a grid.
    pub grid_single_agent: bool,

    /// Number of snapshots kept for undo
    pub undo_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps_cap: 10_000,
            default_tolerance: 0.5,
            agent_radius: 0.5,
            script_timeout_ms: 250,
            inference_timeout_ms: 2_000,
            inference_fallback: true,
            inference_url: None,
            inference_key_env: "ENVSIM_INFERENCE_KEY".to_string(),
            grid_single_agent: true,
            undo_depth: 100,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Fill the inference endpoint from `ENVSIM_INFERENCE_URL` when the file left it unset
    pub fn with_env_overrides(mut self) -> Self {
        if self.inference_url.is_none() {
            self.inference_url = std::env::var("ENVSIM_INFERENCE_URL").ok();
        }
        self
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_steps_cap == 0 {
            return Err(EngineError::Config("max_steps_cap must be positive".into()));
        }

        if !(self.default_tolerance >= 0.0 && self.default_tolerance.is_finite()) {
            return Err(EngineError::Config(format!(
                "default_tolerance ({}) must be a finite non-negative number",
                self.default_tolerance
            )));
        }

        if !(self.agent_radius >= 0.0 && self.agent_radius.is_finite()) {
            return Err(EngineError::Config(format!(
                "agent_radius ({}) must be a finite non-negative number",
                self.agent_radius
            )));
        }

        if self.script_timeout_ms == 0 || self.inference_timeout_ms == 0 {
            return Err(EngineError::Config("timeouts must be positive".into()));
        }

        Ok(())
    }
}
