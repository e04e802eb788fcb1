//! Custom script capability
//!
//! The engine never executes script text itself. A `ScriptRunner` supplied by
//! the host does, and its answer is reduced to a boolean.

use crate::conditions::ConditionError;
use crate::rollout::state::SimState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Value produced by a custom script
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Bool(bool),
    Number(f64),
}

impl ScriptValue {
    /// Booleans as-is; numbers are true when finite and non-zero
    pub fn truthy(self) -> bool {
        match self {
            ScriptValue::Bool(b) => b,
            ScriptValue::Number(n) => n.is_finite() && n != 0.0,
        }
    }
}

/// Host capability that evaluates `custom` condition scripts
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str, state: &SimState) -> Result<ScriptValue, ConditionError>;
}

/// Runner used when the host provides none; every script fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScriptRunner;

#[async_trait]
impl ScriptRunner for NoScriptRunner {
    async fn run(&self, _script: &str, _state: &SimState) -> Result<ScriptValue, ConditionError> {
        Err(ConditionError::ScriptUnavailable)
    }
}
