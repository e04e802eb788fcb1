//! Condition DSL interpreter

pub mod evaluator;
pub mod script;

pub use evaluator::ConditionEvaluator;
pub use script::{NoScriptRunner, ScriptRunner, ScriptValue};

use crate::core::error::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Why a condition could not be decided
///
/// The rollout treats all of these as "not satisfied".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("unknown object '{0}'")]
    UnknownObject(String),

    #[error("no agent or object with id '{0}'")]
    UnknownEntity(String),

    #[error("unknown condition kind")]
    UnknownKind,

    #[error("no script runner available")]
    ScriptUnavailable,

    #[error("script timed out after {0:?}")]
    ScriptTimeout(Duration),

    #[error("script failed: {0}")]
    ScriptFailed(String),
}

impl From<ConditionError> for EngineError {
    fn from(e: ConditionError) -> Self {
        EngineError::Condition(e.to_string())
    }
}
