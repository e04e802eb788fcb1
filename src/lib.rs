//! envsim - Environment simulation and rule evaluation engine

pub mod conditions;
pub mod core;
pub mod policy;
pub mod rollout;
pub mod rules;
pub mod scene;
pub mod spatial;
pub mod spec;
pub mod validation;

pub use crate::core::{EngineConfig, EngineError, Result};
pub use crate::policy::PolicyKind;
pub use crate::rollout::{rollout, Capabilities, RolloutRequest, RolloutStepper, SimulatorResult};
pub use crate::scene::{migrate_from_legacy, SceneMutator};
pub use crate::spec::EnvSpec;
pub use crate::validation::{validate, validate_spec, ValidationReport};
