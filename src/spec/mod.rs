//! Environment description: world, entities, action space and rules
//!
//! Pure data with structural invariants. Behaviour lives in the scene,
//! conditions, rules and rollout modules.

pub mod action_space;
pub mod agents;
pub mod conditions;
pub mod env_spec;
pub mod objects;
pub mod rules;
pub mod world;

pub use action_space::{Action, ActionSpace, GRID_DIRECTIONS};
pub use agents::{AgentSpec, Controller};
pub use conditions::{ConditionSpec, RefKind};
pub use env_spec::{allocate_id, EnvSpec, EpisodeConfig};
pub use objects::{ObjectSpec, ObjectType, Properties, Size};
pub use rules::{
    EventAction, EventEffect, EventRule, ModifyParams, RemoveParams, RewardRule, RuleSet,
    SpawnParams, TerminationRule,
};
pub use world::{Cell, CoordinateSystem, EnvType, World};
