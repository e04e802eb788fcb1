//! Condition descriptions used by reward, termination and event rules

use crate::core::types::{AgentId, ObjectId, Vec2};
use serde::{Deserialize, Serialize};

/// A condition over the world state
///
/// Closed set of kinds; a document naming a kind this build does not know
/// deserializes into `Unknown`, which always evaluates to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConditionSpec {
    /// Step counter has reached `steps`
    Timeout { steps: u64 },
    /// True on every step
    Step,
    ReachGoal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
    },
    HitTrap {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
    },
    CollectKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
    },
    AgentAtPosition {
        agent_id: AgentId,
        position: Vec2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },
    AgentAtObject {
        agent_id: AgentId,
        object_id: ObjectId,
    },
    /// Either side may name an agent or an object
    Collision { a: String, b: String },
    InsideRegion {
        agent_id: AgentId,
        region_id: ObjectId,
    },
    Custom { script: String },
    #[serde(other)]
    Unknown,
}

/// What kind of entity a condition expects an id to resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Agent,
    Object,
    /// Either an agent or an object
    Entity,
}

impl ConditionSpec {
    pub fn reach_goal() -> Self {
        ConditionSpec::ReachGoal { agent_id: None }
    }

    pub fn hit_trap() -> Self {
        ConditionSpec::HitTrap { agent_id: None }
    }

    pub fn collect_key() -> Self {
        ConditionSpec::CollectKey { agent_id: None }
    }

    /// Serialized tag of this condition
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConditionSpec::Timeout { .. } => "timeout",
            ConditionSpec::Step => "step",
            ConditionSpec::ReachGoal { .. } => "reach_goal",
            ConditionSpec::HitTrap { .. } => "hit_trap",
            ConditionSpec::CollectKey { .. } => "collect_key",
            ConditionSpec::AgentAtPosition { .. } => "agent_at_position",
            ConditionSpec::AgentAtObject { .. } => "agent_at_object",
            ConditionSpec::Collision { .. } => "collision",
            ConditionSpec::InsideRegion { .. } => "inside_region",
            ConditionSpec::Custom { .. } => "custom",
            ConditionSpec::Unknown => "unknown",
        }
    }

    /// Whether a termination on this condition counts as success
    ///
    /// Only `reach_goal` is success-shaped. Termination rules can override
    /// this per rule.
    pub fn is_success_shaped(&self) -> bool {
        matches!(self, ConditionSpec::ReachGoal { .. })
    }

    /// Ids this condition refers to, with the kind each must resolve to
    pub fn references(&self) -> Vec<(RefKind, &str)> {
        match self {
            ConditionSpec::ReachGoal { agent_id }
            | ConditionSpec::HitTrap { agent_id }
            | ConditionSpec::CollectKey { agent_id } => agent_id
                .as_deref()
                .map(|id| vec![(RefKind::Agent, id)])
                .unwrap_or_default(),
            ConditionSpec::AgentAtPosition { agent_id, .. } => vec![(RefKind::Agent, agent_id)],
            ConditionSpec::AgentAtObject { agent_id, object_id } => {
                vec![(RefKind::Agent, agent_id), (RefKind::Object, object_id)]
            }
            ConditionSpec::Collision { a, b } => vec![(RefKind::Entity, a), (RefKind::Entity, b)],
            ConditionSpec::InsideRegion { agent_id, region_id } => {
                vec![(RefKind::Agent, agent_id), (RefKind::Object, region_id)]
            }
            ConditionSpec::Timeout { .. }
            | ConditionSpec::Step
            | ConditionSpec::Custom { .. }
            | ConditionSpec::Unknown => Vec::new(),
        }
    }
}
