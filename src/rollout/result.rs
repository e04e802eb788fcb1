//! Step trace and rollout result documents

use crate::core::error::Result;
use crate::core::types::{AgentId, ObjectId, RuleId, StepIndex, Vec2};
use crate::policy::PolicyKind;
use crate::spec::{Action, AgentSpec, EventAction, ObjectSpec, ObjectType};
use serde::{Deserialize, Serialize};

/// One reward rule's contribution to a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardContribution {
    pub rule_id: RuleId,
    pub value: f64,
    pub reason: String,
    pub shaping: bool,
}

/// Something noteworthy that happened during a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StepEvent {
    /// An event rule fired; the descriptor is kept for callers that handle `custom`
    EventRule {
        rule_id: RuleId,
        action: EventAction,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        params: serde_json::Value,
    },
    ObjectSpawned {
        rule_id: RuleId,
        object_id: ObjectId,
        object_type: ObjectType,
    },
    PropertyModified {
        rule_id: RuleId,
        object_id: ObjectId,
        key: String,
    },
    ObjectRemoved {
        rule_id: RuleId,
        object_id: ObjectId,
    },
    EventFailed {
        rule_id: RuleId,
        reason: String,
    },
    BoundsClamped {
        agent_id: AgentId,
        attempted: Vec2,
        clamped: Vec2,
    },
    MoveBlocked {
        agent_id: AgentId,
        object_id: ObjectId,
    },
    PolicyFallback {
        reason: String,
    },
    ConditionFailed {
        rule_id: RuleId,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub events: Vec<StepEvent>,
    pub rewards: Vec<RewardContribution>,
}

/// World snapshot recorded with each step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub agents: Vec<AgentSpec>,
    pub objects: Vec<ObjectSpec>,
    pub step: StepIndex,
    pub total_reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub state: StepState,
    /// Joint action, one entry per agent in declaration order
    pub action: Vec<Action>,
    pub reward: f64,
    pub done: bool,
}

/// Fully materialized outcome of one rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorResult {
    pub steps: Vec<Step>,
    pub total_reward: f64,
    pub episode_length: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_rule_id: Option<RuleId>,
    pub policy: PolicyKind,
    pub seed: u64,
    /// Steps where the trained model failed and a random action was used
    #[serde(default)]
    pub fallback_count: u32,
}

impl SimulatorResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reward contributions across all steps, in order
    pub fn reward_breakdown(&self) -> impl Iterator<Item = &RewardContribution> {
        self.steps.iter().flat_map(|s| s.state.info.rewards.iter())
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} after {} steps, total reward {:.3}{}",
            if self.success { "success" } else { "no success" },
            self.episode_length,
            self.total_reward,
            self.termination_reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_event_tags() {
        let event = StepEvent::BoundsClamped {
            agent_id: "agent_1".into(),
            attempted: Vec2::new(-1.0, 0.0),
            clamped: Vec2::new(0.0, 0.0),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("bounds_clamped"));
        assert_eq!(value["agentId"], json!("agent_1"));
    }

    #[test]
    fn test_event_rule_descriptor_omits_null_params() {
        let event = StepEvent::EventRule {
            rule_id: "e1".into(),
            action: EventAction::RemoveObject,
            params: serde_json::Value::Null,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("params").is_none());
        assert_eq!(value["action"], json!("remove_object"));
    }

    #[test]
    fn test_summary_mentions_reason() {
        let result = SimulatorResult {
            steps: vec![],
            total_reward: 10.0,
            episode_length: 8,
            success: true,
            termination_reason: Some("reach_goal".into()),
            termination_rule_id: Some("t1".into()),
            policy: PolicyKind::Greedy,
            seed: 7,
            fallback_count: 0,
        };
        assert_eq!(result.summary(), "success after 8 steps, total reward 10.000 (reach_goal)");
    }
}
