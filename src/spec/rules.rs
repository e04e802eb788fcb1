//! Reward, termination and event rule definitions

use crate::core::types::{ObjectId, RuleId, Vec2};
use crate::spec::conditions::ConditionSpec;
use crate::spec::objects::{ObjectType, Properties, Size};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    pub id: RuleId,
    pub condition: ConditionSpec,
    pub reward: f64,
    /// Dense signal rather than a sparse event reward; reporting only
    #[serde(default)]
    pub shaping: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationRule {
    pub id: RuleId,
    pub condition: ConditionSpec,
    /// Overrides the success classification of the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl TerminationRule {
    pub fn is_success(&self) -> bool {
        self.success
            .unwrap_or_else(|| self.condition.is_success_shaped())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    SpawnObject,
    ModifyProperty,
    RemoveObject,
    Custom,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRule {
    pub id: RuleId,
    pub condition: ConditionSpec,
    pub action: EventAction,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Fire at most once per rollout
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub once: bool,
}

/// Typed form of an event rule's action and params
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    Spawn(SpawnParams),
    Modify(ModifyParams),
    Remove(RemoveParams),
    Custom(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnParams {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub position: Vec2,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyParams {
    pub object_id: ObjectId,
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParams {
    pub object_id: ObjectId,
}

impl EventRule {
    /// Decode `params` according to `action`
    pub fn effect(&self) -> Result<EventEffect, String> {
        let decode_err = |e: serde_json::Error| format!("event rule '{}': {}", self.id, e);
        match self.action {
            EventAction::SpawnObject => serde_json::from_value(self.params.clone())
                .map(EventEffect::Spawn)
                .map_err(decode_err),
            EventAction::ModifyProperty => serde_json::from_value(self.params.clone())
                .map(EventEffect::Modify)
                .map_err(decode_err),
            EventAction::RemoveObject => serde_json::from_value(self.params.clone())
                .map(EventEffect::Remove)
                .map_err(decode_err),
            EventAction::Custom => Ok(EventEffect::Custom(self.params.clone())),
            EventAction::Unknown => Err(format!("event rule '{}': unknown action", self.id)),
        }
    }
}

/// The three rule collections of an environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rewards: Vec<RewardRule>,
    #[serde(default)]
    pub terminations: Vec<TerminationRule>,
    #[serde(default)]
    pub events: Vec<EventRule>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty() && self.terminations.is_empty() && self.events.is_empty()
    }

    /// All rule ids in declaration order (rewards, terminations, events)
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rewards
            .iter()
            .map(|r| r.id.as_str())
            .chain(self.terminations.iter().map(|r| r.id.as_str()))
            .chain(self.events.iter().map(|r| r.id.as_str()))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids().any(|existing| existing == id)
    }

    /// Every condition with the id of the rule that owns it
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &ConditionSpec)> {
        self.rewards
            .iter()
            .map(|r| (r.id.as_str(), &r.condition))
            .chain(self.terminations.iter().map(|r| (r.id.as_str(), &r.condition)))
            .chain(self.events.iter().map(|r| (r.id.as_str(), &r.condition)))
    }

    /// Whether any termination rule is a timeout
    pub fn has_timeout(&self) -> bool {
        self.terminations
            .iter()
            .any(|r| matches!(r.condition, ConditionSpec::Timeout { .. }))
    }

    /// Remove the rule with this id from whichever collection holds it
    ///
    /// Returns true when a rule was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.rewards.len() + self.terminations.len() + self.events.len();
        self.rewards.retain(|r| r.id != id);
        self.terminations.retain(|r| r.id != id);
        self.events.retain(|r| r.id != id);
        before != self.rewards.len() + self.terminations.len() + self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_termination_success_override() {
        let rule = TerminationRule {
            id: "t1".into(),
            condition: ConditionSpec::reach_goal(),
            success: None,
        };
        assert!(rule.is_success());

        let checkpoint = TerminationRule {
            id: "t2".into(),
            condition: ConditionSpec::AgentAtObject {
                agent_id: "agent_1".into(),
                object_id: "exit".into(),
            },
            success: Some(true),
        };
        assert!(checkpoint.is_success());

        let trap = TerminationRule {
            id: "t3".into(),
            condition: ConditionSpec::hit_trap(),
            success: None,
        };
        assert!(!trap.is_success());
    }

    #[test]
    fn test_event_effect_decoding() {
        let rule: EventRule = serde_json::from_value(json!({
            "id": "open_door",
            "condition": {"type": "collect_key"},
            "action": "modify_property",
            "params": {"objectId": "door_1", "key": "open", "value": true}
        }))
        .unwrap();

        match rule.effect().unwrap() {
            EventEffect::Modify(p) => {
                assert_eq!(p.object_id, "door_1");
                assert_eq!(p.value, json!(true));
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_malformed_params_reported() {
        let rule = EventRule {
            id: "spawn".into(),
            condition: ConditionSpec::Step,
            action: EventAction::SpawnObject,
            params: json!({"position": "nowhere"}),
            once: false,
        };
        let err = rule.effect().unwrap_err();
        assert!(err.contains("spawn"));
    }

    #[test]
    fn test_rule_set_remove() {
        let mut rules = RuleSet::default();
        rules.rewards.push(RewardRule {
            id: "r1".into(),
            condition: ConditionSpec::Step,
            reward: -0.1,
            shaping: true,
        });
        assert!(rules.contains_id("r1"));
        assert!(rules.remove("r1"));
        assert!(!rules.remove("r1"));
        assert!(rules.is_empty());
    }
}
