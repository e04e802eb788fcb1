//! Per-tick rule evaluation
//!
//! Rewards are additive, terminations are first-match, events are collected
//! and applied to the object list after the step has been recorded.

use crate::conditions::ConditionEvaluator;
use crate::core::types::{RuleId, Vec2};
use crate::rollout::result::{RewardContribution, StepEvent};
use crate::rollout::state::SimState;
use crate::spec::{ConditionSpec, EventEffect, RuleSet};
use ahash::AHashSet;

/// Reason recorded when no rule ended the episode before the step limit
pub const MAX_STEPS_REACHED: &str = "max_steps_reached";

/// Per-rollout inputs to a tick
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Effective step limit of the rollout
    pub max_steps: u64,
    /// `once` event rules that already fired
    pub spent_once: &'a AHashSet<RuleId>,
}

/// How the episode ended
#[derive(Debug, Clone, PartialEq)]
pub struct Termination {
    /// `None` for the max-steps backstop
    pub rule_id: Option<RuleId>,
    pub reason: String,
    pub success: bool,
}

impl Termination {
    pub fn max_steps() -> Self {
        Self {
            rule_id: None,
            reason: MAX_STEPS_REACHED.to_string(),
            success: false,
        }
    }
}

/// An event rule whose condition held this tick
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    pub rule_id: RuleId,
    pub once: bool,
    pub effect: EventEffect,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub reward_delta: f64,
    pub reward_breakdown: Vec<RewardContribution>,
    pub events: Vec<StepEvent>,
    pub fired: Vec<FiredEvent>,
    pub terminated: bool,
    pub termination: Option<Termination>,
}

/// Evaluates a rule set against the state after each action
#[derive(Debug, Clone)]
pub struct RuleEngine {
    evaluator: ConditionEvaluator,
}

impl RuleEngine {
    pub fn new(evaluator: ConditionEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub async fn tick(&self, state: &SimState, rules: &RuleSet, ctx: TickContext<'_>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        // Rewards: every satisfied rule, declaration order
        for rule in &rules.rewards {
            if self.holds(&rule.id, &rule.condition, state, &mut outcome.events).await {
                outcome.reward_delta += rule.reward;
                outcome.reward_breakdown.push(RewardContribution {
                    rule_id: rule.id.clone(),
                    value: rule.reward,
                    reason: describe(&rule.condition),
                    shaping: rule.shaping,
                });
            }
        }

        // Terminations: first satisfied rule wins
        for rule in &rules.terminations {
            if self.holds(&rule.id, &rule.condition, state, &mut outcome.events).await {
                outcome.terminated = true;
                outcome.termination = Some(Termination {
                    rule_id: Some(rule.id.clone()),
                    reason: rule.condition.kind_name().to_string(),
                    success: rule.is_success(),
                });
                break;
            }
        }

        // Events: every satisfied rule not yet spent
        for rule in &rules.events {
            if rule.once && ctx.spent_once.contains(&rule.id) {
                continue;
            }
            if !self.holds(&rule.id, &rule.condition, state, &mut outcome.events).await {
                continue;
            }
            outcome.events.push(StepEvent::EventRule {
                rule_id: rule.id.clone(),
                action: rule.action,
                params: rule.params.clone(),
            });
            match rule.effect() {
                Ok(effect) => outcome.fired.push(FiredEvent {
                    rule_id: rule.id.clone(),
                    once: rule.once,
                    effect,
                }),
                Err(reason) => outcome.events.push(StepEvent::EventFailed {
                    rule_id: rule.id.clone(),
                    reason,
                }),
            }
        }

        if !outcome.terminated && state.step >= ctx.max_steps {
            outcome.terminated = true;
            outcome.termination = Some(Termination::max_steps());
        }

        tracing::debug!(
            step = state.step,
            reward = outcome.reward_delta,
            terminated = outcome.terminated,
            events = outcome.fired.len(),
            "rules evaluated"
        );
        outcome
    }

    /// Evaluate one rule condition, recording a diagnostic when it cannot be decided
    async fn holds(
        &self,
        rule_id: &str,
        condition: &ConditionSpec,
        state: &SimState,
        events: &mut Vec<StepEvent>,
    ) -> bool {
        match self.evaluator.evaluate_checked(condition, state).await {
            Ok(satisfied) => satisfied,
            Err(e) => {
                events.push(StepEvent::ConditionFailed {
                    rule_id: rule_id.to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }
}

/// Human readable reason for a satisfied condition
pub fn describe(condition: &ConditionSpec) -> String {
    let who = |agent_id: &Option<String>| agent_id.clone().unwrap_or_else(|| "agent".into());
    match condition {
        ConditionSpec::Timeout { steps } => format!("timeout after {} steps", steps),
        ConditionSpec::Step => "per-step signal".into(),
        ConditionSpec::ReachGoal { agent_id } => format!("{} reached goal", who(agent_id)),
        ConditionSpec::HitTrap { agent_id } => format!("{} hit trap", who(agent_id)),
        ConditionSpec::CollectKey { agent_id } => format!("{} collected key", who(agent_id)),
        ConditionSpec::AgentAtPosition {
            agent_id,
            position: Vec2 { x, y },
            ..
        } => format!("{} at ({}, {})", agent_id, x, y),
        ConditionSpec::AgentAtObject {
            agent_id,
            object_id,
        } => format!("{} at {}", agent_id, object_id),
        ConditionSpec::Collision { a, b } => format!("{} collided with {}", a, b),
        ConditionSpec::InsideRegion {
            agent_id,
            region_id,
        } => format!("{} inside {}", agent_id, region_id),
        ConditionSpec::Custom { .. } => "custom script".into(),
        ConditionSpec::Unknown => "unknown condition".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::spec::{
        AgentSpec, EnvSpec, EventAction, EventRule, ObjectSpec, ObjectType, RewardRule,
        TerminationRule,
    };
    use serde_json::json;

    fn engine() -> RuleEngine {
        RuleEngine::new(ConditionEvaluator::without_scripts(&EngineConfig::default()))
    }

    fn state_on_goal() -> SimState {
        let mut spec = EnvSpec::grid(5, 5);
        spec.agents.push(AgentSpec::new("agent_1", "A", Vec2::new(4.0, 4.0)));
        spec.objects
            .push(ObjectSpec::new("goal_1", ObjectType::Goal, Vec2::new(4.0, 4.0)));
        let mut state = SimState::initial(&spec);
        state.step = 8;
        state
    }

    fn reward(id: &str, condition: ConditionSpec, value: f64) -> RewardRule {
        RewardRule {
            id: id.into(),
            condition,
            reward: value,
            shaping: false,
        }
    }

    fn termination(id: &str, condition: ConditionSpec) -> TerminationRule {
        TerminationRule {
            id: id.into(),
            condition,
            success: None,
        }
    }

    #[tokio::test]
    async fn test_rewards_are_additive_in_order() {
        let mut rules = RuleSet::default();
        rules.rewards.push(reward("goal", ConditionSpec::reach_goal(), 10.0));
        rules.rewards.push(reward("living", ConditionSpec::Step, -0.1));
        rules.rewards.push(reward("trap", ConditionSpec::hit_trap(), -10.0));

        let spent = AHashSet::new();
        let outcome = engine()
            .tick(&state_on_goal(), &rules, TickContext { max_steps: 50, spent_once: &spent })
            .await;

        assert!((outcome.reward_delta - 9.9).abs() < 1e-12);
        let ids: Vec<_> = outcome.reward_breakdown.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["goal", "living"]);
        assert_eq!(outcome.reward_breakdown[0].reason, "agent reached goal");
        assert!(!outcome.terminated);
    }

    #[tokio::test]
    async fn test_first_termination_wins() {
        let mut rules = RuleSet::default();
        rules.terminations.push(termination("timeout", ConditionSpec::Timeout { steps: 5 }));
        rules.terminations.push(termination("goal", ConditionSpec::reach_goal()));

        let spent = AHashSet::new();
        let outcome = engine()
            .tick(&state_on_goal(), &rules, TickContext { max_steps: 50, spent_once: &spent })
            .await;

        let termination = outcome.termination.unwrap();
        assert_eq!(termination.rule_id.as_deref(), Some("timeout"));
        assert_eq!(termination.reason, "timeout");
        assert!(!termination.success);
    }

    #[tokio::test]
    async fn test_max_steps_backstop() {
        let spent = AHashSet::new();
        let outcome = engine()
            .tick(&state_on_goal(), &RuleSet::default(), TickContext { max_steps: 8, spent_once: &spent })
            .await;
        assert!(outcome.terminated);
        assert_eq!(outcome.termination, Some(Termination::max_steps()));
    }

    #[tokio::test]
    async fn test_once_event_skipped_when_spent() {
        let mut rules = RuleSet::default();
        rules.events.push(EventRule {
            id: "unlock".into(),
            condition: ConditionSpec::Step,
            action: EventAction::RemoveObject,
            params: json!({"objectId": "goal_1"}),
            once: true,
        });

        let mut spent = AHashSet::new();
        let ctx = TickContext { max_steps: 50, spent_once: &spent };
        let outcome = engine().tick(&state_on_goal(), &rules, ctx).await;
        assert_eq!(outcome.fired.len(), 1);
        assert!(outcome.fired[0].once);

        spent.insert("unlock".to_string());
        let ctx = TickContext { max_steps: 50, spent_once: &spent };
        let outcome = engine().tick(&state_on_goal(), &rules, ctx).await;
        assert!(outcome.fired.is_empty());
    }

    #[tokio::test]
    async fn test_bad_params_and_dangling_refs_are_reported() {
        let mut rules = RuleSet::default();
        rules.rewards.push(reward(
            "gone",
            ConditionSpec::AgentAtObject {
                agent_id: "agent_1".into(),
                object_id: "deleted".into(),
            },
            1.0,
        ));
        rules.events.push(EventRule {
            id: "spawn".into(),
            condition: ConditionSpec::Step,
            action: EventAction::SpawnObject,
            params: json!({}),
            once: false,
        });

        let spent = AHashSet::new();
        let outcome = engine()
            .tick(&state_on_goal(), &rules, TickContext { max_steps: 50, spent_once: &spent })
            .await;

        assert_eq!(outcome.reward_delta, 0.0);
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            StepEvent::ConditionFailed { rule_id, .. } if rule_id == "gone"
        )));
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            StepEvent::EventFailed { rule_id, .. } if rule_id == "spawn"
        )));
        assert!(outcome.fired.is_empty());
    }
}
