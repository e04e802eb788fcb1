//! Environment builders shared by the integration tests

#![allow(dead_code)]

use envsim::core::types::Vec2;
use envsim::spec::{
    AgentSpec, ConditionSpec, EnvSpec, ObjectSpec, ObjectType, RewardRule, TerminationRule,
};

pub fn reward(id: &str, condition: ConditionSpec, value: f64) -> RewardRule {
    RewardRule {
        id: id.to_string(),
        condition,
        reward: value,
        shaping: false,
    }
}

pub fn termination(id: &str, condition: ConditionSpec) -> TerminationRule {
    TerminationRule {
        id: id.to_string(),
        condition,
        success: None,
    }
}

/// 5x5 grid, agent in the top-left corner, goal in the bottom-right
pub fn goal_grid() -> EnvSpec {
    let mut spec = EnvSpec::grid(5, 5);
    spec.agents.push(AgentSpec::new("agent_1", "Explorer", Vec2::ZERO));
    spec.objects
        .push(ObjectSpec::new("goal_1", ObjectType::Goal, Vec2::new(4.0, 4.0)));
    spec.rules
        .rewards
        .push(reward("reach_goal_reward", ConditionSpec::reach_goal(), 10.0));
    spec.rules
        .terminations
        .push(termination("reach_goal_end", ConditionSpec::reach_goal()));
    spec.rules.terminations.push(termination(
        "timeout_end",
        ConditionSpec::Timeout { steps: 50 },
    ));
    spec.episode.max_steps = Some(50);
    spec
}

/// `goal_grid` with a trap on the diagonal the greedy policy walks
pub fn trap_grid() -> EnvSpec {
    let mut spec = goal_grid();
    spec.objects
        .push(ObjectSpec::new("trap_1", ObjectType::Trap, Vec2::new(2.0, 2.0)));
    spec.rules
        .rewards
        .push(reward("hit_trap_penalty", ConditionSpec::hit_trap(), -10.0));
    spec.rules
        .terminations
        .push(termination("hit_trap_end", ConditionSpec::hit_trap()));
    spec
}

/// 5x1 corridor from (0, 0) to a goal at (4, 0)
pub fn corridor() -> EnvSpec {
    let mut spec = EnvSpec::grid(5, 1);
    spec.agents.push(AgentSpec::new("agent_1", "Runner", Vec2::ZERO));
    spec.objects
        .push(ObjectSpec::new("goal_1", ObjectType::Goal, Vec2::new(4.0, 0.0)));
    spec.rules
        .rewards
        .push(reward("goal", ConditionSpec::reach_goal(), 1.0));
    spec.rules
        .terminations
        .push(termination("done", ConditionSpec::reach_goal()));
    spec
}
