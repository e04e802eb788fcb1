//! Greedy movement toward the nearest goal

use crate::core::types::Vec2;
use crate::rollout::state::SimState;
use crate::spec::{Action, ActionSpace, AgentSpec, ObjectSpec, ObjectType};
use ordered_float::OrderedFloat;

/// Closest goal to `from`; the first declared wins a tie
pub fn nearest_goal(state: &SimState, from: Vec2) -> Option<&ObjectSpec> {
    state
        .objects_of_type(&ObjectType::Goal)
        .min_by_key(|goal| OrderedFloat(goal.position.distance(&from)))
}

/// Action that moves the agent toward its nearest goal
///
/// Without a goal the agent stays put (or takes action 0 when the
/// discrete space has no stay action).
pub fn choose(state: &SimState, agent: &AgentSpec, space: &ActionSpace) -> Action {
    let delta = nearest_goal(state, agent.position)
        .map(|goal| goal.position - agent.position)
        .unwrap_or(Vec2::ZERO);

    match space {
        ActionSpace::Discrete { .. } => Action::Discrete(best_direction(space.directions(), delta)),
        ActionSpace::Continuous { low, high } => Action::Continuous(Vec2::new(
            delta.x.clamp(*low, *high),
            delta.y.clamp(*low, *high),
        )),
    }
}

/// Index of the direction with the largest dot product
///
/// The highest index wins a tie, so diagonal targets are approached in a
/// staircase that starts horizontally.
fn best_direction(directions: &[Vec2], delta: Vec2) -> u32 {
    if delta.length() == 0.0 {
        return directions
            .iter()
            .position(|d| d.length() == 0.0)
            .unwrap_or(0) as u32;
    }
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, dir) in directions.iter().enumerate() {
        let score = dir.dot(&delta);
        if score >= best_score {
            best = i;
            best_score = score;
        }
    }
    best as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnvSpec, EnvType, World};

    fn state_with_goals(goals: &[(f64, f64)]) -> SimState {
        let mut spec = EnvSpec::grid(5, 5);
        spec.agents.push(AgentSpec::new("agent_1", "A", Vec2::ZERO));
        for (i, (x, y)) in goals.iter().enumerate() {
            spec.objects.push(ObjectSpec::new(
                format!("goal_{}", i),
                ObjectType::Goal,
                Vec2::new(*x, *y),
            ));
        }
        SimState::initial(&spec)
    }

    #[test]
    fn test_diagonal_tie_prefers_higher_index() {
        let state = state_with_goals(&[(4.0, 4.0)]);
        let action = choose(&state, &state.agents[0], &ActionSpace::Discrete { n: 4 });
        // down (1) and right (3) score equally
        assert_eq!(action, Action::Discrete(3));
    }

    #[test]
    fn test_nearest_goal_tie_uses_declaration_order() {
        let state = state_with_goals(&[(0.0, 3.0), (3.0, 0.0)]);
        assert_eq!(nearest_goal(&state, Vec2::ZERO).unwrap().id, "goal_0");
        let action = choose(&state, &state.agents[0], &ActionSpace::Discrete { n: 4 });
        assert_eq!(action, Action::Discrete(1));
    }

    #[test]
    fn test_no_goal_stays() {
        let state = state_with_goals(&[]);
        assert_eq!(
            choose(&state, &state.agents[0], &ActionSpace::Discrete { n: 5 }),
            Action::Discrete(4)
        );
        assert_eq!(
            choose(&state, &state.agents[0], &ActionSpace::Discrete { n: 4 }),
            Action::Discrete(0)
        );
    }

    #[test]
    fn test_continuous_displacement_is_clipped() {
        let mut spec = EnvSpec::new(EnvType::Continuous2d, World::new(10.0, 10.0));
        spec.agents.push(AgentSpec::new("a", "A", Vec2::new(1.0, 1.0)));
        spec.objects
            .push(ObjectSpec::new("g", ObjectType::Goal, Vec2::new(1.5, 8.0)));
        let state = SimState::initial(&spec);
        let action = choose(
            &state,
            &state.agents[0],
            &ActionSpace::Continuous {
                low: -1.0,
                high: 1.0,
            },
        );
        assert_eq!(action, Action::Continuous(Vec2::new(0.5, 1.0)));
    }
}
