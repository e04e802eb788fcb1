//! Applying actions to agent positions
//!
//! Kinematics never fails: out-of-bounds targets are clamped and blocked
//! moves leave the agent where it was. Both are reported as step events.

use crate::core::config::EngineConfig;
use crate::core::types::Vec2;
use crate::rollout::result::StepEvent;
use crate::rollout::state::SimState;
use crate::spatial::Blockers;
use crate::spec::{Action, AgentSpec, Controller, EnvType, GRID_DIRECTIONS};

#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    agent_radius: f64,
    point_radius: f64,
}

impl Kinematics {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            agent_radius: config.agent_radius,
            point_radius: config.default_tolerance,
        }
    }

    /// Move every agent by its action; actions pair with agents by index
    pub fn apply(&self, state: &mut SimState, actions: &[Action]) -> Vec<StepEvent> {
        let blockers = Blockers::build(
            &state.objects,
            &state.world,
            state.env_type,
            self.agent_radius,
            self.point_radius,
        );
        let cell_size = state.world.cell_size();
        let env_type = state.env_type;
        let mut events = Vec::new();

        for (agent, action) in state.agents.iter_mut().zip(actions) {
            let Some(delta) = displacement(agent, action, env_type, cell_size) else {
                continue;
            };
            if delta == Vec2::ZERO {
                continue;
            }

            let attempted = agent.position + delta;
            let mut target = attempted;
            if !state.world.contains(attempted, env_type) {
                target = state.world.clamp(attempted, env_type);
                events.push(StepEvent::BoundsClamped {
                    agent_id: agent.id.clone(),
                    attempted,
                    clamped: target,
                });
            }
            if target == agent.position {
                continue;
            }

            if let Some(blocker) = blockers.blocker_at(target) {
                tracing::debug!(agent = %agent.id, blocker, "move blocked");
                events.push(StepEvent::MoveBlocked {
                    agent_id: agent.id.clone(),
                    object_id: blocker.to_string(),
                });
                continue;
            }
            agent.position = target;
        }
        events
    }
}

/// World-space displacement requested by an action, `None` when the agent ignores it
fn displacement(agent: &AgentSpec, action: &Action, env_type: EnvType, cell_size: f64) -> Option<Vec2> {
    let step = match action {
        Action::Discrete(i) => *GRID_DIRECTIONS.get(*i as usize)? * cell_size,
        Action::Continuous(v) if env_type == EnvType::Continuous2d && v.is_finite() => *v,
        Action::Continuous(_) => return None,
    };
    match &agent.controller {
        Controller::Static => None,
        Controller::GridStep => Some(step),
        Controller::Velocity { max_speed } => {
            let speed = step.length();
            if speed > *max_speed && speed > 0.0 {
                Some(step * (max_speed / speed))
            } else {
                Some(step)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnvSpec, ObjectSpec, ObjectType, World};

    fn grid_state(agent_at: Vec2) -> SimState {
        let mut spec = EnvSpec::grid(5, 5);
        spec.agents.push(AgentSpec::new("agent_1", "A", agent_at));
        spec.objects
            .push(ObjectSpec::new("wall_1", ObjectType::Wall, Vec2::new(2.0, 0.0)));
        SimState::initial(&spec)
    }

    fn kinematics() -> Kinematics {
        Kinematics::new(&EngineConfig::default())
    }

    #[test]
    fn test_grid_step_moves_one_cell() {
        let mut state = grid_state(Vec2::new(0.0, 0.0));
        let events = kinematics().apply(&mut state, &[Action::Discrete(1)]);
        assert!(events.is_empty());
        assert_eq!(state.agents[0].position, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_edge_move_is_clamped() {
        let mut state = grid_state(Vec2::new(0.0, 0.0));
        let events = kinematics().apply(&mut state, &[Action::Discrete(0)]);
        assert_eq!(state.agents[0].position, Vec2::new(0.0, 0.0));
        assert_eq!(
            events,
            vec![StepEvent::BoundsClamped {
                agent_id: "agent_1".into(),
                attempted: Vec2::new(0.0, -1.0),
                clamped: Vec2::new(0.0, 0.0),
            }]
        );
    }

    #[test]
    fn test_wall_blocks_move() {
        let mut state = grid_state(Vec2::new(1.0, 0.0));
        let events = kinematics().apply(&mut state, &[Action::Discrete(3)]);
        assert_eq!(state.agents[0].position, Vec2::new(1.0, 0.0));
        assert_eq!(
            events,
            vec![StepEvent::MoveBlocked {
                agent_id: "agent_1".into(),
                object_id: "wall_1".into(),
            }]
        );
    }

    #[test]
    fn test_static_agent_ignores_action() {
        let mut state = grid_state(Vec2::new(0.0, 0.0));
        state.agents[0].controller = Controller::Static;
        kinematics().apply(&mut state, &[Action::Discrete(1)]);
        assert_eq!(state.agents[0].position, Vec2::ZERO);
    }

    #[test]
    fn test_velocity_is_capped() {
        let mut spec = EnvSpec::new(EnvType::Continuous2d, World::new(10.0, 10.0));
        let mut agent = AgentSpec::new("a", "A", Vec2::new(5.0, 5.0));
        agent.controller = Controller::Velocity { max_speed: 0.5 };
        spec.agents.push(agent);
        let mut state = SimState::initial(&spec);

        kinematics().apply(&mut state, &[Action::Continuous(Vec2::new(1.0, 0.0))]);
        assert_eq!(state.agents[0].position, Vec2::new(5.5, 5.0));
    }

    #[test]
    fn test_continuous_action_ignored_on_grid() {
        let mut state = grid_state(Vec2::new(0.0, 0.0));
        let events = kinematics().apply(&mut state, &[Action::Continuous(Vec2::new(1.0, 0.0))]);
        assert!(events.is_empty());
        assert_eq!(state.agents[0].position, Vec2::ZERO);
    }
}
