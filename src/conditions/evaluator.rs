//! Condition evaluation against a simulation state
//!
//! Built-in kinds are pure functions of the state. `custom` is the only kind
//! that suspends: it is handed to the `ScriptRunner` under a timeout.

use crate::conditions::script::{NoScriptRunner, ScriptRunner};
use crate::conditions::ConditionError;
use crate::core::config::EngineConfig;
use crate::rollout::state::SimState;
use crate::spatial::Footprint;
use crate::spec::{AgentSpec, ConditionSpec, ObjectSpec, ObjectType};
use std::sync::Arc;
use std::time::Duration;

/// Interpreter for `ConditionSpec`
#[derive(Clone)]
pub struct ConditionEvaluator {
    scripts: Arc<dyn ScriptRunner>,
    default_tolerance: f64,
    agent_radius: f64,
    script_timeout: Duration,
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("default_tolerance", &self.default_tolerance)
            .field("agent_radius", &self.agent_radius)
            .field("script_timeout", &self.script_timeout)
            .finish_non_exhaustive()
    }
}

impl ConditionEvaluator {
    pub fn new(config: &EngineConfig, scripts: Arc<dyn ScriptRunner>) -> Self {
        Self {
            scripts,
            default_tolerance: config.default_tolerance,
            agent_radius: config.agent_radius,
            script_timeout: config.script_timeout(),
        }
    }

    /// Evaluator whose `custom` conditions are always false
    pub fn without_scripts(config: &EngineConfig) -> Self {
        Self::new(config, Arc::new(NoScriptRunner))
    }

    /// Evaluate a condition; any failure counts as false
    pub async fn evaluate(&self, condition: &ConditionSpec, state: &SimState) -> bool {
        match self.evaluate_checked(condition, state).await {
            Ok(satisfied) => satisfied,
            Err(e) => {
                tracing::debug!(kind = condition.kind_name(), error = %e, "condition treated as false");
                false
            }
        }
    }

    /// Evaluate a condition, reporting why it could not be decided
    pub async fn evaluate_checked(
        &self,
        condition: &ConditionSpec,
        state: &SimState,
    ) -> Result<bool, ConditionError> {
        match condition {
            ConditionSpec::Custom { script } => self.run_script(script, state).await,
            other => self.evaluate_builtin(other, state),
        }
    }

    /// Evaluate any kind except `custom` without suspending
    pub fn evaluate_builtin(
        &self,
        condition: &ConditionSpec,
        state: &SimState,
    ) -> Result<bool, ConditionError> {
        match condition {
            ConditionSpec::Timeout { steps } => Ok(state.step >= *steps),

            ConditionSpec::Step => Ok(true),

            ConditionSpec::ReachGoal { agent_id } => {
                self.any_agent_at_type(state, agent_id.as_deref(), &ObjectType::Goal)
            }
            ConditionSpec::HitTrap { agent_id } => {
                self.any_agent_at_type(state, agent_id.as_deref(), &ObjectType::Trap)
            }
            ConditionSpec::CollectKey { agent_id } => {
                self.any_agent_at_type(state, agent_id.as_deref(), &ObjectType::Key)
            }

            ConditionSpec::AgentAtPosition {
                agent_id,
                position,
                tolerance,
            } => {
                let agent = find_agent(state, agent_id)?;
                let tolerance = tolerance.unwrap_or(self.default_tolerance);
                Ok(agent.position.distance(position) <= tolerance)
            }

            ConditionSpec::AgentAtObject {
                agent_id,
                object_id,
            } => {
                let agent = find_agent(state, agent_id)?;
                let object = find_object(state, object_id)?;
                Ok(self.agent_at(state, agent, object))
            }

            ConditionSpec::Collision { a, b } => {
                let fa = self.entity_footprint(state, a)?;
                let fb = self.entity_footprint(state, b)?;
                Ok(fa.overlaps(&fb))
            }

            ConditionSpec::InsideRegion {
                agent_id,
                region_id,
            } => {
                let agent = find_agent(state, agent_id)?;
                let region = find_object(state, region_id)?;
                Ok(self.agent_at(state, agent, region))
            }

            ConditionSpec::Custom { .. } => Err(ConditionError::ScriptUnavailable),

            ConditionSpec::Unknown => Err(ConditionError::UnknownKind),
        }
    }

    async fn run_script(&self, script: &str, state: &SimState) -> Result<bool, ConditionError> {
        match tokio::time::timeout(self.script_timeout, self.scripts.run(script, state)).await {
            Ok(Ok(value)) => Ok(value.truthy()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "custom script failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.script_timeout, "custom script timed out");
                Err(ConditionError::ScriptTimeout(self.script_timeout))
            }
        }
    }

    /// Whether the agent stands on the object's footprint
    fn agent_at(&self, state: &SimState, agent: &AgentSpec, object: &ObjectSpec) -> bool {
        Footprint::of_object(object, &state.world, state.env_type, self.default_tolerance)
            .contains_point(agent.position)
    }

    fn any_agent_at_type(
        &self,
        state: &SimState,
        agent_id: Option<&str>,
        object_type: &ObjectType,
    ) -> Result<bool, ConditionError> {
        let agents: Vec<&AgentSpec> = match agent_id {
            Some(id) => vec![find_agent(state, id)?],
            None => state.agents.iter().collect(),
        };
        Ok(state.objects_of_type(object_type).any(|object| {
            agents
                .iter()
                .any(|agent| self.agent_at(state, agent, object))
        }))
    }

    fn entity_footprint(&self, state: &SimState, id: &str) -> Result<Footprint, ConditionError> {
        if let Some(agent) = state.agent(id) {
            return Ok(Footprint::of_agent(
                agent.position,
                &state.world,
                state.env_type,
                self.agent_radius,
            ));
        }
        state
            .object(id)
            .map(|object| {
                Footprint::of_object(object, &state.world, state.env_type, self.default_tolerance)
            })
            .ok_or_else(|| ConditionError::UnknownEntity(id.to_string()))
    }
}

fn find_agent<'a>(state: &'a SimState, id: &str) -> Result<&'a AgentSpec, ConditionError> {
    state
        .agent(id)
        .ok_or_else(|| ConditionError::UnknownAgent(id.to_string()))
}

fn find_object<'a>(state: &'a SimState, id: &str) -> Result<&'a ObjectSpec, ConditionError> {
    state
        .object(id)
        .ok_or_else(|| ConditionError::UnknownObject(id.to_string()))
}
