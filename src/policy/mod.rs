//! Action selection for rollouts
//!
//! A `PolicySource` owns the rollout's RNG, so random and fallback actions
//! are a pure function of the seed.

pub mod greedy;
pub mod random;
pub mod remote;

pub use remote::{HttpInferenceClient, InferenceBackend, InferenceRequest, InferenceResponse};

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::rollout::result::StepEvent;
use crate::rollout::state::SimState;
use crate::spec::{Action, ActionSpace};
use derive_more::Display;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which policy drives a rollout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PolicyKind {
    #[display(fmt = "random")]
    Random,
    #[display(fmt = "greedy")]
    Greedy,
    #[display(fmt = "trained_model({})", run_id)]
    TrainedModel { run_id: String },
}

impl PolicyKind {
    /// Parse a policy name as used on the command line
    pub fn from_name(name: &str, run_id: Option<String>) -> Result<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(PolicyKind::Random),
            "greedy" => Ok(PolicyKind::Greedy),
            "trained_model" | "trained" => Ok(PolicyKind::TrainedModel {
                run_id: run_id.unwrap_or_default(),
            }),
            other => Err(EngineError::Validation(format!("unknown policy '{}'", other))),
        }
    }
}

/// Joint action for one step plus anything worth recording about how it was chosen
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub actions: Vec<Action>,
    pub events: Vec<StepEvent>,
}

impl PolicyDecision {
    fn plain(actions: Vec<Action>) -> Self {
        Self {
            actions,
            events: Vec::new(),
        }
    }
}

pub struct PolicySource {
    kind: PolicyKind,
    rng: ChaCha8Rng,
    inference: Option<Arc<dyn InferenceBackend>>,
    inference_timeout: Duration,
    fallback: bool,
    fallback_count: u32,
}

impl std::fmt::Debug for PolicySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySource")
            .field("kind", &self.kind)
            .field("has_inference", &self.inference.is_some())
            .field("fallback", &self.fallback)
            .field("fallback_count", &self.fallback_count)
            .finish()
    }
}

impl PolicySource {
    pub fn new(
        kind: PolicyKind,
        seed: u64,
        config: &EngineConfig,
        inference: Option<Arc<dyn InferenceBackend>>,
    ) -> Self {
        Self {
            kind,
            rng: ChaCha8Rng::seed_from_u64(seed),
            inference,
            inference_timeout: config.inference_timeout(),
            fallback: config.inference_fallback,
            fallback_count: 0,
        }
    }

    pub fn kind(&self) -> &PolicyKind {
        &self.kind
    }

    /// Steps so far where a random action replaced a failed inference
    pub fn fallback_count(&self) -> u32 {
        self.fallback_count
    }

    /// Choose one action per agent, in agent declaration order
    pub async fn next_action(&mut self, state: &SimState, space: &ActionSpace) -> Result<PolicyDecision> {
        match self.kind.clone() {
            PolicyKind::Random => Ok(PolicyDecision::plain(random::sample_joint(
                &mut self.rng,
                space,
                state.agents.len(),
            ))),
            PolicyKind::Greedy => Ok(PolicyDecision::plain(
                state
                    .agents
                    .iter()
                    .map(|agent| greedy::choose(state, agent, space))
                    .collect(),
            )),
            PolicyKind::TrainedModel { run_id } => match self.infer(&run_id, state, space).await {
                Ok(actions) => Ok(PolicyDecision::plain(actions)),
                Err(e) if self.fallback => {
                    tracing::warn!(step = state.step, error = %e, "inference failed, using random action");
                    self.fallback_count += 1;
                    Ok(PolicyDecision {
                        actions: random::sample_joint(&mut self.rng, space, state.agents.len()),
                        events: vec![StepEvent::PolicyFallback {
                            reason: e.to_string(),
                        }],
                    })
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn infer(&self, run_id: &str, state: &SimState, space: &ActionSpace) -> Result<Vec<Action>> {
        let backend = self
            .inference
            .as_ref()
            .ok_or_else(|| EngineError::Policy("no inference backend configured".into()))?;
        let request = InferenceRequest::new(run_id, state, space);

        let response = tokio::time::timeout(self.inference_timeout, backend.infer(&request))
            .await
            .map_err(|_| {
                EngineError::Policy(format!("inference timed out after {:?}", self.inference_timeout))
            })??;

        let actions = response.into_actions();
        if actions.len() != state.agents.len() {
            return Err(EngineError::Policy(format!(
                "expected {} actions, got {}",
                state.agents.len(),
                actions.len()
            )));
        }
        if let Some(bad) = actions.iter().find(|a| !space.contains(a)) {
            return Err(EngineError::Policy(format!(
                "action {:?} is outside the action space",
                bad
            )));
        }
        Ok(actions)
    }
}
