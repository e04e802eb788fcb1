//! The rollout state machine
//!
//! Idle -> Running -> Completed | Terminated | Failed. Each step works on a
//! copy of the state and is committed only once the policy, kinematics and
//! rule engine have all run.

use crate::conditions::{ConditionEvaluator, NoScriptRunner, ScriptRunner};
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::policy::{InferenceBackend, PolicyKind, PolicySource};
use crate::rollout::kinematics::Kinematics;
use crate::rollout::result::{SimulatorResult, Step, StepInfo, StepState};
use crate::rollout::state::SimState;
use crate::rules::{apply_effects, RuleEngine, Termination, TickContext};
use crate::spec::EnvSpec;
use crate::validation;
use ahash::AHashSet;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Reason recorded when a rollout is cancelled between steps
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RolloutPhase {
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "running")]
    Running,
    #[display(fmt = "completed")]
    Completed,
    #[display(fmt = "terminated")]
    Terminated,
    #[display(fmt = "failed")]
    Failed,
}

impl RolloutPhase {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RolloutPhase::Completed | RolloutPhase::Terminated | RolloutPhase::Failed
        )
    }
}

/// What to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutRequest {
    pub policy: PolicyKind,
    pub max_steps: u64,
    pub seed: u64,
}

impl RolloutRequest {
    pub fn new(policy: PolicyKind, max_steps: u64, seed: u64) -> Self {
        Self {
            policy,
            max_steps,
            seed,
        }
    }
}

/// Host-provided collaborators
#[derive(Clone, Default)]
pub struct Capabilities {
    pub inference: Option<Arc<dyn InferenceBackend>>,
    pub scripts: Option<Arc<dyn ScriptRunner>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("inference", &self.inference.is_some())
            .field("scripts", &self.scripts.is_some())
            .finish()
    }
}

impl Capabilities {
    pub fn with_inference(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.inference = Some(backend);
        self
    }

    pub fn with_scripts(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.scripts = Some(runner);
        self
    }
}

/// Cooperative cancellation flag, checked between steps
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Effective step limit: the tighter of the request and the episode setting
pub fn effective_max_steps(spec: &EnvSpec, request: &RolloutRequest, config: &EngineConfig) -> Result<u64> {
    let limit = spec
        .episode
        .max_steps
        .map_or(request.max_steps, |episode| episode.min(request.max_steps));
    if limit == 0 || limit > config.max_steps_cap {
        return Err(EngineError::Validation(format!(
            "max steps must be within 1..={}, got {}",
            config.max_steps_cap, limit
        )));
    }
    Ok(limit)
}

pub struct RolloutStepper {
    spec: Arc<EnvSpec>,
    request: RolloutRequest,
    config: EngineConfig,
    has_inference: bool,
    phase: RolloutPhase,
    policy: PolicySource,
    rules: RuleEngine,
    kinematics: Kinematics,
    cancel: CancelHandle,
}

impl std::fmt::Debug for RolloutStepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutStepper")
            .field("request", &self.request)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl RolloutStepper {
    pub fn new(
        spec: Arc<EnvSpec>,
        request: RolloutRequest,
        config: &EngineConfig,
        capabilities: Capabilities,
    ) -> Self {
        let scripts = capabilities
            .scripts
            .unwrap_or_else(|| Arc::new(NoScriptRunner));
        let has_inference = capabilities.inference.is_some();
        Self {
            policy: PolicySource::new(
                request.policy.clone(),
                request.seed,
                config,
                capabilities.inference,
            ),
            rules: RuleEngine::new(ConditionEvaluator::new(config, scripts)),
            kinematics: Kinematics::new(config),
            spec,
            request,
            config: config.clone(),
            has_inference,
            phase: RolloutPhase::Idle,
            cancel: CancelHandle::default(),
        }
    }

    pub fn phase(&self) -> RolloutPhase {
        self.phase
    }

    /// Handle that stops the rollout before its next step
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the rollout to completion
    ///
    /// Validation failures and unrecoverable policy errors return `Err` and
    /// leave the stepper in `Failed`; no partial trace is produced.
    pub async fn run(&mut self) -> Result<SimulatorResult> {
        if self.phase != RolloutPhase::Idle {
            return Err(EngineError::Validation(format!(
                "rollout already {}",
                self.phase
            )));
        }

        let max_steps = match self.preflight() {
            Ok(max_steps) => max_steps,
            Err(e) => {
                tracing::warn!(error = %e, "rollout rejected");
                self.phase = RolloutPhase::Failed;
                return Err(e);
            }
        };

        self.phase = RolloutPhase::Running;
        let span = tracing::info_span!(
            "rollout",
            id = %Uuid::new_v4(),
            policy = %self.request.policy,
            seed = self.request.seed
        );
        let result = self.execute(max_steps).instrument(span).await;

        self.phase = match &result {
            Ok(r) if r.success => RolloutPhase::Completed,
            Ok(_) => RolloutPhase::Terminated,
            Err(_) => RolloutPhase::Failed,
        };
        result
    }

    fn preflight(&self) -> Result<u64> {
        let report = validation::validate(&self.spec, &self.request.policy, self.has_inference);
        if !report.valid {
            return Err(EngineError::Validation(
                report.error.unwrap_or_else(|| "invalid environment".into()),
            ));
        }
        effective_max_steps(&self.spec, &self.request, &self.config)
    }

    async fn execute(&mut self, max_steps: u64) -> Result<SimulatorResult> {
        let spec = Arc::clone(&self.spec);
        tracing::info!(max_steps, agents = spec.agents.len(), "rollout started");

        let mut state = SimState::initial(&spec);
        let mut steps = Vec::new();
        let mut spent_once: AHashSet<String> = AHashSet::new();

        let termination = loop {
            if self.cancel.is_cancelled() {
                tracing::info!(step = state.step, "rollout cancelled");
                break Termination {
                    rule_id: None,
                    reason: CANCELLED.to_string(),
                    success: false,
                };
            }

            let decision = self.policy.next_action(&state, &spec.action_space).await?;

            let mut next = state.clone();
            let mut events = decision.events;
            events.extend(self.kinematics.apply(&mut next, &decision.actions));
            next.step += 1;

            let ctx = TickContext {
                max_steps,
                spent_once: &spent_once,
            };
            let outcome = self.rules.tick(&next, &spec.rules, ctx).await;
            next.total_reward += outcome.reward_delta;
            events.extend(outcome.events);

            let snapshot_agents = next.agents.clone();
            let snapshot_objects = next.objects.clone();

            // Effects shape the next step only
            events.extend(apply_effects(&mut next, &outcome.fired));
            spent_once.extend(
                outcome
                    .fired
                    .iter()
                    .filter(|f| f.once)
                    .map(|f| f.rule_id.clone()),
            );

            tracing::debug!(
                step = next.step,
                reward = outcome.reward_delta,
                total = next.total_reward,
                "step"
            );

            steps.push(Step {
                state: StepState {
                    agents: snapshot_agents,
                    objects: snapshot_objects,
                    step: next.step,
                    total_reward: next.total_reward,
                    done: outcome.terminated,
                    info: StepInfo {
                        events,
                        rewards: outcome.reward_breakdown,
                    },
                },
                action: decision.actions,
                reward: outcome.reward_delta,
                done: outcome.terminated,
            });
            state = next;

            if let Some(termination) = outcome.termination {
                break termination;
            }
        };

        tracing::info!(
            steps = state.step,
            total_reward = state.total_reward,
            success = termination.success,
            reason = %termination.reason,
            "rollout finished"
        );

        Ok(SimulatorResult {
            steps,
            total_reward: state.total_reward,
            episode_length: state.step,
            success: termination.success,
            termination_reason: Some(termination.reason),
            termination_rule_id: termination.rule_id,
            policy: self.request.policy.clone(),
            seed: self.request.seed,
            fallback_count: self.policy.fallback_count(),
        })
    }
}

/// Run a single rollout
pub async fn rollout(
    spec: Arc<EnvSpec>,
    request: RolloutRequest,
    config: &EngineConfig,
    capabilities: Capabilities,
) -> Result<SimulatorResult> {
    RolloutStepper::new(spec, request, config, capabilities)
        .run()
        .await
}

/// Run one rollout per seed concurrently; results keep the order of `seeds`
pub async fn run_batch(
    spec: Arc<EnvSpec>,
    policy: PolicyKind,
    max_steps: u64,
    seeds: &[u64],
    config: &EngineConfig,
    capabilities: Capabilities,
) -> Vec<Result<SimulatorResult>> {
    let handles: Vec<_> = seeds
        .iter()
        .map(|&seed| {
            let spec = Arc::clone(&spec);
            let request = RolloutRequest::new(policy.clone(), max_steps, seed);
            let config = config.clone();
            let capabilities = capabilities.clone();
            tokio::spawn(async move { rollout(spec, request, &config, capabilities).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Task(e.to_string())),
        });
    }
    results
}
