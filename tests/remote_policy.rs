//! Trained-model rollouts against in-process inference backends

mod common;

use async_trait::async_trait;
use common::corridor;
use envsim::core::error::Result;
use envsim::policy::{InferenceBackend, InferenceRequest, InferenceResponse};
use envsim::rollout::{rollout, Capabilities, RolloutRequest, StepEvent};
use envsim::spec::Action;
use envsim::{EngineConfig, EngineError, PolicyKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Always moves right and counts how often it was asked
#[derive(Default)]
struct RightMover {
    calls: AtomicUsize,
}

#[async_trait]
impl InferenceBackend for RightMover {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.run_id, "run-7");
        Ok(InferenceResponse::joint(vec![Action::Discrete(3)]))
    }
}

struct Unreachable;

#[async_trait]
impl InferenceBackend for Unreachable {
    async fn infer(&self, _request: &InferenceRequest) -> Result<InferenceResponse> {
        Err(EngineError::Policy("connection refused".into()))
    }
}

/// Answers long after the engine has stopped waiting
struct Stalled;

#[async_trait]
impl InferenceBackend for Stalled {
    async fn infer(&self, _request: &InferenceRequest) -> Result<InferenceResponse> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(InferenceResponse::joint(vec![Action::Discrete(3)]))
    }
}

fn trained() -> PolicyKind {
    PolicyKind::TrainedModel {
        run_id: "run-7".into(),
    }
}

#[tokio::test]
async fn test_trained_model_drives_rollout() {
    let backend = Arc::new(RightMover::default());
    let result = rollout(
        Arc::new(corridor()),
        RolloutRequest::new(trained(), 20, 0),
        &EngineConfig::default(),
        Capabilities::default().with_inference(backend.clone()),
    )
    .await
    .unwrap();

    assert!(result.success);
    assert_eq!(result.episode_length, 4);
    assert_eq!(result.fallback_count, 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    assert_eq!(result.policy, trained());
}

#[tokio::test]
async fn test_failed_inference_falls_back_to_random() {
    let mut spec = corridor();
    spec.rules.terminations.clear();
    spec.episode.max_steps = Some(6);

    let result = rollout(
        Arc::new(spec),
        RolloutRequest::new(trained(), 20, 3),
        &EngineConfig::default(),
        Capabilities::default().with_inference(Arc::new(Unreachable)),
    )
    .await
    .unwrap();

    assert_eq!(result.episode_length, 6);
    assert_eq!(result.fallback_count, 6);
    for step in &result.steps {
        assert!(step
            .state
            .info
            .events
            .iter()
            .any(|e| matches!(e, StepEvent::PolicyFallback { .. })));
    }
}

#[tokio::test]
async fn test_failed_inference_without_fallback_fails() {
    let config = EngineConfig {
        inference_fallback: false,
        ..EngineConfig::default()
    };
    let result = rollout(
        Arc::new(corridor()),
        RolloutRequest::new(trained(), 20, 0),
        &config,
        Capabilities::default().with_inference(Arc::new(Unreachable)),
    )
    .await;

    assert!(matches!(result, Err(EngineError::Policy(_))));
}

#[tokio::test]
async fn test_trained_model_needs_backend() {
    let result = rollout(
        Arc::new(corridor()),
        RolloutRequest::new(trained(), 20, 0),
        &EngineConfig::default(),
        Capabilities::default(),
    )
    .await;

    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn test_slow_inference_times_out_and_falls_back() {
    let mut spec = corridor();
    spec.rules.terminations.clear();
    spec.episode.max_steps = Some(3);
    let config = EngineConfig {
        inference_timeout_ms: 20,
        ..EngineConfig::default()
    };

    let result = rollout(
        Arc::new(spec),
        RolloutRequest::new(trained(), 20, 5),
        &config,
        Capabilities::default().with_inference(Arc::new(Stalled)),
    )
    .await
    .unwrap();

    assert_eq!(result.episode_length, 3);
    assert_eq!(result.fallback_count, 3);
    for step in &result.steps {
        assert!(step.state.info.events.iter().any(|e| matches!(
            e,
            StepEvent::PolicyFallback { reason, .. } if reason.contains("timed out")
        )));
    }
}
