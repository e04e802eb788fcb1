//! Remote trained-model inference
//!
//! The engine only knows the `InferenceBackend` trait. `HttpInferenceClient`
//! is the stock implementation: it posts the observation to
//! `<baseUrl>/runs/<runId>/act` and reads back one action per agent.

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::rollout::state::SimState;
use crate::spec::{Action, ActionSpace, AgentSpec, ObjectSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Observation sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub agents: Vec<AgentSpec>,
    pub objects: Vec<ObjectSpec>,
    pub step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    pub run_id: String,
    pub state: Observation,
    pub action_space: ActionSpace,
}

impl InferenceRequest {
    pub fn new(run_id: &str, state: &SimState, action_space: &ActionSpace) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: Observation {
                agents: state.agents.clone(),
                objects: state.objects.clone(),
                step: state.step,
            },
            action_space: action_space.clone(),
        }
    }
}

/// Model answer: either a joint action or a single action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl InferenceResponse {
    pub fn joint(actions: Vec<Action>) -> Self {
        Self {
            actions: Some(actions),
            action: None,
        }
    }

    /// Actions in agent order; `actions` takes precedence over `action`
    pub fn into_actions(self) -> Vec<Action> {
        match (self.actions, self.action) {
            (Some(actions), _) => actions,
            (None, Some(action)) => vec![action],
            (None, None) => Vec::new(),
        }
    }
}

/// Host capability that maps an observation to actions
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse>;
}

/// HTTP inference client
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInferenceClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpInferenceClient {
    /// Create a client with explicit configuration
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Policy(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Create a client from environment variables
    ///
    /// Required: ENVSIM_INFERENCE_URL
    /// Optional: ENVSIM_INFERENCE_KEY
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("ENVSIM_INFERENCE_URL")
            .map_err(|_| EngineError::Config("ENVSIM_INFERENCE_URL not set".into()))?;
        let api_key = std::env::var("ENVSIM_INFERENCE_KEY").ok();
        Self::new(base_url, api_key, EngineConfig::default().inference_timeout())
    }

    /// Create a client from the engine configuration
    ///
    /// The bearer token is read from the variable named by `inference_key_env`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let base_url = config
            .inference_url
            .clone()
            .ok_or_else(|| EngineError::Config("inference_url not configured".into()))?;
        let api_key = std::env::var(&config.inference_key_env).ok();
        Self::new(base_url, api_key, config.inference_timeout())
    }

    /// Endpoint for one training run
    pub fn endpoint(&self, run_id: &str) -> String {
        format!("{}/runs/{}/act", self.base_url.trim_end_matches('/'), run_id)
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let mut builder = self
            .client
            .post(self.endpoint(&request.run_id))
            .header("content-type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::Policy(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Policy(format!(
                "inference API error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Policy(format!("malformed inference response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client =
            HttpInferenceClient::new("http://localhost:9000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("run-7"), "http://localhost:9000/runs/run-7/act");
    }

    #[test]
    fn test_response_shapes() {
        let joint: InferenceResponse = serde_json::from_value(json!({"actions": [1, 3]})).unwrap();
        assert_eq!(
            joint.into_actions(),
            vec![Action::Discrete(1), Action::Discrete(3)]
        );

        let single: InferenceResponse =
            serde_json::from_value(json!({"action": {"x": 0.5, "y": -0.5}})).unwrap();
        assert_eq!(
            single.into_actions(),
            vec![Action::Continuous(crate::core::types::Vec2::new(0.5, -0.5))]
        );

        let empty: InferenceResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_actions().is_empty());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let state = SimState::initial(&crate::spec::EnvSpec::grid(3, 3));
        let request = InferenceRequest::new("run-1", &state, &ActionSpace::Discrete { n: 4 });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["runId"], json!("run-1"));
        assert_eq!(value["actionSpace"]["kind"], json!("discrete"));
        assert_eq!(value["state"]["step"], json!(0));
    }

    #[test]
    fn test_from_config_requires_url() {
        let result = HttpInferenceClient::from_config(&EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
