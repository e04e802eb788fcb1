use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Condition evaluation failed: {0}")]
    Condition(String),

    #[error("Position ({x}, {y}) is outside the world bounds")]
    OutOfBounds { x: f64, y: f64 },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Agent limit reached: {0}")]
    AgentLimit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rollout task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
