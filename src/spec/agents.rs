//! Agents and their controllers

use crate::core::types::{AgentId, Vec2};
use serde::{Deserialize, Serialize};

/// How an agent turns actions into motion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Controller {
    /// One cell per discrete action
    #[default]
    GridStep,
    /// Continuous displacement, capped at `max_speed` per step
    Velocity { max_speed: f64 },
    /// Ignores actions entirely
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: AgentId,
    pub name: String,
    pub position: Vec2,
    #[serde(default)]
    pub controller: Controller,
}

impl AgentSpec {
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, position: Vec2) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            controller: Controller::default(),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.controller, Controller::Static)
    }
}
