//! The `EnvSpec` aggregate root

use crate::core::error::Result;
use crate::core::types::Vec2;
use crate::spec::action_space::ActionSpace;
use crate::spec::agents::AgentSpec;
use crate::spec::objects::{ObjectSpec, ObjectType, Properties};
use crate::spec::rules::RuleSet;
use crate::spec::world::{EnvType, World};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,
}

/// Canonical description of one environment
///
/// Treated as a value: edits produce a new `EnvSpec` instead of mutating a
/// shared one, so rollouts and undo history can hold snapshots safely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvSpec {
    #[serde(default)]
    pub env_type: EnvType,
    pub world: World,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub action_space: ActionSpace,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub episode: EpisodeConfig,
    #[serde(default)]
    pub metadata: Properties,
    /// Last id sequence number handed out; ids are never reused
    #[serde(default)]
    pub id_seq: u64,
}

impl EnvSpec {
    /// Empty environment with the action space that suits its type
    pub fn new(env_type: EnvType, world: World) -> Self {
        let action_space = match env_type {
            EnvType::Grid => ActionSpace::Discrete { n: 4 },
            EnvType::Continuous2d => ActionSpace::Continuous {
                low: -1.0,
                high: 1.0,
            },
        };
        Self {
            env_type,
            world,
            objects: Vec::new(),
            agents: Vec::new(),
            action_space,
            rules: RuleSet::default(),
            episode: EpisodeConfig::default(),
            metadata: Properties::new(),
            id_seq: 0,
        }
    }

    /// Grid environment of `width` x `height` unit cells
    pub fn grid(width: u32, height: u32) -> Self {
        Self::new(EnvType::Grid, World::new(width as f64, height as f64))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectSpec> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Whether an object, agent or rule already uses this id
    pub fn has_id(&self, id: &str) -> bool {
        self.object(id).is_some() || self.agent(id).is_some() || self.rules.contains_id(id)
    }

    pub fn objects_of_type<'a>(
        &'a self,
        object_type: &'a ObjectType,
    ) -> impl Iterator<Item = &'a ObjectSpec> + 'a {
        self.objects.iter().filter(move |o| &o.object_type == object_type)
    }

    pub fn has_goal(&self) -> bool {
        self.objects_of_type(&ObjectType::Goal).next().is_some()
    }

    pub fn in_bounds(&self, p: Vec2) -> bool {
        self.world.contains(p, self.env_type)
    }

    /// Hand out the next unused id with the given prefix
    pub fn allocate_id(&mut self, prefix: &str) -> String {
        let spec = &*self;
        let mut seq = spec.id_seq;
        let id = allocate_id(prefix, &mut seq, |candidate| spec.has_id(candidate));
        self.id_seq = seq;
        id
    }
}

/// Next id of the form `<prefix>_<n>` that `taken` does not claim
///
/// Advances `seq` past the returned number so it is never handed out again.
/// Once the counter is exhausted it stays pinned at `u64::MAX` and the lowest
/// free number is used instead.
pub fn allocate_id(prefix: &str, seq: &mut u64, taken: impl Fn(&str) -> bool) -> String {
    while let Some(next) = seq.checked_add(1) {
        *seq = next;
        let candidate = format!("{}_{}", prefix, next);
        if !taken(&candidate) {
            return candidate;
        }
    }
    let mut n: u64 = 1;
    loop {
        let candidate = format!("{}_{}", prefix, n);
        if !taken(&candidate) {
            return candidate;
        }
        n = n.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document_defaults() {
        let spec: EnvSpec = serde_json::from_value(json!({
            "world": {"width": 5.0, "height": 5.0}
        }))
        .unwrap();

        assert_eq!(spec.env_type, EnvType::Grid);
        assert!(spec.objects.is_empty());
        assert!(spec.rules.is_empty());
        assert_eq!(spec.episode.max_steps, None);
        assert_eq!(spec.id_seq, 0);
    }

    #[test]
    fn test_allocate_id_skips_existing() {
        let mut spec = EnvSpec::grid(5, 5);
        spec.objects
            .push(ObjectSpec::new("obj_1", ObjectType::Wall, Vec2::ZERO));

        let id = spec.allocate_id("obj");
        assert_eq!(id, "obj_2");
        assert_eq!(spec.id_seq, 2);
        assert_eq!(spec.allocate_id("agent"), "agent_3");
    }

    #[test]
    fn test_allocate_id_at_counter_limit() {
        let mut spec = EnvSpec::grid(5, 5);
        spec.id_seq = u64::MAX - 1;
        assert_eq!(spec.allocate_id("obj"), format!("obj_{}", u64::MAX));
        assert_eq!(spec.id_seq, u64::MAX);

        spec.objects
            .push(ObjectSpec::new("obj_1", ObjectType::Wall, Vec2::ZERO));
        assert_eq!(spec.allocate_id("obj"), "obj_2");
        assert_eq!(spec.id_seq, u64::MAX);
    }

    #[test]
    fn test_camel_case_fields() {
        let mut spec = EnvSpec::grid(3, 3);
        spec.episode.max_steps = Some(20);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["envType"], json!("grid"));
        assert_eq!(value["episode"]["maxSteps"], json!(20));
        assert_eq!(value["actionSpace"]["kind"], json!("discrete"));
    }
}
