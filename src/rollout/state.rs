//! Mutable world state owned by one rollout

use crate::core::types::{ObjectId, StepIndex};
use crate::spec::{allocate_id, AgentSpec, EnvSpec, EnvType, ObjectSpec, ObjectType, World};

/// World state at one point of a rollout
///
/// Starts as a copy of the spec's entities; the spec itself is never
/// touched, so concurrent rollouts of the same spec do not interfere.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub env_type: EnvType,
    pub world: World,
    pub agents: Vec<AgentSpec>,
    pub objects: Vec<ObjectSpec>,
    pub step: StepIndex,
    pub total_reward: f64,
    id_seq: u64,
}

impl SimState {
    pub fn initial(spec: &EnvSpec) -> Self {
        Self {
            env_type: spec.env_type,
            world: spec.world.clone(),
            agents: spec.agents.clone(),
            objects: spec.objects.clone(),
            step: 0,
            total_reward: 0.0,
            id_seq: spec.id_seq,
        }
    }

    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectSpec> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: &str) -> Option<&mut ObjectSpec> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn objects_of_type<'a>(
        &'a self,
        object_type: &'a ObjectType,
    ) -> impl Iterator<Item = &'a ObjectSpec> + 'a {
        self.objects.iter().filter(move |o| &o.object_type == object_type)
    }

    /// Fresh object id for objects spawned during the rollout
    pub fn next_object_id(&mut self) -> ObjectId {
        let agents = &self.agents;
        let objects = &self.objects;
        allocate_id("obj", &mut self.id_seq, |candidate| {
            objects.iter().any(|o| o.id == candidate) || agents.iter().any(|a| a.id == candidate)
        })
    }
}
