//! Copy-on-write editing of an `EnvSpec`
//!
//! Every successful edit produces a new snapshot; the previous one goes on
//! the undo stack. Snapshots are shared as `Arc<EnvSpec>`, so a rollout
//! started from an older snapshot is unaffected by later edits.

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::Vec2;
use crate::scene::assets::AssetCatalog;
use crate::spec::objects::ASSET_ID_KEY;
use crate::spec::{
    AgentSpec, ConditionSpec, Controller, EnvSpec, EnvType, EventAction, EventRule, ObjectSpec,
    ObjectType, Properties, RewardRule, Size, TerminationRule,
};
use std::collections::VecDeque;
use std::sync::Arc;

pub struct SceneMutator {
    current: Arc<EnvSpec>,
    undo_stack: VecDeque<Arc<EnvSpec>>,
    redo_stack: Vec<Arc<EnvSpec>>,
    undo_depth: usize,
    grid_single_agent: bool,
    max_steps_cap: u64,
    catalog: Option<Arc<dyn AssetCatalog>>,
    /// Highest id counter any snapshot has reached; undo never lowers it
    id_high_water: u64,
}

impl std::fmt::Debug for SceneMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneMutator")
            .field("objects", &self.current.objects.len())
            .field("agents", &self.current.agents.len())
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .finish_non_exhaustive()
    }
}

impl SceneMutator {
    pub fn new(spec: EnvSpec, config: &EngineConfig) -> Self {
        Self {
            id_high_water: spec.id_seq,
            current: Arc::new(spec),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            undo_depth: config.undo_depth,
            grid_single_agent: config.grid_single_agent,
            max_steps_cap: config.max_steps_cap,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn AssetCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Current snapshot
    pub fn spec(&self) -> Arc<EnvSpec> {
        Arc::clone(&self.current)
    }

    pub fn add_object(
        &mut self,
        object_type: ObjectType,
        position: Vec2,
        size: Option<Size>,
        properties: Properties,
    ) -> Result<Arc<EnvSpec>> {
        let (size, properties) = self.resolve_asset(size, properties)?;
        if !size.is_well_formed() {
            return Err(EngineError::Validation(format!("malformed size {:?}", size)));
        }
        self.edit("add_object", |spec| {
            check_bounds(spec, position)?;
            let id = spec.allocate_id("obj");
            let mut object = ObjectSpec::new(id, object_type, position);
            object.size = size;
            object.properties = properties;
            spec.objects.push(object);
            Ok(())
        })
    }

    /// Remove an object; an unknown id leaves the spec untouched
    ///
    /// Rules that refer to the object stay in place and evaluate to false.
    pub fn remove_object(&mut self, id: &str) -> Arc<EnvSpec> {
        if self.current.object(id).is_none() {
            return self.spec();
        }
        self.commit_with("remove_object", |spec| spec.objects.retain(|o| o.id != id))
    }

    pub fn add_agent(
        &mut self,
        name: &str,
        position: Vec2,
        controller: Controller,
    ) -> Result<Arc<EnvSpec>> {
        let single = self.grid_single_agent;
        self.edit("add_agent", |spec| {
            if single && spec.env_type == EnvType::Grid && !spec.agents.is_empty() {
                return Err(EngineError::AgentLimit(
                    "grid environments hold a single agent".into(),
                ));
            }
            check_bounds(spec, position)?;
            let id = spec.allocate_id("agent");
            let mut agent = AgentSpec::new(id, name, position);
            agent.controller = controller;
            spec.agents.push(agent);
            Ok(())
        })
    }

    /// Remove an agent; an unknown id leaves the spec untouched
    pub fn remove_agent(&mut self, id: &str) -> Arc<EnvSpec> {
        if self.current.agent(id).is_none() {
            return self.spec();
        }
        self.commit_with("remove_agent", |spec| spec.agents.retain(|a| a.id != id))
    }

    pub fn move_object(&mut self, id: &str, position: Vec2) -> Result<Arc<EnvSpec>> {
        self.edit("move_object", |spec| {
            check_bounds(spec, position)?;
            object_mut(spec, id)?.position = position;
            Ok(())
        })
    }

    pub fn set_object_property(
        &mut self,
        id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Arc<EnvSpec>> {
        self.edit("set_object_property", |spec| {
            object_mut(spec, id)?.properties.insert(key.to_string(), value);
            Ok(())
        })
    }

    pub fn move_agent(&mut self, id: &str, position: Vec2) -> Result<Arc<EnvSpec>> {
        self.edit("move_agent", |spec| {
            check_bounds(spec, position)?;
            let agent = spec
                .agents
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| EngineError::Validation(format!("no agent '{}'", id)))?;
            agent.position = position;
            Ok(())
        })
    }

    pub fn add_reward_rule(&mut self, condition: ConditionSpec, reward: f64, shaping: bool) -> Result<Arc<EnvSpec>> {
        if !reward.is_finite() {
            return Err(EngineError::Validation(format!("reward must be finite, got {}", reward)));
        }
        self.edit("add_reward_rule", |spec| {
            let id = spec.allocate_id("rule");
            spec.rules.rewards.push(RewardRule {
                id,
                condition,
                reward,
                shaping,
            });
            Ok(())
        })
    }

    pub fn add_termination_rule(
        &mut self,
        condition: ConditionSpec,
        success: Option<bool>,
    ) -> Result<Arc<EnvSpec>> {
        self.edit("add_termination_rule", |spec| {
            let id = spec.allocate_id("rule");
            spec.rules.terminations.push(TerminationRule {
                id,
                condition,
                success,
            });
            Ok(())
        })
    }

    pub fn add_event_rule(
        &mut self,
        condition: ConditionSpec,
        action: EventAction,
        params: serde_json::Value,
        once: bool,
    ) -> Result<Arc<EnvSpec>> {
        self.edit("add_event_rule", |spec| {
            let id = spec.allocate_id("rule");
            let rule = EventRule {
                id,
                condition,
                action,
                params,
                once,
            };
            rule.effect().map_err(EngineError::Validation)?;
            spec.rules.events.push(rule);
            Ok(())
        })
    }

    /// Remove a rule of any kind; an unknown id leaves the spec untouched
    pub fn remove_rule(&mut self, id: &str) -> Arc<EnvSpec> {
        if !self.current.rules.contains_id(id) {
            return self.spec();
        }
        self.commit_with("remove_rule", |spec| {
            spec.rules.remove(id);
        })
    }

    pub fn set_max_steps(&mut self, max_steps: Option<u64>) -> Result<Arc<EnvSpec>> {
        if let Some(n) = max_steps {
            if n == 0 || n > self.max_steps_cap {
                return Err(EngineError::Validation(format!(
                    "max steps must be within 1..={}, got {}",
                    self.max_steps_cap, n
                )));
            }
        }
        self.edit("set_max_steps", |spec| {
            spec.episode.max_steps = max_steps;
            Ok(())
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Step back one edit; returns false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop_back() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.current, previous);
                self.redo_stack.push(current);
                tracing::debug!(remaining = self.undo_stack.len(), "undo");
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone edit; returns false when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.current, next);
                self.push_undo(current);
                tracing::debug!(remaining = self.redo_stack.len(), "redo");
                true
            }
            None => false,
        }
    }

    /// Apply a fallible edit to a copy and commit it on success
    fn edit<F>(&mut self, op: &str, f: F) -> Result<Arc<EnvSpec>>
    where
        F: FnOnce(&mut EnvSpec) -> Result<()>,
    {
        let mut next = self.draft();
        f(&mut next)?;
        Ok(self.commit(op, next))
    }

    fn commit_with<F>(&mut self, op: &str, f: F) -> Arc<EnvSpec>
    where
        F: FnOnce(&mut EnvSpec),
    {
        let mut next = self.draft();
        f(&mut next);
        self.commit(op, next)
    }

    /// Copy of the current snapshot with the id counter at its high-water mark
    fn draft(&self) -> EnvSpec {
        let mut next = (*self.current).clone();
        next.id_seq = next.id_seq.max(self.id_high_water);
        next
    }

    fn commit(&mut self, op: &str, next: EnvSpec) -> Arc<EnvSpec> {
        self.id_high_water = self.id_high_water.max(next.id_seq);
        let previous = std::mem::replace(&mut self.current, Arc::new(next));
        self.push_undo(previous);
        self.redo_stack.clear();
        tracing::debug!(
            op,
            objects = self.current.objects.len(),
            agents = self.current.agents.len(),
            "scene edited"
        );
        self.spec()
    }

    fn push_undo(&mut self, snapshot: Arc<EnvSpec>) {
        if self.undo_depth == 0 {
            return;
        }
        if self.undo_stack.len() == self.undo_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(snapshot);
    }

    /// Merge asset defaults beneath the explicit size and properties
    fn resolve_asset(&self, size: Option<Size>, properties: Properties) -> Result<(Size, Properties)> {
        let Some(asset_id) = properties.get(ASSET_ID_KEY).and_then(|v| v.as_str()) else {
            return Ok((size.unwrap_or_default(), properties));
        };
        let asset = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.resolve(asset_id))
            .ok_or_else(|| EngineError::AssetNotFound(asset_id.to_string()))?;

        let mut merged = asset.properties;
        merged.extend(properties);
        let size = size.or(asset.size).unwrap_or_default();
        Ok((size, merged))
    }
}

fn check_bounds(spec: &EnvSpec, position: Vec2) -> Result<()> {
    if spec.in_bounds(position) {
        Ok(())
    } else {
        Err(EngineError::OutOfBounds {
            x: position.x,
            y: position.y,
        })
    }
}

fn object_mut<'a>(spec: &'a mut EnvSpec, id: &str) -> Result<&'a mut ObjectSpec> {
    spec.objects
        .iter_mut()
        .find(|o| o.id == id)
        .ok_or_else(|| EngineError::Validation(format!("no object '{}'", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::assets::{AssetDefinition, InMemoryCatalog};
    use serde_json::json;

    fn mutator() -> SceneMutator {
        SceneMutator::new(EnvSpec::grid(5, 5), &EngineConfig::default())
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut m = mutator();
        m.add_object(ObjectType::Wall, Vec2::new(1.0, 1.0), None, Properties::new())
            .unwrap();
        let spec = m
            .add_object(ObjectType::Goal, Vec2::new(4.0, 4.0), None, Properties::new())
            .unwrap();
        assert_eq!(spec.objects[1].id, "obj_2");

        m.remove_object("obj_2");
        let spec = m
            .add_object(ObjectType::Goal, Vec2::new(4.0, 4.0), None, Properties::new())
            .unwrap();
        assert_eq!(spec.objects[1].id, "obj_3");
    }

    #[test]
    fn test_ids_not_reused_after_undo() {
        let mut m = mutator();
        let spec = m
            .add_object(ObjectType::Wall, Vec2::new(1.0, 1.0), None, Properties::new())
            .unwrap();
        let undone = spec.objects[0].id.clone();

        assert!(m.undo());
        let spec = m
            .add_object(ObjectType::Goal, Vec2::new(4.0, 4.0), None, Properties::new())
            .unwrap();
        assert_ne!(spec.objects[0].id, undone);
        assert_eq!(spec.objects[0].id, "obj_2");
        // the restored snapshot itself is untouched
        assert!(m.undo());
        assert_eq!(m.spec().id_seq, 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut m = mutator();
        let before = m.spec();
        let after = m.remove_object("missing");
        assert_eq!(*before, *after);
        assert_eq!(*m.remove_agent("missing"), *before);
        assert_eq!(*m.remove_rule("missing"), *before);
        assert!(!m.can_undo());
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut m = mutator();
        let result = m.add_object(ObjectType::Goal, Vec2::new(7.0, 1.0), None, Properties::new());
        assert!(matches!(result, Err(EngineError::OutOfBounds { .. })));
        assert!(m.spec().objects.is_empty());
    }

    #[test]
    fn test_grid_single_agent() {
        let mut m = mutator();
        m.add_agent("A", Vec2::ZERO, Controller::GridStep).unwrap();
        let second = m.add_agent("B", Vec2::new(1.0, 0.0), Controller::GridStep);
        assert!(matches!(second, Err(EngineError::AgentLimit(_))));

        let config = EngineConfig {
            grid_single_agent: false,
            ..EngineConfig::default()
        };
        let mut relaxed = SceneMutator::new(EnvSpec::grid(5, 5), &config);
        relaxed.add_agent("A", Vec2::ZERO, Controller::GridStep).unwrap();
        relaxed
            .add_agent("B", Vec2::new(1.0, 0.0), Controller::GridStep)
            .unwrap();
        assert_eq!(relaxed.spec().agents.len(), 2);
    }

    #[test]
    fn test_dangling_rule_kept_after_removal() {
        let mut m = mutator();
        m.add_agent("A", Vec2::ZERO, Controller::GridStep).unwrap();
        m.add_object(ObjectType::Checkpoint, Vec2::new(2.0, 2.0), None, Properties::new())
            .unwrap();
        m.add_reward_rule(
            ConditionSpec::AgentAtObject {
                agent_id: "agent_1".into(),
                object_id: "obj_2".into(),
            },
            1.0,
            false,
        )
        .unwrap();
        let spec = m.remove_object("obj_2");
        assert_eq!(spec.rules.rewards.len(), 1);
        assert_eq!(spec.rules.rewards[0].id, "rule_3");
    }

    #[test]
    fn test_undo_redo() {
        let mut m = mutator();
        let empty = m.spec();
        m.add_object(ObjectType::Goal, Vec2::new(4.0, 4.0), None, Properties::new())
            .unwrap();
        let with_goal = m.spec();

        assert!(m.undo());
        assert_eq!(*m.spec(), *empty);
        assert!(!m.undo());
        assert!(m.redo());
        assert_eq!(*m.spec(), *with_goal);
        assert!(!m.redo());

        m.undo();
        m.set_max_steps(Some(30)).unwrap();
        assert!(!m.can_redo());
    }

    #[test]
    fn test_undo_depth_bounded() {
        let config = EngineConfig {
            undo_depth: 2,
            ..EngineConfig::default()
        };
        let mut m = SceneMutator::new(EnvSpec::grid(5, 5), &config);
        for x in 0..4 {
            m.add_object(ObjectType::Wall, Vec2::new(x as f64, 0.0), None, Properties::new())
                .unwrap();
        }
        assert!(m.undo());
        assert!(m.undo());
        assert!(!m.undo());
        assert_eq!(m.spec().objects.len(), 2);
    }

    #[test]
    fn test_asset_defaults_merge_beneath_properties() {
        let mut catalog = InMemoryCatalog::new();
        let mut defaults = Properties::new();
        defaults.insert("color".into(), json!("brown"));
        defaults.insert("weight".into(), json!(3));
        catalog.insert(AssetDefinition {
            id: "crate".into(),
            object_type: Some(ObjectType::Obstacle),
            size: Some(Size::Rect {
                width: 2.0,
                height: 1.0,
            }),
            properties: defaults,
        });
        let mut m = mutator().with_catalog(Arc::new(catalog));

        let mut props = Properties::new();
        props.insert(ASSET_ID_KEY.into(), json!("crate"));
        props.insert("color".into(), json!("red"));
        let spec = m
            .add_object(ObjectType::Obstacle, Vec2::new(1.0, 1.0), None, props)
            .unwrap();
        let object = &spec.objects[0];
        assert_eq!(object.properties["color"], json!("red"));
        assert_eq!(object.properties["weight"], json!(3));
        assert_eq!(object.asset_id(), Some("crate"));
        assert_eq!(
            object.size,
            Size::Rect {
                width: 2.0,
                height: 1.0
            }
        );

        let mut missing = Properties::new();
        missing.insert(ASSET_ID_KEY.into(), json!("barrel"));
        let result = m.add_object(ObjectType::Obstacle, Vec2::new(2.0, 2.0), None, missing);
        assert!(matches!(result, Err(EngineError::AssetNotFound(id)) if id == "barrel"));
    }

    #[test]
    fn test_event_rule_params_checked() {
        let mut m = mutator();
        let result = m.add_event_rule(
            ConditionSpec::collect_key(),
            EventAction::ModifyProperty,
            json!({"objectId": "door_1"}),
            true,
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(m.spec().rules.events.is_empty());
    }

    #[test]
    fn test_snapshots_are_isolated() {
        let mut m = mutator();
        let before = m.spec();
        m.add_object(ObjectType::Trap, Vec2::new(2.0, 2.0), None, Properties::new())
            .unwrap();
        assert!(before.objects.is_empty());
        assert_eq!(m.spec().objects.len(), 1);
    }
}
