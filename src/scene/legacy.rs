//! Migration of older editor documents into `EnvSpec`
//!
//! Migration is total. Anything missing or malformed is defaulted, and the
//! result is normalized so nothing downstream ever sees the raw shape.

use crate::core::types::Vec2;
use crate::spec::{
    allocate_id, ActionSpace, AgentSpec, ConditionSpec, EnvSpec, EnvType, ObjectSpec, ObjectType,
    RewardRule, TerminationRule, World,
};
use ahash::AHashSet;
use serde::de::DeserializeOwned;
use serde_json::Value;

const DEFAULT_GRID_SIZE: f64 = 10.0;
const DEFAULT_GOAL_REWARD: f64 = 10.0;
const DEFAULT_TRAP_REWARD: f64 = -10.0;
const DEFAULT_KEY_REWARD: f64 = 1.0;
const DEFAULT_STEP_REWARD: f64 = -0.01;

/// Convert a legacy or canonical document into a normalized `EnvSpec`
pub fn migrate_from_legacy(doc: &Value) -> EnvSpec {
    if doc.get("world").is_some() {
        tracing::debug!("document is already canonical; normalizing");
        return normalize(decode_canonical(doc));
    }

    let (width, height) = grid_size(doc.get("gridSize"));
    let mut spec = EnvSpec::new(EnvType::Grid, World::new(width, height));

    if let Some(name) = doc.get("name").and_then(Value::as_str) {
        spec.metadata
            .insert("name".to_string(), Value::String(name.to_string()));
    }

    let agent_pos = doc
        .get("agent")
        .and_then(position)
        .or_else(|| doc.get("agentPos").and_then(position))
        .unwrap_or(Vec2::ZERO);
    let agent_id = spec.allocate_id("agent");
    let agent_pos = spec.world.clamp(agent_pos, EnvType::Grid);
    spec.agents.push(AgentSpec::new(agent_id, "Agent", agent_pos));

    let place = |spec: &mut EnvSpec, key: &str, object_type: ObjectType| -> usize {
        let positions = positions(doc.get(key));
        for pos in &positions {
            let id = spec.allocate_id("obj");
            let pos = spec.world.clamp(*pos, EnvType::Grid);
            spec.objects
                .push(ObjectSpec::new(id, object_type.clone(), pos));
        }
        positions.len()
    };
    place(&mut spec, "goals", ObjectType::Goal);
    place(&mut spec, "walls", ObjectType::Wall);
    place(&mut spec, "obstacles", ObjectType::Obstacle);
    place(&mut spec, "traps", ObjectType::Trap);
    let keys = place(&mut spec, "keys", ObjectType::Key);

    let rewards = doc.get("rewards");
    let reward_of = |key: &str, default: f64| {
        rewards
            .and_then(|r| r.get(key))
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    };

    push_reward(&mut spec, ConditionSpec::reach_goal(), reward_of("goal", DEFAULT_GOAL_REWARD), false);
    push_termination(&mut spec, ConditionSpec::reach_goal());
    push_reward(&mut spec, ConditionSpec::hit_trap(), reward_of("trap", DEFAULT_TRAP_REWARD), false);
    push_termination(&mut spec, ConditionSpec::hit_trap());
    if keys > 0 {
        push_reward(&mut spec, ConditionSpec::collect_key(), reward_of("key", DEFAULT_KEY_REWARD), false);
    }
    let step_reward = reward_of("step", DEFAULT_STEP_REWARD);
    if step_reward != 0.0 {
        push_reward(&mut spec, ConditionSpec::Step, step_reward, true);
    }

    spec.episode.max_steps = doc
        .get("maxSteps")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0);

    tracing::debug!(
        objects = spec.objects.len(),
        rules = spec.rules.rewards.len() + spec.rules.terminations.len(),
        "legacy document migrated"
    );
    normalize(spec)
}

/// Decode a canonical document part by part
///
/// A malformed entry is dropped and a malformed section falls back to its
/// default, so one bad field never discards the rest of the document.
fn decode_canonical(doc: &Value) -> EnvSpec {
    let env_type: EnvType = section(doc.get("envType"), "envType");
    let world = doc
        .get("world")
        .and_then(|w| serde_json::from_value::<World>(w.clone()).ok())
        .unwrap_or_else(|| {
            tracing::warn!("malformed world; using its readable dimensions");
            let (width, height) = grid_size(doc.get("world"));
            World::new(width, height)
        });

    let mut spec = EnvSpec::new(env_type, world);
    if let Some(space) = doc.get("actionSpace") {
        match serde_json::from_value::<ActionSpace>(space.clone()) {
            Ok(space) => spec.action_space = space,
            Err(e) => tracing::warn!(error = %e, "malformed actionSpace; using the default"),
        }
    }
    spec.objects = entries(doc.get("objects"), "object");
    spec.agents = entries(doc.get("agents"), "agent");
    let rules = doc.get("rules");
    spec.rules.rewards = entries(rules.and_then(|r| r.get("rewards")), "reward rule");
    spec.rules.terminations = entries(rules.and_then(|r| r.get("terminations")), "termination rule");
    spec.rules.events = entries(rules.and_then(|r| r.get("events")), "event rule");
    spec.episode = section(doc.get("episode"), "episode");
    spec.metadata = section(doc.get("metadata"), "metadata");
    spec.id_seq = doc.get("idSeq").and_then(Value::as_u64).unwrap_or(0);
    spec
}

fn section<T: DeserializeOwned + Default>(value: Option<&Value>, what: &str) -> T {
    match value {
        None | Some(Value::Null) => T::default(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            tracing::warn!(section = what, error = %e, "malformed section; using the default");
            T::default()
        }),
    }
}

/// Decodable elements of a JSON array; the rest are dropped
fn entries<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(entry = what, error = %e, "dropping malformed entry");
                None
            }
        })
        .collect()
}

/// Repair a canonical spec: bounds, action space, ids and the id counter
pub fn normalize(mut spec: EnvSpec) -> EnvSpec {
    let sane = |v: f64| v.is_finite() && v > 0.0;
    if !sane(spec.world.width) {
        spec.world.width = DEFAULT_GRID_SIZE;
    }
    if !sane(spec.world.height) {
        spec.world.height = DEFAULT_GRID_SIZE;
    }
    if spec.world.cell_size.map_or(false, |cs| !sane(cs)) {
        spec.world.cell_size = None;
    }

    let space_fits = spec.action_space.validate().is_ok()
        && !(spec.env_type == EnvType::Grid
            && matches!(spec.action_space, ActionSpace::Continuous { .. }));
    if !space_fits {
        spec.action_space = EnvSpec::new(spec.env_type, spec.world.clone()).action_space;
    }

    if let Some(0) = spec.episode.max_steps {
        spec.episode.max_steps = None;
    }

    for agent in &mut spec.agents {
        if !agent.position.is_finite() {
            agent.position = spec.world.clamp(agent.position, spec.env_type);
        }
    }
    for object in &mut spec.objects {
        if !object.position.is_finite() {
            object.position = spec.world.clamp(object.position, spec.env_type);
        }
    }

    repair_ids(&mut spec);
    spec
}

fn repair_ids(spec: &mut EnvSpec) {
    let mut taken: AHashSet<String> = spec
        .objects
        .iter()
        .map(|o| o.id.clone())
        .chain(spec.agents.iter().map(|a| a.id.clone()))
        .chain(spec.rules.ids().map(str::to_string))
        .collect();
    let mut seq = spec.id_seq.max(highest_suffix(taken.iter()));
    let mut seen: AHashSet<String> = AHashSet::new();

    let mut fix = |id: &mut String, prefix: &str| {
        if !id.trim().is_empty() && seen.insert(id.clone()) {
            return;
        }
        let fresh = allocate_id(prefix, &mut seq, |c| taken.contains(c));
        tracing::debug!(old = %id, new = %fresh, "id repaired");
        taken.insert(fresh.clone());
        seen.insert(fresh.clone());
        *id = fresh;
    };

    for object in &mut spec.objects {
        fix(&mut object.id, "obj");
    }
    for agent in &mut spec.agents {
        fix(&mut agent.id, "agent");
    }
    for rule in &mut spec.rules.rewards {
        fix(&mut rule.id, "rule");
    }
    for rule in &mut spec.rules.terminations {
        fix(&mut rule.id, "rule");
    }
    for rule in &mut spec.rules.events {
        fix(&mut rule.id, "rule");
    }

    spec.id_seq = seq;
}

/// Largest `n` among ids shaped like `<prefix>_<n>`
fn highest_suffix<'a>(ids: impl Iterator<Item = &'a String>) -> u64 {
    ids.filter_map(|id| id.rsplit_once('_'))
        .filter_map(|(_, n)| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

fn push_reward(spec: &mut EnvSpec, condition: ConditionSpec, reward: f64, shaping: bool) {
    let id = spec.allocate_id("rule");
    spec.rules.rewards.push(RewardRule {
        id,
        condition,
        reward,
        shaping,
    });
}

fn push_termination(spec: &mut EnvSpec, condition: ConditionSpec) {
    let id = spec.allocate_id("rule");
    spec.rules.terminations.push(TerminationRule {
        id,
        condition,
        success: None,
    });
}

/// `gridSize` as a number, `[w, h]` or `{width, height}`
fn grid_size(value: Option<&Value>) -> (f64, f64) {
    let positive = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
    let (w, h) = match value {
        Some(Value::Number(n)) => (n.as_f64(), n.as_f64()),
        Some(Value::Array(items)) => (
            items.first().and_then(Value::as_f64),
            items.get(1).and_then(Value::as_f64),
        ),
        Some(Value::Object(map)) => (
            map.get("width").and_then(Value::as_f64),
            map.get("height").and_then(Value::as_f64),
        ),
        _ => (None, None),
    };
    (
        positive(w).unwrap_or(DEFAULT_GRID_SIZE),
        positive(h).unwrap_or(DEFAULT_GRID_SIZE),
    )
}

/// A position as `{x, y}`, `[x, y]` or `{position: {x, y}}`
fn position(value: &Value) -> Option<Vec2> {
    let p = match value {
        Value::Array(items) => Vec2::new(items.first()?.as_f64()?, items.get(1)?.as_f64()?),
        Value::Object(map) => {
            if let Some(inner) = map.get("position") {
                return position(inner);
            }
            Vec2::new(map.get("x")?.as_f64()?, map.get("y")?.as_f64()?)
        }
        _ => return None,
    };
    p.is_finite().then_some(p)
}

fn positions(value: Option<&Value>) -> Vec<Vec2> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(position).collect())
        .unwrap_or_default()
}
