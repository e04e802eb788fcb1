//! Application of fired event rules to the object list

use crate::rollout::result::StepEvent;
use crate::rollout::state::SimState;
use crate::rules::engine::FiredEvent;
use crate::spec::{EventEffect, ModifyParams, ObjectSpec, ObjectType, RemoveParams, SpawnParams};

/// Apply fired events in firing order
///
/// Failures never abort the rollout; each one is reported as an
/// `event_failed` event and the remaining effects still apply.
pub fn apply_effects(state: &mut SimState, fired: &[FiredEvent]) -> Vec<StepEvent> {
    let mut events = Vec::new();
    for event in fired {
        let rule_id = event.rule_id.clone();
        let result = match &event.effect {
            EventEffect::Spawn(params) => spawn(state, params).map(|(object_id, object_type)| {
                StepEvent::ObjectSpawned {
                    rule_id: rule_id.clone(),
                    object_id,
                    object_type,
                }
            }),
            EventEffect::Modify(params) => modify(state, params).map(|()| StepEvent::PropertyModified {
                rule_id: rule_id.clone(),
                object_id: params.object_id.clone(),
                key: params.key.clone(),
            }),
            EventEffect::Remove(params) => remove(state, params).map(|()| StepEvent::ObjectRemoved {
                rule_id: rule_id.clone(),
                object_id: params.object_id.clone(),
            }),
            // Left to the caller; the `event_rule` descriptor carries the params
            EventEffect::Custom(_) => continue,
        };

        match result {
            Ok(applied) => events.push(applied),
            Err(reason) => {
                tracing::warn!(rule = %rule_id, %reason, "event effect failed");
                events.push(StepEvent::EventFailed { rule_id, reason });
            }
        }
    }
    events
}

fn spawn(
    state: &mut SimState,
    params: &SpawnParams,
) -> Result<(String, ObjectType), String> {
    if !state.world.contains(params.position, state.env_type) {
        return Err(format!(
            "spawn position ({}, {}) is outside the world",
            params.position.x, params.position.y
        ));
    }
    if !params.size.is_well_formed() {
        return Err("spawn size is malformed".to_string());
    }
    let id = state.next_object_id();
    let mut object = ObjectSpec::new(id.clone(), params.object_type.clone(), params.position);
    object.size = params.size.clone();
    object.properties = params.properties.clone();
    state.objects.push(object);
    Ok((id, params.object_type.clone()))
}

fn modify(state: &mut SimState, params: &ModifyParams) -> Result<(), String> {
    let object = state
        .object_mut(&params.object_id)
        .ok_or_else(|| format!("no object '{}'", params.object_id))?;
    object
        .properties
        .insert(params.key.clone(), params.value.clone());
    Ok(())
}

fn remove(state: &mut SimState, params: &RemoveParams) -> Result<(), String> {
    let before = state.objects.len();
    state.objects.retain(|o| o.id != params.object_id);
    if state.objects.len() == before {
        return Err(format!("no object '{}'", params.object_id));
    }
    Ok(())
}
