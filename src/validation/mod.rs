//! Pre-flight checks for an environment and policy
//!
//! Errors make a rollout impossible; warnings describe things that will
//! silently evaluate to false or be ignored at run time.

use crate::policy::PolicyKind;
use crate::spec::{ActionSpace, ConditionSpec, EnvSpec, EnvType, ObjectType, RefKind};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            warnings,
        }
    }
}

/// Structural checks plus the requirements of the chosen policy
pub fn validate(spec: &EnvSpec, policy: &PolicyKind, has_inference: bool) -> ValidationReport {
    let (mut errors, warnings) = structural_findings(spec);

    match policy {
        PolicyKind::Random => {}
        PolicyKind::Greedy => {
            if !spec.has_goal() {
                errors.push("greedy policy needs at least one goal".to_string());
            }
        }
        PolicyKind::TrainedModel { run_id } => {
            if run_id.trim().is_empty() {
                errors.push("trained_model policy needs a run id".to_string());
            }
            if !has_inference {
                errors.push("trained_model policy needs an inference backend".to_string());
            }
        }
    }

    let report = ValidationReport::from_findings(errors, warnings);
    tracing::debug!(
        valid = report.valid,
        warnings = report.warnings.len(),
        %policy,
        "environment validated"
    );
    report
}

/// Structural checks only
pub fn validate_spec(spec: &EnvSpec) -> ValidationReport {
    let (errors, warnings) = structural_findings(spec);
    ValidationReport::from_findings(errors, warnings)
}

fn structural_findings(spec: &EnvSpec) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = spec.world.validate() {
        errors.push(e);
    }
    if let Err(e) = spec.action_space.validate() {
        errors.push(e);
    }
    if spec.env_type == EnvType::Grid && matches!(spec.action_space, ActionSpace::Continuous { .. }) {
        errors.push("grid environments need a discrete action space".to_string());
    }
    if spec.agents.is_empty() {
        errors.push("environment has no agent".to_string());
    }

    // Ids are unique across objects, agents and rules
    let mut seen: AHashSet<&str> = AHashSet::new();
    let ids = spec
        .objects
        .iter()
        .map(|o| o.id.as_str())
        .chain(spec.agents.iter().map(|a| a.id.as_str()))
        .chain(spec.rules.ids());
    for id in ids {
        if id.trim().is_empty() {
            errors.push("empty id".to_string());
        } else if !seen.insert(id) {
            errors.push(format!("duplicate id '{}'", id));
        }
    }

    if spec.env_type == EnvType::Grid && spec.agents.len() > 1 {
        warnings.push(format!(
            "grid environment has {} agents; editors expect one",
            spec.agents.len()
        ));
    }
    for agent in &spec.agents {
        if !spec.in_bounds(agent.position) {
            warnings.push(format!("agent '{}' starts outside the world", agent.id));
        }
    }
    for object in &spec.objects {
        if !spec.in_bounds(object.position) {
            warnings.push(format!("object '{}' is outside the world", object.id));
        }
        if !object.size.is_well_formed() {
            warnings.push(format!(
                "object '{}' has a malformed size and is treated as a point",
                object.id
            ));
        }
    }

    for (rule_id, condition) in spec.rules.conditions() {
        check_condition(spec, rule_id, condition, &mut warnings);
    }
    for rule in &spec.rules.events {
        if let Err(e) = rule.effect() {
            warnings.push(e);
        }
    }

    (errors, warnings)
}

fn check_condition(spec: &EnvSpec, rule_id: &str, condition: &ConditionSpec, warnings: &mut Vec<String>) {
    if matches!(condition, ConditionSpec::Unknown) {
        warnings.push(format!("rule '{}' uses an unknown condition kind", rule_id));
        return;
    }

    for (kind, id) in condition.references() {
        let resolves = match kind {
            RefKind::Agent => spec.agent(id).is_some(),
            RefKind::Object => spec.object(id).is_some(),
            RefKind::Entity => spec.agent(id).is_some() || spec.object(id).is_some(),
        };
        if !resolves {
            warnings.push(format!("rule '{}' refers to missing id '{}'", rule_id, id));
        }
    }

    if let ConditionSpec::InsideRegion { region_id, .. } = condition {
        if let Some(object) = spec.object(region_id) {
            if object.object_type != ObjectType::Region {
                warnings.push(format!(
                    "rule '{}' uses '{}' as a region but it is a {}",
                    rule_id, region_id, object.object_type
                ));
            }
        }
    }
}
