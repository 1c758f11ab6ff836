//! Plan computation.
//!
//! Given a resource schema, the prior state, the proposed state and the raw
//! configuration, [`plan`] produces the state the provider expects after
//! apply, the per-attribute changes and whether the change needs a replace.
//!
//! Rules, applied per schema attribute:
//!
//! - A configured value wins. If it is equivalent to the prior value (sets
//!   compared without order, case-insensitive enumerations without case) the
//!   prior value is kept so no spurious diff appears.
//! - An unconfigured attribute with a default takes the default.
//! - An unconfigured computed attribute keeps its prior value, or is left
//!   null (unknown) on create and on replace.
//! - Any `force_new` attribute that differs from prior state forces replace.
//! - A null proposed state plans destruction.

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::validate;

/// Compute the plan for a resource.
///
/// Returns the validation diagnostics as `Err` when `config` is invalid; no
/// plan is produced in that case.
pub fn plan(
    schema: &Schema,
    prior_state: Option<&Value>,
    proposed_state: &Value,
    config: &Value,
) -> Result<PlanResult, Vec<Diagnostic>> {
    let prior = prior_state.and_then(Value::as_object);

    if proposed_state.is_null() {
        return Ok(plan_destroy(prior));
    }

    let config = if config.is_null() { proposed_state } else { config };
    let diagnostics = validate(schema, config);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    let config = config.as_object();

    let mut planned = Map::new();
    for (name, attr) in &schema.attributes {
        let configured = config
            .and_then(|c| c.get(name))
            .filter(|v| !v.is_null() && !attr.flags.is_computed_only());
        let prior_value = prior.and_then(|p| p.get(name));
        planned.insert(name.clone(), planned_value(attr, configured, prior_value));
    }

    let requires_replace = prior.is_some_and(|prior| {
        schema.attributes.iter().any(|(name, attr)| {
            attr.force_new
                && !values_equivalent(
                    attr,
                    prior.get(name).unwrap_or(&Value::Null),
                    planned.get(name).unwrap_or(&Value::Null),
                )
        })
    });

    // A replaced object gets fresh server-assigned values.
    if requires_replace {
        for (name, attr) in &schema.attributes {
            let configured = !attr.flags.is_computed_only()
                && config.and_then(|c| c.get(name)).is_some_and(|v| !v.is_null());
            if attr.flags.computed && !configured && attr.default.is_none() {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    let changes = diff(schema, prior, &planned);
    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_destroy(prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = prior
        .map(|prior| {
            prior
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(name, v)| AttributeChange::removed(name.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn planned_value(attr: &Attribute, configured: Option<&Value>, prior: Option<&Value>) -> Value {
    match (configured, prior) {
        (Some(cfg), Some(prior)) if !prior.is_null() => {
            if values_equivalent(attr, prior, cfg) {
                prior.clone()
            } else if let (Value::Object(cfg), Value::Object(prior)) = (cfg, prior) {
                merge_object(cfg, prior)
            } else {
                cfg.clone()
            }
        },
        (Some(cfg), _) => cfg.clone(),
        (None, prior) => {
            if let Some(default) = &attr.default {
                default.clone()
            } else if attr.flags.computed {
                prior.cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        },
    }
}

/// Null fields of a configured object take their prior value.
fn merge_object(configured: &Map<String, Value>, prior: &Map<String, Value>) -> Value {
    let mut merged = prior.clone();
    for (key, value) in configured {
        if !value.is_null() {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Attribute-aware equality used for planning.
pub fn values_equivalent(attr: &Attribute, a: &Value, b: &Value) -> bool {
    match (&attr.attr_type, a, b) {
        (AttributeType::Set(_), Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().all(|item| b.contains(item))
        },
        (AttributeType::String, Value::String(a), Value::String(b)) => attr.equivalent_str(a, b),
        _ => a == b,
    }
}

fn diff(
    schema: &Schema,
    prior: Option<&Map<String, Value>>,
    planned: &Map<String, Value>,
) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    for (name, attr) in &schema.attributes {
        let before = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        let after = planned.get(name).filter(|v| !v.is_null());
        match (before, after) {
            (None, None) => {},
            (None, Some(after)) => changes.push(AttributeChange::added(name.clone(), after.clone())),
            (Some(before), None) => {
                // Unknown computed values are not a removal.
                if !attr.flags.computed {
                    changes.push(AttributeChange::removed(name.clone(), before.clone()));
                }
            },
            (Some(before), Some(after)) => {
                if !values_equivalent(attr, before, after) {
                    changes.push(AttributeChange::modified(
                        name.clone(),
                        before.clone(),
                        after.clone(),
                    ));
                }
            },
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Schema};
    use serde_json::json;

    fn secret_schema() -> Schema {
        Schema::new(1)
            .with_attribute("id", Attribute::computed_int64())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("value", Attribute::required_string().sensitive())
            .with_attribute("images", Attribute::optional_computed_string_set())
            .with_attribute(
                "events",
                Attribute::required_string_set().one_of(&["push", "tag", "cron"]),
            )
    }

    #[test]
    fn test_plan_create_leaves_computed_unknown() {
        let config = json!({"name": "token", "value": "v", "events": ["push"]});
        let result = plan(&secret_schema(), None, &config, &config).unwrap();

        assert!(!result.requires_replace);
        assert_eq!(result.planned_state["id"], Value::Null);
        assert_eq!(result.planned_state["images"], Value::Null);
        assert_eq!(result.planned_state["name"], "token");

        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["events", "name", "value"]);
    }

    #[test]
    fn test_plan_update_keeps_computed_prior_values() {
        let prior = json!({"id": 4, "name": "token", "value": "v", "images": ["alpine"], "events": ["push"]});
        let config = json!({"name": "token", "value": "v2", "images": null, "events": ["push"]});
        let result = plan(&secret_schema(), Some(&prior), &config, &config).unwrap();

        assert!(!result.requires_replace);
        assert_eq!(result.planned_state["id"], 4);
        assert_eq!(result.planned_state["images"], json!(["alpine"]));
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "value");
    }

    #[test]
    fn test_plan_sets_compare_without_order() {
        let prior = json!({"id": 4, "name": "token", "value": "v", "images": [], "events": ["push", "tag"]});
        let config = json!({"name": "token", "value": "v", "events": ["tag", "push"]});
        let result = plan(&secret_schema(), Some(&prior), &config, &config).unwrap();

        assert!(result.changes.is_empty());
        assert_eq!(result.planned_state["events"], json!(["push", "tag"]));
    }

    #[test]
    fn test_plan_force_new_requires_replace() {
        let prior = json!({"id": 4, "name": "token", "value": "v", "images": [], "events": ["push"]});
        let config = json!({"name": "renamed", "value": "v", "events": ["push"]});
        let result = plan(&secret_schema(), Some(&prior), &config, &config).unwrap();

        assert!(result.requires_replace);
        assert_eq!(result.planned_state["id"], Value::Null);
        assert!(result.changes.iter().any(|c| c.path == "name"));
    }

    #[test]
    fn test_plan_rejects_invalid_config() {
        let config = json!({"name": "token", "value": "v", "events": ["push", "commit"]});
        let diagnostics = plan(&secret_schema(), None, &config, &config).unwrap_err();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("events.1"));
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": 4, "name": "token", "images": null});
        let result = plan(&secret_schema(), Some(&prior), &Value::Null, &Value::Null).unwrap();

        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 2);
        assert!(result.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_case_insensitive_value_keeps_prior() {
        let schema = Schema::v0().with_attribute(
            "visibility",
            Attribute::optional_computed_string().one_of_case_insensitive(&["public", "private"]),
        );
        let prior = json!({"visibility": "private"});
        let config = json!({"visibility": "PRIVATE"});
        let result = plan(&schema, Some(&prior), &config, &config).unwrap();

        assert_eq!(result.planned_state["visibility"], "private");
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_plan_object_fills_unset_fields_from_prior() {
        let schema = Schema::v0().with_attribute(
            "trusted",
            Attribute::new(
                AttributeType::object([
                    ("network", AttributeType::Bool),
                    ("volumes", AttributeType::Bool),
                ]),
                AttributeFlags::optional_computed(),
            ),
        );
        let prior = json!({"trusted": {"network": false, "volumes": true}});
        let config = json!({"trusted": {"network": true, "volumes": null}});
        let result = plan(&schema, Some(&prior), &config, &config).unwrap();

        assert_eq!(
            result.planned_state["trusted"],
            json!({"network": true, "volumes": true})
        );
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn test_plan_applies_defaults() {
        let schema = Schema::v0()
            .with_attribute("branch", Attribute::optional_computed_string().with_default(json!("main")));
        let config = json!({});
        let result = plan(&schema, None, &config, &config).unwrap();
        assert_eq!(result.planned_state["branch"], "main");
    }
}
