//! Configuration validation against a [`Schema`].
//!
//! Diagnostics carry the dotted path of the offending attribute, with set
//! elements addressed by index (`events.1`).
//!
//! # Example
//!
//! ```
//! use terraform_provider_woodpecker::schema::{Schema, Attribute};
//! use terraform_provider_woodpecker::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("timeout", Attribute::optional_computed_int64().at_least(1));
//!
//! let diagnostics = validate(&schema, &json!({"name": "ci", "timeout": 60}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "ci", "timeout": 0}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("timeout".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, AttributeValidator, Diagnostic, Schema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Check `value` against `schema`; an empty result means it is valid.
///
/// Required attributes must be present and non-null, values must match
/// their declared type, and validators run on scalars and on every set
/// element. Computed-only attributes are not checked since the server owns
/// them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        // Nothing configured yet: only required attributes can be missing.
        Value::Null => {
            for (name, attr) in &schema.attributes {
                validate_attribute(attr, None, name, &mut diagnostics);
            }
            return diagnostics;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }
    diagnostics
}

/// [`validate`] as a `Result`, for `?` at call sites that must stop on errors.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` produces no diagnostics.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Validate the attributes an update would change.
///
/// Attributes whose planned value is the non-null value already in `prior`
/// are skipped. Those were carried forward from state, and the server may
/// hold values (a zero `timeout`, say) that the configuration could never
/// set.
pub fn validate_changes(schema: &Schema, prior: &Value, planned: &Value) -> Vec<Diagnostic> {
    let (Some(prior), Some(planned)) = (prior.as_object(), planned.as_object()) else {
        return validate(schema, planned);
    };

    let mut diagnostics = Vec::new();
    for (name, attr) in &schema.attributes {
        let value = planned.get(name);
        let unchanged = value.is_some_and(|v| !v.is_null() && prior.get(name) == Some(v));
        if !unchanged {
            validate_attribute(attr, value, name, &mut diagnostics);
        }
    }
    diagnostics
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            // Type errors make validator messages noise.
            if diagnostics.len() == before {
                apply_validators(&attr.validators, v, path, diagnostics);
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
                if let Some(dup) = first_duplicate(arr) {
                    diagnostics.push(
                        Diagnostic::error(format!("Duplicate set element in '{}'", path))
                            .with_detail(format!("Value {} appears more than once", dup))
                            .with_attribute(path),
                    );
                }
            } else {
                diagnostics.push(type_error(path, "set", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &BTreeMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        let attr_path = format!("{}.{}", path, name);
        match obj.get(name) {
            None | Some(Value::Null) => {},
            Some(value) => validate_attribute_type(attr_type, value, &attr_path, diagnostics),
        }
    }
    for name in obj.keys().filter(|k| !attrs.contains_key(k.as_str())) {
        diagnostics.push(
            Diagnostic::error(format!("Unsupported attribute '{}.{}'", path, name))
                .with_attribute(format!("{}.{}", path, name)),
        );
    }
}

fn apply_validators(
    validators: &[AttributeValidator],
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if validators.is_empty() {
        return;
    }
    if let Value::Array(items) = value {
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}.{}", path, i);
            for validator in validators {
                check_validator(validator, item, &item_path, diagnostics);
            }
        }
        return;
    }
    for validator in validators {
        check_validator(validator, value, path, diagnostics);
    }
}

fn check_validator(
    validator: &AttributeValidator,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match validator {
        AttributeValidator::OneOf {
            values,
            case_insensitive,
        } => {
            let Some(s) = value.as_str() else {
                return;
            };
            let matched = values.iter().any(|allowed| {
                if *case_insensitive {
                    allowed.eq_ignore_ascii_case(s)
                } else {
                    allowed == s
                }
            });
            if !matched {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                diagnostics.push(
                    Diagnostic::error(format!("Invalid Attribute Value Match for '{}'", path))
                        .with_detail(format!(
                            "Attribute {} value must be one of: [{}], got: \"{}\"",
                            path,
                            quoted.join(" "),
                            s
                        ))
                        .with_attribute(path),
                );
            }
        },
        AttributeValidator::AtLeast { min } => {
            let Some(n) = value.as_i64() else {
                return;
            };
            if n < *min {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid Attribute Value for '{}'", path))
                        .with_detail(format!(
                            "Attribute {} value must be at least {}, got: {}",
                            path, min, n
                        ))
                        .with_attribute(path),
                );
            }
        },
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn first_duplicate(items: &[Value]) -> Option<&Value> {
    items
        .iter()
        .enumerate()
        .find(|(i, item)| items[..*i].contains(item))
        .map(|(_, item)| item)
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        ))
        .with_attribute(path)
}
