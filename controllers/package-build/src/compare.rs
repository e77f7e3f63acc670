//! Execution-spec comparison.
//!
//! Decides whether a live job still matches the desired spec synthesized
//! from a PackageBuild's template. Identity fields never enter the
//! comparison: only the two `JobSpec` values do.

use k8s_openapi::api::batch::v1::JobSpec;
use serde_json::Value;

/// Semantic equality between a live job's execution spec and the desired
/// spec.
///
/// A live object carries fields the apiserver's defaulting populated that
/// the template never set, so the desired spec is compared as a
/// normalized subset of the live spec: every field the template sets must
/// match, fields only the server added are ignored.
pub fn job_specs_equal(existing: &JobSpec, desired: &JobSpec) -> bool {
    let (Ok(existing), Ok(desired)) =
        (serde_json::to_value(existing), serde_json::to_value(desired))
    else {
        return false;
    };
    subsumes(&normalize(desired), &normalize(existing))
}

/// Strips nulls and empty containers so that "absent" and "empty" compare
/// equal regardless of which side serialized them.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: serde_json::Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// True when every field present in `want` is present and equal in `have`.
/// Arrays must agree in length and subsume element-wise: list order is
/// semantic for job specs (containers, volumes, args).
fn subsumes(want: &Value, have: &Value) -> bool {
    match (want, have) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| have.get(key).is_some_and(|other| subsumes(value, other))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len()
                && want.iter().zip(have.iter()).all(|(w, h)| subsumes(w, h))
        }
        (want, have) => want == have,
    }
}
