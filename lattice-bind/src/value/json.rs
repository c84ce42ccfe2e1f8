//! JSON interop.
//!
//! `from_json` is the usual way hosts seed scope objects; `to_json` backs
//! `JSON.stringify` and reads through signals, producing the raw structure.

use std::collections::HashSet;

use serde_json::{Map, Number};

use crate::error::EvalError;

use super::{JsArray, JsObject, OpaqueKind, Value};

impl Value {
    /// Build a plain value tree from JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::Array(JsArray::from_vec(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(JsObject::from_pairs(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Serialize following `JSON.stringify` rules. `undefined` and functions
    /// are dropped from objects and become `null` inside arrays.
    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        let mut visiting = HashSet::new();
        Ok(to_json_inner(self, &mut visiting)?.unwrap_or(serde_json::Value::Null))
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn to_json_inner(
    value: &Value,
    visiting: &mut HashSet<usize>,
) -> Result<Option<serde_json::Value>, EvalError> {
    let value = value.unwrap_untracked();
    let ptr = value.container_ptr();
    if let Some(ptr) = ptr {
        if !visiting.insert(ptr) {
            return Err(EvalError::type_error("Converting circular structure to JSON"));
        }
    }
    let json = match &value {
        Value::Undefined | Value::Function(_) => None,
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => Some(number_to_json(*n)),
        Value::String(s) => Some(serde_json::Value::String(s.to_string())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.to_vec() {
                out.push(to_json_inner(&item, visiting)?.unwrap_or(serde_json::Value::Null));
            }
            Some(serde_json::Value::Array(out))
        }
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, item) in obj.entries() {
                if let Some(json) = to_json_inner(&item, visiting)? {
                    out.insert(key, json);
                }
            }
            Some(serde_json::Value::Object(out))
        }
        Value::Map(_) | Value::Set(_) => Some(serde_json::Value::Object(Map::new())),
        Value::Opaque(o) => Some(match o.kind() {
            OpaqueKind::Date(ms) => number_to_json(*ms),
            _ => serde_json::Value::Object(Map::new()),
        }),
        Value::Signal(s) => to_json_inner(&s.read_untracked(), visiting)?,
    };
    if let Some(ptr) = ptr {
        visiting.remove(&ptr);
    }
    Ok(json)
}
