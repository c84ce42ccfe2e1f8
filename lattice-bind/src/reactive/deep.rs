//! Deep Refs
//!
//! A deep ref is a signal whose array elements and object properties are
//! themselves signals, recursively. Conversion happens in place: the
//! container keeps its identity and each slot is replaced by a signal
//! holding the old slot value.
//!
//! Object graphs may be cyclic, so conversion carries an identity map from
//! container pointer to the signal created for it. Meeting a container a
//! second time reuses that signal instead of recursing.
//!
//! Maps, sets, functions, and opaque values (dates, regexps, errors, host
//! objects) are wrapped but never descended into.

use std::collections::HashMap;

use crate::value::{JsArray, JsMap, JsObject, JsSet, Value};

use super::Signal;

type Seen = HashMap<usize, Signal>;

/// Convert `value` into a deep signal.
///
/// An existing deep signal is returned unchanged. An existing shallow signal
/// is marked deep and its contents converted.
pub fn deep_ref(value: impl Into<Value>) -> Signal {
    let mut seen = Seen::new();
    convert(value.into(), &mut seen)
}

fn convert(value: Value, seen: &mut Seen) -> Signal {
    let signal = match value {
        Value::Signal(signal) if signal.is_deep() => return signal,
        Value::Signal(signal) => signal,
        plain => {
            if let Some(existing) = plain.container_ptr().and_then(|ptr| seen.get(&ptr)) {
                return existing.clone();
            }
            Signal::new(plain)
        }
    };
    signal.mark_deep();
    let contents = signal.read_untracked();
    if let Some(ptr) = contents.container_ptr() {
        seen.insert(ptr, signal.clone());
    }
    convert_children(&contents, seen);
    signal
}

fn convert_children(value: &Value, seen: &mut Seen) {
    match value {
        Value::Array(items) => {
            for (index, item) in items.to_vec().into_iter().enumerate() {
                if let Some(child) = convert_slot(item, seen) {
                    items.replace(index, Value::Signal(child));
                }
            }
        }
        Value::Object(props) => {
            for (key, item) in props.entries() {
                if let Some(child) = convert_slot(item, seen) {
                    props.set(key, child);
                }
            }
        }
        _ => {}
    }
}

/// Returns the signal to store in a slot, or `None` if the slot already
/// holds a deep signal.
fn convert_slot(item: Value, seen: &mut Seen) -> Option<Signal> {
    match item {
        Value::Signal(s) if s.is_deep() => None,
        other => Some(convert(other, seen)),
    }
}

/// Convert the contents of a value just written into a deep signal.
pub(crate) fn convert_contents(signal: &Signal, value: &Value) {
    let mut seen = Seen::new();
    if let Some(ptr) = value.container_ptr() {
        seen.insert(ptr, signal.clone());
    }
    convert_children(value, &mut seen);
}

/// Recursively strip signals, producing plain containers.
///
/// Containers are copied, so the result shares nothing with the reactive
/// graph. Cycles are preserved.
pub fn to_raw(value: &Value) -> Value {
    let mut copies = HashMap::new();
    raw_inner(value, &mut copies)
}

fn raw_inner(value: &Value, copies: &mut HashMap<usize, Value>) -> Value {
    let value = value.unwrap_untracked();
    let Some(ptr) = value.container_ptr() else {
        return value;
    };
    if let Some(copy) = copies.get(&ptr) {
        return copy.clone();
    }
    match &value {
        Value::Array(items) => {
            let copy = JsArray::new();
            copies.insert(ptr, Value::Array(copy.clone()));
            let raw: Vec<Value> = items.to_vec().iter().map(|v| raw_inner(v, copies)).collect();
            copy.push_all(raw);
            Value::Array(copy)
        }
        Value::Object(props) => {
            let copy = JsObject::new();
            copies.insert(ptr, Value::Object(copy.clone()));
            for (key, item) in props.entries() {
                let raw = raw_inner(&item, copies);
                copy.set(key, raw);
            }
            Value::Object(copy)
        }
        Value::Map(map) => {
            let copy = JsMap::new();
            copies.insert(ptr, Value::Map(copy.clone()));
            for (key, item) in map.entries() {
                let raw = raw_inner(&item, copies);
                copy.insert_silently(raw_inner(&key, copies), raw);
            }
            Value::Map(copy)
        }
        Value::Set(set) => {
            let copy = JsSet::new();
            copies.insert(ptr, Value::Set(copy.clone()));
            for item in set.values() {
                let raw = raw_inner(&item, copies);
                copy.insert_silently(raw);
            }
            Value::Set(copy)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn slot(obj: &JsObject, key: &str) -> Signal {
        obj.get(key)
            .and_then(|v| v.as_signal().cloned())
            .unwrap_or_else(|| panic!("{key} should hold a signal"))
    }

    #[test]
    fn deep_ref_is_idempotent() {
        let r = deep_ref(Value::Object(JsObject::from_pairs([("a", Value::from(1))])));
        let again = deep_ref(r.clone());
        assert_eq!(r, again);
        assert!(r.is_deep());
    }

    #[test]
    fn nested_properties_become_signals() {
        let inner = JsObject::from_pairs([("n", Value::from(1))]);
        let outer = JsObject::from_pairs([
            ("inner", Value::Object(inner.clone())),
            ("list", Value::array(vec![Value::from(1), Value::from(2)])),
        ]);
        let r = deep_ref(Value::Object(outer.clone()));

        let inner_sig = slot(&outer, "inner");
        assert!(inner_sig.is_deep());
        assert!(slot(&inner, "n").is_deep());

        let list = slot(&outer, "list").read_untracked();
        let list = list.as_array().unwrap();
        assert!(list.get(0).unwrap().is_signal());
        assert_eq!(r.read_untracked().as_object().map(JsObject::len), Some(2));
    }

    #[test]
    fn self_referential_object_terminates() {
        let obj = JsObject::new();
        obj.set("self", obj.clone());
        let r = deep_ref(Value::Object(obj.clone()));

        let current = r.read();
        let back = current.as_object().unwrap().get("self").unwrap();
        assert_eq!(back, Value::Signal(r));
    }

    #[test]
    fn opaque_and_collections_are_not_descended() {
        let map = JsMap::new();
        map.set(Value::from("k"), Value::from(1));
        let obj = JsObject::from_pairs([("m", Value::Map(map.clone()))]);
        deep_ref(Value::Object(obj.clone()));

        assert!(slot(&obj, "m").is_deep());
        assert!(!map.get(&Value::from("k")).unwrap().is_signal());
    }

    #[test]
    fn deep_array_push_notifies() {
        let r = deep_ref(Value::array(vec![Value::from(1)]));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _stop = r.observe(move |_, _| counter.set(counter.get() + 1), false);

        r.read().as_array().unwrap().push(Value::from(2));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn writes_into_deep_signals_are_converted() {
        let r = deep_ref(Value::Object(JsObject::new()));
        let next = JsObject::from_pairs([("x", Value::from(1))]);
        r.write(Value::Object(next.clone())).unwrap();
        assert!(slot(&next, "x").is_deep());
    }

    #[test]
    fn to_raw_strips_signals() {
        let obj = JsObject::from_pairs([("a", Value::array(vec![Value::from(1)]))]);
        obj.set("me", obj.clone());
        let r = deep_ref(Value::Object(obj));

        let raw = to_raw(&Value::Signal(r));
        let raw_obj = raw.as_object().unwrap();
        let a = raw_obj.get("a").unwrap();
        assert_eq!(a.as_array().unwrap().get(0), Some(Value::from(1)));
        assert_eq!(raw_obj.get("me"), Some(raw.clone()));
    }
}
