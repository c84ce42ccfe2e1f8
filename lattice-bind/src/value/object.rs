//! Plain objects.
//!
//! Property order is insertion order (`IndexMap`), matching what template
//! authors see when iterating an object literal.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Function, Value};

/// A shared, mutable property bag.
#[derive(Clone, Default)]
pub struct JsObject(Rc<ObjectData>);

#[derive(Default)]
struct ObjectData {
    props: RefCell<IndexMap<String, Value>>,
    /// Set for objects created with `new`, used by `instanceof`.
    constructor: Option<Function>,
}

impl JsObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_constructor(constructor: Function) -> Self {
        Self(Rc::new(ObjectData {
            props: RefCell::new(IndexMap::new()),
            constructor: Some(constructor),
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let props = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self(Rc::new(ObjectData {
            props: RefCell::new(props),
            constructor: None,
        }))
    }

    /// Own property lookup. Signals are returned as-is.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.props.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.props.borrow_mut().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.props.borrow_mut().shift_remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn constructor(&self) -> Option<&Function> {
        self.0.constructor.as_ref()
    }

    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let obj = JsObject::from_pairs([("b", 1), ("a", 2)]);
        obj.set("c", 3);
        assert_eq!(obj.keys(), vec!["b", "a", "c"]);

        obj.remove("b");
        assert_eq!(obj.keys(), vec!["a", "c"]);
    }

    #[test]
    fn clones_share_properties() {
        let a = JsObject::new();
        let b = a.clone();
        b.set("x", "y");
        assert_eq!(a.get("x").unwrap().as_str(), Some("y"));
        assert!(a.ptr_eq(&b));
    }
}
