//! Observable Containers
//!
//! Arrays, maps, and sets are wrapped in an [`Observable`] cell that keeps a
//! back-pointer list of every signal currently holding the container. The
//! mutating methods (`push`, `splice`, `set`, `add`, ...) perform the
//! operation and then notify each of those signals, so in-place mutation is
//! visible to observers exactly like a `write()` would be.
//!
//! Non-mutating accessors never notify. Plain index/property assignment does
//! not notify either; only the listed methods do.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::EvalError;
use crate::reactive::{Signal, WeakSignal};

use super::Value;

/// Shared storage plus the set of signals wrapping it.
#[derive(Default)]
pub(crate) struct Observable<T> {
    data: RefCell<T>,
    watchers: RefCell<Vec<WeakSignal>>,
}

impl<T> Observable<T> {
    fn new(data: T) -> Self {
        Self {
            data: RefCell::new(data),
            watchers: RefCell::new(Vec::new()),
        }
    }

    fn attach(&self, signal: &Signal) {
        let mut watchers = self.watchers.borrow_mut();
        watchers.retain(|w| w.upgrade().is_some());
        if !watchers.iter().any(|w| w.points_to(signal)) {
            watchers.push(signal.downgrade());
        }
    }

    fn detach(&self, signal: &Signal) {
        self.watchers
            .borrow_mut()
            .retain(|w| w.upgrade().is_some() && !w.points_to(signal));
    }

    fn watcher_count(&self) -> usize {
        self.watchers
            .borrow()
            .iter()
            .filter(|w| w.upgrade().is_some())
            .count()
    }

    /// Notify every live signal wrapping this container.
    fn notify(&self) {
        let live: Vec<Signal> = self
            .watchers
            .borrow()
            .iter()
            .filter_map(WeakSignal::upgrade)
            .collect();
        for signal in live {
            signal.notify_mutation();
        }
    }
}

macro_rules! container_identity {
    ($ty:ident) => {
        impl $ty {
            pub fn ptr_eq(&self, other: &$ty) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }

            pub(crate) fn as_ptr(&self) -> usize {
                Rc::as_ptr(&self.0) as *const () as usize
            }

            pub(crate) fn attach(&self, signal: &Signal) {
                self.0.attach(signal);
            }

            pub(crate) fn detach(&self, signal: &Signal) {
                self.0.detach(signal);
            }

            /// Number of signals currently wrapping this container.
            pub fn watcher_count(&self) -> usize {
                self.0.watcher_count()
            }
        }
    };
}

// ----------------------------------------------------------------------------
// Array
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct JsArray(Rc<Observable<Vec<Value>>>);

container_identity!(JsArray);

impl JsArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(Observable::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.data.borrow().get(index).cloned()
    }

    /// Snapshot of the elements. Callers iterate the copy so callbacks may
    /// mutate the array freely.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.data.borrow().clone()
    }

    /// Index assignment; grows the array with `undefined` holes. Does not
    /// notify. Fails when the array would grow past [`MAX_ARRAY_LEN`].
    pub fn set(&self, index: usize, value: Value) -> Result<(), EvalError> {
        let mut data = self.0.data.borrow_mut();
        if index >= data.len() {
            grow(&mut data, index.saturating_add(1))?;
        }
        data[index] = value;
        Ok(())
    }

    /// Overwrite an existing element. Out-of-range indices are ignored.
    pub(crate) fn replace(&self, index: usize, value: Value) {
        if let Some(slot) = self.0.data.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    /// `length` assignment. Does not notify.
    pub fn set_len(&self, len: usize) -> Result<(), EvalError> {
        let mut data = self.0.data.borrow_mut();
        if len <= data.len() {
            data.truncate(len);
            return Ok(());
        }
        grow(&mut data, len)
    }

    pub fn push(&self, value: Value) -> usize {
        self.push_all(vec![value])
    }

    pub fn push_all(&self, values: Vec<Value>) -> usize {
        let len = {
            let mut data = self.0.data.borrow_mut();
            data.extend(values);
            data.len()
        };
        self.0.notify();
        len
    }

    pub fn pop(&self) -> Value {
        let popped = self.0.data.borrow_mut().pop();
        self.0.notify();
        popped.unwrap_or_default()
    }

    pub fn shift(&self) -> Value {
        let shifted = {
            let mut data = self.0.data.borrow_mut();
            if data.is_empty() {
                None
            } else {
                Some(data.remove(0))
            }
        };
        self.0.notify();
        shifted.unwrap_or_default()
    }

    pub fn unshift(&self, values: Vec<Value>) -> usize {
        let len = {
            let mut data = self.0.data.borrow_mut();
            data.splice(0..0, values);
            data.len()
        };
        self.0.notify();
        len
    }

    /// `splice(start, deleteCount, ...items)` with JS index clamping.
    pub fn splice(&self, start: f64, delete_count: Option<f64>, items: Vec<Value>) -> Vec<Value> {
        let removed = {
            let mut data = self.0.data.borrow_mut();
            let len = data.len();
            let start = relative_index(start, len);
            let count = match delete_count {
                Some(n) if n.is_nan() || n < 0.0 => 0,
                Some(n) => (n.trunc() as usize).min(len - start),
                None => len - start,
            };
            data.splice(start..start + count, items).collect()
        };
        self.0.notify();
        removed
    }

    pub fn reverse(&self) {
        self.0.data.borrow_mut().reverse();
        self.0.notify();
    }

    /// Stable sort with a fallible comparator. On error the array is left
    /// untouched and no notification is sent.
    pub fn sort_by<E>(
        &self,
        mut compare: impl FnMut(&Value, &Value) -> Result<Ordering, E>,
    ) -> Result<(), E> {
        let mut items = self.to_vec();
        let mut failure = None;
        items.sort_by(|a, b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            compare(a, b).unwrap_or_else(|e| {
                failure = Some(e);
                Ordering::Equal
            })
        });
        if let Some(e) = failure {
            return Err(e);
        }
        *self.0.data.borrow_mut() = items;
        self.0.notify();
        Ok(())
    }
}

/// Longest array that index or `length` assignment may produce. Arrays are
/// dense, so every hole below the written index costs a slot.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

fn invalid_length() -> EvalError {
    EvalError::Range("Invalid array length".into())
}

fn grow(data: &mut Vec<Value>, len: usize) -> Result<(), EvalError> {
    if len > MAX_ARRAY_LEN {
        return Err(invalid_length());
    }
    data.try_reserve(len.saturating_sub(data.len()))
        .map_err(|_| invalid_length())?;
    data.resize(len, Value::Undefined);
    Ok(())
}

/// `len` undefined slots, as `new Array(len)` produces.
pub(crate) fn holes(len: usize) -> Result<Vec<Value>, EvalError> {
    let mut data = Vec::new();
    grow(&mut data, len)?;
    Ok(data)
}

/// Resolve a possibly-negative JS index against `len`, clamped to `0..=len`.
pub(crate) fn relative_index(index: f64, len: usize) -> usize {
    let index = if index.is_nan() { 0.0 } else { index.trunc() };
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        index.min(len as f64) as usize
    }
}

// ----------------------------------------------------------------------------
// Map / Set
// ----------------------------------------------------------------------------

/// A hashable wrapper using SameValueZero equality, as JS `Map`/`Set` do.
#[derive(Clone, Debug)]
pub struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_value_zero(&other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                let canonical = if *n == 0.0 {
                    0.0f64
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                canonical.to_bits().hash(state);
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Object(o) => o.as_ptr().hash(state),
            Value::Array(a) => a.as_ptr().hash(state),
            Value::Map(m) => m.as_ptr().hash(state),
            Value::Set(s) => s.as_ptr().hash(state),
            Value::Function(f) => f.as_ptr().hash(state),
            Value::Signal(s) => s.id().hash(state),
            Value::Opaque(o) => o.as_ptr().hash(state),
        }
    }
}

#[derive(Clone, Default)]
pub struct JsMap(Rc<Observable<IndexMap<ValueKey, Value>>>);

container_identity!(JsMap);

impl JsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.data.borrow().get(&ValueKey(key.clone())).cloned()
    }

    pub fn has(&self, key: &Value) -> bool {
        self.0.data.borrow().contains_key(&ValueKey(key.clone()))
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .data
            .borrow()
            .iter()
            .map(|(k, v)| (k.0.clone(), v.clone()))
            .collect()
    }

    /// Insert without notifying; used while constructing a map.
    pub(crate) fn insert_silently(&self, key: Value, value: Value) {
        self.0.data.borrow_mut().insert(ValueKey(key), value);
    }

    pub fn set(&self, key: Value, value: Value) {
        self.insert_silently(key, value);
        self.0.notify();
    }

    pub fn delete(&self, key: &Value) -> bool {
        let removed = self
            .0
            .data
            .borrow_mut()
            .shift_remove(&ValueKey(key.clone()))
            .is_some();
        self.0.notify();
        removed
    }

    pub fn clear(&self) {
        self.0.data.borrow_mut().clear();
        self.0.notify();
    }
}

#[derive(Clone, Default)]
pub struct JsSet(Rc<Observable<IndexSet<ValueKey>>>);

container_identity!(JsSet);

impl JsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has(&self, value: &Value) -> bool {
        self.0.data.borrow().contains(&ValueKey(value.clone()))
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.data.borrow().iter().map(|k| k.0.clone()).collect()
    }

    pub(crate) fn insert_silently(&self, value: Value) {
        self.0.data.borrow_mut().insert(ValueKey(value));
    }

    pub fn add(&self, value: Value) {
        self.insert_silently(value);
        self.0.notify();
    }

    pub fn delete(&self, value: &Value) -> bool {
        let removed = self
            .0
            .data
            .borrow_mut()
            .shift_remove(&ValueKey(value.clone()));
        self.0.notify();
        removed
    }

    pub fn clear(&self) {
        self.0.data.borrow_mut().clear();
        self.0.notify();
    }
}
