//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which subscribers depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a collector frame is active, the signal
//!    records itself in that frame.
//!
//! 2. When a signal's value changes, every subscriber is notified with the
//!    new value, unless the signal is paused or a batch is active (in which
//!    case the notification is deferred to the end of the batch).
//!
//! 3. Signals whose value is an array, map, or set register with that
//!    container, so in-place mutation notifies them too.
//!
//! # Identity
//!
//! Signals are shared handles: cloning a `Signal` yields the same cell, and
//! equality and hashing go by identity. Wrapping a signal in a signal is a
//! no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::diagnostics::{self, Diagnostic, DiagnosticKind};
use crate::error::ReactiveError;
use crate::value::Value;

use super::batch;
use super::computed::ComputedCore;
use super::context::{self, silence};
use super::deep;
use super::subscriber::{StopHandle, Subscriber, SubscriberId};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// What `write` is allowed to do.
pub(crate) enum Access {
    Writable,
    ReadOnly,
    Computed(ComputedCore),
}

pub(crate) struct SignalInner {
    id: u64,
    value: RefCell<Value>,
    /// Keyed by subscriber id: insertion order is notification order, and
    /// re-subscribing is a no-op.
    observers: RefCell<IndexMap<SubscriberId, Subscriber>>,
    paused: Cell<bool>,
    deep: Cell<bool>,
    access: Access,
}

/// A reactive cell holding a dynamic [`Value`].
///
/// # Example
///
/// ```rust
/// use lattice_bind::{Signal, Value};
///
/// let count = Signal::new(0);
/// let _stop = count.observe(|v, _| println!("count is {}", v.to_js_string()), false);
/// count.write(Value::from(5)).unwrap();
/// assert_eq!(count.read(), Value::from(5));
/// ```
#[derive(Clone)]
pub struct Signal(Rc<SignalInner>);

impl Signal {
    /// Create a writable signal. If `value` is already a signal, that same
    /// signal is returned.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_access(value.into(), Access::Writable)
    }

    /// Create a signal whose value can only change through container
    /// mutation or `trigger`.
    pub fn read_only(value: impl Into<Value>) -> Self {
        Self::with_access(value.into(), Access::ReadOnly)
    }

    pub(crate) fn computed(core: ComputedCore) -> Self {
        Self::with_access(Value::Undefined, Access::Computed(core))
    }

    fn with_access(value: Value, access: Access) -> Self {
        if let Value::Signal(existing) = value {
            return existing;
        }
        let signal = Self(Rc::new(SignalInner {
            id: next_signal_id(),
            value: RefCell::new(Value::Undefined),
            observers: RefCell::new(IndexMap::new()),
            paused: Cell::new(false),
            deep: Cell::new(false),
            access,
        }));
        signal.attach_container(&value);
        *signal.0.value.borrow_mut() = value;
        signal
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Read the current value, recording this signal in the active
    /// collector frame.
    ///
    /// The value is returned as stored: a signal nested inside is not
    /// unwrapped.
    pub fn read(&self) -> Value {
        context::track(self);
        self.read_untracked()
    }

    /// Read the current value without recording a dependency.
    pub fn read_untracked(&self) -> Value {
        if let Access::Computed(core) = &self.0.access {
            core.refresh(self);
        }
        self.0.value.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    ///
    /// Writing a signal stores a snapshot of its current value, not a live
    /// link. Writing a value strictly equal to the current one does nothing.
    pub fn write(&self, value: impl Into<Value>) -> Result<(), ReactiveError> {
        match self.0.access {
            Access::Writable => {}
            Access::ReadOnly => return Err(ReactiveError::ReadOnly),
            Access::Computed(_) => return Err(ReactiveError::ComputedIsReadOnly),
        }
        let value = match value.into() {
            Value::Signal(other) => other.read_untracked(),
            value => value,
        };
        if self.replace_value(value) && !self.0.paused.get() {
            self.notify(None);
        }
        Ok(())
    }

    /// Read-modify-write.
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.read_untracked());
        self.write(next)
    }

    /// Store a new value without notifying. Returns whether it changed.
    pub(crate) fn replace_value(&self, value: Value) -> bool {
        if self.0.value.borrow().strict_equals(&value) {
            return false;
        }
        self.attach_container(&value);
        let old = std::mem::replace(&mut *self.0.value.borrow_mut(), value.clone());
        self.detach_container(&old);
        if self.is_deep() && matches!(value, Value::Array(_) | Value::Object(_)) {
            deep::convert_contents(self, &value);
        }
        true
    }

    fn attach_container(&self, value: &Value) {
        match value {
            Value::Array(a) => a.attach(self),
            Value::Map(m) => m.attach(self),
            Value::Set(s) => s.attach(self),
            _ => {}
        }
    }

    fn detach_container(&self, value: &Value) {
        match value {
            Value::Array(a) => a.detach(self),
            Value::Map(m) => m.detach(self),
            Value::Set(s) => s.detach(self),
            _ => {}
        }
    }

    /// Register a callback invoked with `(value, source)` on every change.
    ///
    /// With `immediate`, the callback also runs once right away with the
    /// current value.
    pub fn observe<F>(&self, callback: F, immediate: bool) -> StopHandle
    where
        F: Fn(&Value, Option<&Value>) + 'static,
    {
        let subscriber = Subscriber::new(callback);
        self.subscribe(&subscriber);
        if immediate {
            let value = self.read_untracked();
            silence(|| subscriber.notify(&value, None));
        }
        let weak = self.downgrade();
        let id = subscriber.id();
        StopHandle::new(move || {
            if let Some(signal) = weak.upgrade() {
                signal.unsubscribe(id);
            }
        })
    }

    /// Add a subscriber. Subscribing the same subscriber twice is a no-op.
    pub fn subscribe(&self, subscriber: &Subscriber) {
        self.0
            .observers
            .borrow_mut()
            .entry(subscriber.id())
            .or_insert_with(|| subscriber.clone());
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.0.observers.borrow_mut().shift_remove(&subscriber_id);
    }

    /// Get the number of subscribers.
    pub fn dependent_count(&self) -> usize {
        self.0.observers.borrow().len()
    }

    /// Suppress notifications from writes and container mutation until
    /// `resume`. Resuming does not replay missed changes.
    pub fn pause(&self) {
        self.0.paused.set(true);
    }

    pub fn resume(&self) {
        self.0.paused.set(false);
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.get()
    }

    /// Notify subscribers without changing the value. Ignores `pause`.
    pub fn trigger(&self, source: Option<&Value>) {
        self.notify(source);
    }

    pub fn is_deep(&self) -> bool {
        self.0.deep.get()
    }

    pub(crate) fn mark_deep(&self) {
        self.0.deep.set(true);
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.0.access, Access::Computed(_))
    }

    pub(crate) fn computed_core(&self) -> Option<&ComputedCore> {
        match &self.0.access {
            Access::Computed(core) => Some(core),
            _ => None,
        }
    }

    pub fn downgrade(&self) -> WeakSignal {
        WeakSignal(Rc::downgrade(&self.0))
    }

    /// Called by a container this signal wraps after an in-place mutation.
    pub(crate) fn notify_mutation(&self) {
        if !self.0.paused.get() {
            self.notify(None);
        }
    }

    /// Notify now, or defer to the end of the active batch.
    pub(crate) fn notify(&self, source: Option<&Value>) {
        if batch::defer(self) {
            return;
        }
        self.dispatch(source, false);
    }

    /// Invoke every subscriber with the current value.
    ///
    /// Subscribers are snapshotted first, so a callback may subscribe or
    /// unsubscribe freely. When `isolate` is set each call is guarded and a
    /// panic is reported instead of aborting the remaining calls.
    pub(crate) fn dispatch(&self, source: Option<&Value>, isolate: bool) {
        let subscribers: Vec<Subscriber> = self.0.observers.borrow().values().cloned().collect();
        if subscribers.is_empty() {
            return;
        }
        let value = if subscribers.iter().any(Subscriber::wants_value) {
            self.read_untracked()
        } else {
            self.0.value.borrow().clone()
        };
        silence(|| {
            for subscriber in &subscribers {
                if !isolate {
                    subscriber.notify(&value, source);
                    continue;
                }
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(&value, source)));
                if let Err(payload) = outcome {
                    diagnostics::report(Diagnostic::new(
                        DiagnosticKind::Observer,
                        panic_message(payload.as_ref()),
                    ));
                }
            }
        });
    }

    /// Store a computed result without notifying.
    pub(crate) fn store_computed(&self, value: Value) {
        self.replace_value(value);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "observer panicked".to_string()
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.0.id)
            .field("value", &*self.0.value.borrow())
            .field("subscriber_count", &self.dependent_count())
            .field("deep", &self.is_deep())
            .finish()
    }
}

/// A non-owning reference to a signal.
#[derive(Clone)]
pub struct WeakSignal(Weak<SignalInner>);

impl WeakSignal {
    pub fn upgrade(&self) -> Option<Signal> {
        self.0.upgrade().map(Signal)
    }

    pub fn points_to(&self, signal: &Signal) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&signal.0))
    }
}

impl fmt::Debug for WeakSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakSignal")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(signal: &Signal) -> (Rc<RefCell<Vec<Value>>>, StopHandle) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let stop = signal.observe(move |v, _| sink.borrow_mut().push(v.clone()), false);
        (seen, stop)
    }

    #[test]
    fn signal_get_set() {
        let signal = Signal::new(42);
        assert_eq!(signal.read(), Value::from(42));

        signal.write(100).unwrap();
        assert_eq!(signal.read(), Value::from(100));
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal
            .update(|v| Value::from(v.to_number() * 2.0))
            .unwrap();
        assert_eq!(signal.read(), Value::from(20));
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(1);
        let s2 = Signal::new(2);
        let s3 = Signal::new(3);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn wrapping_a_signal_returns_it() {
        let inner = Signal::new(1);
        let outer = Signal::new(inner.clone());
        assert_eq!(inner, outer);
    }

    #[test]
    fn writing_a_signal_snapshots_it() {
        let source = Signal::new(1);
        let target = Signal::new(0);
        target.write(source.clone()).unwrap();
        source.write(2).unwrap();
        assert_eq!(target.read(), Value::from(1));
    }

    #[test]
    fn equal_writes_do_not_notify() {
        let signal = Signal::new("a");
        let (seen, _stop) = recorder(&signal);

        signal.write("a").unwrap();
        assert!(seen.borrow().is_empty());

        signal.write("b").unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from("b")]);
    }

    #[test]
    fn observers_are_called_in_subscription_order() {
        let signal = Signal::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let order = order.clone();
                signal.observe(move |_, _| order.borrow_mut().push(i), false)
            })
            .collect();

        signal.write(1).unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(handles);
    }

    #[test]
    fn subscribe_is_deduplicated() {
        let signal = Signal::new(0);
        let subscriber = Subscriber::new(|_, _| {});
        signal.subscribe(&subscriber);
        signal.subscribe(&subscriber);
        assert_eq!(signal.dependent_count(), 1);

        signal.unsubscribe(subscriber.id());
        assert_eq!(signal.dependent_count(), 0);
    }

    #[test]
    fn stop_handle_unsubscribes() {
        let signal = Signal::new(0);
        let (seen, stop) = recorder(&signal);
        stop.stop();
        signal.write(1).unwrap();
        assert!(seen.borrow().is_empty());
        assert_eq!(signal.dependent_count(), 0);
    }

    #[test]
    fn immediate_observe_runs_once_up_front() {
        let signal = Signal::new(7);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _stop = signal.observe(move |v, _| sink.borrow_mut().push(v.clone()), true);
        assert_eq!(*seen.borrow(), vec![Value::from(7)]);
    }

    #[test]
    fn pause_suppresses_and_resume_does_not_replay() {
        let signal = Signal::new(0);
        let (seen, _stop) = recorder(&signal);

        signal.pause();
        signal.write(1).unwrap();
        signal.write(2).unwrap();
        assert!(seen.borrow().is_empty());

        signal.resume();
        assert!(seen.borrow().is_empty());

        signal.write(3).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from(3)]);
    }

    #[test]
    fn trigger_passes_source() {
        let signal = Signal::new(1);
        let sources = Rc::new(RefCell::new(Vec::new()));
        let sink = sources.clone();
        let _stop = signal.observe(move |_, source| sink.borrow_mut().push(source.cloned()), false);

        signal.trigger(Some(&Value::from("input")));
        assert_eq!(*sources.borrow(), vec![Some(Value::from("input"))]);
    }

    #[test]
    fn read_only_signals_reject_writes() {
        let signal = Signal::read_only(1);
        assert_eq!(signal.write(2), Err(ReactiveError::ReadOnly));
        assert_eq!(signal.read(), Value::from(1));
    }

    #[test]
    fn observer_reads_are_not_collected() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let b2 = b.clone();
        let _stop = a.observe(
            move |_, _| {
                b2.read();
            },
            false,
        );

        let (_, refs) = context::collect_refs(|| a.write(1).unwrap());
        assert!(!refs.contains(&b));
    }

    #[test]
    fn weak_signal_upgrades_while_alive() {
        let signal = Signal::new(0);
        let weak = signal.downgrade();
        assert!(weak.points_to(&signal));
        assert_eq!(weak.upgrade(), Some(signal.clone()));
        drop(signal);
        assert!(weak.upgrade().is_none());
    }
}
