//! Computed Signals
//!
//! A computed is a read-only signal whose value is derived from other
//! signals.
//!
//! # How Computeds Work
//!
//! 1. The derivation never runs until the first read.
//!
//! 2. A read runs the derivation inside a collector frame, caches the result,
//!    and subscribes an invalidation hook to every signal it read.
//!
//! 3. When any of those signals change, the computed is marked dirty and
//!    notifies its own subscribers. It does not recompute yet.
//!
//! 4. The next read recomputes. Reads while clean return the cached value.
//!
//! Value observers registered through `observe` force a recompute before
//! they are called, so they always see the fresh value; internal
//! invalidation hooks (effects, other computeds) do not, which keeps chains
//! of computeds lazy.
//!
//! # Reentrancy
//!
//! A derivation that changes one of its own dependencies while running
//! would invalidate itself forever. When that is detected the computed
//! freezes: it keeps the value just computed, drops every subscription, and
//! notifies its subscribers one final time.

use std::cell::{Cell, OnceCell, RefCell};

use tracing::debug;

use crate::value::Value;

use super::context::collect_refs;
use super::subscriber::{Subscriber, Subscriptions};
use super::Signal;

pub(crate) struct ComputedCore {
    compute: Box<dyn Fn() -> Value>,
    dirty: Cell<bool>,
    computing: Cell<bool>,
    reentered: Cell<bool>,
    frozen: Cell<bool>,
    sources: RefCell<Subscriptions>,
    invalidator: OnceCell<Subscriber>,
}

/// Resets the `computing` flag even if the derivation panics.
struct ComputingGuard<'a>(&'a Cell<bool>);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ComputedCore {
    fn new(compute: Box<dyn Fn() -> Value>) -> Self {
        Self {
            compute,
            dirty: Cell::new(true),
            computing: Cell::new(false),
            reentered: Cell::new(false),
            frozen: Cell::new(false),
            sources: RefCell::new(Subscriptions::default()),
            invalidator: OnceCell::new(),
        }
    }

    fn invalidator(&self, signal: &Signal) -> &Subscriber {
        self.invalidator.get_or_init(|| {
            let weak = signal.downgrade();
            Subscriber::invalidation(move || {
                if let Some(signal) = weak.upgrade() {
                    if let Some(core) = signal.computed_core() {
                        core.invalidate(&signal);
                    }
                }
            })
        })
    }

    /// Recompute if dirty.
    pub(crate) fn refresh(&self, signal: &Signal) {
        if self.frozen.get() || !self.dirty.get() || self.computing.get() {
            return;
        }
        self.computing.set(true);
        self.reentered.set(false);
        let (value, refs) = {
            let _guard = ComputingGuard(&self.computing);
            collect_refs(|| (self.compute)())
        };

        let invalidator = self.invalidator(signal).clone();
        if self.reentered.get() {
            self.frozen.set(true);
            self.sources.borrow_mut().clear(&invalidator);
            signal.store_computed(value);
            debug!(
                signal_id = signal.id(),
                "computed invalidated itself while running; freezing"
            );
            signal.notify(None);
            return;
        }

        self.sources.borrow_mut().replace(refs, &invalidator);
        self.dirty.set(false);
        signal.store_computed(value);
    }

    fn invalidate(&self, signal: &Signal) {
        if self.frozen.get() {
            return;
        }
        if self.computing.get() {
            self.reentered.set(true);
            return;
        }
        if self.dirty.get() {
            return;
        }
        self.dirty.set(true);
        signal.notify(None);
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub(crate) fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }
}

/// Create a lazily evaluated, read-only derived signal.
///
/// ```rust
/// use lattice_bind::{computed, Signal, Value};
///
/// let count = Signal::new(2);
/// let c = count.clone();
/// let doubled = computed(move || c.read().to_number() * 2.0);
/// assert_eq!(doubled.read(), Value::from(4));
/// count.write(5).unwrap();
/// assert_eq!(doubled.read(), Value::from(10));
/// ```
pub fn computed<F, R>(compute: F) -> Signal
where
    F: Fn() -> R + 'static,
    R: Into<Value>,
{
    Signal::computed(ComputedCore::new(Box::new(move || compute().into())))
}

/// A computed over an explicit list of sources. `compute` receives their
/// current values in order.
pub fn compute_from<F, R>(sources: &[Signal], compute: F) -> Signal
where
    F: Fn(&[Value]) -> R + 'static,
    R: Into<Value>,
{
    let sources = sources.to_vec();
    computed(move || {
        let values: Vec<Value> = sources.iter().map(Signal::read).collect();
        compute(&values)
    })
}
