//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything registered in a signal's observer set: a user
//! callback from `observe`, an effect's re-run trigger, or a computed's
//! invalidation hook.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use crate::value::Value;

use super::Signal;

/// Unique identifier for a subscriber.
///
/// Observer sets are keyed by this ID, which is what keeps them free of
/// duplicates: subscribing the same subscriber twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = dyn Fn(&Value, Option<&Value>);

/// A callback registered against one or more signals.
///
/// Invoked with `(value, source)` where `source` is whatever was passed to
/// `trigger`.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Rc<Callback>,
    /// Whether the callback consumes the value argument. Computed signals
    /// only refresh before notifying when some subscriber wants the value.
    wants_value: bool,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Rc::new(notify),
            wants_value: true,
        }
    }

    /// A subscriber that only cares that something changed.
    pub(crate) fn invalidation<F>(notify: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Rc::new(move |_, _| notify()),
            wants_value: false,
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn wants_value(&self) -> bool {
        self.wants_value
    }

    /// Notify the subscriber that one of its sources changed.
    pub fn notify(&self, value: &Value, source: Option<&Value>) {
        (self.notify)(value, source);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("wants_value", &self.wants_value)
            .finish()
    }
}

/// Idempotent cancellation handle returned by every subscribing call.
#[derive(Clone)]
pub struct StopHandle(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl StopHandle {
    pub fn new<F>(stop: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Rc::new(RefCell::new(Some(Box::new(stop)))))
    }

    /// Combine several handles into one.
    pub fn all(handles: Vec<StopHandle>) -> Self {
        Self::new(move || {
            for handle in handles {
                handle.stop();
            }
        })
    }

    pub fn stop(&self) {
        let stop = self.0.borrow_mut().take();
        if let Some(stop) = stop {
            stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// The set of signals one subscriber is currently attached to.
///
/// Effects and computeds rebuild this after every run, since the set of
/// signals read can differ from one run to the next.
#[derive(Default)]
pub(crate) struct Subscriptions {
    sources: Vec<Signal>,
}

impl Subscriptions {
    /// Detach from every current source and attach to `sources` instead.
    pub(crate) fn replace(&mut self, sources: IndexSet<Signal>, subscriber: &Subscriber) {
        self.clear(subscriber);
        for signal in sources {
            signal.subscribe(subscriber);
            self.sources.push(signal);
        }
    }

    pub(crate) fn clear(&mut self, subscriber: &Subscriber) {
        for signal in self.sources.drain(..) {
            signal.unsubscribe(subscriber.id());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sources.len()
    }
}
