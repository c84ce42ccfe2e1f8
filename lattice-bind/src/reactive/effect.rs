//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously (or at
//!    the end of the active batch).
//!
//! 3. Before re-running, the effect drops every old subscription and runs
//!    its cleanups; the new run collects a fresh dependency set, which may
//!    differ from the previous one.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager.
//!
//! # Lifetime
//!
//! Dropping an `Effect` handle does not stop it: subscriptions keep it
//! alive until [`Effect::stop`] is called.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use super::context::collect_refs;
use super::subscriber::{StopHandle, Subscriber, Subscriptions};

/// Cleanup callbacks registered by one run of an effect.
#[derive(Clone, Default)]
pub struct EffectCleanup(Rc<RefCell<Vec<Box<dyn FnOnce()>>>>);

impl EffectCleanup {
    /// Register `f` to run before the next re-run, or when the effect stops.
    pub fn on_cleanup<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.0.borrow_mut().push(Box::new(f));
    }

    fn run(&self) {
        let cleanups = std::mem::take(&mut *self.0.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

struct EffectInner {
    run: Box<dyn Fn(&EffectCleanup)>,
    sources: RefCell<Subscriptions>,
    /// Taken on stop, breaking the effect <-> subscriber cycle.
    subscriber: RefCell<Option<Subscriber>>,
    cleanup: RefCell<EffectCleanup>,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use lattice_bind::{watch_effect, Signal};
///
/// let count = Signal::new(0);
/// let c = count.clone();
/// let effect = watch_effect(move |_| {
///     println!("count is {}", c.read().to_js_string());
/// });
///
/// count.write(5).unwrap(); // prints "count is 5"
/// assert_eq!(effect.run_count(), 2);
/// effect.stop();
/// ```
#[derive(Clone)]
pub struct Effect(Rc<EffectInner>);

/// Run `f` now and again whenever a signal it read changes.
pub fn watch_effect<F>(f: F) -> Effect
where
    F: Fn(&EffectCleanup) + 'static,
{
    let effect = Effect(Rc::new(EffectInner {
        run: Box::new(f),
        sources: RefCell::new(Subscriptions::default()),
        subscriber: RefCell::new(None),
        cleanup: RefCell::new(EffectCleanup::default()),
        stopped: Cell::new(false),
        run_count: Cell::new(0),
    }));

    let target = effect.clone();
    let subscriber = Subscriber::invalidation(move || target.execute());
    *effect.0.subscriber.borrow_mut() = Some(subscriber);

    effect.execute();
    effect
}

impl Effect {
    fn execute(&self) {
        if self.0.stopped.get() {
            return;
        }
        let Some(subscriber) = self.0.subscriber.borrow().clone() else {
            return;
        };

        self.0.sources.borrow_mut().clear(&subscriber);
        let previous = std::mem::take(&mut *self.0.cleanup.borrow_mut());
        previous.run();

        let cleanup = EffectCleanup::default();
        let ((), refs) = collect_refs(|| (self.0.run)(&cleanup));
        self.0.run_count.set(self.0.run_count.get() + 1);

        if self.0.stopped.get() {
            // Stopped from inside its own run.
            cleanup.run();
            return;
        }
        trace!(
            run_count = self.0.run_count.get(),
            dependencies = refs.len(),
            "effect ran"
        );
        *self.0.cleanup.borrow_mut() = cleanup;
        self.0.sources.borrow_mut().replace(refs, &subscriber);
    }

    /// Unsubscribe from everything and run pending cleanups. Idempotent.
    pub fn stop(&self) {
        if self.0.stopped.replace(true) {
            return;
        }
        if let Some(subscriber) = self.0.subscriber.borrow_mut().take() {
            self.0.sources.borrow_mut().clear(&subscriber);
        }
        let cleanup = std::mem::take(&mut *self.0.cleanup.borrow_mut());
        cleanup.run();
        debug!(run_count = self.0.run_count.get(), "effect stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.0.stopped.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Get the number of signals read by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.0.sources.borrow().len()
    }

    /// A handle that stops this effect.
    pub fn stop_handle(&self) -> StopHandle {
        let effect = self.clone();
        StopHandle::new(move || effect.stop())
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
