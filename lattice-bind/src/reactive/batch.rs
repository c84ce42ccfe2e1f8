//! Batched Notification
//!
//! While a batch is open, signals that would notify record themselves in the
//! innermost pending set instead. Closing the outermost batch flushes every
//! recorded signal exactly once, in first-change order; closing a nested
//! batch folds its pending set into the parent.
//!
//! The flush isolates subscribers from one another: a panicking observer is
//! reported through [`crate::diagnostics`] and the remaining observers still
//! run.

use std::cell::RefCell;

use indexmap::IndexSet;
use tracing::debug;

use super::Signal;

thread_local! {
    static BATCH_STACK: RefCell<Vec<IndexSet<Signal>>> = const { RefCell::new(Vec::new()) };
}

/// Open a batch. Must be paired with [`end_batch`].
pub fn start_batch() {
    BATCH_STACK.with(|stack| stack.borrow_mut().push(IndexSet::new()));
}

/// Close the innermost batch, flushing if it was the outermost one.
pub fn end_batch() {
    let popped = BATCH_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let pending = stack.pop()?;
        match stack.last_mut() {
            Some(parent) => {
                parent.extend(pending);
                Some(IndexSet::new())
            }
            None => Some(pending),
        }
    });
    match popped {
        Some(pending) => flush(pending),
        None => debug!("end_batch called without a matching start_batch"),
    }
}

fn flush(pending: IndexSet<Signal>) {
    for signal in pending {
        signal.dispatch(None, true);
    }
}

/// Run `f` inside a batch. The batch is closed even if `f` panics, in
/// which case pending notifications are dropped.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            if std::thread::panicking() {
                let _ = BATCH_STACK.try_with(|stack| stack.borrow_mut().pop());
            } else {
                end_batch();
            }
        }
    }

    start_batch();
    let _guard = BatchGuard;
    f()
}

/// Whether a batch is currently open.
pub fn is_batching() -> bool {
    BATCH_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Record `signal` in the innermost batch. Returns false if no batch is open.
pub(crate) fn defer(signal: &Signal) -> bool {
    BATCH_STACK.with(|stack| match stack.borrow_mut().last_mut() {
        Some(pending) => {
            pending.insert(signal.clone());
            true
        }
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn writes_coalesce_into_one_notification() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _stop = signal.observe(move |v, _| sink.borrow_mut().push(v.clone()), false);

        batch(|| {
            for i in 1..=10 {
                signal.write(i).unwrap();
            }
            assert!(seen.borrow().is_empty());
        });

        assert_eq!(*seen.borrow(), vec![Value::from(10)]);
    }

    #[test]
    fn nested_batches_flush_at_outermost_end() {
        let signal = Signal::new(0);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _stop = signal.observe(move |_, _| counter.set(counter.get() + 1), false);

        start_batch();
        signal.write(1).unwrap();
        start_batch();
        signal.write(2).unwrap();
        end_batch();
        assert_eq!(hits.get(), 0);
        assert!(is_batching());
        end_batch();

        assert_eq!(hits.get(), 1);
        assert!(!is_batching());
    }

    #[test]
    fn unmatched_end_batch_is_harmless() {
        end_batch();
        assert!(!is_batching());
    }

    #[test]
    fn batch_is_closed_after_panic() {
        let signal = Signal::new(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch(|| {
                signal.write(1).unwrap();
                panic!("inside batch");
            })
        }));
        assert!(result.is_err());
        assert!(!is_batching());
    }

    #[test]
    fn panicking_observer_does_not_block_siblings() {
        let signal = Signal::new(0);
        let _bad = signal.observe(|_, _| panic!("observer failure"), false);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _good = signal.observe(move |_, _| counter.set(counter.get() + 1), false);

        batch(|| signal.write(1).unwrap());
        assert_eq!(hits.get(), 1);
    }
}
