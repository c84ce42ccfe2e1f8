//! Dependency Collection
//!
//! The collector tracks which signals are read while a computation runs.
//! When a signal is read, it records itself in the innermost frame of a
//! thread-local stack.
//!
//! # Implementation
//!
//! Each frame is either a recording frame (an ordered set of signals) or a
//! silenced frame. A silenced frame hides reads from every collector below it;
//! observer dispatch runs inside one so that callbacks never leak their reads
//! into whatever computation happened to trigger them.
//!
//! Frames nest, which is what makes collection reentrant: a computed that is
//! first read inside an effect records its own dependencies in its own frame,
//! and only the computed itself lands in the effect's frame.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::Signal;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

enum Frame {
    Recording(IndexSet<Signal>),
    Silenced,
}

/// Guard that pops its frame when dropped.
///
/// Dropping pops even if the computation panics, keeping the stack balanced.
pub struct ReactiveContext {
    depth: usize,
    finished: bool,
}

impl ReactiveContext {
    /// Push a recording frame.
    pub fn enter() -> Self {
        Self::push(Frame::Recording(IndexSet::new()))
    }

    /// Push a silenced frame.
    pub fn silenced() -> Self {
        Self::push(Frame::Silenced)
    }

    fn push(frame: Frame) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        Self {
            depth,
            finished: false,
        }
    }

    /// Whether a recording frame is on top of the stack.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Frame::Recording(_))))
    }

    /// Pop the frame and return what it recorded.
    pub fn finish(mut self) -> IndexSet<Signal> {
        self.finished = true;
        match self.pop() {
            Some(Frame::Recording(refs)) => refs,
            _ => IndexSet::new(),
        }
    }

    fn pop(&self) -> Option<Frame> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext mismatch: frames were popped out of order"
            );
            stack.pop()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            // Ignore the result; a panic unwinding through here must not
            // trigger a second one.
            let _ = CONTEXT_STACK.try_with(|stack| stack.borrow_mut().pop());
        }
    }
}

/// Record a read of `signal` in the innermost frame.
pub(crate) fn track(signal: &Signal) {
    CONTEXT_STACK.with(|stack| {
        if let Some(Frame::Recording(refs)) = stack.borrow_mut().last_mut() {
            refs.insert(signal.clone());
        }
    });
}

/// Run `f` and return its result together with every signal it read.
///
/// Duplicate reads are recorded once, in first-read order.
pub fn collect_refs<R>(f: impl FnOnce() -> R) -> (R, IndexSet<Signal>) {
    let ctx = ReactiveContext::enter();
    let result = f();
    (result, ctx.finish())
}

/// Run `f` with reads hidden from every enclosing collector.
pub fn silence<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::silenced();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_each_signal_once() {
        let a = Signal::new(1);
        let b = Signal::new(2);

        let ((), refs) = collect_refs(|| {
            a.read();
            b.read();
            a.read();
        });

        assert_eq!(refs.len(), 2);
        assert_eq!(refs.get_index(0), Some(&a));
        assert_eq!(refs.get_index(1), Some(&b));
    }

    #[test]
    fn nested_frames_are_independent() {
        let outer_sig = Signal::new(1);
        let inner_sig = Signal::new(2);

        let (inner, outer) = collect_refs(|| {
            outer_sig.read();
            let ((), inner) = collect_refs(|| {
                inner_sig.read();
            });
            inner
        });

        assert_eq!(outer.len(), 1);
        assert!(outer.contains(&outer_sig));
        assert_eq!(inner.len(), 1);
        assert!(inner.contains(&inner_sig));
    }

    #[test]
    fn silenced_reads_are_invisible() {
        let a = Signal::new(1);
        let b = Signal::new(2);

        let ((), refs) = collect_refs(|| {
            a.read();
            silence(|| {
                b.read();
                assert!(!ReactiveContext::is_active());
            });
        });

        assert_eq!(refs.len(), 1);
        assert!(refs.contains(&a));
    }

    #[test]
    fn stack_is_balanced_after_panic() {
        let result = std::panic::catch_unwind(|| {
            collect_refs(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn no_collection_outside_frames() {
        assert!(!ReactiveContext::is_active());
        // Reading with no frame active is harmless.
        Signal::new(1).read();
    }
}
