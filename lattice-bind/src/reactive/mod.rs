//! Reactive Primitives
//!
//! This module implements the reactive system behind bindings: signals,
//! computeds, effects, batching, and deep refs.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal is read while a
//! collector frame is active (inside a computed, an effect, or
//! [`collect_refs`]), it records itself as a dependency. When its value
//! changes, every subscriber is notified.
//!
//! ## Computeds
//!
//! A computed is a read-only signal derived from other signals. It is lazy:
//! a dependency change only marks it dirty, and the derivation re-runs on
//! the next read.
//!
//! ## Effects
//!
//! An effect is a side-effecting computation that re-runs whenever a signal
//! it read changes. Binders use effects to keep the DOM in sync.
//!
//! ## Batches
//!
//! Writes inside [`batch`] notify once, when the outermost batch ends.
//!
//! # Implementation Notes
//!
//! All reactive state is thread-local and `Rc`-based. Dependency tracking
//! uses a stack of collector frames so that nested computations (a computed
//! first read inside an effect) keep separate dependency sets.

mod batch;
mod computed;
mod context;
mod deep;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use batch::{batch, end_batch, is_batching, start_batch};
pub use computed::{compute_from, computed};
pub use context::{collect_refs, silence, ReactiveContext};
pub use deep::{deep_ref, to_raw};
pub use effect::{watch_effect, Effect, EffectCleanup};
pub use runtime::{is_signal, observe, observe_many, pause, resume, trigger, unref};
pub use signal::{Signal, WeakSignal};
pub use subscriber::{StopHandle, Subscriber, SubscriberId};
