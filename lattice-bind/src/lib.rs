//! Lattice Bind
//!
//! The data layer behind Lattice template bindings. It implements:
//!
//! - Reactive primitives (signals, deep refs, computeds, effects)
//! - Batched change notification with dependency collection
//! - A parser for the binding expression language, with a shared AST cache
//! - An evaluator that runs expressions against reactive scope chains
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: dynamic values, observable containers, and JS coercions
//! - `reactive`: signals, collectors, batching, computeds, and effects
//! - `expr`: the expression AST, parser, and cache
//! - `eval`: the evaluator and the standard global object
//! - `diagnostics`: the hook recoverable failures are reported through
//!
//! Reactive state is single-threaded; the expression cache is shared across
//! threads.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use lattice_bind::{computed, watch_effect, Signal, Value};
//!
//! // Create a signal
//! let count = Signal::new(1);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = computed(move || c.read().to_number() * 2.0);
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = log.clone();
//! let d = doubled.clone();
//! let effect = watch_effect(move |_| sink.borrow_mut().push(d.read()));
//!
//! // Update the signal
//! count.write(5).unwrap();
//! assert_eq!(*log.borrow(), vec![Value::from(2), Value::from(10)]);
//! effect.stop();
//! ```

pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod expr;
pub mod reactive;
pub mod value;

pub use error::{Error, EvalError, ReactiveError, Result, SyntaxError};
pub use eval::{evaluate, standard_globals, try_evaluate, EvalOptions, EvalResult};
pub use expr::{parse_expression, Expr};
pub use reactive::{
    batch, collect_refs, compute_from, computed, deep_ref, observe, observe_many, silence,
    to_raw, watch_effect, Effect, Signal, StopHandle,
};
pub use value::{Function, JsArray, JsMap, JsObject, JsSet, Opaque, Value};
