//! Expression Evaluation
//!
//! Evaluates parsed binding expressions against a chain of scope objects.
//!
//! Scopes are given innermost first. Identifiers resolve through the chain,
//! then through the global object. Any signal read along the way is
//! registered with the active dependency collector. With
//! [`EvalOptions::collecting`] the collected signals are returned in
//! [`EvalResult::refs`] so a binder can subscribe to them.
//!
//! # Example
//!
//! ```rust
//! use lattice_bind::eval::{evaluate, standard_globals, EvalOptions};
//! use lattice_bind::expr::parse_expression;
//! use lattice_bind::{JsObject, Signal, Value};
//!
//! let count = Signal::new(2);
//! let scope = JsObject::from_pairs([("count", count.clone())]);
//! let ast = parse_expression("count * 10").unwrap();
//!
//! let result = evaluate(
//!     &ast,
//!     &[Value::Object(scope)],
//!     &Value::Object(standard_globals()),
//!     &EvalOptions::new().collecting(),
//! );
//! assert_eq!(result.value, Value::from(20));
//! assert!(result.refs.contains(&count));
//! ```

mod builtins;
mod date;
mod globals;
mod interpreter;
mod operators;
mod scope;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::diagnostics::{self, Diagnostic, DiagnosticKind};
use crate::error::{EvalError, Error};
use crate::expr::{parse_expression, Expr};
use crate::reactive::{collect_refs, Signal};
use crate::value::Value;

pub use globals::standard_globals;
pub(crate) use interpreter::ArrowClosure;

use interpreter::Interpreter;
use scope::ScopeChain;

/// Selects call-argument or top-level positions by `(index, depth)`.
pub type LazyArgFn = dyn Fn(usize, usize) -> bool;

/// Selects object-literal properties by key.
pub type LazyKeyFn = dyn Fn(&str) -> bool;

/// Evaluation switches.
///
/// The lazy selectors turn the chosen positions into event handlers: rather
/// than a value, the position holds a function that evaluates the
/// sub-expression when called, with `$event` bound to its first argument.
#[derive(Clone, Default)]
pub struct EvalOptions {
    pub(crate) lazy_arg: Option<Rc<LazyArgFn>>,
    pub(crate) lazy_key: Option<Rc<LazyKeyFn>>,
    pub(crate) extra_context: Option<Value>,
    pub(crate) collect_refs: bool,
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer the positions for which `select(index, depth)` is true.
    /// Top-level entries have depth 0; arguments of a call or elements of an
    /// array literal have the depth of their list, starting at 1.
    pub fn with_lazy_arg<F>(mut self, select: F) -> Self
    where
        F: Fn(usize, usize) -> bool + 'static,
    {
        self.lazy_arg = Some(Rc::new(select));
        self
    }

    /// Defer object-literal values whose key satisfies `select`.
    pub fn with_lazy_key<F>(mut self, select: F) -> Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.lazy_key = Some(Rc::new(select));
        self
    }

    /// Push `context` as the innermost scope.
    pub fn with_extra_context(mut self, context: impl Into<Value>) -> Self {
        self.extra_context = Some(context.into());
        self
    }

    /// Return the signals read during evaluation in [`EvalResult::refs`].
    pub fn collecting(mut self) -> Self {
        self.collect_refs = true;
        self
    }
}

impl fmt::Debug for EvalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalOptions")
            .field("lazy_arg", &self.lazy_arg.is_some())
            .field("lazy_key", &self.lazy_key.is_some())
            .field("extra_context", &self.extra_context)
            .field("collect_refs", &self.collect_refs)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvalResult {
    pub value: Value,
    /// Signals read while evaluating, in first-read order. Empty unless
    /// collection was requested.
    pub refs: IndexSet<Signal>,
    /// The signal behind the value when the whole expression is a single
    /// identifier or member read, e.g. for two-way bindings.
    pub reference: Option<Signal>,
}

type Outcome = (Result<(Value, Option<Signal>), EvalError>, IndexSet<Signal>);

fn run(ast: &Expr, contexts: &[Value], global: &Value, options: &EvalOptions) -> Outcome {
    let mut chain = ScopeChain::new(contexts, global.clone());
    if let Some(extra) = &options.extra_context {
        chain = chain.with_innermost(extra.clone());
    }
    let mut interpreter = Interpreter::new(chain, options);
    if options.collect_refs {
        collect_refs(|| interpreter.eval_root(ast))
    } else {
        (interpreter.eval_root(ast), IndexSet::new())
    }
}

/// Evaluate `ast`, returning the first error raised.
pub fn try_evaluate(
    ast: &Expr,
    contexts: &[Value],
    global: &Value,
    options: &EvalOptions,
) -> Result<EvalResult, EvalError> {
    let (result, refs) = run(ast, contexts, global, options);
    let (value, reference) = result?;
    Ok(EvalResult {
        value,
        refs,
        reference,
    })
}

/// Evaluate `ast`, reporting failures to the diagnostics hook.
///
/// A failed evaluation yields `undefined`, but still returns the signals
/// read before the failure so a binding can recover once they change.
pub fn evaluate(
    ast: &Expr,
    contexts: &[Value],
    global: &Value,
    options: &EvalOptions,
) -> EvalResult {
    let (result, refs) = run(ast, contexts, global, options);
    match result {
        Ok((value, reference)) => EvalResult {
            value,
            refs,
            reference,
        },
        Err(err) => {
            diagnostics::report(Diagnostic::new(DiagnosticKind::Evaluation, err.to_string()));
            EvalResult {
                refs,
                ..EvalResult::default()
            }
        }
    }
}

/// Parse `source` through the global cache and evaluate it.
///
/// Parse failures are reported with the offending text and yield an empty
/// result; evaluation failures behave as in [`evaluate`].
pub fn evaluate_source(
    source: &str,
    contexts: &[Value],
    global: &Value,
    options: &EvalOptions,
) -> EvalResult {
    match parse_expression(source) {
        Ok(ast) => evaluate(&ast, contexts, global, options),
        Err(err) => {
            diagnostics::report(
                Diagnostic::new(DiagnosticKind::Parse, err.to_string()).with_source(source),
            );
            EvalResult::default()
        }
    }
}

/// Parse and evaluate `source`, returning the first error of either stage.
pub fn try_evaluate_source(
    source: &str,
    contexts: &[Value],
    global: &Value,
    options: &EvalOptions,
) -> Result<EvalResult, Error> {
    let ast = parse_expression(source)?;
    Ok(try_evaluate(&ast, contexts, global, options)?)
}
