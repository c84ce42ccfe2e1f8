//! Diagnostics Hook
//!
//! Every recoverable failure (syntax errors in binding text, expressions that
//! throw during evaluation, observers that panic during a batch flush) is
//! funneled through a single process-wide hook. The default hook forwards to
//! `tracing`; hosts can swap it to surface errors in their own UI.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Where a diagnostic originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Binding text failed to parse.
    Parse,
    /// An expression raised an error while being evaluated.
    Evaluation,
    /// An observer panicked while a batch was being flushed.
    Observer,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Evaluation => "evaluation",
            DiagnosticKind::Observer => "observer",
        };
        f.write_str(name)
    }
}

/// A recoverable error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Expression source, when the failure belongs to a binding.
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

static HOOK: OnceLock<RwLock<Option<DiagnosticHook>>> = OnceLock::new();

fn hook_slot() -> &'static RwLock<Option<DiagnosticHook>> {
    HOOK.get_or_init(|| RwLock::new(None))
}

/// Replace the diagnostics hook.
pub fn set_hook<F>(hook: F)
where
    F: Fn(&Diagnostic) + Send + Sync + 'static,
{
    *hook_slot().write() = Some(Arc::new(hook));
}

/// Restore the default `tracing` hook.
pub fn reset_hook() {
    *hook_slot().write() = None;
}

/// Report a recoverable error through the active hook.
pub fn report(diagnostic: Diagnostic) {
    // Clone out so a hook may itself call `set_hook` without deadlocking.
    let hook = hook_slot().read().clone();
    match hook {
        Some(hook) => hook(&diagnostic),
        None => match &diagnostic.source {
            Some(source) => tracing::warn!(
                kind = %diagnostic.kind,
                source = %source,
                "{}",
                diagnostic.message
            ),
            None => tracing::warn!(kind = %diagnostic.kind, "{}", diagnostic.message),
        },
    }
}
