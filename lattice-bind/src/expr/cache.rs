//! AST cache keyed by exact source text.
//!
//! Templates repeat the same binding text many times (every row of a list
//! binds the same expressions), so each distinct string is parsed once.
//! Failed parses are not cached.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::trace;

use crate::error::SyntaxError;

use super::ast::Expr;
use super::parser::parse;

#[derive(Default)]
pub struct ExpressionCache {
    entries: RwLock<HashMap<String, Arc<Expr>>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by [`parse_expression`].
    pub fn global() -> &'static ExpressionCache {
        static GLOBAL: OnceLock<ExpressionCache> = OnceLock::new();
        GLOBAL.get_or_init(ExpressionCache::new)
    }

    /// Parse `source`, returning the cached tree if this exact text was
    /// parsed before.
    pub fn parse(&self, source: &str) -> Result<Arc<Expr>, SyntaxError> {
        if let Some(ast) = self.entries.read().get(source) {
            return Ok(Arc::clone(ast));
        }
        trace!(source, "expression cache miss");
        let ast = Arc::new(parse(source)?);
        let mut entries = self.entries.write();
        // Another thread may have raced us; keep the first tree so every
        // caller shares one.
        let ast = entries.entry(source.to_string()).or_insert(ast);
        Ok(Arc::clone(ast))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Parse through the global cache.
pub fn parse_expression(source: &str) -> Result<Arc<Expr>, SyntaxError> {
    ExpressionCache::global().parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_yields_same_tree() {
        let cache = ExpressionCache::new();
        let first = cache.parse("a + 1").unwrap();
        let second = cache.parse("a + 1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache.parse("a+1").unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(*first, *other);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ExpressionCache::new();
        assert!(cache.parse("a +").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ExpressionCache::new();
        cache.parse("x").unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn global_cache_is_shared() {
        let a = parse_expression("shared.binding").unwrap();
        let b = parse_expression("shared.binding").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!ExpressionCache::global().is_empty());
    }
}
