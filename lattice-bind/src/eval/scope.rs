//! Scope chains for identifier resolution.

use smallvec::SmallVec;

use crate::value::{JsObject, Value};

/// Ordered scopes, innermost first, plus a global fallback.
///
/// Cloning is cheap: scopes are reference values.
#[derive(Clone, Debug)]
pub(crate) struct ScopeChain {
    scopes: SmallVec<[Value; 4]>,
    global: Value,
    /// `this` is fixed when the chain is built; scopes pushed later (arrow
    /// parameters, `$event`) do not change it.
    this: Value,
}

/// Where an identifier was found.
pub(crate) struct Binding {
    /// The scope object holding the name.
    pub(crate) owner: JsObject,
    /// The stored value, possibly a signal.
    pub(crate) value: Value,
}

pub(crate) enum Resolution {
    /// `$root`, `$parent`, or `$ctx`.
    Special(Value),
    Found(Binding),
    Unresolved,
}

impl ScopeChain {
    pub(crate) fn new(contexts: &[Value], global: Value) -> Self {
        Self {
            scopes: contexts.iter().cloned().collect(),
            this: contexts.first().cloned().unwrap_or_default(),
            global,
        }
    }

    /// A new chain with `scope` as its innermost entry.
    pub(crate) fn with_innermost(&self, scope: Value) -> Self {
        let mut scopes = SmallVec::with_capacity(self.scopes.len() + 1);
        scopes.push(scope);
        scopes.extend(self.scopes.iter().cloned());
        Self {
            scopes,
            global: self.global.clone(),
            this: self.this.clone(),
        }
    }

    pub(crate) fn this_value(&self) -> Value {
        self.this.clone()
    }

    /// Look `name` up innermost first. `$parent` is the second entry, the
    /// scope just outside the innermost one, so inside an arrow it is the
    /// context the arrow was created in.
    pub(crate) fn resolve(&self, name: &str) -> Resolution {
        match name {
            "$root" => {
                let root = self.scopes.last().cloned().unwrap_or_else(|| self.global.clone());
                return Resolution::Special(root);
            }
            "$parent" => {
                return Resolution::Special(self.scopes.get(1).cloned().unwrap_or_default());
            }
            "$ctx" => return Resolution::Special(Value::array(self.scopes.iter().cloned())),
            _ => {}
        }
        self.scopes
            .iter()
            .chain(std::iter::once(&self.global))
            .find_map(|scope| lookup(scope, name))
            .map_or(Resolution::Unresolved, Resolution::Found)
    }
}

fn lookup(scope: &Value, name: &str) -> Option<Binding> {
    // Reading a signal-backed scope registers it, so bindings re-run when
    // the whole scope object is replaced.
    match scope.unwrap_signal() {
        Value::Object(owner) => {
            let value = owner.get(name)?;
            Some(Binding { owner, value })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, i32)]) -> Value {
        Value::Object(JsObject::from_pairs(
            pairs.iter().map(|(k, v)| (k.to_string(), Value::from(*v))),
        ))
    }

    fn found(chain: &ScopeChain, name: &str) -> Option<Value> {
        match chain.resolve(name) {
            Resolution::Found(binding) => Some(binding.value),
            _ => None,
        }
    }

    #[test]
    fn innermost_scope_wins() {
        let chain = ScopeChain::new(
            &[scope(&[("a", 1)]), scope(&[("a", 2), ("b", 3)])],
            scope(&[("c", 4)]),
        );
        assert_eq!(found(&chain, "a"), Some(Value::from(1)));
        assert_eq!(found(&chain, "b"), Some(Value::from(3)));
        assert_eq!(found(&chain, "c"), Some(Value::from(4)));
        assert!(found(&chain, "d").is_none());
    }

    #[test]
    fn special_names() {
        let inner = scope(&[("a", 1)]);
        let outer = scope(&[("b", 2)]);
        let chain = ScopeChain::new(&[inner.clone(), outer.clone()], Value::Undefined);

        let Resolution::Special(root) = chain.resolve("$root") else {
            panic!("$root should resolve");
        };
        assert_eq!(root, outer);
        let Resolution::Special(parent) = chain.resolve("$parent") else {
            panic!("$parent should resolve");
        };
        assert_eq!(parent, outer);
        let Resolution::Special(ctx) = chain.resolve("$ctx") else {
            panic!("$ctx should resolve");
        };
        assert_eq!(ctx.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn parent_is_one_step_outside_the_innermost_scope() {
        let only = scope(&[("a", 1)]);
        let chain = ScopeChain::new(&[only.clone()], Value::Undefined);
        let Resolution::Special(parent) = chain.resolve("$parent") else {
            panic!("$parent should resolve");
        };
        assert!(parent.is_undefined());

        let nested = chain.with_innermost(scope(&[("x", 2)]));
        let Resolution::Special(parent) = nested.resolve("$parent") else {
            panic!("$parent should resolve");
        };
        assert_eq!(parent, only);
    }

    #[test]
    fn pushed_scopes_keep_this() {
        let inner = scope(&[("a", 1)]);
        let chain = ScopeChain::new(&[inner.clone()], Value::Undefined);
        let nested = chain.with_innermost(scope(&[("a", 5)]));
        assert_eq!(found(&nested, "a"), Some(Value::from(5)));
        assert_eq!(nested.this_value(), inner);
    }
}
