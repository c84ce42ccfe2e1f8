//! Callable values.
//!
//! A [`Function`] is either a host-provided native closure, an arrow function
//! produced by evaluating an expression, or a bound wrapper that fixes `this`.
//! Identifier and member resolution bind scope-resident functions to their
//! owner explicitly, so calling a method never depends on an implicit
//! receiver.

use std::rc::Rc;

use crate::error::EvalError;
use crate::eval::ArrowClosure;

use super::{JsObject, Value};

/// Signature of host functions: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, EvalError>;

#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

struct FunctionData {
    name: Rc<str>,
    kind: FunctionKind,
    /// Static members, e.g. `Array.isArray`.
    statics: Option<JsObject>,
}

pub(crate) enum FunctionKind {
    Native {
        call: Rc<NativeFn>,
        construct: Option<Rc<NativeFn>>,
        instance_check: Option<fn(&Value) -> bool>,
    },
    Arrow(ArrowClosure),
    Bound {
        target: Function,
        this: Value,
    },
}

impl Function {
    fn from_kind(name: &str, kind: FunctionKind) -> Self {
        Self(Rc::new(FunctionData {
            name: Rc::from(name),
            kind,
            statics: None,
        }))
    }

    /// Wrap a host closure.
    pub fn native<F>(name: &str, call: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        Self::from_kind(
            name,
            FunctionKind::Native {
                call: Rc::new(call),
                construct: None,
                instance_check: None,
            },
        )
    }

    /// A host function with dedicated `new` behavior.
    pub fn constructor<F, C>(name: &str, call: F, construct: C) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
        C: Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        Self::from_kind(
            name,
            FunctionKind::Native {
                call: Rc::new(call),
                construct: Some(Rc::new(construct)),
                instance_check: None,
            },
        )
    }

    pub(crate) fn arrow(closure: ArrowClosure) -> Self {
        Self::from_kind("", FunctionKind::Arrow(closure))
    }

    /// Attach static members. Only valid on a freshly created function.
    pub fn with_statics(mut self, statics: JsObject) -> Self {
        if let Some(data) = Rc::get_mut(&mut self.0) {
            data.statics = Some(statics);
        }
        self
    }

    /// Override `instanceof` for builtin constructors.
    pub(crate) fn with_instance_check(mut self, check: fn(&Value) -> bool) -> Self {
        if let Some(FunctionData {
            kind: FunctionKind::Native { instance_check, .. },
            ..
        }) = Rc::get_mut(&mut self.0)
        {
            *instance_check = Some(check);
        }
        self
    }

    pub fn name(&self) -> &str {
        match &self.0.kind {
            FunctionKind::Bound { target, .. } => target.name(),
            _ => &self.0.name,
        }
    }

    pub fn statics(&self) -> Option<&JsObject> {
        match &self.0.kind {
            FunctionKind::Bound { target, .. } => target.statics(),
            _ => self.0.statics.as_ref(),
        }
    }

    pub fn is_arrow(&self) -> bool {
        matches!(self.0.kind, FunctionKind::Arrow(_))
    }

    /// Fix `this` for later calls. Arrow functions and already-bound
    /// functions ignore rebinding, as in JS.
    pub fn bind(&self, this: Value) -> Function {
        match &self.0.kind {
            FunctionKind::Native { .. } => Self::from_kind(
                &self.0.name,
                FunctionKind::Bound {
                    target: self.clone(),
                    this,
                },
            ),
            FunctionKind::Arrow(_) | FunctionKind::Bound { .. } => self.clone(),
        }
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, EvalError> {
        match &self.0.kind {
            FunctionKind::Native { call, .. } => call(this, args),
            FunctionKind::Arrow(closure) => closure.invoke(args),
            FunctionKind::Bound { target, this } => target.call(this, args),
        }
    }

    /// The `new` operator.
    pub fn construct(&self, args: &[Value]) -> Result<Value, EvalError> {
        match &self.0.kind {
            FunctionKind::Native {
                construct: Some(construct),
                ..
            } => construct(&Value::Undefined, args),
            FunctionKind::Native { call, .. } => {
                let instance = JsObject::with_constructor(self.clone());
                let this = Value::Object(instance);
                let result = call(&this, args)?;
                Ok(if result.is_object_like() { result } else { this })
            }
            FunctionKind::Bound { target, .. } => target.construct(args),
            FunctionKind::Arrow(_) => Err(EvalError::type_error(format!(
                "{} is not a constructor",
                display_name(self.name())
            ))),
        }
    }

    /// `value instanceof self`.
    pub fn has_instance(&self, value: &Value) -> bool {
        match &self.0.kind {
            FunctionKind::Bound { target, .. } => target.has_instance(value),
            FunctionKind::Native {
                instance_check: Some(check),
                ..
            } => check(value),
            _ => match value {
                Value::Object(obj) => obj.constructor().is_some_and(|c| c.ptr_eq(self)),
                _ => false,
            },
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

pub(crate) fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "anonymous"
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_functions_fix_this() {
        let whoami = Function::native("whoami", |this, _| Ok(this.clone()));
        let owner = Value::from("owner");
        let bound = whoami.bind(owner.clone());
        assert_eq!(bound.call(&Value::Undefined, &[]).unwrap(), owner);
        // Rebinding a bound function is a no-op.
        let rebound = bound.bind(Value::from("other"));
        assert_eq!(rebound.call(&Value::Undefined, &[]).unwrap(), owner);
        assert_eq!(rebound.name(), "whoami");
    }

    #[test]
    fn plain_native_functions_construct_instances() {
        let point = Function::native("Point", |this, args| {
            if let Value::Object(obj) = this {
                obj.set("x", args.first().cloned().unwrap_or_default());
            }
            Ok(Value::Undefined)
        });
        let p = point.construct(&[Value::from(3)]).unwrap();
        let obj = p.as_object().unwrap();
        assert_eq!(obj.get("x").unwrap(), Value::from(3));
        assert!(point.has_instance(&p));
        assert!(!point.has_instance(&Value::Object(JsObject::new())));
    }
}
