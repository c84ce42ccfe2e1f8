//! Tree-walking interpreter.
//!
//! Every value the interpreter hands back has signals read through; reading
//! a signal registers it with the active [`ReactiveContext`], which is how
//! bindings learn what they depend on.
//!
//! [`ReactiveContext`]: crate::reactive::ReactiveContext

use std::sync::Arc;

use tracing::trace;

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, Key, Literal, Property, UpdateOp};
use crate::reactive::Signal;
use crate::value::{Function, JsArray, JsObject, Opaque, Value};

use super::builtins::{get_property, iterate, own_entries};
use super::operators;
use super::scope::{Resolution, ScopeChain};
use super::EvalOptions;

/// An arrow function together with the scope chain it was created in.
#[derive(Clone)]
pub(crate) struct ArrowClosure {
    params: Vec<String>,
    body: Arc<Expr>,
    scope: ScopeChain,
}

impl ArrowClosure {
    /// Bind `args` to the parameters in a fresh innermost scope and evaluate
    /// the body there.
    pub(crate) fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        let params = JsObject::from_pairs(
            self.params
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), args.get(i).cloned().unwrap_or_default())),
        );
        let options = EvalOptions::default();
        let mut interpreter =
            Interpreter::new(self.scope.with_innermost(Value::Object(params)), &options);
        interpreter.eval(&self.body)
    }
}

/// A value together with the signal it was read from, if any.
#[derive(Default)]
struct Place {
    value: Value,
    signal: Option<Signal>,
}

impl Place {
    fn plain(value: Value) -> Self {
        Self {
            value,
            signal: None,
        }
    }

    /// Read through `raw` if it is a signal.
    fn read(raw: Value) -> Self {
        match raw {
            Value::Signal(signal) => Self {
                value: signal.read(),
                signal: Some(signal),
            },
            value => Self::plain(value),
        }
    }
}

/// An assignable location.
enum Slot {
    Signal(Signal),
    Property(JsObject, String),
    Element(JsArray, usize),
    Length(JsArray),
    /// A location writes to which are silently dropped, such as a property
    /// of a number.
    Ignored,
}

impl Slot {
    fn read(&self) -> Value {
        match self {
            Slot::Signal(signal) => signal.read(),
            Slot::Property(object, key) => object.get(key).unwrap_or_default().unwrap_signal(),
            Slot::Element(array, index) => array.get(*index).unwrap_or_default().unwrap_signal(),
            Slot::Length(array) => Value::from(array.len()),
            Slot::Ignored => Value::Undefined,
        }
    }

    fn write(&self, value: Value) -> Result<(), EvalError> {
        match self {
            Slot::Signal(signal) => signal.write(value)?,
            Slot::Property(object, key) => object.set(key.clone(), value),
            Slot::Element(array, index) => array.set(*index, value)?,
            Slot::Length(array) => {
                let len = value.to_number();
                if len < 0.0 || len.trunc() != len || len > f64::from(u32::MAX) {
                    return Err(EvalError::Range("Invalid array length".into()));
                }
                array.set_len(len as usize)?;
            }
            Slot::Ignored => {}
        }
        Ok(())
    }
}

pub(crate) struct Interpreter<'o> {
    chain: ScopeChain,
    options: &'o EvalOptions,
    /// Nesting of call-argument and array-element lists; top-level entries
    /// sit at depth 0.
    depth: usize,
}

impl<'o> Interpreter<'o> {
    pub(crate) fn new(chain: ScopeChain, options: &'o EvalOptions) -> Self {
        Self {
            chain,
            options,
            depth: 0,
        }
    }

    /// Evaluate a whole binding. Returns the value and, when the expression
    /// is a plain identifier or member read, the signal it came from.
    pub(crate) fn eval_root(&mut self, expr: &Expr) -> Result<(Value, Option<Signal>), EvalError> {
        match expr {
            Expr::Compound { body } => {
                let values = body
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| self.eval_entry(index, entry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((Value::array(values), None))
            }
            _ if self.is_lazy_arg(0) => Ok((self.thunk(expr, true), None)),
            Expr::Identifier { .. } | Expr::Member { .. } => {
                let place = self.eval_chain(expr)?.unwrap_or_default();
                Ok((place.value, place.signal))
            }
            _ => Ok((self.eval(expr)?, None)),
        }
    }

    fn eval_entry(&mut self, index: usize, expr: &Expr) -> Result<Value, EvalError> {
        if self.is_lazy_arg(index) {
            return Ok(self.thunk(expr, true));
        }
        self.eval(expr)
    }

    fn is_lazy_arg(&self, index: usize) -> bool {
        self.options
            .lazy_arg
            .as_ref()
            .is_some_and(|select| select(index, self.depth))
    }

    fn is_lazy_key(&self, key: &str) -> bool {
        self.options.lazy_key.as_ref().is_some_and(|select| select(key))
    }

    fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// A function that evaluates `expr` on demand with `$event` bound to its
    /// first argument.
    fn thunk(&self, expr: &Expr, top_level: bool) -> Value {
        let expr = expr.clone();
        let chain = self.chain.clone();
        Value::Function(Function::native("", move |_this, args| {
            let event = args.first().cloned().unwrap_or_default();
            let scope = JsObject::from_pairs([("$event", event)]);
            let options = EvalOptions::default();
            let mut interpreter =
                Interpreter::new(chain.with_innermost(Value::Object(scope)), &options);
            trace!(top_level, "running event handler");
            let result = interpreter.eval(&expr)?;
            if let (true, Value::Function(handler)) = (top_level, &result) {
                return handler.call(&Value::Undefined, args);
            }
            Ok(result)
        }))
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { value } => literal(value),
            Expr::Identifier { name } => Ok(self.identifier(name).value),
            Expr::This => Ok(self.chain.this_value()),
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or_default().value)
            }
            Expr::Unary { operator, argument } => {
                let value = self.eval(argument)?;
                Ok(operators::unary(*operator, &value))
            }
            Expr::Binary {
                operator,
                left,
                right,
            } if operator.is_logical() => self.logical(*operator, left, right),
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                operators::binary(*operator, &left, &right)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Array { elements } => self.array_literal(elements),
            Expr::Object { properties } => self.object_literal(properties),
            Expr::Template {
                quasis,
                expressions,
            } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(i) {
                        out.push_str(&self.eval(expr)?.to_js_string());
                    }
                }
                Ok(Value::from(out))
            }
            Expr::Arrow { params, body } => Ok(Value::Function(Function::arrow(ArrowClosure {
                params: params.clone(),
                body: Arc::clone(body),
                scope: self.chain.clone(),
            }))),
            Expr::Assignment {
                operator,
                target,
                value,
            } => self.assign(*operator, target, value),
            Expr::Update {
                operator,
                prefix,
                argument,
            } => self.update(*operator, *prefix, argument),
            Expr::Spread { .. } => Err(EvalError::Syntax("Unexpected token '...'".into())),
            Expr::New { callee, arguments } => {
                let constructor = self.eval(callee)?;
                let Value::Function(constructor) = constructor else {
                    return Err(EvalError::type_error(format!(
                        "{} is not a constructor",
                        describe(callee)
                    )));
                };
                let args = self.arguments(arguments)?;
                constructor.construct(&args)
            }
            Expr::Sequence { expressions } => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.eval(expr)?;
                }
                Ok(last)
            }
            Expr::Compound { body } => {
                let values = body
                    .iter()
                    .map(|entry| self.eval(entry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            Expr::TaggedTemplate {
                tag,
                quasis,
                expressions,
            } => {
                let Some((callee, this)) = self.callee(tag)? else {
                    return Ok(Value::Undefined);
                };
                let Value::Function(f) = callee else {
                    return Err(EvalError::type_error(format!(
                        "{} is not a function",
                        describe(tag)
                    )));
                };
                let mut args = vec![Value::array(quasis.iter().map(|q| Value::from(q.as_str())))];
                for expr in expressions {
                    args.push(self.eval(expr)?);
                }
                Ok(f.call(&this, &args)?.unwrap_signal())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Names and member chains
    // ------------------------------------------------------------------------

    fn identifier(&self, name: &str) -> Place {
        match self.chain.resolve(name) {
            Resolution::Special(value) => Place::plain(value),
            Resolution::Found(binding) => {
                let mut place = Place::read(binding.value);
                place.value = bind_to(place.value, Value::Object(binding.owner));
                place
            }
            Resolution::Unresolved => Place::default(),
        }
    }

    /// Evaluate a member/call chain. `None` means an optional link
    /// short-circuited, making the whole chain `undefined`.
    fn eval_chain(&mut self, expr: &Expr) -> Result<Option<Place>, EvalError> {
        match expr {
            Expr::Identifier { name } => Ok(Some(self.identifier(name))),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object)?.map(|p| p.value) else {
                    return Ok(None);
                };
                if object.is_nullish() && *optional {
                    return Ok(None);
                }
                let key = self.property_key(property)?;
                Ok(Some(read_member(&object, &key)?))
            }
            Expr::Call {
                callee,
                arguments,
                optional,
            } => {
                let Some((callee_value, this)) = self.callee(callee)? else {
                    return Ok(None);
                };
                if callee_value.is_nullish() && *optional {
                    return Ok(None);
                }
                let Value::Function(f) = callee_value else {
                    return Err(EvalError::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                };
                let args = self.arguments(arguments)?;
                Ok(Some(Place::plain(f.call(&this, &args)?.unwrap_signal())))
            }
            other => Ok(Some(Place::plain(self.eval(other)?))),
        }
    }

    /// Resolve a call target and the `this` it should receive.
    fn callee(&mut self, callee: &Expr) -> Result<Option<(Value, Value)>, EvalError> {
        let Expr::Member {
            object,
            property,
            optional,
        } = callee
        else {
            return Ok(self.eval_chain(callee)?.map(|p| (p.value, Value::Undefined)));
        };
        let Some(object) = self.eval_chain(object)?.map(|p| p.value) else {
            return Ok(None);
        };
        if object.is_nullish() && *optional {
            return Ok(None);
        }
        let key = self.property_key(property)?;
        let place = read_member(&object, &key)?;
        Ok(Some((place.value, object)))
    }

    fn property_key(&mut self, key: &Key) -> Result<String, EvalError> {
        match key {
            Key::Static(name) => Ok(name.clone()),
            Key::Computed(expr) => Ok(self.eval(expr)?.to_js_string()),
        }
    }

    fn logical(&mut self, operator: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let left = self.eval(left)?;
        let short_circuit = match operator {
            BinaryOp::And => !left.truthy(),
            BinaryOp::Or => left.truthy(),
            _ => !left.is_nullish(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.eval(right)
        }
    }

    // ------------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------------

    fn arguments(&mut self, arguments: &[Expr]) -> Result<Vec<Value>, EvalError> {
        self.nested(|this| -> Result<Vec<Value>, EvalError> {
            let mut values = Vec::with_capacity(arguments.len());
            for (index, argument) in arguments.iter().enumerate() {
                match argument {
                    Expr::Spread { argument } => values.extend(iterate(&this.eval(argument)?)?),
                    _ if this.is_lazy_arg(index) => values.push(this.thunk(argument, false)),
                    _ => values.push(this.eval(argument)?),
                }
            }
            Ok(values)
        })
    }

    fn array_literal(&mut self, elements: &[Option<Expr>]) -> Result<Value, EvalError> {
        self.nested(|this| -> Result<Value, EvalError> {
            let mut values = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                match element {
                    None => values.push(Value::Undefined),
                    Some(Expr::Spread { argument }) => {
                        values.extend(iterate(&this.eval(argument)?)?)
                    }
                    Some(element) if this.is_lazy_arg(index) => {
                        values.push(this.thunk(element, false))
                    }
                    Some(element) => values.push(this.eval(element)?),
                }
            }
            Ok(Value::array(values))
        })
    }

    fn object_literal(&mut self, properties: &[Property]) -> Result<Value, EvalError> {
        let object = JsObject::new();
        for property in properties {
            match property {
                Property::Spread { argument } => {
                    for (key, value) in own_entries(&self.eval(argument)?) {
                        object.set(key, value);
                    }
                }
                Property::KeyValue { key, value, .. } => {
                    let key = self.property_key(key)?;
                    let value = if self.is_lazy_key(&key) {
                        self.thunk(value, false)
                    } else {
                        self.eval(value)?
                    };
                    object.set(key, value);
                }
            }
        }
        Ok(Value::Object(object))
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Resolve an assignment target. `None` means an identifier no scope
    /// declares.
    fn slot(&mut self, target: &Expr) -> Result<Option<Slot>, EvalError> {
        match target {
            Expr::Identifier { name } => Ok(match self.chain.resolve(name) {
                Resolution::Found(binding) => Some(match binding.value {
                    Value::Signal(signal) => Slot::Signal(signal),
                    _ => Slot::Property(binding.owner, name.clone()),
                }),
                Resolution::Special(_) => Some(Slot::Ignored),
                Resolution::Unresolved => None,
            }),
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object)?;
                let key = self.property_key(property)?;
                Ok(Some(member_slot(&object, key)?))
            }
            _ => Err(EvalError::Syntax(
                "Invalid left-hand side in assignment".into(),
            )),
        }
    }

    fn assign(
        &mut self,
        operator: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
    ) -> Result<Value, EvalError> {
        let Some(slot) = self.slot(target)? else {
            return Ok(Value::Undefined);
        };
        let value = match operator {
            None => self.eval(value)?,
            Some(op) if op.is_logical() => {
                let current = slot.read();
                let keep = match op {
                    BinaryOp::And => !current.truthy(),
                    BinaryOp::Or => current.truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval(value)?
            }
            Some(op) => {
                let current = slot.read();
                let rhs = self.eval(value)?;
                operators::binary(op, &current, &rhs)?
            }
        };
        slot.write(value.clone())?;
        Ok(value)
    }

    fn update(
        &mut self,
        operator: UpdateOp,
        prefix: bool,
        argument: &Expr,
    ) -> Result<Value, EvalError> {
        let Some(slot) = self.slot(argument)? else {
            return Ok(Value::Undefined);
        };
        let old = slot.read().to_number();
        let new = match operator {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        slot.write(Value::Number(new))?;
        Ok(Value::Number(if prefix { new } else { old }))
    }
}

fn literal(literal: &Literal) -> Result<Value, EvalError> {
    Ok(match literal {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::from(s.as_str()),
        Literal::Regex { pattern, flags } => Value::Opaque(Opaque::regexp(pattern, flags)?),
    })
}

/// Plain-object methods become bound to their owner; builtin methods already
/// close over their receiver.
fn bind_to(value: Value, owner: Value) -> Value {
    match value {
        Value::Function(f) if !f.is_arrow() => Value::Function(f.bind(owner)),
        other => other,
    }
}

fn read_member(object: &Value, key: &str) -> Result<Place, EvalError> {
    let mut place = Place::read(get_property(object, key)?);
    if matches!(object, Value::Object(_)) {
        place.value = bind_to(place.value, object.clone());
    }
    Ok(place)
}

fn member_slot(object: &Value, key: String) -> Result<Slot, EvalError> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_js_string()
            )))
        }
        Value::Object(o) => match o.get(&key) {
            Some(Value::Signal(signal)) => Slot::Signal(signal),
            _ => Slot::Property(o.clone(), key),
        },
        Value::Array(a) if key == "length" => Slot::Length(a.clone()),
        Value::Array(a) => match key.parse::<usize>() {
            Ok(index) if index.to_string() == key => match a.get(index) {
                Some(Value::Signal(signal)) => Slot::Signal(signal),
                _ => Slot::Element(a.clone(), index),
            },
            _ => Slot::Ignored,
        },
        Value::Function(f) => match f.statics() {
            Some(statics) => Slot::Property(statics.clone(), key),
            None => Slot::Ignored,
        },
        _ => Slot::Ignored,
    })
}

/// Source-like rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Identifier { name } => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member {
            object, property, ..
        } => match property {
            Key::Static(name) => format!("{}.{name}", describe(object)),
            Key::Computed(_) => format!("{}[...]", describe(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn run(source: &str, scope: &JsObject) -> Result<Value, EvalError> {
        let options = EvalOptions::default();
        let chain = ScopeChain::new(
            &[Value::Object(scope.clone())],
            Value::Object(crate::eval::standard_globals()),
        );
        let ast = parse(source).expect("test source parses");
        Interpreter::new(chain, &options).eval_root(&ast).map(|(v, _)| v)
    }

    #[test]
    fn arrows_close_over_their_scope() {
        let scope = JsObject::from_pairs([("k", 10)]);
        let value = run("[1, 2, 3].map(x => x * k)", &scope).unwrap();
        assert_eq!(value.to_js_string(), "10,20,30");
    }

    #[test]
    fn methods_are_bound_to_their_owner() {
        let counter = JsObject::from_pairs([("n", 1)]);
        counter.set(
            "get",
            Function::native("get", |this, _| {
                Ok(this.as_object().and_then(|o| o.get("n")).unwrap_or_default())
            }),
        );
        let scope = JsObject::from_pairs([("counter", counter)]);
        assert_eq!(run("counter.get()", &scope).unwrap(), Value::from(1));
        assert_eq!(run("(0, counter.get)()", &scope).unwrap(), Value::from(1));
    }

    #[test]
    fn optional_chain_short_circuits_everything() {
        let scope = JsObject::from_pairs([("a", Value::Null)]);
        assert!(run("a?.b.c.d()", &scope).unwrap().is_undefined());
        assert!(run("a.b", &scope).is_err());
    }

    #[test]
    fn assignment_targets() {
        let scope = JsObject::from_pairs([("n", 1)]);
        assert_eq!(run("n += 2", &scope).unwrap(), Value::from(3));
        assert_eq!(scope.get("n"), Some(Value::from(3)));
        assert!(run("missing = 1", &scope).unwrap().is_undefined());
        assert!(!scope.has("missing"));
        assert_eq!(run("n++", &scope).unwrap(), Value::from(3));
        assert_eq!(run("++n", &scope).unwrap(), Value::from(5));
    }

    #[test]
    fn logical_assignment_skips_the_write() {
        let scope = JsObject::from_pairs([("a", 1), ("b", 0)]);
        assert_eq!(run("a ||= 5", &scope).unwrap(), Value::from(1));
        assert_eq!(run("b ||= 5", &scope).unwrap(), Value::from(5));
        assert_eq!(scope.get("b"), Some(Value::from(5)));
    }

    #[test]
    fn array_length_assignment() {
        let scope = JsObject::from_pairs([("list", Value::array([1.0, 2.0, 3.0].map(Value::from)))]);
        run("list.length = 1", &scope).unwrap();
        assert_eq!(run("list.length", &scope).unwrap(), Value::from(1));
        assert!(run("list.length = -1", &scope).is_err());
    }

    #[test]
    fn sparse_writes_past_the_array_cap_fail() {
        let scope = JsObject::from_pairs([("list", Value::array([1.0, 2.0].map(Value::from)))]);
        for source in ["list[4294967294] = 1", "list.length = 4294967295", "new Array(4294967295)"] {
            let err = run(source, &scope).unwrap_err();
            assert_eq!(err.to_string(), "RangeError: Invalid array length", "{source}");
        }
        assert_eq!(run("list.length", &scope).unwrap(), Value::from(2));

        run("list[4] = 5", &scope).unwrap();
        assert_eq!(run("list.length", &scope).unwrap(), Value::from(5));
        assert!(run("list[3]", &scope).unwrap().is_undefined());
    }

    #[test]
    fn calling_a_non_function_names_the_callee() {
        let scope = JsObject::from_pairs([("obj", JsObject::new())]);
        let err = run("obj.missing()", &scope).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: obj.missing is not a function");
    }

    #[test]
    fn tagged_templates_receive_strings_and_values() {
        let scope = JsObject::new();
        scope.set(
            "tag",
            Function::native("tag", |_, args| {
                Ok(Value::from(format!(
                    "{}|{}",
                    args[0].to_js_string(),
                    args.len() - 1
                )))
            }),
        );
        assert_eq!(run("tag`a${1}b${2}c`", &scope).unwrap(), Value::from("a,b,c|2"));
    }
}
