//! Value Model
//!
//! Binding expressions operate on dynamic, JavaScript-like values. Primitive
//! values are stored inline; objects, arrays, maps, sets, and functions are
//! reference types whose identity matters (`===` compares pointers).
//!
//! Signals can appear anywhere a value can. Coercions (`truthy`, `to_number`,
//! `to_js_string`, equality) read through signals transparently, so a deep
//! ref'd structure behaves like its plain counterpart inside expressions.

mod coerce;
mod container;
mod function;
mod json;
mod object;

use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;
use crate::reactive::Signal;

pub use coerce::format_number;
pub(crate) use coerce::{join_values, parse_radix_digits, string_to_number};
pub(crate) use container::{holes, relative_index};
pub use container::{JsArray, JsMap, JsSet, ValueKey, MAX_ARRAY_LEN};
pub use function::{Function, NativeFn};
pub use object::JsObject;

/// A dynamic binding value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(JsObject),
    Array(JsArray),
    Map(JsMap),
    Set(JsSet),
    Function(Function),
    Signal(Signal),
    Opaque(Opaque),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(JsArray::from_vec(items.into_iter().collect()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Value::Signal(_))
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Read through a signal, registering it with the active collector.
    pub fn unwrap_signal(&self) -> Value {
        match self {
            Value::Signal(s) => s.read(),
            other => other.clone(),
        }
    }

    /// Read through a signal without registering a dependency.
    pub fn unwrap_untracked(&self) -> Value {
        match self {
            Value::Signal(s) => s.read_untracked(),
            other => other.clone(),
        }
    }

    /// Whether this is a reference type (not a primitive).
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Object(_)
                | Value::Array(_)
                | Value::Map(_)
                | Value::Set(_)
                | Value::Function(_)
                | Value::Opaque(_)
        )
    }

    /// Pointer identity of a container this value refers to.
    ///
    /// Only plain objects and the observable containers have one; it keys the
    /// identity map used by deep conversion.
    pub(crate) fn container_ptr(&self) -> Option<usize> {
        match self {
            Value::Object(o) => Some(o.as_ptr()),
            Value::Array(a) => Some(a.as_ptr()),
            Value::Map(m) => Some(m.as_ptr()),
            Value::Set(s) => Some(s.as_ptr()),
            _ => None,
        }
    }

    /// The `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Signal(s) => s.read().type_of(),
            Value::Object(_) | Value::Array(_) | Value::Map(_) | Value::Set(_) | Value::Opaque(_) => {
                "object"
            }
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Signal(s) => s.read().truthy(),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    /// Strict (`===`) equality.
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: deep refs are frequently cyclic.
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{:?}", &**s),
            Value::Object(o) => write!(f, "Object({} keys)", o.len()),
            Value::Array(a) => write!(f, "Array({})", a.len()),
            Value::Map(m) => write!(f, "Map({})", m.len()),
            Value::Set(s) => write!(f, "Set({})", s.len()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Signal(s) => write!(f, "Signal#{}", s.id()),
            Value::Opaque(o) => write!(f, "{o:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<JsObject> for Value {
    fn from(o: JsObject) -> Self {
        Value::Object(o)
    }
}

impl From<JsArray> for Value {
    fn from(a: JsArray) -> Self {
        Value::Array(a)
    }
}

impl From<JsMap> for Value {
    fn from(m: JsMap) -> Self {
        Value::Map(m)
    }
}

impl From<JsSet> for Value {
    fn from(s: JsSet) -> Self {
        Value::Set(s)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Signal> for Value {
    fn from(s: Signal) -> Self {
        Value::Signal(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(JsArray::from_vec(items))
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

// ----------------------------------------------------------------------------
// Opaque leaves
// ----------------------------------------------------------------------------

/// Values deep conversion never descends into.
#[derive(Clone)]
pub struct Opaque(Rc<OpaqueKind>);

pub enum OpaqueKind {
    /// Milliseconds since the Unix epoch.
    Date(f64),
    RegExp(JsRegExp),
    Error { name: String, message: String },
    /// A host object such as a DOM node or a pending promise.
    Host(Rc<dyn std::any::Any>),
}

impl Opaque {
    pub fn new(kind: OpaqueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn date(ms: f64) -> Self {
        Self::new(OpaqueKind::Date(ms))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(OpaqueKind::Error {
            name: name.into(),
            message: message.into(),
        })
    }

    pub fn regexp(source: &str, flags: &str) -> Result<Self, EvalError> {
        Ok(Self::new(OpaqueKind::RegExp(JsRegExp::new(source, flags)?)))
    }

    pub fn host<T: 'static>(value: T) -> Self {
        Self::new(OpaqueKind::Host(Rc::new(value)))
    }

    pub fn kind(&self) -> &OpaqueKind {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            OpaqueKind::Date(ms) => write!(f, "Date({ms})"),
            OpaqueKind::RegExp(re) => write!(f, "/{}/{}", re.source, re.flags),
            OpaqueKind::Error { name, message } => write!(f, "{name}: {message}"),
            OpaqueKind::Host(_) => f.write_str("HostObject"),
        }
    }
}

/// A compiled regular-expression literal.
pub struct JsRegExp {
    pub source: String,
    pub flags: String,
    pub(crate) regex: regex::Regex,
}

impl JsRegExp {
    pub fn new(source: &str, flags: &str) -> Result<Self, EvalError> {
        let mut builder = regex::RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                other => {
                    return Err(EvalError::Syntax(format!(
                        "Invalid regular expression flags '{other}'"
                    )))
                }
            }
        }
        let regex = builder
            .build()
            .map_err(|e| EvalError::Syntax(format!("Invalid regular expression: /{source}/: {e}")))?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn test(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}
