//! JavaScript coercion and equality rules.
//!
//! Template authors write expressions expecting browser semantics, so these
//! follow the ECMAScript abstract operations (ToNumber, ToString, ToInt32,
//! IsStrictlyEqual, IsLooselyEqual, SameValueZero) for the value kinds the
//! binding language supports.

use super::{Opaque, OpaqueKind, Value};

/// Format a number the way `Number.prototype.toString()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{n}")
}

/// ToNumber applied to a string.
pub(crate) fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix_digits(&t[2..], radix).unwrap_or(f64::NAN);
    }
    let valid = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse unsigned digits in the given radix into a float.
pub(crate) fn parse_radix_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        let d = c.to_digit(radix)?;
        value = value * f64::from(radix) + f64::from(d);
    }
    Some(value)
}

fn function_source(name: &str) -> String {
    format!("function {name}() {{ [native code] }}")
}

impl Value {
    /// ToPrimitive: reference types collapse to a number or string.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Signal(s) => s.read().to_primitive(),
            Value::Array(a) => Value::string(join_values(&a.to_vec(), ",")),
            Value::Object(_) => Value::string("[object Object]"),
            Value::Map(_) => Value::string("[object Map]"),
            Value::Set(_) => Value::string("[object Set]"),
            Value::Function(f) => Value::string(function_source(f.name())),
            Value::Opaque(o) => opaque_primitive(o),
            primitive => primitive.clone(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            other => other.to_primitive().to_number(),
        }
    }

    /// ToString.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            other => other.to_primitive().to_js_string(),
        }
    }

    pub fn to_int32(&self) -> i32 {
        to_uint32_bits(self.to_number()) as i32
    }

    pub fn to_uint32(&self) -> u32 {
        to_uint32_bits(self.to_number())
    }

    /// Integer conversion used for indices and counts (ToIntegerOrInfinity).
    pub fn to_integer(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() {
            0.0
        } else {
            n.trunc()
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        if let Value::Signal(s) = self {
            return s.read().loose_equals(other);
        }
        if let Value::Signal(s) = other {
            return self.loose_equals(&s.read());
        }
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (a, b) if a.is_object_like() && !b.is_object_like() => a.to_primitive().loose_equals(b),
            (a, b) if !a.is_object_like() && b.is_object_like() => a.loose_equals(&b.to_primitive()),
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero: like `===` but `NaN` equals itself.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

fn to_uint32_bits(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn opaque_primitive(o: &Opaque) -> Value {
    match o.kind() {
        OpaqueKind::Date(ms) => Value::Number(*ms),
        OpaqueKind::RegExp(re) => Value::string(format!("/{}/{}", re.source, re.flags)),
        OpaqueKind::Error { name, message } if message.is_empty() => Value::string(name),
        OpaqueKind::Error { name, message } => Value::string(format!("{name}: {message}")),
        OpaqueKind::Host(_) => Value::string("[object Object]"),
    }
}

/// `Array.prototype.join` element formatting: nullish elements become "".
pub(crate) fn join_values(items: &[Value], separator: &str) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        let item = item.unwrap_signal();
        if !item.is_nullish() {
            out.push_str(&item.to_js_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(123456.5), "123456.5");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_to_number_rules() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(Value::from(4_294_967_295.0).to_int32(), -1);
        assert_eq!(Value::from(2_147_483_648.0).to_int32(), -2_147_483_648);
        assert_eq!(Value::from(-1).to_uint32(), 4_294_967_295);
        assert_eq!(Value::from(f64::NAN).to_int32(), 0);
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::from(0)));
        assert!(Value::from("1").loose_equals(&Value::from(1)));
        assert!(Value::from(true).loose_equals(&Value::from(1)));
        assert!(Value::array(vec![Value::from(1), Value::from(2)]).loose_equals(&Value::from("1,2")));
        assert!(!Value::from(f64::NAN).loose_equals(&Value::from(f64::NAN)));
    }

    #[test]
    fn array_to_string_skips_nullish() {
        let v = Value::array(vec![Value::from(1), Value::Null, Value::Undefined, Value::from("a")]);
        assert_eq!(v.to_js_string(), "1,,,a");
    }
}
