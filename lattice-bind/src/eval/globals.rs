//! The standard global object.
//!
//! Hosts pass [`standard_globals`] (possibly extended with their own names)
//! as the `global` argument of evaluation.

use std::f64::consts;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::EvalError;
use crate::value::{
    holes, parse_radix_digits, Function, JsMap, JsObject, JsSet, Opaque, OpaqueKind, Value,
};

use super::builtins::{arg, callable, function, iterate, own_entries};
use super::date;
use super::operators::power;

/// A fresh object holding `Math`, `JSON`, the builtin constructors, and the
/// global functions and constants.
pub fn standard_globals() -> JsObject {
    let globals = JsObject::new();
    globals.set("Math", math());
    globals.set("JSON", json());
    globals.set("Number", number());
    globals.set("String", string());
    globals.set("Boolean", boolean());
    globals.set("Array", array());
    globals.set("Object", object());
    globals.set("Map", map());
    globals.set("Set", set());
    globals.set("Date", date_constructor());
    globals.set("Error", error());
    globals.set("RegExp", regexp());
    globals.set("parseInt", function("parseInt", |args| Ok(parse_int_value(args))));
    globals.set("parseFloat", function("parseFloat", |args| Ok(parse_float_value(args))));
    globals.set(
        "isNaN",
        function("isNaN", |args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))),
    );
    globals.set(
        "isFinite",
        function("isFinite", |args| Ok(Value::Bool(arg(args, 0).to_number().is_finite()))),
    );
    globals.set("NaN", f64::NAN);
    globals.set("Infinity", f64::INFINITY);
    globals
}

fn numbers(args: &[Value]) -> impl Iterator<Item = f64> + '_ {
    args.iter().map(Value::to_number)
}

// ----------------------------------------------------------------------------
// Math
// ----------------------------------------------------------------------------

fn js_round(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn js_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn math() -> JsObject {
    let math = JsObject::new();
    let constants = [
        ("PI", consts::PI),
        ("E", consts::E),
        ("LN2", consts::LN_2),
        ("LN10", consts::LN_10),
        ("LOG2E", consts::LOG2_E),
        ("LOG10E", consts::LOG10_E),
        ("SQRT2", consts::SQRT_2),
        ("SQRT1_2", consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        math.set(name, value);
    }

    let unary: &[(&str, fn(f64) -> f64)] = &[
        ("abs", f64::abs),
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("round", js_round),
        ("trunc", f64::trunc),
        ("sign", js_sign),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
    ];
    for &(name, op) in unary {
        math.set(
            name,
            function(name, move |args| Ok(Value::Number(op(arg(args, 0).to_number())))),
        );
    }

    math.set(
        "pow",
        function("pow", |args| {
            Ok(Value::Number(power(
                arg(args, 0).to_number(),
                arg(args, 1).to_number(),
            )))
        }),
    );
    math.set(
        "atan2",
        function("atan2", |args| {
            Ok(Value::Number(
                arg(args, 0).to_number().atan2(arg(args, 1).to_number()),
            ))
        }),
    );
    math.set(
        "min",
        function("min", |args| {
            Ok(Value::Number(numbers(args).fold(f64::INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.min(n)
                }
            })))
        }),
    );
    math.set(
        "max",
        function("max", |args| {
            Ok(Value::Number(numbers(args).fold(f64::NEG_INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.max(n)
                }
            })))
        }),
    );
    math.set(
        "hypot",
        function("hypot", |args| {
            Ok(Value::Number(numbers(args).map(|n| n * n).sum::<f64>().sqrt()))
        }),
    );
    math
}

// ----------------------------------------------------------------------------
// JSON
// ----------------------------------------------------------------------------

fn indent_of(space: &Value) -> Option<String> {
    let indent = match space.unwrap_signal() {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => return None,
    };
    (!indent.is_empty()).then_some(indent)
}

fn stringify(args: &[Value]) -> Result<Value, EvalError> {
    let value = arg(args, 0).unwrap_signal();
    if matches!(value, Value::Undefined | Value::Function(_)) {
        return Ok(Value::Undefined);
    }
    let json = value.to_json()?;
    let text = match indent_of(&arg(args, 2)) {
        None => serde_json::to_string(&json),
        Some(indent) => {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            json.serialize(&mut serializer)
                .map(|()| String::from_utf8_lossy(&out).into_owned())
        }
    };
    text.map(Value::from)
        .map_err(|e| EvalError::type_error(e.to_string()))
}

fn json() -> JsObject {
    JsObject::from_pairs([
        ("stringify", Value::Function(function("stringify", stringify))),
        (
            "parse",
            Value::Function(function("parse", |args| {
                let text = arg(args, 0).to_js_string();
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|json| Value::from_json(&json))
                    .map_err(|e| EvalError::Syntax(format!("JSON.parse: {e}")))
            })),
        ),
    ])
}

// ----------------------------------------------------------------------------
// Number, String, Boolean
// ----------------------------------------------------------------------------

fn parse_int_value(args: &[Value]) -> Value {
    let radix = match arg(args, 1) {
        Value::Undefined => 0,
        other => other.to_int32(),
    };
    Value::Number(parse_int(&arg(args, 0).to_js_string(), radix))
}

fn parse_int(text: &str, radix: i32) -> f64 {
    let text = text.trim_start();
    let (negative, mut digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = radix as u32;
    if radix == 0 || radix == 16 {
        if let Some(rest) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    match parse_radix_digits(&digits[..end], radix) {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }
}

fn parse_float_value(args: &[Value]) -> Value {
    Value::Number(parse_float(&arg(args, 0).to_js_string()))
}

fn parse_float(text: &str) -> f64 {
    static DECIMAL: OnceLock<Option<Regex>> = OnceLock::new();
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let decimal = DECIMAL.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").ok()
    });
    decimal
        .as_ref()
        .and_then(|re| re.find(text))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn is_number(value: &Value) -> Option<f64> {
    match value.unwrap_signal() {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn number() -> Function {
    let statics = JsObject::new();
    let constants = [
        ("MAX_SAFE_INTEGER", 9_007_199_254_740_991.0),
        ("MIN_SAFE_INTEGER", -9_007_199_254_740_991.0),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ];
    for (name, value) in constants {
        statics.set(name, value);
    }
    statics.set(
        "isInteger",
        function("isInteger", |args| {
            Ok(Value::Bool(
                is_number(&arg(args, 0)).is_some_and(|n| n.is_finite() && n.trunc() == n),
            ))
        }),
    );
    statics.set(
        "isSafeInteger",
        function("isSafeInteger", |args| {
            Ok(Value::Bool(is_number(&arg(args, 0)).is_some_and(|n| {
                n.trunc() == n && n.abs() <= 9_007_199_254_740_991.0
            })))
        }),
    );
    statics.set(
        "isFinite",
        function("isFinite", |args| {
            Ok(Value::Bool(is_number(&arg(args, 0)).is_some_and(f64::is_finite)))
        }),
    );
    statics.set(
        "isNaN",
        function("isNaN", |args| {
            Ok(Value::Bool(is_number(&arg(args, 0)).is_some_and(f64::is_nan)))
        }),
    );
    statics.set("parseInt", function("parseInt", |args| Ok(parse_int_value(args))));
    statics.set("parseFloat", function("parseFloat", |args| Ok(parse_float_value(args))));

    let convert = |_: &Value, args: &[Value]| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    };
    Function::constructor("Number", convert, convert).with_statics(statics)
}

fn string() -> Function {
    let statics = JsObject::from_pairs([(
        "fromCharCode",
        Value::Function(function("fromCharCode", |args| {
            Ok(Value::from(
                args.iter()
                    .map(|code| {
                        char::from_u32(code.to_uint32() & 0xFFFF).unwrap_or('\u{FFFD}')
                    })
                    .collect::<String>(),
            ))
        })),
    )]);
    let convert = |_: &Value, args: &[Value]| {
        Ok(Value::from(
            args.first().map(Value::to_js_string).unwrap_or_default(),
        ))
    };
    Function::constructor("String", convert, convert).with_statics(statics)
}

fn boolean() -> Function {
    let convert =
        |_: &Value, args: &[Value]| Ok(Value::Bool(args.first().is_some_and(Value::truthy)));
    Function::constructor("Boolean", convert, convert)
}

// ----------------------------------------------------------------------------
// Array, Object
// ----------------------------------------------------------------------------

fn new_array(_: &Value, args: &[Value]) -> Result<Value, EvalError> {
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.trunc() != *n || *n > f64::from(u32::MAX) {
            return Err(EvalError::Range("Invalid array length".into()));
        }
        return Ok(Value::array(holes(*n as usize)?));
    }
    Ok(Value::array(args.to_vec()))
}

fn array_from(args: &[Value]) -> Result<Value, EvalError> {
    let source = arg(args, 0).unwrap_signal();
    let items = match &source {
        Value::Object(o) => {
            let len = o.get("length").map_or(0.0, |v| v.to_integer()).max(0.0);
            holes(len as usize)?
        }
        other => iterate(other)?,
    };
    let mapper = match arg(args, 1) {
        Value::Undefined => return Ok(Value::array(items)),
        other => callable(&other)?,
    };
    let mapped = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| mapper.call(&Value::Undefined, &[item, Value::from(i)]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(mapped))
}

fn array() -> Function {
    let statics = JsObject::from_pairs([
        (
            "isArray",
            Value::Function(function("isArray", |args| {
                Ok(Value::Bool(matches!(arg(args, 0).unwrap_signal(), Value::Array(_))))
            })),
        ),
        ("from", Value::Function(function("from", array_from))),
        (
            "of",
            Value::Function(function("of", |args| Ok(Value::array(args.to_vec())))),
        ),
    ]);
    Function::constructor("Array", new_array, new_array)
        .with_statics(statics)
        .with_instance_check(|v| matches!(v.unwrap_untracked(), Value::Array(_)))
}

fn object() -> Function {
    let statics = JsObject::from_pairs([
        (
            "keys",
            Value::Function(function("keys", |args| {
                Ok(Value::array(
                    own_entries(&arg(args, 0)).into_iter().map(|(k, _)| Value::from(k)),
                ))
            })),
        ),
        (
            "values",
            Value::Function(function("values", |args| {
                Ok(Value::array(
                    own_entries(&arg(args, 0)).into_iter().map(|(_, v)| v),
                ))
            })),
        ),
        (
            "entries",
            Value::Function(function("entries", |args| {
                Ok(Value::array(
                    own_entries(&arg(args, 0))
                        .into_iter()
                        .map(|(k, v)| Value::array([Value::from(k), v])),
                ))
            })),
        ),
        ("assign", Value::Function(function("assign", object_assign))),
        (
            "fromEntries",
            Value::Function(function("fromEntries", |args| {
                let out = JsObject::new();
                for entry in iterate(&arg(args, 0))? {
                    let entry = entry.unwrap_signal();
                    let (key, value) = match entry.as_array() {
                        Some(pair) => (pair.get(0), pair.get(1)),
                        None => (None, None),
                    };
                    let key = key.map(|k| k.unwrap_signal().to_js_string()).unwrap_or_default();
                    out.set(key, value.map(|v| v.unwrap_signal()).unwrap_or_default());
                }
                Ok(Value::Object(out))
            })),
        ),
        (
            "freeze",
            Value::Function(function("freeze", |args| Ok(arg(args, 0)))),
        ),
    ]);
    let convert = |_: &Value, args: &[Value]| {
        Ok(match args.first().map(Value::unwrap_signal) {
            Some(v) if v.is_object_like() => v,
            _ => Value::Object(JsObject::new()),
        })
    };
    Function::constructor("Object", convert, convert)
        .with_statics(statics)
        .with_instance_check(|v| v.unwrap_untracked().is_object_like())
}

fn object_assign(args: &[Value]) -> Result<Value, EvalError> {
    let target = arg(args, 0).unwrap_signal();
    let Value::Object(object) = &target else {
        if target.is_nullish() {
            return Err(EvalError::type_error(
                "Cannot convert undefined or null to object",
            ));
        }
        return Ok(target);
    };
    for source in args.iter().skip(1) {
        for (key, value) in own_entries(source) {
            match object.get(&key) {
                Some(Value::Signal(slot)) => slot.write(value)?,
                _ => object.set(key, value),
            }
        }
    }
    Ok(target)
}

// ----------------------------------------------------------------------------
// Map, Set
// ----------------------------------------------------------------------------

fn requires_new(name: &'static str) -> impl Fn(&Value, &[Value]) -> Result<Value, EvalError> {
    move |_, _| {
        Err(EvalError::type_error(format!(
            "Constructor {name} requires 'new'"
        )))
    }
}

fn map() -> Function {
    let construct = |_: &Value, args: &[Value]| -> Result<Value, EvalError> {
        let map = JsMap::new();
        let source = arg(args, 0);
        if !source.is_nullish() {
            for entry in iterate(&source)? {
                let pair = entry.unwrap_signal();
                let Some(pair) = pair.as_array() else {
                    return Err(EvalError::type_error(format!(
                        "Iterator value {} is not an entry object",
                        pair.to_js_string()
                    )));
                };
                map.insert_silently(
                    pair.get(0).unwrap_or_default(),
                    pair.get(1).unwrap_or_default(),
                );
            }
        }
        Ok(Value::Map(map))
    };
    Function::constructor("Map", requires_new("Map"), construct)
        .with_instance_check(|v| matches!(v.unwrap_untracked(), Value::Map(_)))
}

fn set() -> Function {
    let construct = |_: &Value, args: &[Value]| -> Result<Value, EvalError> {
        let set = JsSet::new();
        let source = arg(args, 0);
        if !source.is_nullish() {
            for value in iterate(&source)? {
                set.insert_silently(value);
            }
        }
        Ok(Value::Set(set))
    };
    Function::constructor("Set", requires_new("Set"), construct)
        .with_instance_check(|v| matches!(v.unwrap_untracked(), Value::Set(_)))
}

// ----------------------------------------------------------------------------
// Date, Error, RegExp
// ----------------------------------------------------------------------------

fn is_kind(value: &Value, check: fn(&OpaqueKind) -> bool) -> bool {
    match value.unwrap_untracked() {
        Value::Opaque(o) => check(o.kind()),
        _ => false,
    }
}

fn date_constructor() -> Function {
    let construct = |_: &Value, args: &[Value]| {
        let ms = match args {
            [] => date::now(),
            [single] => match single.unwrap_signal() {
                Value::Opaque(o) => match o.kind() {
                    OpaqueKind::Date(ms) => *ms,
                    _ => Value::Opaque(o.clone()).to_number(),
                },
                Value::String(s) => date::parse(&s),
                other => date::time_clip(other.to_number()),
            },
            fields => date::from_fields(&numbers(fields).collect::<Vec<_>>()),
        };
        Ok(Value::Opaque(Opaque::date(ms)))
    };
    let call = |_: &Value, _: &[Value]| {
        Ok(Value::from(
            date::to_iso_string(date::now()).unwrap_or_default(),
        ))
    };
    let statics = JsObject::from_pairs([
        (
            "now",
            Value::Function(function("now", |_| Ok(Value::Number(date::now())))),
        ),
        (
            "parse",
            Value::Function(function("parse", |args| {
                Ok(Value::Number(date::parse(&arg(args, 0).to_js_string())))
            })),
        ),
        (
            "UTC",
            Value::Function(function("UTC", |args| {
                Ok(Value::Number(date::from_fields(&numbers(args).collect::<Vec<_>>())))
            })),
        ),
    ]);
    Function::constructor("Date", call, construct)
        .with_statics(statics)
        .with_instance_check(|v| is_kind(v, |k| matches!(k, OpaqueKind::Date(_))))
}

fn error() -> Function {
    let make = |_: &Value, args: &[Value]| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            other => other.to_js_string(),
        };
        Ok(Value::Opaque(Opaque::error("Error", message)))
    };
    Function::constructor("Error", make, make)
        .with_instance_check(|v| is_kind(v, |k| matches!(k, OpaqueKind::Error { .. })))
}

fn regexp() -> Function {
    let make = |_: &Value, args: &[Value]| -> Result<Value, EvalError> {
        let (source, inherited) = match arg(args, 0).unwrap_signal() {
            Value::Opaque(o) => match o.kind() {
                OpaqueKind::RegExp(re) => (re.source.clone(), re.flags.clone()),
                _ => (Value::Opaque(o.clone()).to_js_string(), String::new()),
            },
            Value::Undefined => ("(?:)".to_string(), String::new()),
            other => (other.to_js_string(), String::new()),
        };
        let flags = match arg(args, 1) {
            Value::Undefined => inherited,
            other => other.to_js_string(),
        };
        Ok(Value::Opaque(Opaque::regexp(&source, &flags)?))
    };
    Function::constructor("RegExp", make, make)
        .with_instance_check(|v| is_kind(v, |k| matches!(k, OpaqueKind::RegExp(_))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(name: &str) -> Value {
        standard_globals().get(name).unwrap()
    }

    fn call_static(owner: &str, name: &str, args: &[Value]) -> Value {
        let owner = global(owner);
        let statics = match &owner {
            Value::Function(f) => f.statics().cloned().unwrap(),
            Value::Object(o) => o.clone(),
            _ => panic!("{name} has no members"),
        };
        callable(&statics.get(name).unwrap())
            .unwrap()
            .call(&Value::Undefined, args)
            .unwrap()
    }

    #[test]
    fn parse_int_rules() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("  -0x1F", 0), -31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("px", 0).is_nan());
        assert!(parse_int("1", 37).is_nan());
    }

    #[test]
    fn parse_float_rules() {
        assert_eq!(parse_float("3.5em"), 3.5);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn math_helpers() {
        assert_eq!(call_static("Math", "max", &[Value::from(1), Value::from(3)]), Value::from(3));
        assert_eq!(call_static("Math", "min", &[]), Value::Number(f64::INFINITY));
        assert_eq!(call_static("Math", "round", &[Value::Number(-2.5)]), Value::from(-2));
        assert_eq!(call_static("Math", "round", &[Value::Number(2.5)]), Value::from(3));
        assert!(call_static("Math", "max", &[Value::from(1), Value::Number(f64::NAN)])
            .to_number()
            .is_nan());
    }

    #[test]
    fn json_round_trip() {
        let parsed = call_static("JSON", "parse", &[Value::from(r#"{"a":[1,2],"b":"x"}"#)]);
        let text = call_static("JSON", "stringify", &[parsed.clone()]);
        assert_eq!(text, Value::from(r#"{"a":[1,2],"b":"x"}"#));
        let pretty = call_static(
            "JSON",
            "stringify",
            &[parsed, Value::Null, Value::from(2)],
        );
        assert!(pretty.to_js_string().contains("\n  \"a\""));
        assert!(call_static("JSON", "stringify", &[Value::Undefined]).is_undefined());
    }

    #[test]
    fn constructors_and_instanceof() {
        let map_ctor = global("Map");
        let Value::Function(map_fn) = &map_ctor else {
            panic!("Map is a function");
        };
        let entries = Value::array([Value::array([Value::from("k"), Value::from(1)])]);
        let map = map_fn.construct(&[entries]).unwrap();
        assert!(map_fn.has_instance(&map));
        assert!(map_fn.call(&Value::Undefined, &[]).is_err());

        let Value::Function(array_fn) = global("Array") else {
            panic!("Array is a function");
        };
        assert!(array_fn.has_instance(&Value::array([])));
        assert!(array_fn.construct(&[Value::Number(-1.0)]).is_err());
    }

    #[test]
    fn date_fields() {
        let Value::Function(date_fn) = global("Date") else {
            panic!("Date is a function");
        };
        let d = date_fn
            .construct(&[Value::from(2020), Value::from(0), Value::from(15)])
            .unwrap();
        assert_eq!(d.to_number(), date::from_fields(&[2020.0, 0.0, 15.0]));
        assert!(date_fn.has_instance(&d));
    }

    #[test]
    fn object_statics() {
        let obj = Value::Object(JsObject::from_pairs([("a", 1), ("b", 2)]));
        let keys = call_static("Object", "keys", &[obj.clone()]);
        assert_eq!(keys.to_js_string(), "a,b");
        let merged = call_static(
            "Object",
            "assign",
            &[Value::Object(JsObject::new()), obj],
        );
        assert_eq!(merged.as_object().map(JsObject::len), Some(2));
    }
}
