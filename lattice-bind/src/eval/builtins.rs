//! Property access and builtin methods.
//!
//! Methods are produced on access as native functions closed over their
//! receiver, so `items.push` can be passed around and still mutate `items`.
//! Array elements are read through any signal they hold, which registers
//! every element a method inspects as a dependency.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::EvalError;
use crate::value::{
    format_number, join_values, relative_index, Function, JsArray, JsMap, JsObject, JsRegExp,
    JsSet, Opaque, OpaqueKind, Value,
};

use super::date;

type Method = Box<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

/// Argument `index`, or `undefined`.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// A native function that ignores `this`.
pub(crate) fn function<F>(name: &str, f: F) -> Function
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + 'static,
{
    Function::native(name, move |_this, args| f(args))
}

fn method(name: &str, f: Method) -> Value {
    Value::Function(function(name, f))
}

pub(crate) fn callable(value: &Value) -> Result<Function, EvalError> {
    match value.unwrap_signal() {
        Value::Function(f) => Ok(f),
        other => Err(EvalError::type_error(format!(
            "{} is not a function",
            other.to_js_string()
        ))),
    }
}

/// A canonical array index: digits only, no leading zeros.
fn index_key(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

fn relative(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    relative_index(value.to_integer(), len)
}

/// Array elements with signals read through.
pub(crate) fn elements(array: &JsArray) -> Vec<Value> {
    array.to_vec().iter().map(Value::unwrap_signal).collect()
}

// ----------------------------------------------------------------------------
// Property lookup
// ----------------------------------------------------------------------------

/// `object[key]`. The result may be a signal; callers decide whether to read
/// through it.
pub(crate) fn get_property(object: &Value, key: &str) -> Result<Value, EvalError> {
    Ok(match object {
        Value::Signal(s) => return get_property(&s.read(), key),
        Value::Undefined | Value::Null => {
            return Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )))
        }
        Value::Object(o) => o.get(key).unwrap_or_else(|| object_property(o, key)),
        Value::Array(a) => array_property(a, key),
        Value::String(s) => string_property(s, key),
        Value::Number(n) => number_property(*n, key),
        Value::Bool(b) => {
            let b = *b;
            match key {
                "toString" => method("toString", Box::new(move |_| Ok(Value::from(b.to_string())))),
                "valueOf" => method("valueOf", Box::new(move |_| Ok(Value::Bool(b)))),
                _ => Value::Undefined,
            }
        }
        Value::Map(m) => map_property(m, key),
        Value::Set(s) => set_property(s, key),
        Value::Function(f) => function_property(f, key),
        Value::Opaque(o) => opaque_property(o, key),
    })
}

/// The `in` operator.
pub(crate) fn has_property(object: &Value, key: &str) -> bool {
    match object.unwrap_signal() {
        Value::Object(o) => o.has(key),
        Value::Array(a) => key == "length" || index_key(key).is_some_and(|i| i < a.len()),
        Value::Map(_) | Value::Set(_) => key == "size",
        Value::Function(f) => key == "name" || f.statics().is_some_and(|s| s.has(key)),
        _ => false,
    }
}

/// Values produced by `...` in array literals and call arguments.
pub(crate) fn iterate(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value.unwrap_signal() {
        Value::Array(a) => Ok(elements(&a)),
        Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Set(s) => Ok(s.values()),
        Value::Map(m) => Ok(m
            .entries()
            .into_iter()
            .map(|(k, v)| Value::array([k, v]))
            .collect()),
        other => Err(EvalError::type_error(format!(
            "{} is not iterable",
            other.to_js_string()
        ))),
    }
}

/// Own enumerable entries, as used by object spread and `Object.entries`.
pub(crate) fn own_entries(value: &Value) -> Vec<(String, Value)> {
    match value.unwrap_signal() {
        Value::Object(o) => o
            .entries()
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_signal()))
            .collect(),
        Value::Array(a) => elements(&a)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::String(s) => s
            .encode_utf16()
            .enumerate()
            .map(|(i, u)| (i.to_string(), Value::from(String::from_utf16_lossy(&[u]))))
            .collect(),
        _ => Vec::new(),
    }
}

fn object_property(object: &JsObject, key: &str) -> Value {
    let object = object.clone();
    match key {
        "hasOwnProperty" => method(
            "hasOwnProperty",
            Box::new(move |args| Ok(Value::Bool(object.has(&arg(args, 0).to_js_string())))),
        ),
        _ => Value::Undefined,
    }
}

fn function_property(f: &Function, key: &str) -> Value {
    if let Some(value) = f.statics().and_then(|s| s.get(key)) {
        return value;
    }
    let f = f.clone();
    match key {
        "name" => Value::from(f.name()),
        "call" => Value::Function(Function::native("call", move |_this, args| {
            f.call(&arg(args, 0), args.get(1..).unwrap_or_default())
        })),
        "bind" => Value::Function(Function::native("bind", move |_this, args| {
            Ok(Value::Function(f.bind(arg(args, 0))))
        })),
        _ => Value::Undefined,
    }
}

// ----------------------------------------------------------------------------
// Arrays
// ----------------------------------------------------------------------------

fn array_property(array: &JsArray, key: &str) -> Value {
    if key == "length" {
        return Value::from(array.len());
    }
    if let Some(index) = index_key(key) {
        return array.get(index).unwrap_or_default();
    }
    array_method(array, key).map_or(Value::Undefined, |f| method(key, f))
}

/// Call `callback(item, index, array)` for each element until `step`
/// returns `Some`.
fn each<T>(
    array: &JsArray,
    callback: &Value,
    mut step: impl FnMut(usize, &Value, Value) -> Option<T>,
) -> Result<Option<T>, EvalError> {
    let callback = callable(callback)?;
    for (index, item) in elements(array).into_iter().enumerate() {
        let result = callback.call(
            &Value::Undefined,
            &[item.clone(), Value::from(index), Value::Array(array.clone())],
        )?;
        if let Some(done) = step(index, &item, result) {
            return Ok(Some(done));
        }
    }
    Ok(None)
}

fn default_order(a: &Value, b: &Value) -> Ordering {
    let (a, b) = (a.to_js_string(), b.to_js_string());
    a.encode_utf16().cmp(b.encode_utf16())
}

fn array_method(array: &JsArray, name: &str) -> Option<Method> {
    let a = array.clone();
    let f: Method = match name {
        "push" => Box::new(move |args| Ok(Value::from(a.push_all(args.to_vec())))),
        "pop" => Box::new(move |_| Ok(a.pop().unwrap_signal())),
        "shift" => Box::new(move |_| Ok(a.shift().unwrap_signal())),
        "unshift" => Box::new(move |args| Ok(Value::from(a.unshift(args.to_vec())))),
        "splice" => Box::new(move |args| {
            let start = arg(args, 0).to_integer();
            let count = match args.len() {
                0 => Some(0.0),
                1 => None,
                _ => Some(args[1].to_integer()),
            };
            let items = args.iter().skip(2).cloned().collect();
            let removed = a.splice(start, count, items);
            Ok(Value::array(removed.iter().map(Value::unwrap_signal)))
        }),
        "reverse" => Box::new(move |_| {
            a.reverse();
            Ok(Value::Array(a.clone()))
        }),
        "sort" => Box::new(move |args| {
            let comparator = match arg(args, 0) {
                Value::Undefined => None,
                Value::Function(f) => Some(f),
                _ => {
                    return Err(EvalError::type_error(
                        "The comparison function must be either a function or undefined",
                    ))
                }
            };
            a.sort_by(|x, y| -> Result<Ordering, EvalError> {
                let (x, y) = (x.unwrap_signal(), y.unwrap_signal());
                match (x.is_undefined(), y.is_undefined()) {
                    (true, true) => return Ok(Ordering::Equal),
                    (true, false) => return Ok(Ordering::Greater),
                    (false, true) => return Ok(Ordering::Less),
                    _ => {}
                }
                let Some(f) = &comparator else {
                    return Ok(default_order(&x, &y));
                };
                let n = f.call(&Value::Undefined, &[x, y])?.to_number();
                Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
            })?;
            Ok(Value::Array(a.clone()))
        }),
        "slice" => Box::new(move |args| {
            let items = elements(&a);
            let start = relative(&arg(args, 0), items.len(), 0);
            let end = relative(&arg(args, 1), items.len(), items.len());
            Ok(Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
        }),
        "concat" => Box::new(move |args| {
            let mut items = elements(&a);
            for value in args {
                match value.unwrap_signal() {
                    Value::Array(other) => items.extend(elements(&other)),
                    other => items.push(other),
                }
            }
            Ok(Value::array(items))
        }),
        "join" => Box::new(move |args| {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            Ok(Value::from(join_values(&a.to_vec(), &separator)))
        }),
        "toString" => Box::new(move |_| Ok(Value::from(join_values(&a.to_vec(), ",")))),
        "indexOf" => Box::new(move |args| {
            let items = elements(&a);
            let needle = arg(args, 0);
            let from = relative(&arg(args, 1), items.len(), 0);
            let found = items.iter().skip(from).position(|v| v.strict_equals(&needle));
            Ok(Value::Number(found.map_or(-1.0, |i| (i + from) as f64)))
        }),
        "lastIndexOf" => Box::new(move |args| {
            let needle = arg(args, 0);
            let found = elements(&a).iter().rposition(|v| v.strict_equals(&needle));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }),
        "includes" => Box::new(move |args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(elements(&a).iter().any(|v| v.same_value_zero(&needle))))
        }),
        "at" => Box::new(move |args| {
            let len = a.len() as f64;
            let i = arg(args, 0).to_integer();
            let i = if i < 0.0 { len + i } else { i };
            if i < 0.0 || i >= len {
                return Ok(Value::Undefined);
            }
            Ok(a.get(i as usize).map(|v| v.unwrap_signal()).unwrap_or_default())
        }),
        "map" => Box::new(move |args| {
            let mut out = Vec::with_capacity(a.len());
            each(&a, &arg(args, 0), |_, _, result| {
                out.push(result);
                None::<()>
            })?;
            Ok(Value::array(out))
        }),
        "filter" => Box::new(move |args| {
            let mut out = Vec::new();
            each(&a, &arg(args, 0), |_, item, keep| {
                if keep.truthy() {
                    out.push(item.clone());
                }
                None::<()>
            })?;
            Ok(Value::array(out))
        }),
        "forEach" => Box::new(move |args| {
            each(&a, &arg(args, 0), |_, _, _| None::<()>)?;
            Ok(Value::Undefined)
        }),
        "find" => Box::new(move |args| {
            let found = each(&a, &arg(args, 0), |_, item, hit| hit.truthy().then(|| item.clone()))?;
            Ok(found.unwrap_or_default())
        }),
        "findIndex" => Box::new(move |args| {
            let found = each(&a, &arg(args, 0), |i, _, hit| hit.truthy().then_some(i))?;
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }),
        "some" => Box::new(move |args| {
            let found = each(&a, &arg(args, 0), |_, _, hit| hit.truthy().then_some(()))?;
            Ok(Value::Bool(found.is_some()))
        }),
        "every" => Box::new(move |args| {
            let failed = each(&a, &arg(args, 0), |_, _, hit| (!hit.truthy()).then_some(()))?;
            Ok(Value::Bool(failed.is_none()))
        }),
        "reduce" => Box::new(move |args| {
            let callback = callable(&arg(args, 0))?;
            let mut items = elements(&a).into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match items.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(EvalError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for (index, item) in items {
                acc = callback.call(
                    &Value::Undefined,
                    &[acc, item, Value::from(index), Value::Array(a.clone())],
                )?;
            }
            Ok(acc)
        }),
        "flat" => Box::new(move |_| {
            let mut out = Vec::new();
            for item in elements(&a) {
                match item {
                    Value::Array(inner) => out.extend(elements(&inner)),
                    other => out.push(other),
                }
            }
            Ok(Value::array(out))
        }),
        _ => return None,
    };
    Some(f)
}

// ----------------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------------

fn string_property(s: &Rc<str>, key: &str) -> Value {
    if key == "length" {
        return Value::from(unit_len(s));
    }
    if let Some(index) = index_key(key) {
        return s
            .encode_utf16()
            .nth(index)
            .map_or(Value::Undefined, |u| Value::from(String::from_utf16_lossy(&[u])));
    }
    string_method(s.clone(), key).map_or(Value::Undefined, |f| method(key, f))
}


/// Code-unit index of `needle` in `hay` at or after `from`.
fn find_units(hay: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    (from..=hay.len().saturating_sub(needle.len()))
        .find(|&i| hay.get(i..i + needle.len()) == Some(needle))
}

fn pad(s: &str, args: &[Value], at_start: bool) -> Result<String, EvalError> {
    let target = arg(args, 0).to_integer().max(0.0);
    let fill: Vec<u16> = match arg(args, 1) {
        Value::Undefined => vec![u16::from(b' ')],
        other => other.to_js_string().encode_utf16().collect(),
    };
    let len = unit_len(s);
    if target <= len as f64 || fill.is_empty() {
        return Ok(s.to_string());
    }
    check_string_len(target)?;
    let padding: Vec<u16> = fill.iter().copied().cycle().take(target as usize - len).collect();
    let padding = String::from_utf16_lossy(&padding);
    Ok(if at_start {
        padding + s
    } else {
        s.to_string() + &padding
    })
}

/// Longest string, in UTF-16 code units, that `repeat` and the pad methods
/// will build.
pub(crate) const MAX_STRING_LEN: usize = 1 << 28;

fn check_string_len(len: f64) -> Result<(), EvalError> {
    if len > MAX_STRING_LEN as f64 {
        return Err(EvalError::Range("Invalid string length".into()));
    }
    Ok(())
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Number of UTF-16 code units in `s`, which is what JS indices count.
fn unit_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn unit_slice(units: &[u16], start: usize, end: usize) -> String {
    String::from_utf16_lossy(units.get(start..end.max(start)).unwrap_or_default())
}

fn as_regexp(value: &Value) -> Option<Opaque> {
    match value.unwrap_signal() {
        Value::Opaque(o) if matches!(o.kind(), OpaqueKind::RegExp(_)) => Some(o),
        _ => None,
    }
}

/// Rewrite JS `$n` / `$&` replacement references for the regex crate.
fn translate_replacement(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

fn replace_with_regex(
    text: &str,
    re: &JsRegExp,
    replacement: &Value,
    all: bool,
) -> Result<String, EvalError> {
    let Value::Function(f) = replacement else {
        let template = translate_replacement(&replacement.to_js_string());
        return Ok(if all {
            re.regex.replace_all(text, template.as_str()).into_owned()
        } else {
            re.regex.replace(text, template.as_str()).into_owned()
        });
    };
    let mut out = String::new();
    let mut last = 0;
    for caps in re.regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let mut args = vec![Value::from(whole.as_str())];
        args.extend(
            caps.iter()
                .skip(1)
                .map(|g| g.map_or(Value::Undefined, |m| Value::from(m.as_str()))),
        );
        args.push(Value::from(unit_len(&text[..whole.start()])));
        args.push(Value::from(text));
        out.push_str(&f.call(&Value::Undefined, &args)?.to_js_string());
        last = whole.end();
        if !all {
            break;
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn replace_with_string(
    text: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> Result<String, EvalError> {
    let mut out = String::new();
    let mut last = 0;
    for (start, matched) in text.match_indices(pattern) {
        out.push_str(&text[last..start]);
        let piece = match replacement {
            Value::Function(f) => f
                .call(
                    &Value::Undefined,
                    &[
                        Value::from(matched),
                        Value::from(unit_len(&text[..start])),
                        Value::from(text),
                    ],
                )?
                .to_js_string(),
            other => other.to_js_string(),
        };
        out.push_str(&piece);
        last = start + matched.len();
        if !all {
            break;
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn replace(text: &str, args: &[Value], all: bool) -> Result<Value, EvalError> {
    let pattern = arg(args, 0);
    let replacement = arg(args, 1).unwrap_signal();
    if let Some(opaque) = as_regexp(&pattern) {
        let OpaqueKind::RegExp(re) = opaque.kind() else {
            return Ok(Value::from(text));
        };
        if all && !re.is_global() {
            return Err(EvalError::type_error(
                "replaceAll must be called with a global RegExp",
            ));
        }
        let all = all || re.is_global();
        return Ok(Value::from(replace_with_regex(text, re, &replacement, all)?));
    }
    let pattern = pattern.to_js_string();
    Ok(Value::from(replace_with_string(text, &pattern, &replacement, all)?))
}

fn split(text: &str, args: &[Value]) -> Vec<Value> {
    let separator = arg(args, 0);
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => other.to_uint32() as usize,
    };
    let parts: Vec<String> = if separator.is_undefined() {
        vec![text.to_string()]
    } else if let Some(opaque) = as_regexp(&separator) {
        match opaque.kind() {
            OpaqueKind::RegExp(re) => re.regex.split(text).map(str::to_string).collect(),
            _ => vec![text.to_string()],
        }
    } else {
        let separator = separator.to_js_string();
        if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator.as_str()).map(str::to_string).collect()
        }
    };
    parts.into_iter().take(limit).map(Value::from).collect()
}

fn string_method(s: Rc<str>, name: &str) -> Option<Method> {
    let f: Method = match name {
        "toUpperCase" => Box::new(move |_| Ok(Value::from(s.to_uppercase()))),
        "toLowerCase" => Box::new(move |_| Ok(Value::from(s.to_lowercase()))),
        "trim" => Box::new(move |_| Ok(Value::from(s.trim()))),
        "trimStart" => Box::new(move |_| Ok(Value::from(s.trim_start()))),
        "trimEnd" => Box::new(move |_| Ok(Value::from(s.trim_end()))),
        "toString" | "valueOf" => Box::new(move |_| Ok(Value::String(s.clone()))),
        "includes" => Box::new(move |args| {
            let hay = units(&s);
            let needle = units(&arg(args, 0).to_js_string());
            let from = relative(&arg(args, 1), hay.len(), 0);
            Ok(Value::Bool(find_units(&hay, &needle, from).is_some()))
        }),
        "indexOf" => Box::new(move |args| {
            let hay = units(&s);
            let needle = units(&arg(args, 0).to_js_string());
            let from = arg(args, 1).to_integer().clamp(0.0, hay.len() as f64) as usize;
            Ok(Value::Number(
                find_units(&hay, &needle, from).map_or(-1.0, |i| i as f64),
            ))
        }),
        "lastIndexOf" => Box::new(move |args| {
            let needle = arg(args, 0).to_js_string();
            Ok(Value::Number(
                s.rfind(needle.as_str())
                    .map_or(-1.0, |byte| unit_len(&s[..byte]) as f64),
            ))
        }),
        "startsWith" => Box::new(move |args| {
            let hay = units(&s);
            let from = arg(args, 1).to_integer().clamp(0.0, hay.len() as f64) as usize;
            let needle = units(&arg(args, 0).to_js_string());
            Ok(Value::Bool(hay[from..].starts_with(&needle)))
        }),
        "endsWith" => Box::new(move |args| {
            let hay = units(&s);
            let end = match arg(args, 1) {
                Value::Undefined => hay.len(),
                other => other.to_integer().clamp(0.0, hay.len() as f64) as usize,
            };
            let needle = units(&arg(args, 0).to_js_string());
            Ok(Value::Bool(hay[..end].ends_with(&needle)))
        }),
        "slice" => Box::new(move |args| {
            let hay = units(&s);
            let start = relative(&arg(args, 0), hay.len(), 0);
            let end = relative(&arg(args, 1), hay.len(), hay.len());
            Ok(Value::from(unit_slice(&hay, start, end)))
        }),
        "substring" => Box::new(move |args| {
            let hay = units(&s);
            let clamp = |v: Value, default: usize| {
                if v.is_undefined() {
                    default
                } else {
                    v.to_integer().clamp(0.0, hay.len() as f64) as usize
                }
            };
            let start = clamp(arg(args, 0), 0);
            let end = clamp(arg(args, 1), hay.len());
            Ok(Value::from(unit_slice(&hay, start.min(end), start.max(end))))
        }),
        "charAt" => Box::new(move |args| {
            let index = arg(args, 0).to_integer();
            let unit = (index >= 0.0)
                .then(|| s.encode_utf16().nth(index as usize))
                .flatten();
            Ok(Value::from(
                unit.map(|u| String::from_utf16_lossy(&[u])).unwrap_or_default(),
            ))
        }),
        "charCodeAt" => Box::new(move |args| {
            let index = arg(args, 0).to_integer();
            let unit = (index >= 0.0)
                .then(|| s.encode_utf16().nth(index as usize))
                .flatten();
            Ok(Value::Number(unit.map_or(f64::NAN, f64::from)))
        }),
        "at" => Box::new(move |args| {
            let hay = units(&s);
            let len = hay.len() as f64;
            let i = arg(args, 0).to_integer();
            let i = if i < 0.0 { len + i } else { i };
            if i < 0.0 || i >= len {
                return Ok(Value::Undefined);
            }
            Ok(Value::from(String::from_utf16_lossy(&hay[i as usize..=i as usize])))
        }),
        "padStart" => Box::new(move |args| Ok(Value::from(pad(&s, args, true)?))),
        "padEnd" => Box::new(move |args| Ok(Value::from(pad(&s, args, false)?))),
        "repeat" => Box::new(move |args| {
            let count = arg(args, 0).to_integer();
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::Range(format!(
                    "Invalid count value: {}",
                    format_number(count)
                )));
            }
            if s.is_empty() {
                return Ok(Value::from(""));
            }
            check_string_len(unit_len(&s) as f64 * count)?;
            Ok(Value::from(s.repeat(count as usize)))
        }),
        "concat" => Box::new(move |args| {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value.to_js_string());
            }
            Ok(Value::from(out))
        }),
        "split" => Box::new(move |args| Ok(Value::array(split(&s, args)))),
        "replace" => Box::new(move |args| replace(&s, args, false)),
        "replaceAll" => Box::new(move |args| replace(&s, args, true)),
        _ => return None,
    };
    Some(f)
}

// ----------------------------------------------------------------------------
// Numbers
// ----------------------------------------------------------------------------

fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let base = f64::from(radix);
    let mut int = n.abs().trunc();
    let mut frac = n.abs().fract();
    let mut digits = Vec::new();
    while int >= 1.0 {
        let d = (int % base) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        int = (int / base).trunc();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if n < 0.0 {
        digits.push('-');
    }
    let mut out: String = digits.into_iter().rev().collect();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= base;
            out.push(char::from_digit(frac.trunc() as u32, radix).unwrap_or('0'));
            frac = frac.fract();
            if frac == 0.0 {
                break;
            }
        }
    }
    out
}

fn number_property(n: f64, key: &str) -> Value {
    let f: Method = match key {
        "toFixed" => Box::new(move |args| {
            let digits = arg(args, 0).to_integer();
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::Range(
                    "toFixed() digits argument must be between 0 and 100".into(),
                ));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{:.*}", digits as usize, n)))
        }),
        "toString" => Box::new(move |args| {
            let radix = match arg(args, 0) {
                Value::Undefined => 10.0,
                other => other.to_integer(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(EvalError::Range(
                    "toString() radix must be between 2 and 36".into(),
                ));
            }
            Ok(Value::from(if radix == 10.0 {
                format_number(n)
            } else {
                to_radix_string(n, radix as u32)
            }))
        }),
        "valueOf" => Box::new(move |_| Ok(Value::Number(n))),
        _ => return Value::Undefined,
    };
    method(key, f)
}

// ----------------------------------------------------------------------------
// Map / Set
// ----------------------------------------------------------------------------

fn map_property(map: &JsMap, key: &str) -> Value {
    let m = map.clone();
    let f: Method = match key {
        "size" => return Value::from(map.len()),
        "get" => Box::new(move |args| Ok(m.get(&arg(args, 0)).unwrap_or_default())),
        "set" => Box::new(move |args| {
            m.set(arg(args, 0), arg(args, 1));
            Ok(Value::Map(m.clone()))
        }),
        "has" => Box::new(move |args| Ok(Value::Bool(m.has(&arg(args, 0))))),
        "delete" => Box::new(move |args| Ok(Value::Bool(m.delete(&arg(args, 0))))),
        "clear" => Box::new(move |_| {
            m.clear();
            Ok(Value::Undefined)
        }),
        "keys" => Box::new(move |_| Ok(Value::array(m.entries().into_iter().map(|(k, _)| k)))),
        "values" => Box::new(move |_| Ok(Value::array(m.entries().into_iter().map(|(_, v)| v)))),
        "entries" => Box::new(move |_| {
            Ok(Value::array(
                m.entries().into_iter().map(|(k, v)| Value::array([k, v])),
            ))
        }),
        "forEach" => Box::new(move |args| {
            let callback = callable(&arg(args, 0))?;
            for (k, v) in m.entries() {
                callback.call(&Value::Undefined, &[v, k, Value::Map(m.clone())])?;
            }
            Ok(Value::Undefined)
        }),
        _ => return Value::Undefined,
    };
    method(key, f)
}

fn set_property(set: &JsSet, key: &str) -> Value {
    let s = set.clone();
    let f: Method = match key {
        "size" => return Value::from(set.len()),
        "add" => Box::new(move |args| {
            s.add(arg(args, 0));
            Ok(Value::Set(s.clone()))
        }),
        "has" => Box::new(move |args| Ok(Value::Bool(s.has(&arg(args, 0))))),
        "delete" => Box::new(move |args| Ok(Value::Bool(s.delete(&arg(args, 0))))),
        "clear" => Box::new(move |_| {
            s.clear();
            Ok(Value::Undefined)
        }),
        "values" | "keys" => Box::new(move |_| Ok(Value::array(s.values()))),
        "entries" => Box::new(move |_| {
            Ok(Value::array(
                s.values().into_iter().map(|v| Value::array([v.clone(), v])),
            ))
        }),
        "forEach" => Box::new(move |args| {
            let callback = callable(&arg(args, 0))?;
            for v in s.values() {
                callback.call(&Value::Undefined, &[v.clone(), v, Value::Set(s.clone())])?;
            }
            Ok(Value::Undefined)
        }),
        _ => return Value::Undefined,
    };
    method(key, f)
}

// ----------------------------------------------------------------------------
// Dates, regular expressions, errors
// ----------------------------------------------------------------------------

fn opaque_property(opaque: &Opaque, key: &str) -> Value {
    match opaque.kind() {
        OpaqueKind::RegExp(re) => match key {
            "source" => Value::from(re.source.as_str()),
            "flags" => Value::from(re.flags.as_str()),
            "global" => Value::Bool(re.is_global()),
            "test" => {
                let o = opaque.clone();
                method(
                    "test",
                    Box::new(move |args| {
                        let text = arg(args, 0).to_js_string();
                        Ok(Value::Bool(match o.kind() {
                            OpaqueKind::RegExp(re) => re.test(&text),
                            _ => false,
                        }))
                    }),
                )
            }
            _ => Value::Undefined,
        },
        OpaqueKind::Date(ms) => date_method(*ms, key).map_or(Value::Undefined, |f| method(key, f)),
        OpaqueKind::Error { name, message } => match key {
            "name" => Value::from(name.as_str()),
            "message" => Value::from(message.as_str()),
            _ => Value::Undefined,
        },
        OpaqueKind::Host(_) => Value::Undefined,
    }
}

fn date_method(ms: f64, name: &str) -> Option<Method> {
    let field: fn(&date::DateParts) -> f64 = match name {
        "getTime" | "valueOf" => return Some(Box::new(move |_| Ok(Value::Number(ms)))),
        "toISOString" | "toJSON" => {
            return Some(Box::new(move |_| match date::to_iso_string(ms) {
                Some(s) => Ok(Value::from(s)),
                None => Err(EvalError::Range("Invalid time value".into())),
            }))
        }
        "getFullYear" => |p| p.year as f64,
        "getMonth" => |p| f64::from(p.month),
        "getDate" => |p| f64::from(p.day),
        "getDay" => |p| f64::from(p.weekday),
        "getHours" => |p| f64::from(p.hours),
        "getMinutes" => |p| f64::from(p.minutes),
        "getSeconds" => |p| f64::from(p.seconds),
        "getMilliseconds" => |p| f64::from(p.millis),
        _ => return None,
    };
    Some(Box::new(move |_| {
        Ok(Value::Number(date::parts(ms).as_ref().map_or(f64::NAN, field)))
    }))
}
