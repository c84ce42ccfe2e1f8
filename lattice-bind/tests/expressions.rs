//! Integration Tests for Expression Parsing and Evaluation
//!
//! Table-driven coverage of the binding language, plus the paths a binder
//! relies on: two-way references, lazy handlers, the AST cache, and the
//! diagnostics hook.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use lattice_bind::diagnostics::{self, Diagnostic, DiagnosticKind};
use lattice_bind::eval::{evaluate_source, try_evaluate_source};
use lattice_bind::expr::ExpressionCache;
use lattice_bind::{
    batch, deep_ref, evaluate, parse_expression, standard_globals, try_evaluate, EvalOptions,
    Function, JsObject, Signal, Value,
};

/// Scope shared by the table tests. Built fresh for every case so
/// assignments cannot leak between rows.
fn scope() -> Value {
    let scope = Value::from_json(&json!({
        "a": 1,
        "b": 2,
        "c": 3,
        "name": "Ada",
        "items": [1, 2, 3],
        "user": { "profile": { "city": "Oslo" } },
        "nothing": null,
    }));
    if let Some(object) = scope.as_object() {
        object.set("tag", Function::native("tag", |_, args| {
            let strings = args.first().and_then(Value::as_array).map(|a| a.to_vec());
            let mut out = String::new();
            for (i, part) in strings.unwrap_or_default().iter().enumerate() {
                out.push_str(&part.to_js_string());
                if let Some(value) = args.get(i + 1) {
                    out.push_str(&value.to_js_string().to_uppercase());
                }
            }
            Ok(Value::from(out))
        }));
    }
    scope
}

fn globals() -> Value {
    Value::Object(standard_globals())
}

fn eval_json(source: &str) -> serde_json::Value {
    let result = try_evaluate_source(source, &[scope()], &globals(), &EvalOptions::new())
        .unwrap_or_else(|err| panic!("{source}: {err}"));
    result
        .value
        .to_json()
        .unwrap_or_else(|err| panic!("{source}: {err}"))
}

/// Test that each expression in the table evaluates to the expected JSON.
#[test]
fn evaluation_table() {
    let cases = [
        // Precedence and associativity
        ("a + b * c", json!(7)),
        ("(a + b) * c", json!(9)),
        ("2 ** 3 ** 2", json!(512)),
        ("10 - 4 - 3", json!(3)),
        // Ternary
        ("a > b ? 'yes' : 'no'", json!("no")),
        ("a ? b ? 'x' : 'y' : 'z'", json!("x")),
        // Templates
        ("`Hello ${name}!`", json!("Hello Ada!")),
        ("`${a}+${b}=${a + b}`", json!("1+2=3")),
        ("`outer ${`inner ${c}`}`", json!("outer inner 3")),
        // Tagged templates
        ("tag`a${name}b${a}`", json!("aADAb1")),
        // Spread
        ("[...items, 4]", json!([1, 2, 3, 4])),
        ("({ ...user.profile, zip: 1 })", json!({ "city": "Oslo", "zip": 1 })),
        ("Math.max(...items)", json!(3)),
        // Optional chaining and nullish coalescing
        ("user?.profile?.city", json!("Oslo")),
        ("nothing ?? 'fallback'", json!("fallback")),
        ("nothing?.deep.value ?? 'short'", json!("short")),
        // new
        ("new Date(0).getTime()", json!(0)),
        ("new Map([[1, 'one']]).get(1)", json!("one")),
        ("new Set(items).size", json!(3)),
        ("new Date(Date.UTC(2020, 0, 2)).toISOString()", json!("2020-01-02T00:00:00.000Z")),
        // Arrows and array methods
        ("items.map(x => x * 2).filter(x => x > 2)", json!([4, 6])),
        ("items.reduce((sum, x) => sum + x, 0)", json!(6)),
        ("items.find(x => x > 1)", json!(2)),
        ("((x, y) => x * y)(b, c)", json!(6)),
        // Operators
        ("typeof name", json!("string")),
        ("'city' in user.profile", json!(true)),
        ("[1, 2, 3].includes(2) && !false", json!(true)),
        ("'5' == 5 && '5' !== 5", json!(true)),
        ("7 % 4 | 8", json!(11)),
        // Globals
        ("JSON.stringify({ a: [1, 2] })", json!("{\"a\":[1,2]}")),
        ("parseInt('42px') + 1", json!(43)),
        ("Object.keys(user)", json!(["profile"])),
        ("'abc'.toUpperCase().split('')", json!(["A", "B", "C"])),
        ("[a, b, c].join('-')", json!("1-2-3")),
        ("/z+/.test(user.profile.city)", json!(false)),
        ("/O/i.test(user.profile.city)", json!(true)),
        ("isNaN(Date.UTC(1e20, 0))", json!(true)),
        ("'😀'.length", json!(2)),
        // Assignment and top-level lists
        ("a = 5, a * 2", json!([5, 10])),
        ("b += 3; b", json!([5, 5])),
        ("(c++, c)", json!(4)),
        ("$root.name", json!("Ada")),
    ];

    for (source, expected) in cases {
        assert_eq!(eval_json(source), expected, "{source}");
    }
}

/// Test expressions that evaluate to `undefined` without raising.
#[test]
fn undefined_results() {
    for source in ["missing", "nothing?.deep.value", "[1, , 2][1]", "user.age", "void 0"] {
        let result =
            try_evaluate_source(source, &[scope()], &globals(), &EvalOptions::new()).unwrap();
        assert!(result.value.is_undefined(), "{source}");
    }
}

/// Test that malformed expressions fail to parse.
#[test]
fn invalid_expressions_fail_to_parse() {
    for source in ["a +", "f(a,,b)", "{a:}", "++1", "a ? b", "(a", "`open ${a`"] {
        assert!(parse_expression(source).is_err(), "{source}");
    }
}

/// Test that runtime failures carry JavaScript-style messages.
#[test]
fn runtime_errors() {
    let cases = [
        ("nothing.deep", "TypeError: Cannot read properties of null (reading 'deep')"),
        ("a()", "TypeError: a is not a function"),
        ("'x'.repeat(-1)", "RangeError: Invalid count value: -1"),
        ("'ab'.repeat(1e19)", "RangeError: Invalid string length"),
        ("'x'.padStart(1e19)", "RangeError: Invalid string length"),
        ("'x'.padEnd(1e19, 'ab')", "RangeError: Invalid string length"),
        ("items[4294967294] = 1", "RangeError: Invalid array length"),
        ("items.length = 4294967295", "RangeError: Invalid array length"),
    ];
    for (source, message) in cases {
        let err = try_evaluate_source(source, &[scope()], &globals(), &EvalOptions::new())
            .expect_err(source);
        assert_eq!(err.to_string(), message, "{source}");
    }
}

/// Test that a plain identifier or member read reports its signal, so a
/// binder can write back through it.
#[test]
fn two_way_reference_through_deep_ref() {
    let state = deep_ref(Value::from_json(&json!({ "form": { "name": "Ada" } })));
    let contexts = [Value::Signal(state.clone())];
    let ast = parse_expression("form.name").unwrap();

    let result = evaluate(&ast, &contexts, &globals(), &EvalOptions::new().collecting());
    assert_eq!(result.value, Value::from("Ada"));
    let reference = result.reference.expect("member read has a reference");
    assert!(result.refs.contains(&reference));

    reference.write("Grace").unwrap();
    let again = evaluate(&ast, &contexts, &globals(), &EvalOptions::new());
    assert_eq!(again.value, Value::from("Grace"));
}

/// Test that assignment inside an expression notifies the bound signal.
#[test]
fn assignment_writes_through_signals() {
    let count = Signal::new(1);
    let scope = Value::Object(JsObject::from_pairs([("count", count.clone())]));
    let fired = Rc::new(Cell::new(0));
    let sink = fired.clone();
    let _handle = count.observe(move |_, _| sink.set(sink.get() + 1), false);

    let result = try_evaluate_source("count += 41", &[scope], &globals(), &EvalOptions::new())
        .unwrap();

    assert_eq!(result.value, Value::from(42));
    assert_eq!(count.read_untracked(), Value::from(42));
    assert_eq!(fired.get(), 1);
}

/// Test that call arguments selected as lazy become `$event` handlers.
#[test]
fn lazy_call_arguments_become_handlers() {
    let clicks = Signal::new(0);
    let received = Rc::new(Cell::new(Value::Undefined));
    let sink = received.clone();
    let on = Function::native("on", move |_, args| {
        sink.set(args.get(1).cloned().unwrap_or_default());
        Ok(Value::Undefined)
    });
    let scope = Value::Object(JsObject::from_pairs([
        ("clicks", Value::Signal(clicks.clone())),
        ("on", Value::Function(on)),
    ]));
    let options = EvalOptions::new().with_lazy_arg(|index, depth| depth == 1 && index == 1);

    try_evaluate_source("on('tap', clicks += $event)", &[scope], &globals(), &options).unwrap();

    // The handler was passed, not run
    assert_eq!(clicks.read_untracked(), Value::from(0));
    let handler = received.take();
    let handler = handler.as_function().expect("handler");
    handler.call(&Value::Undefined, &[Value::from(3)]).unwrap();
    handler.call(&Value::Undefined, &[Value::from(4)]).unwrap();
    assert_eq!(clicks.read_untracked(), Value::from(7));
}

/// Test that identical source text shares one parsed tree.
#[test]
fn cache_shares_trees() {
    let cache = ExpressionCache::new();
    let first = cache.parse("a + b").unwrap();
    let second = cache.parse("a + b").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    assert!(cache.parse("a +").is_err());
    assert_eq!(cache.len(), 1);

    let global_first = parse_expression("items.length").unwrap();
    let global_second = parse_expression("items.length").unwrap();
    assert!(Arc::ptr_eq(&global_first, &global_second));
}

/// Test that a failed evaluation still returns the refs read before it.
#[test]
fn failed_evaluation_keeps_refs() {
    let ready = Signal::new(Value::Null);
    let scope = Value::Object(JsObject::from_pairs([("ready", ready.clone())]));
    let ast = parse_expression("ready.value").unwrap();

    assert!(try_evaluate(&ast, &[scope.clone()], &globals(), &EvalOptions::new()).is_err());
    let result = evaluate(&ast, &[scope], &globals(), &EvalOptions::new().collecting());
    assert!(result.value.is_undefined());
    assert!(result.refs.contains(&ready));
}

/// Test that every recoverable failure reaches the diagnostics hook.
///
/// The hook is process-wide, so this is the only test in this binary that
/// installs one, and it keeps only reports from its own thread.
#[test]
fn diagnostics_hook_receives_failures() {
    let seen: Arc<Mutex<Vec<Diagnostic>>> = Arc::default();
    let sink = seen.clone();
    let me = std::thread::current().id();
    diagnostics::set_hook(move |diagnostic| {
        if std::thread::current().id() == me {
            sink.lock().push(diagnostic.clone());
        }
    });

    // Parse failure
    let result = evaluate_source("a +", &[], &globals(), &EvalOptions::new());
    assert!(result.value.is_undefined());

    // Evaluation failure
    evaluate_source("nothing.deep", &[scope()], &globals(), &EvalOptions::new());

    // Observer panic during a batch flush; the second observer still runs
    let signal = Signal::new(0);
    let _bad = signal.observe(|_, _| panic!("observer exploded"), false);
    let reached = Rc::new(Cell::new(false));
    let flag = reached.clone();
    let _good = signal.observe(move |_, _| flag.set(true), false);
    batch(|| signal.write(1).unwrap());

    diagnostics::reset_hook();

    let seen = seen.lock();
    let kinds: Vec<DiagnosticKind> = seen.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![DiagnosticKind::Parse, DiagnosticKind::Evaluation, DiagnosticKind::Observer]
    );
    assert_eq!(seen[0].source.as_deref(), Some("a +"));
    assert!(seen[2].message.contains("observer exploded"));
    assert!(reached.get());
}
