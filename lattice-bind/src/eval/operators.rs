//! Unary and binary operator semantics.
//!
//! Operands arrive already evaluated and unwrapped. `&&`, `||`, and `??`
//! are not handled here since their right operand is evaluated lazily.

use std::cmp::Ordering;

use crate::error::EvalError;
use crate::expr::{BinaryOp, UnaryOp};
use crate::value::Value;

use super::builtins::has_property;

pub(crate) fn unary(operator: UnaryOp, value: &Value) -> Value {
    match operator {
        UnaryOp::Neg => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::BitNot => Value::Number(f64::from(!value.to_int32())),
        UnaryOp::TypeOf => Value::from(value.type_of()),
        UnaryOp::Void => Value::Undefined,
    }
}

pub(crate) fn binary(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    let left = left.unwrap_signal();
    let right = right.unwrap_signal();
    Ok(match operator {
        Add => add(&left, &right),
        Sub => Value::Number(left.to_number() - right.to_number()),
        Mul => Value::Number(left.to_number() * right.to_number()),
        Div => Value::Number(left.to_number() / right.to_number()),
        Rem => Value::Number(left.to_number() % right.to_number()),
        Exp => Value::Number(power(left.to_number(), right.to_number())),
        Eq => Value::Bool(left.loose_equals(&right)),
        NotEq => Value::Bool(!left.loose_equals(&right)),
        StrictEq => Value::Bool(left.strict_equals(&right)),
        StrictNotEq => Value::Bool(!left.strict_equals(&right)),
        Lt => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
        Gt => Value::Bool(compare(&left, &right) == Some(Ordering::Greater)),
        LtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        GtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        Shl => Value::Number(f64::from(
            left.to_int32().wrapping_shl(right.to_uint32() & 31),
        )),
        Shr => Value::Number(f64::from(left.to_int32() >> (right.to_uint32() & 31))),
        UShr => Value::Number(f64::from(left.to_uint32() >> (right.to_uint32() & 31))),
        BitAnd => Value::Number(f64::from(left.to_int32() & right.to_int32())),
        BitOr => Value::Number(f64::from(left.to_int32() | right.to_int32())),
        BitXor => Value::Number(f64::from(left.to_int32() ^ right.to_int32())),
        In => {
            if !right.is_object_like() {
                return Err(EvalError::type_error(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    left.to_js_string(),
                    right.to_js_string()
                )));
            }
            Value::Bool(has_property(&right, &left.to_js_string()))
        }
        InstanceOf => match &right {
            Value::Function(f) => Value::Bool(f.has_instance(&left)),
            _ => {
                return Err(EvalError::type_error(
                    "Right-hand side of 'instanceof' is not callable",
                ))
            }
        },
        And | Or | Nullish => {
            return Err(EvalError::type_error(format!(
                "operator {operator} must be evaluated lazily"
            )))
        }
    })
}

fn add(left: &Value, right: &Value) -> Value {
    let left = left.to_primitive();
    let right = right.to_primitive();
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        let mut out = left.to_js_string();
        out.push_str(&right.to_js_string());
        return Value::from(out);
    }
    Value::Number(left.to_number() + right.to_number())
}

/// `**`, which differs from `powf` for a unit base with a NaN or infinite
/// exponent.
pub(crate) fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Relational comparison; `None` when either side is NaN.
pub(crate) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let left = left.to_primitive();
    let right = right.to_primitive();
    if let (Value::String(a), Value::String(b)) = (&left, &right) {
        return Some(a.encode_utf16().cmp(b.encode_utf16()));
    }
    left.to_number().partial_cmp(&right.to_number())
}
