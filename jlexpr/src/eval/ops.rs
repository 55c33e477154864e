//! Value-level semantics of the operators.

use jlclass::{JavaType, PrimitiveType};

use super::Host;
use crate::error::EvalError;
use crate::expr::BinaryOp;
use crate::value::Value;

enum Pair {
    Int(i32, i32),
    Long(i64, i64),
    Float(f32, f32),
    Double(f64, f64),
}

fn mismatch(value: &Value, expected: &str) -> EvalError {
    EvalError::TypeMismatch {
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

fn numeric_type(value: &Value) -> Result<PrimitiveType, EvalError> {
    if value.is_null() {
        return Err(EvalError::NullPointer {
            context: "unboxing a null value".to_string(),
        });
    }
    value
        .primitive_type()
        .and_then(PrimitiveType::unary_promotion)
        .ok_or_else(|| mismatch(value, "numeric"))
}

/// Binary numeric promotion of two runtime values.
fn numeric_pair(a: &Value, b: &Value) -> Result<Pair, EvalError> {
    let target = numeric_type(a)?
        .promote(numeric_type(b)?)
        .ok_or_else(|| mismatch(b, "numeric"))?;
    let a = a.cast(target).ok_or_else(|| mismatch(a, target.name()))?;
    let b = b.cast(target).ok_or_else(|| mismatch(b, target.name()))?;
    Ok(match (a, b) {
        (Value::Int(x), Value::Int(y)) => Pair::Int(x, y),
        (Value::Long(x), Value::Long(y)) => Pair::Long(x, y),
        (Value::Float(x), Value::Float(y)) => Pair::Float(x, y),
        (Value::Double(x), Value::Double(y)) => Pair::Double(x, y),
        (a, _) => return Err(mismatch(&a, "numeric")),
    })
}

const DIVIDE_BY_ZERO: &str = "/ by zero";

pub(super) fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    Ok(match numeric_pair(a, b)? {
        Pair::Int(x, y) => Value::Int(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Subtract => x.wrapping_sub(y),
            BinaryOp::Multiply => x.wrapping_mul(y),
            BinaryOp::Divide | BinaryOp::Modulo if y == 0 => {
                return Err(EvalError::Arithmetic(DIVIDE_BY_ZERO));
            }
            BinaryOp::Divide => x.wrapping_div(y),
            _ => x.wrapping_rem(y),
        }),
        Pair::Long(x, y) => Value::Long(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Subtract => x.wrapping_sub(y),
            BinaryOp::Multiply => x.wrapping_mul(y),
            BinaryOp::Divide | BinaryOp::Modulo if y == 0 => {
                return Err(EvalError::Arithmetic(DIVIDE_BY_ZERO));
            }
            BinaryOp::Divide => x.wrapping_div(y),
            _ => x.wrapping_rem(y),
        }),
        Pair::Float(x, y) => Value::Float(match op {
            BinaryOp::Add => x + y,
            BinaryOp::Subtract => x - y,
            BinaryOp::Multiply => x * y,
            BinaryOp::Divide => x / y,
            _ => x % y,
        }),
        Pair::Double(x, y) => Value::Double(match op {
            BinaryOp::Add => x + y,
            BinaryOp::Subtract => x - y,
            BinaryOp::Multiply => x * y,
            BinaryOp::Divide => x / y,
            _ => x % y,
        }),
    })
}

pub(super) fn bitwise(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    if let (Value::Boolean(x), Value::Boolean(y)) = (a, b) {
        return Ok(Value::Boolean(match op {
            BinaryOp::BitwiseAnd => x & y,
            BinaryOp::BitwiseOr => x | y,
            _ => x ^ y,
        }));
    }
    Ok(match numeric_pair(a, b)? {
        Pair::Int(x, y) => Value::Int(match op {
            BinaryOp::BitwiseAnd => x & y,
            BinaryOp::BitwiseOr => x | y,
            _ => x ^ y,
        }),
        Pair::Long(x, y) => Value::Long(match op {
            BinaryOp::BitwiseAnd => x & y,
            BinaryOp::BitwiseOr => x | y,
            _ => x ^ y,
        }),
        Pair::Float(..) | Pair::Double(..) => return Err(mismatch(a, "integral")),
    })
}

/// Shift distances are masked to the width of the left operand.
pub(super) fn shift(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let distance = b.as_i64().ok_or_else(|| mismatch(b, "int"))?;
    let left = numeric_type(a)?;
    let value = a.cast(left).ok_or_else(|| mismatch(a, left.name()))?;
    Ok(match value {
        Value::Int(x) => {
            let s = (distance & 0x1f) as u32;
            Value::Int(match op {
                BinaryOp::LeftShift => x.wrapping_shl(s),
                BinaryOp::RightShift => x >> s,
                _ => ((x as u32) >> s) as i32,
            })
        }
        Value::Long(x) => {
            let s = (distance & 0x3f) as u32;
            Value::Long(match op {
                BinaryOp::LeftShift => x.wrapping_shl(s),
                BinaryOp::RightShift => x >> s,
                _ => ((x as u64) >> s) as i64,
            })
        }
        other => return Err(mismatch(&other, "integral")),
    })
}

/// Ordering comparisons. Any comparison involving NaN is false.
pub(super) fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    fn test<T: PartialOrd>(op: BinaryOp, x: T, y: T) -> bool {
        match op {
            BinaryOp::GreaterThan => x > y,
            BinaryOp::GreaterThanOrEqual => x >= y,
            BinaryOp::LessThan => x < y,
            _ => x <= y,
        }
    }
    Ok(match numeric_pair(a, b)? {
        Pair::Int(x, y) => test(op, x, y),
        Pair::Long(x, y) => test(op, x, y),
        Pair::Float(x, y) => test(op, x, y),
        Pair::Double(x, y) => test(op, x, y),
    })
}

/// `==`: numeric values compare numerically (so `NaN != NaN`), strings by
/// content, host objects by identity.
pub(super) fn equals(a: &Value, b: &Value) -> Result<bool, EvalError> {
    let numeric = |v: &Value| v.primitive_type().is_some_and(|p| p != PrimitiveType::Boolean);
    if numeric(a) && numeric(b) {
        return Ok(match numeric_pair(a, b)? {
            Pair::Int(x, y) => x == y,
            Pair::Long(x, y) => x == y,
            Pair::Float(x, y) => x == y,
            Pair::Double(x, y) => x == y,
        });
    }
    Ok(a == b)
}

pub(super) fn negate(value: &Value) -> Result<Value, EvalError> {
    let promoted = numeric_type(value)?;
    Ok(match value.cast(promoted) {
        Some(Value::Int(x)) => Value::Int(x.wrapping_neg()),
        Some(Value::Long(x)) => Value::Long(x.wrapping_neg()),
        Some(Value::Float(x)) => Value::Float(-x),
        Some(Value::Double(x)) => Value::Double(-x),
        _ => return Err(mismatch(value, "numeric")),
    })
}

pub(super) fn bitwise_not(value: &Value) -> Result<Value, EvalError> {
    let promoted = numeric_type(value)?;
    Ok(match value.cast(promoted) {
        Some(Value::Int(x)) => Value::Int(!x),
        Some(Value::Long(x)) => Value::Long(!x),
        _ => return Err(mismatch(value, "integral")),
    })
}

pub(super) fn as_bool(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Null => Err(EvalError::NullPointer {
            context: "unboxing a null Boolean".to_string(),
        }),
        other => Err(mismatch(other, "boolean")),
    }
}

/// Runtime behaviour of a `Convert` node from static type `from` to `to`.
pub(super) fn convert(
    value: Value,
    from: &JavaType,
    to: &JavaType,
    host: &dyn Host,
) -> Result<Value, EvalError> {
    let cast_to = |value: &Value, p: PrimitiveType| {
        value.cast(p).ok_or_else(|| EvalError::ClassCast {
            from: value.to_string(),
            to: to.clone(),
        })
    };

    match (from.is_primitive(), to) {
        // Primitive conversion.
        (true, JavaType::Primitive(p)) => cast_to(&value, *p),
        // Boxing: into the wrapper of the target, or the value's own wrapper.
        (true, target) => match target.unboxed() {
            Some(p) => cast_to(&value, p),
            None => Ok(value),
        },
        // Unboxing (possibly followed by widening).
        (false, JavaType::Primitive(p)) => match value {
            Value::Null => Err(EvalError::NullPointer {
                context: format!("unboxing null to {to}"),
            }),
            ref boxed if boxed.primitive_type().is_some() => cast_to(boxed, *p),
            other => Err(EvalError::ClassCast {
                from: other.to_string(),
                to: to.clone(),
            }),
        },
        // Checked reference cast. Host objects are trusted.
        (false, target) => match &value {
            Value::Null | Value::Object(_) => Ok(value.clone()),
            other if host.is_instance(other, target) => Ok(value.clone()),
            other => Err(EvalError::ClassCast {
                from: other
                    .runtime_type()
                    .map(|ty| ty.to_string())
                    .unwrap_or_else(|| other.to_string()),
                to: to.clone(),
            }),
        },
    }
}

/// Brings a caller-supplied argument to the declared parameter type.
pub(super) fn coerce_argument(value: &Value, ty: &JavaType) -> Result<Value, EvalError> {
    let JavaType::Primitive(p) = ty else {
        return Ok(value.clone());
    };
    match value.primitive_type() {
        Some(q) if q == *p => Ok(value.clone()),
        Some(q) if q.widens_to(*p) => value.cast(*p).ok_or_else(|| mismatch(value, p.name())),
        _ => Err(mismatch(value, p.name())),
    }
}
