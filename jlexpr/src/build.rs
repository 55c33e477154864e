//! Smart constructors.
//!
//! These are the only way to create [`Expression`] nodes. Each one type-checks
//! its operands, inserts the implicit conversions the host language performs
//! (numeric promotion, unboxing, `0`/`1` to `boolean`) and applies a small set
//! of local rewrites:
//!
//! - `x == true` is `x`, `x == false` is `!x` (and the `!=` duals);
//! - `true && x` is `x`, `false || x` is `x` (both sides, both operators);
//! - `t ? true : false` is `t`, `t ? false : true` is `!t`;
//! - `!` is pushed through comparisons, null tests, `&&`, `||` and conditionals;
//! - `x ^ -1` is `~x`;
//! - `Integer.intValue()` style calls become conversions, `Integer.valueOf(int)`
//!   style calls become boxing conversions.
//!
//! Rebuilding an already normalised tree through these constructors yields a
//! structurally equal tree.

use std::sync::Arc;

use jlclass::{JavaType, PrimitiveType, types};
use log::trace;

use crate::convert::TypeConverter;
use crate::error::{BuildError, BuildResult};
use crate::expr::{Arguments, BinaryOp, ExprKind, Expression, ExpressionType, UnaryOp};
use crate::member::{MemberHandle, MemberKind};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// Constant of an explicit type. Boxed constants hold the primitive value
/// (`Value::Int(3)` typed `java/lang/Integer`).
pub fn constant(value: Value, ty: JavaType) -> BuildResult<Expression> {
    if !constant_fits(&value, &ty) {
        return Err(BuildError::ConstantType {
            value: value.to_string(),
            ty,
        });
    }
    Ok(Expression::new(ty, ExprKind::Constant(value)))
}

/// Constant typed with the value's natural type.
pub fn constant_of(value: impl Into<Value>) -> Expression {
    let value = value.into();
    Expression::new(value.natural_type(), ExprKind::Constant(value))
}

/// Typed `null`.
pub fn null(ty: JavaType) -> BuildResult<Expression> {
    constant(Value::Null, ty)
}

fn constant_fits(value: &Value, ty: &JavaType) -> bool {
    match (value, ty) {
        (_, JavaType::Primitive(PrimitiveType::Void)) => false,
        (Value::Null, ty) => ty.is_reference(),
        (value, JavaType::Primitive(p)) => value.primitive_type() == Some(*p),
        (Value::Object(_), _) => true,
        (value, ty) => match (value.primitive_type(), ty.unboxed()) {
            (Some(p), Some(wrapped)) => p == wrapped,
            _ => value
                .runtime_type()
                .is_some_and(|runtime| ty.is_assignable_from(&runtime)),
        },
    }
}

pub fn parameter(ty: JavaType, index: usize) -> BuildResult<Expression> {
    if ty.is_void() {
        return Err(BuildError::PrimitiveNotAllowed {
            op: ExpressionType::Parameter,
            found: ty,
        });
    }
    Ok(Expression::new(ty, ExprKind::Parameter(index)))
}

// ---------------------------------------------------------------------------
// Unary
// ---------------------------------------------------------------------------

/// Dispatches on `op`. `ty` is only used by `Convert`.
pub fn unary(op: UnaryOp, ty: JavaType, operand: Expression) -> BuildResult<Expression> {
    match op {
        UnaryOp::Negate => negate(operand),
        UnaryOp::BitwiseNot => bitwise_not(operand),
        UnaryOp::LogicalNot => logical_not(operand),
        UnaryOp::ArrayLength => array_length(operand),
        UnaryOp::IsNull => is_null(operand),
        UnaryOp::IsNonNull => is_non_null(operand),
        UnaryOp::Convert => convert(operand, ty),
    }
}

fn unary_node(op: UnaryOp, ty: JavaType, operand: Expression) -> Expression {
    Expression::new(ty, ExprKind::Unary { op, operand })
}

pub fn negate(operand: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Unary(UnaryOp::Negate);
    let (operand, promoted) = numeric_operand(kind, operand)?;
    let operand = coerce(operand, promoted)?;
    Ok(unary_node(UnaryOp::Negate, promoted.into(), operand))
}

pub fn bitwise_not(operand: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Unary(UnaryOp::BitwiseNot);
    let (operand, promoted) = numeric_operand(kind, operand)?;
    if !promoted.is_integral() {
        return Err(BuildError::NotIntegral {
            op: kind,
            found: operand.result_type().clone(),
        });
    }
    let operand = coerce(operand, promoted)?;
    Ok(unary_node(UnaryOp::BitwiseNot, promoted.into(), operand))
}

/// Logical negation, pushed inwards wherever an equivalent form exists.
pub fn logical_not(operand: Expression) -> BuildResult<Expression> {
    let operand = boolean_operand(ExpressionType::Unary(UnaryOp::LogicalNot), operand)?;

    if let Some(value) = operand.as_bool_constant() {
        return constant(Value::Boolean(!value), JavaType::BOOLEAN);
    }

    match operand.kind() {
        ExprKind::Unary {
            op: UnaryOp::LogicalNot,
            operand: inner,
        } => Ok(inner.clone()),
        ExprKind::Unary {
            op: UnaryOp::IsNull,
            operand: inner,
        } => is_non_null(inner.clone()),
        ExprKind::Unary {
            op: UnaryOp::IsNonNull,
            operand: inner,
        } => is_null(inner.clone()),
        ExprKind::Binary {
            op,
            first,
            second,
            test,
        } => match (op, test) {
            (BinaryOp::LogicalAnd, _) => {
                logical_or(logical_not(first.clone())?, logical_not(second.clone())?)
            }
            (BinaryOp::LogicalOr, _) => {
                logical_and(logical_not(first.clone())?, logical_not(second.clone())?)
            }
            (BinaryOp::Conditional, Some(test)) => condition(
                test.clone(),
                logical_not(first.clone())?,
                logical_not(second.clone())?,
            ),
            (op, _) => match op.dual() {
                Some(dual) => binary(dual, first.clone(), second.clone()),
                None => Ok(unary_node(UnaryOp::LogicalNot, JavaType::BOOLEAN, operand.clone())),
            },
        },
        _ => Ok(unary_node(UnaryOp::LogicalNot, JavaType::BOOLEAN, operand.clone())),
    }
}

pub fn array_length(operand: Expression) -> BuildResult<Expression> {
    if !operand.result_type().is_array() {
        return Err(BuildError::NotArray {
            op: ExpressionType::Unary(UnaryOp::ArrayLength),
            found: operand.result_type().clone(),
        });
    }
    Ok(unary_node(UnaryOp::ArrayLength, JavaType::INT, operand))
}

pub fn is_null(operand: Expression) -> BuildResult<Expression> {
    null_test(UnaryOp::IsNull, operand)
}

pub fn is_non_null(operand: Expression) -> BuildResult<Expression> {
    null_test(UnaryOp::IsNonNull, operand)
}

fn null_test(op: UnaryOp, operand: Expression) -> BuildResult<Expression> {
    if operand.result_type().is_primitive() {
        return Err(BuildError::PrimitiveNotAllowed {
            op: ExpressionType::Unary(op),
            found: operand.result_type().clone(),
        });
    }
    Ok(unary_node(op, JavaType::BOOLEAN, operand))
}

/// Explicit conversion node. Returns `operand` itself when it already has type `to`.
pub fn convert(operand: Expression, to: JavaType) -> BuildResult<Expression> {
    if operand.result_type() == &to {
        return Ok(operand);
    }
    if !convertible(operand.result_type(), &to) {
        return Err(BuildError::IllegalConversion {
            expression: operand.to_string(),
            from: operand.result_type().clone(),
            to,
        });
    }
    Ok(unary_node(UnaryOp::Convert, to, operand))
}

/// Primitive conversions keep `boolean` apart from the numbers; boxing and
/// unboxing go through the wrapper classes; reference casts are always allowed.
fn convertible(from: &JavaType, to: &JavaType) -> bool {
    use PrimitiveType::{Boolean, Void};
    match (from, to) {
        (JavaType::Primitive(Void), _) | (_, JavaType::Primitive(Void)) => false,
        (JavaType::Primitive(a), JavaType::Primitive(b)) => (*a == Boolean) == (*b == Boolean),
        (JavaType::Primitive(a), to) => to.is_assignable_from(&JavaType::class(a.wrapper())),
        (from, JavaType::Primitive(b)) => {
            from.unboxed().is_some_and(|u| (u == Boolean) == (*b == Boolean))
                || from.is_assignable_from(&JavaType::class(b.wrapper()))
        }
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

/// Dispatches on `op`. Conditionals need a test and go through [`condition`].
pub fn binary(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => arithmetic(op, first, second),
        BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::ExclusiveOr => {
            bitwise(op, first, second)
        }
        BinaryOp::LeftShift | BinaryOp::RightShift | BinaryOp::UnsignedRightShift => {
            shift(op, first, second)
        }
        BinaryOp::Equal | BinaryOp::NotEqual => equality(op, first, second),
        BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual
        | BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual => relational(op, first, second),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => logical(op, first, second),
        BinaryOp::ArrayIndex => array_index(first, second),
        BinaryOp::Coalesce => coalesce(first, second),
        BinaryOp::InstanceOf => match second.as_constant() {
            Some(Value::Class(ty)) => instance_of(first, ty.clone()),
            _ => Err(BuildError::TypeMismatch {
                op: ExpressionType::Binary(op),
                first: first.result_type().clone(),
                second: second.result_type().clone(),
            }),
        },
        BinaryOp::Conditional => Err(BuildError::WrongArity {
            found: ExpressionType::Binary(op),
            expected: "two-operand",
        }),
    }
}

fn binary_node(op: BinaryOp, ty: JavaType, first: Expression, second: Expression) -> Expression {
    Expression::new(
        ty,
        ExprKind::Binary {
            op,
            first,
            second,
            test: None,
        },
    )
}

pub fn add(first: Expression, second: Expression) -> BuildResult<Expression> {
    arithmetic(BinaryOp::Add, first, second)
}

pub fn subtract(first: Expression, second: Expression) -> BuildResult<Expression> {
    arithmetic(BinaryOp::Subtract, first, second)
}

pub fn multiply(first: Expression, second: Expression) -> BuildResult<Expression> {
    arithmetic(BinaryOp::Multiply, first, second)
}

pub fn divide(first: Expression, second: Expression) -> BuildResult<Expression> {
    arithmetic(BinaryOp::Divide, first, second)
}

pub fn modulo(first: Expression, second: Expression) -> BuildResult<Expression> {
    arithmetic(BinaryOp::Modulo, first, second)
}

pub fn bitwise_and(first: Expression, second: Expression) -> BuildResult<Expression> {
    bitwise(BinaryOp::BitwiseAnd, first, second)
}

pub fn bitwise_or(first: Expression, second: Expression) -> BuildResult<Expression> {
    bitwise(BinaryOp::BitwiseOr, first, second)
}

pub fn exclusive_or(first: Expression, second: Expression) -> BuildResult<Expression> {
    bitwise(BinaryOp::ExclusiveOr, first, second)
}

pub fn left_shift(first: Expression, second: Expression) -> BuildResult<Expression> {
    shift(BinaryOp::LeftShift, first, second)
}

pub fn right_shift(first: Expression, second: Expression) -> BuildResult<Expression> {
    shift(BinaryOp::RightShift, first, second)
}

pub fn unsigned_right_shift(first: Expression, second: Expression) -> BuildResult<Expression> {
    shift(BinaryOp::UnsignedRightShift, first, second)
}

pub fn equal(first: Expression, second: Expression) -> BuildResult<Expression> {
    equality(BinaryOp::Equal, first, second)
}

pub fn not_equal(first: Expression, second: Expression) -> BuildResult<Expression> {
    equality(BinaryOp::NotEqual, first, second)
}

pub fn greater_than(first: Expression, second: Expression) -> BuildResult<Expression> {
    relational(BinaryOp::GreaterThan, first, second)
}

pub fn greater_than_or_equal(first: Expression, second: Expression) -> BuildResult<Expression> {
    relational(BinaryOp::GreaterThanOrEqual, first, second)
}

pub fn less_than(first: Expression, second: Expression) -> BuildResult<Expression> {
    relational(BinaryOp::LessThan, first, second)
}

pub fn less_than_or_equal(first: Expression, second: Expression) -> BuildResult<Expression> {
    relational(BinaryOp::LessThanOrEqual, first, second)
}

pub fn logical_and(first: Expression, second: Expression) -> BuildResult<Expression> {
    logical(BinaryOp::LogicalAnd, first, second)
}

pub fn logical_or(first: Expression, second: Expression) -> BuildResult<Expression> {
    logical(BinaryOp::LogicalOr, first, second)
}

fn arithmetic(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);
    let (first, a) = numeric_operand(kind, first)?;
    let (second, b) = numeric_operand(kind, second)?;
    let target = promote(kind, &first, a, &second, b)?;
    let first = coerce(first, target)?;
    let second = coerce(second, target)?;
    Ok(binary_node(op, target.into(), first, second))
}

fn bitwise(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);

    // Non-short-circuit boolean operators compile to the integer instructions.
    if first.result_type().is_boolean() || second.result_type().is_boolean() {
        let first = boolean_operand(kind, first)?;
        let second = boolean_operand(kind, second)?;
        return Ok(binary_node(op, JavaType::BOOLEAN, first, second));
    }

    let (first, a) = numeric_operand(kind, first)?;
    let (second, b) = numeric_operand(kind, second)?;
    let target = promote(kind, &first, a, &second, b)?;
    if !target.is_integral() {
        return Err(BuildError::NotIntegral {
            op: kind,
            found: target.into(),
        });
    }
    let first = coerce(first, target)?;
    let second = coerce(second, target)?;

    if op == BinaryOp::ExclusiveOr {
        if second.as_integral_constant() == Some(-1) {
            return bitwise_not(first);
        }
        if first.as_integral_constant() == Some(-1) {
            return bitwise_not(second);
        }
    }
    Ok(binary_node(op, target.into(), first, second))
}

/// The shift distance is always computed as `int`; the result has the promoted left type.
fn shift(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);
    let (first, a) = numeric_operand(kind, first)?;
    let (second, b) = numeric_operand(kind, second)?;
    for (operand, promoted) in [(&first, a), (&second, b)] {
        if !promoted.is_integral() {
            return Err(BuildError::NotIntegral {
                op: kind,
                found: operand.result_type().clone(),
            });
        }
    }
    let first = coerce(first, a)?;
    let second = coerce(second, PrimitiveType::Int)?;
    Ok(binary_node(op, a.into(), first, second))
}

fn relational(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);
    let (first, a) = numeric_operand(kind, first)?;
    let (second, b) = numeric_operand(kind, second)?;
    let target = promote(kind, &first, a, &second, b)?;
    let first = coerce(first, target)?;
    let second = coerce(second, target)?;
    Ok(binary_node(op, JavaType::BOOLEAN, first, second))
}

fn equality(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);
    if let Some(folded) = fold_boolean_equality(op, &first, &second)? {
        return Ok(folded);
    }

    let (a, b) = (first.result_type(), second.result_type());
    if a.is_reference() && b.is_reference() {
        return Ok(binary_node(op, JavaType::BOOLEAN, first, second));
    }
    if a.is_boolean() && b.is_boolean() {
        let first = boolean_operand(kind, first)?;
        let second = boolean_operand(kind, second)?;
        return Ok(binary_node(op, JavaType::BOOLEAN, first, second));
    }

    let mismatch = || BuildError::TypeMismatch {
        op: kind,
        first: a.clone(),
        second: b.clone(),
    };
    let (first, pa) = numeric_operand(kind, first.clone()).map_err(|_| mismatch())?;
    let (second, pb) = numeric_operand(kind, second.clone()).map_err(|_| mismatch())?;
    let target = promote(kind, &first, pa, &second, pb)?;
    let first = coerce(first, target)?;
    let second = coerce(second, target)?;
    Ok(binary_node(op, JavaType::BOOLEAN, first, second))
}

/// `x == true` and friends. A `0`/`1` integer constant facing a boolean counts as a boolean constant.
fn fold_boolean_equality(
    op: BinaryOp,
    first: &Expression,
    second: &Expression,
) -> BuildResult<Option<Expression>> {
    let literal = |constant: &Expression, other: &Expression| -> Option<bool> {
        if !other.result_type().is_boolean() {
            return None;
        }
        constant.as_bool_constant().or_else(|| {
            if other.result_type() != &JavaType::BOOLEAN {
                return None;
            }
            match constant.as_integral_constant() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            }
        })
    };

    let (value, other) = match (literal(first, second), literal(second, first)) {
        (Some(value), _) => (value, second),
        (None, Some(value)) => (value, first),
        (None, None) => return Ok(None),
    };

    let keep = (op == BinaryOp::Equal) == value;
    let folded = if keep {
        other.clone()
    } else {
        logical_not(other.clone())?
    };
    Ok(Some(folded))
}

fn logical(op: BinaryOp, first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(op);
    let first = boolean_operand(kind, first)?;
    let second = boolean_operand(kind, second)?;
    let is_and = op == BinaryOp::LogicalAnd;

    // The neutral element disappears, the absorbing element wins.
    if let Some(value) = first.as_bool_constant() {
        return Ok(if value == is_and { second } else { first });
    }
    if let Some(value) = second.as_bool_constant() {
        return Ok(if value == is_and { first } else { second });
    }
    Ok(binary_node(op, JavaType::BOOLEAN, first, second))
}

pub fn array_index(array: Expression, index: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(BinaryOp::ArrayIndex);
    let Some(element) = array.result_type().element_type().cloned() else {
        return Err(BuildError::NotArray {
            op: kind,
            found: array.result_type().clone(),
        });
    };
    let (index, promoted) = numeric_operand(kind, index)?;
    if promoted != PrimitiveType::Int {
        return Err(BuildError::TypeMismatch {
            op: kind,
            first: array.result_type().clone(),
            second: index.result_type().clone(),
        });
    }
    let index = coerce(index, PrimitiveType::Int)?;
    Ok(binary_node(BinaryOp::ArrayIndex, element, array, index))
}

/// `first ?? second`, typed as `first`.
pub fn coalesce(first: Expression, second: Expression) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(BinaryOp::Coalesce);
    for operand in [&first, &second] {
        if operand.result_type().is_primitive() {
            return Err(BuildError::PrimitiveNotAllowed {
                op: kind,
                found: operand.result_type().clone(),
            });
        }
    }
    let ty = first.result_type().clone();
    Ok(binary_node(BinaryOp::Coalesce, ty, first, second))
}

/// `operand instanceof ty`; the tested type is carried as a `java/lang/Class` constant.
pub fn instance_of(operand: Expression, ty: JavaType) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(BinaryOp::InstanceOf);
    for found in [operand.result_type(), &ty] {
        if found.is_primitive() {
            return Err(BuildError::PrimitiveNotAllowed {
                op: kind,
                found: found.clone(),
            });
        }
    }
    let class = constant(Value::Class(ty), JavaType::class(types::CLASS))?;
    Ok(binary_node(BinaryOp::InstanceOf, JavaType::BOOLEAN, operand, class))
}

/// `test ? if_true : if_false`. The arms are brought to a common type first.
pub fn condition(
    test: Expression,
    if_true: Expression,
    if_false: Expression,
) -> BuildResult<Expression> {
    let kind = ExpressionType::Binary(BinaryOp::Conditional);
    let test = boolean_operand(kind, test)?;
    let (if_true, if_false) = unify_arms(if_true, if_false)?;

    if let (Some(a), Some(b)) = (if_true.as_bool_constant(), if_false.as_bool_constant()) {
        return match (a, b) {
            _ if a == b => Ok(if_true),
            (true, _) => Ok(test),
            (false, _) => logical_not(test),
        };
    }

    let ty = if_true.result_type().clone();
    Ok(Expression::new(
        ty,
        ExprKind::Binary {
            op: BinaryOp::Conditional,
            first: if_true,
            second: if_false,
            test: Some(test),
        },
    ))
}

fn unify_arms(a: Expression, b: Expression) -> BuildResult<(Expression, Expression)> {
    let (ta, tb) = (a.result_type().clone(), b.result_type().clone());
    if ta == tb {
        return Ok((a, b));
    }

    if is_null_constant(&a) && tb.is_reference() {
        return Ok((null(tb)?, b));
    }
    if is_null_constant(&b) && ta.is_reference() {
        return Ok((a, null(ta)?));
    }
    if ta == JavaType::BOOLEAN {
        if let Some(b) = boolean_literal(&b)? {
            return Ok((a, b));
        }
    }
    if tb == JavaType::BOOLEAN {
        if let Some(a) = boolean_literal(&a)? {
            return Ok((a, b));
        }
    }

    let mismatch = || BuildError::TypeMismatch {
        op: ExpressionType::Binary(BinaryOp::Conditional),
        first: ta.clone(),
        second: tb.clone(),
    };
    match (ta.as_primitive(), tb.as_primitive()) {
        (Some(pa), Some(pb)) => {
            let target = pa.promote(pb).ok_or_else(mismatch)?;
            Ok((coerce(a, target)?, coerce(b, target)?))
        }
        (None, None) => {
            let target = if ta.is_assignable_from(&tb) {
                ta.clone()
            } else if tb.is_assignable_from(&ta) {
                tb.clone()
            } else {
                JavaType::object()
            };
            Ok((convert(a, target.clone())?, convert(b, target)?))
        }
        _ => Err(mismatch()),
    }
}

// ---------------------------------------------------------------------------
// Members and invocation
// ---------------------------------------------------------------------------

pub fn field(instance: Option<Expression>, member: MemberHandle) -> BuildResult<Expression> {
    if !member.kind().is_field_access() {
        return Err(BuildError::InstanceMismatch {
            member: member.to_string(),
            reason: "is not a field",
        });
    }
    member_node(instance, member)
}

/// Unapplied method reference; see [`invocation`].
pub fn method(instance: Option<Expression>, member: MemberHandle) -> BuildResult<Expression> {
    if !member.kind().is_method_access() {
        return Err(BuildError::InstanceMismatch {
            member: member.to_string(),
            reason: "is not a method",
        });
    }
    member_node(instance, member)
}

/// Unapplied constructor reference; see [`invocation`].
pub fn new_instance(member: MemberHandle) -> BuildResult<Expression> {
    if !member.kind().is_new() {
        return Err(BuildError::InstanceMismatch {
            member: member.to_string(),
            reason: "is not a constructor",
        });
    }
    member_node(None, member)
}

fn member_node(instance: Option<Expression>, member: MemberHandle) -> BuildResult<Expression> {
    let takes_instance = !member.is_static() && !member.kind().is_new();
    let instance = match (takes_instance, instance) {
        (false, None) => None,
        (false, Some(_)) => {
            return Err(BuildError::InstanceMismatch {
                member: member.to_string(),
                reason: "takes no instance",
            });
        }
        (true, None) => {
            return Err(BuildError::InstanceMismatch {
                member: member.to_string(),
                reason: "requires an instance",
            });
        }
        (true, Some(instance)) => {
            if instance.result_type().is_primitive() {
                return Err(BuildError::PrimitiveNotAllowed {
                    op: ExpressionType::MethodAccess,
                    found: instance.result_type().clone(),
                });
            }
            let owner = member.owner_type();
            if owner.is_assignable_from(instance.result_type()) {
                Some(instance)
            } else {
                Some(TypeConverter::new(owner).convert(&instance)?)
            }
        }
    };

    let ty = member.result_type().clone();
    Ok(Expression::new(ty, ExprKind::Member { instance, member }))
}

/// Invokes a method or constructor. Unboxing accessors and boxing factories
/// are replaced by conversions.
pub fn invoke(
    instance: Option<Expression>,
    member: MemberHandle,
    arguments: impl IntoIterator<Item = Expression>,
) -> BuildResult<Expression> {
    let mut arguments: Arguments = arguments.into_iter().collect();

    if let Some(receiver) = &instance {
        if arguments.is_empty() && receiver.result_type().is_reference() {
            if let Some(primitive) =
                types::unboxing_method(member.owner(), member.name(), member.descriptor())
            {
                trace!("Unboxing call {member} rewritten as conversion");
                return convert(receiver.clone(), primitive.into());
            }
        }
    }

    if instance.is_none() && member.is_static() && arguments.len() == 1 {
        if let Some(primitive) =
            types::boxing_method(member.owner(), member.name(), member.descriptor())
        {
            trace!("Boxing call {member} rewritten as conversion");
            let argument = coerce(arguments.remove(0), primitive)?;
            return convert(argument, JavaType::class(primitive.wrapper()));
        }
    }

    let target = match member.kind() {
        MemberKind::New if instance.is_none() => new_instance(member)?,
        MemberKind::New => {
            return Err(BuildError::InstanceMismatch {
                member: member.to_string(),
                reason: "takes no instance",
            });
        }
        MemberKind::MethodAccess => method(instance, member)?,
        MemberKind::FieldAccess => {
            return Err(BuildError::NotInvocable {
                found: ExpressionType::FieldAccess,
            });
        }
    };
    invocation(target, arguments)
}

/// Applies a method, constructor or lambda to arguments. Primitive arguments
/// are converted to the exact parameter type, reference arguments only when
/// they are not already assignable.
pub fn invocation(
    target: Expression,
    arguments: impl IntoIterator<Item = Expression>,
) -> BuildResult<Expression> {
    let Some(parameters) = target.invocable_parameters() else {
        return Err(BuildError::NotInvocable {
            found: target.expression_type(),
        });
    };
    let arguments: Arguments = arguments.into_iter().collect();
    if parameters.len() != arguments.len() {
        return Err(BuildError::ArgumentCount {
            target: target.to_string(),
            expected: parameters.len(),
            found: arguments.len(),
        });
    }

    let arguments = parameters
        .iter()
        .zip(arguments)
        .enumerate()
        .map(|(position, (expected, argument))| {
            let found = argument.result_type();
            if found == expected || (found.is_reference() && expected.is_assignable_from(found)) {
                return Ok(argument);
            }
            TypeConverter::new(expected.clone())
                .convert(&argument)
                .map_err(|_| BuildError::ArgumentType {
                    target: target.to_string(),
                    position,
                    expected: expected.clone(),
                    found: argument.result_type().clone(),
                })
        })
        .collect::<BuildResult<Arguments>>()?;

    let ty = target.result_type().clone();
    Ok(Expression::new(ty, ExprKind::Invocation { target, arguments }))
}

/// Lambda over `parameters`; its result type is the body's.
pub fn lambda(
    body: Expression,
    parameters: impl Into<Arc<[JavaType]>>,
) -> BuildResult<Expression> {
    let parameters = parameters.into();
    if let Some(index) = body.max_parameter_index() {
        if index >= parameters.len() {
            return Err(BuildError::ParameterOutOfRange {
                index,
                count: parameters.len(),
            });
        }
    }
    let ty = body.result_type().clone();
    Ok(Expression::new(ty, ExprKind::Lambda { body, parameters }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Unary-promoted primitive an operand computes as, unboxing wrappers.
fn numeric_operand(
    op: ExpressionType,
    operand: Expression,
) -> BuildResult<(Expression, PrimitiveType)> {
    let primitive = match operand.result_type() {
        JavaType::Primitive(p) => Some(*p),
        other => other.unboxed(),
    };
    match primitive.and_then(PrimitiveType::unary_promotion) {
        Some(promoted) => Ok((operand, promoted)),
        None => Err(BuildError::NotNumeric {
            op,
            found: operand.result_type().clone(),
        }),
    }
}

fn promote(
    op: ExpressionType,
    first: &Expression,
    a: PrimitiveType,
    second: &Expression,
    b: PrimitiveType,
) -> BuildResult<PrimitiveType> {
    a.promote(b).ok_or_else(|| BuildError::TypeMismatch {
        op,
        first: first.result_type().clone(),
        second: second.result_type().clone(),
    })
}

fn coerce(operand: Expression, to: PrimitiveType) -> BuildResult<Expression> {
    TypeConverter::new(to.into()).convert(&operand)
}

/// Brings a boolean-like operand to `boolean`: unboxes `Boolean`, turns `0`/`1` constants into literals.
fn boolean_operand(op: ExpressionType, operand: Expression) -> BuildResult<Expression> {
    let ty = operand.result_type();
    if ty == &JavaType::BOOLEAN {
        return Ok(operand);
    }
    if ty.is_boolean() {
        return coerce(operand, PrimitiveType::Boolean);
    }
    match boolean_literal(&operand)? {
        Some(literal) => Ok(literal),
        None => Err(BuildError::NotBoolean {
            op,
            found: operand.result_type().clone(),
        }),
    }
}

fn boolean_literal(operand: &Expression) -> BuildResult<Option<Expression>> {
    if !operand.result_type().is_integral() && operand.result_type() != &JavaType::CHAR {
        return Ok(None);
    }
    match operand.as_integral_constant() {
        Some(value @ (0 | 1)) => constant(Value::Boolean(value == 1), JavaType::BOOLEAN).map(Some),
        _ => Ok(None),
    }
}

fn is_null_constant(operand: &Expression) -> bool {
    matches!(operand.as_constant(), Some(Value::Null))
}
