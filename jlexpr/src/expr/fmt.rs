use std::fmt;

use super::{BinaryOp, ExprKind, Expression, UnaryOp};
use crate::member::MemberKind;
use crate::value::Value;

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(Value::Null) => write!(f, "[{}]", self.result_type()),
            ExprKind::Constant(Value::Class(ty)) => write!(f, "{ty}"),
            ExprKind::Constant(value) => write!(f, "{value}"),
            ExprKind::Parameter(index) => write!(f, "P{index}"),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Convert => write!(f, "({}){operand}", self.result_type()),
                UnaryOp::IsNull | UnaryOp::IsNonNull => {
                    write!(f, "({operand} {})", op.symbol())
                }
                UnaryOp::Negate | UnaryOp::BitwiseNot | UnaryOp::LogicalNot | UnaryOp::ArrayLength => {
                    write!(f, "{}{operand}", op.symbol())
                }
            },
            ExprKind::Binary {
                op,
                first,
                second,
                test,
            } => match (op, test) {
                (BinaryOp::Conditional, Some(test)) => write!(f, "({test} ? {first} : {second})"),
                (BinaryOp::ArrayIndex, _) => write!(f, "{first}[{second}]"),
                _ => write!(f, "({first} {} {second})", op.symbol()),
            },
            ExprKind::Member { instance, member } => match (member.kind(), instance) {
                (MemberKind::New, _) => write!(f, "new {}", member.owner_type()),
                (_, Some(instance)) => write!(f, "{instance}.{}", member.name()),
                (_, None) => write!(f, "{}.{}", member.owner_type(), member.name()),
            },
            ExprKind::Invocation { target, arguments } => {
                write!(f, "{target}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
            ExprKind::Lambda { body, parameters } => {
                f.write_str("{(")?;
                for (i, ty) in parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty} P{i}")?;
                }
                write!(f, ") -> {body}}}")
            }
        }
    }
}
