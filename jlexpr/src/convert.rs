use jlclass::{JavaType, PrimitiveType};

use crate::build;
use crate::error::{BuildError, BuildResult};
use crate::expr::{BinaryOp, ExprKind, Expression};
use crate::value::Value;

/// Converts expressions to a fixed target type, folding what can be folded.
///
/// Constants are converted at build time (`1` becomes `true` for a boolean
/// target, `3` becomes `3L` for a long one), conditionals push the conversion
/// into both arms, reference parameters are narrowed in place and everything
/// else is wrapped in a `Convert` node. Converting an expression that already
/// has the target type returns the very same node.
#[derive(Debug, Clone)]
pub struct TypeConverter {
    target: JavaType,
}

impl TypeConverter {
    pub fn new(target: JavaType) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &JavaType {
        &self.target
    }

    pub fn convert(&self, expression: &Expression) -> BuildResult<Expression> {
        let from = expression.result_type();
        if from == &self.target {
            return Ok(expression.clone());
        }

        match expression.kind() {
            ExprKind::Constant(value) => self.convert_constant(expression, value),
            ExprKind::Binary {
                op: BinaryOp::Conditional,
                first,
                second,
                test: Some(test),
            } => build::condition(test.clone(), self.convert(first)?, self.convert(second)?),
            // `&`, `|` and `^` over booleans compile to the integer instructions.
            ExprKind::Binary {
                op: op @ (BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::ExclusiveOr),
                first,
                second,
                test: None,
            } if self.target == JavaType::BOOLEAN => {
                build::binary(*op, self.convert(first)?, self.convert(second)?)
            }
            ExprKind::Parameter(index) if from.is_reference() && self.target.is_reference() => {
                if self.target.is_assignable_from(from) {
                    Ok(expression.clone())
                } else if from.is_assignable_from(&self.target) {
                    build::parameter(self.target.clone(), *index)
                } else {
                    build::convert(expression.clone(), self.target.clone())
                }
            }
            _ if from.is_reference()
                && self.target.is_reference()
                && self.target.is_assignable_from(from) =>
            {
                Ok(expression.clone())
            }
            _ => build::convert(expression.clone(), self.target.clone()),
        }
    }

    fn convert_constant(&self, expression: &Expression, value: &Value) -> BuildResult<Expression> {
        let illegal = || BuildError::IllegalConversion {
            expression: expression.to_string(),
            from: expression.result_type().clone(),
            to: self.target.clone(),
        };

        match &self.target {
            JavaType::Primitive(PrimitiveType::Boolean) => match value.as_i64() {
                Some(0) => build::constant(Value::Boolean(false), JavaType::BOOLEAN),
                Some(1) => build::constant(Value::Boolean(true), JavaType::BOOLEAN),
                Some(_) => Err(illegal()),
                None => match value {
                    Value::Boolean(_) => build::constant(value.clone(), JavaType::BOOLEAN),
                    _ => Err(illegal()),
                },
            },
            JavaType::Primitive(p) => match value.cast(*p) {
                Some(cast) => build::constant(cast, self.target.clone()),
                None => Err(illegal()),
            },
            target if value.is_null() => build::null(target.clone()),
            target => match (value.primitive_type(), target.unboxed()) {
                (Some(_), Some(wrapped)) => match value.cast(wrapped) {
                    Some(cast) => build::constant(cast, target.clone()),
                    None => Err(illegal()),
                },
                (Some(p), None) if target.is_assignable_from(&JavaType::class(p.wrapper())) => {
                    build::constant(value.clone(), target.clone())
                }
                (None, _) if target.is_assignable_from(expression.result_type()) => {
                    Ok(expression.clone())
                }
                _ => build::convert(expression.clone(), target.clone()),
            },
        }
    }
}

/// Shorthand for `TypeConverter::new(to).convert(expression)`.
pub fn convert_to(expression: &Expression, to: &JavaType) -> BuildResult<Expression> {
    TypeConverter::new(to.clone()).convert(expression)
}
