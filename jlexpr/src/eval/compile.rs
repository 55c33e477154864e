use std::sync::Arc;

use jlclass::JavaType;

use super::{Compiled, Frame, Host, ops};
use crate::error::EvalError;
use crate::expr::{BinaryOp, Expression, UnaryOp};
use crate::member::{MemberHandle, MemberKind};
use crate::value::{HostObject, Value};
use crate::visit::Visitor;

/// Translates a tree into nested closures.
pub(super) struct Compiler;

impl Compiler {
    fn compile_all(&mut self, expressions: &[Expression]) -> Arc<[Compiled]> {
        expressions.iter().map(|e| e.accept(self)).collect()
    }
}

fn evaluate_all(compiled: &[Compiled], frame: &Frame<'_>) -> Result<Vec<Value>, EvalError> {
    compiled.iter().map(|c| c(frame)).collect()
}

fn receiver(
    compiled: &Option<Compiled>,
    member: &MemberHandle,
    frame: &Frame<'_>,
) -> Result<Option<Value>, EvalError> {
    let Some(compiled) = compiled else {
        return Ok(None);
    };
    match compiled(frame)? {
        Value::Null => Err(EvalError::NullPointer {
            context: format!("cannot access `{member}` because the instance is null"),
        }),
        value => Ok(Some(value)),
    }
}

impl Visitor for Compiler {
    type Output = Compiled;

    fn visit_constant(&mut self, _: &Expression, value: &Value) -> Compiled {
        let value = value.clone();
        Arc::new(move |_: &Frame<'_>| Ok(value.clone()))
    }

    fn visit_parameter(&mut self, _: &Expression, index: usize) -> Compiled {
        Arc::new(move |frame: &Frame<'_>| {
            frame
                .args
                .get(index)
                .cloned()
                .ok_or(EvalError::ArgumentCount {
                    expected: index + 1,
                    found: frame.args.len(),
                })
        })
    }

    fn visit_unary(&mut self, expression: &Expression, op: UnaryOp, operand: &Expression) -> Compiled {
        let inner = operand.accept(self);
        match op {
            UnaryOp::Negate => Arc::new(move |frame: &Frame<'_>| ops::negate(&inner(frame)?)),
            UnaryOp::BitwiseNot => Arc::new(move |frame: &Frame<'_>| ops::bitwise_not(&inner(frame)?)),
            UnaryOp::LogicalNot => {
                Arc::new(move |frame: &Frame<'_>| Ok(Value::Boolean(!ops::as_bool(&inner(frame)?)?)))
            }
            UnaryOp::ArrayLength => Arc::new(move |frame: &Frame<'_>| match inner(frame)? {
                Value::Array(array) => Ok(Value::Int(array.items.len() as i32)),
                Value::Null => Err(EvalError::NullPointer {
                    context: "cannot read the array length because the array is null".to_string(),
                }),
                other => Err(EvalError::TypeMismatch {
                    value: other.to_string(),
                    expected: "array".to_string(),
                }),
            }),
            UnaryOp::IsNull => Arc::new(move |frame: &Frame<'_>| Ok(Value::Boolean(inner(frame)?.is_null()))),
            UnaryOp::IsNonNull => {
                Arc::new(move |frame: &Frame<'_>| Ok(Value::Boolean(!inner(frame)?.is_null())))
            }
            UnaryOp::Convert => {
                let from = operand.result_type().clone();
                let to = expression.result_type().clone();
                Arc::new(move |frame: &Frame<'_>| ops::convert(inner(frame)?, &from, &to, frame.host.as_ref()))
            }
        }
    }

    fn visit_binary(
        &mut self,
        _: &Expression,
        op: BinaryOp,
        first: &Expression,
        second: &Expression,
        test: Option<&Expression>,
    ) -> Compiled {
        let test = test.map(|test| test.accept(self));
        let a = first.accept(self);
        let b = second.accept(self);

        match op {
            op if op.is_arithmetic() => Arc::new(move |frame: &Frame<'_>| ops::arithmetic(op, &a(frame)?, &b(frame)?)),
            op if op.is_bitwise() => Arc::new(move |frame: &Frame<'_>| ops::bitwise(op, &a(frame)?, &b(frame)?)),
            op if op.is_shift() => Arc::new(move |frame: &Frame<'_>| ops::shift(op, &a(frame)?, &b(frame)?)),
            BinaryOp::Equal => {
                Arc::new(move |frame: &Frame<'_>| Ok(Value::Boolean(ops::equals(&a(frame)?, &b(frame)?)?)))
            }
            BinaryOp::NotEqual => {
                Arc::new(move |frame: &Frame<'_>| Ok(Value::Boolean(!ops::equals(&a(frame)?, &b(frame)?)?)))
            }
            op if op.is_comparison() => Arc::new(move |frame: &Frame<'_>| {
                Ok(Value::Boolean(ops::compare(op, &a(frame)?, &b(frame)?)?))
            }),
            BinaryOp::LogicalAnd => Arc::new(move |frame: &Frame<'_>| {
                Ok(Value::Boolean(
                    ops::as_bool(&a(frame)?)? && ops::as_bool(&b(frame)?)?,
                ))
            }),
            BinaryOp::LogicalOr => Arc::new(move |frame: &Frame<'_>| {
                Ok(Value::Boolean(
                    ops::as_bool(&a(frame)?)? || ops::as_bool(&b(frame)?)?,
                ))
            }),
            BinaryOp::ArrayIndex => Arc::new(move |frame: &Frame<'_>| {
                let array = a(frame)?;
                let index = b(frame)?.as_i64().unwrap_or_default();
                match array {
                    Value::Array(array) => usize::try_from(index)
                        .ok()
                        .and_then(|i| array.items.get(i).cloned())
                        .ok_or(EvalError::ArrayIndexOutOfBounds {
                            index,
                            length: array.items.len(),
                        }),
                    Value::Null => Err(EvalError::NullPointer {
                        context: "cannot load from a null array".to_string(),
                    }),
                    other => Err(EvalError::TypeMismatch {
                        value: other.to_string(),
                        expected: "array".to_string(),
                    }),
                }
            }),
            BinaryOp::Coalesce => Arc::new(move |frame: &Frame<'_>| match a(frame)? {
                Value::Null => b(frame),
                value => Ok(value),
            }),
            BinaryOp::InstanceOf => {
                let ty = match second.as_constant() {
                    Some(Value::Class(ty)) => ty.clone(),
                    _ => JavaType::object(),
                };
                Arc::new(move |frame: &Frame<'_>| {
                    let value = a(frame)?;
                    Ok(Value::Boolean(frame.host.is_instance(&value, &ty)))
                })
            }
            _ => match test {
                Some(test) => Arc::new(move |frame: &Frame<'_>| {
                    if ops::as_bool(&test(frame)?)? {
                        a(frame)
                    } else {
                        b(frame)
                    }
                }),
                None => Arc::new(|_: &Frame<'_>| -> Result<Value, EvalError> {
                    Err(EvalError::Host("conditional without a test".to_string()))
                }),
            },
        }
    }

    fn visit_member(
        &mut self,
        _: &Expression,
        member: &MemberHandle,
        instance: Option<&Expression>,
    ) -> Compiled {
        let instance = instance.map(|i| i.accept(self));
        let member = member.clone();
        match member.kind() {
            MemberKind::FieldAccess => Arc::new(move |frame: &Frame<'_>| {
                let instance = receiver(&instance, &member, frame)?;
                frame.host.get_field(&member, instance.as_ref())
            }),
            MemberKind::MethodAccess | MemberKind::New => Arc::new(move |_: &Frame<'_>| -> Result<Value, EvalError> {
                Err(EvalError::Host(format!("`{member}` is evaluated without being invoked")))
            }),
        }
    }

    fn visit_invocation(
        &mut self,
        _: &Expression,
        target: &Expression,
        arguments: &[Expression],
    ) -> Compiled {
        let arguments = self.compile_all(arguments);

        if let Some((body, _)) = target.as_lambda() {
            let body = body.accept(self);
            return Arc::new(move |frame: &Frame<'_>| {
                let args = evaluate_all(&arguments, frame)?;
                body(&Frame {
                    args: &args,
                    host: frame.host,
                })
            });
        }

        let Some((member, instance)) = target.as_member() else {
            let target = target.accept(self);
            return Arc::new(move |frame: &Frame<'_>| match target(frame)? {
                Value::Object(object) => match object.downcast_arc::<LambdaObject>() {
                    Ok(lambda) => lambda.apply(&evaluate_all(&arguments, frame)?),
                    Err(object) => Err(EvalError::TypeMismatch {
                        value: object.to_java_string(),
                        expected: "lambda".to_string(),
                    }),
                },
                other => Err(EvalError::TypeMismatch {
                    value: other.to_string(),
                    expected: "lambda".to_string(),
                }),
            });
        };

        let instance = instance.map(|i| i.accept(self));
        let member = member.clone();
        match member.kind() {
            MemberKind::New => Arc::new(move |frame: &Frame<'_>| {
                let args = evaluate_all(&arguments, frame)?;
                frame.host.construct(&member, &args)
            }),
            _ => Arc::new(move |frame: &Frame<'_>| {
                let instance = receiver(&instance, &member, frame)?;
                let args = evaluate_all(&arguments, frame)?;
                frame.host.invoke(&member, instance.as_ref(), &args)
            }),
        }
    }

    fn visit_lambda(&mut self, _: &Expression, body: &Expression, parameters: &[JavaType]) -> Compiled {
        let body = body.accept(self);
        let parameters: Arc<[JavaType]> = parameters.into();
        Arc::new(move |frame: &Frame<'_>| {
            Ok(Value::object(LambdaObject {
                body: body.clone(),
                parameters: parameters.clone(),
                host: frame.host.clone(),
            }))
        })
    }
}

/// A lambda evaluated as a value rather than applied on the spot.
struct LambdaObject {
    body: Compiled,
    parameters: Arc<[JavaType]>,
    host: Arc<dyn Host>,
}

impl LambdaObject {
    fn apply(&self, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != self.parameters.len() {
            return Err(EvalError::ArgumentCount {
                expected: self.parameters.len(),
                found: args.len(),
            });
        }
        (self.body)(&Frame {
            args,
            host: &self.host,
        })
    }
}

impl std::fmt::Debug for LambdaObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaObject")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl HostObject for LambdaObject {
    fn class_name(&self) -> &str {
        "java/lang/Object"
    }

    fn invoke(&self, _method: &MemberHandle, args: &[Value]) -> Option<Result<Value, EvalError>> {
        Some(self.apply(args))
    }
}
