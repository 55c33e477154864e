//! Traversals over expression trees.
//!
//! [`Visitor`] is the read-only double dispatch used by the evaluator.
//! [`Rewriter`] rebuilds trees through the smart constructors; its default
//! methods are identity transforms that keep untouched sub-trees shared.

use jlclass::JavaType;

use crate::build;
use crate::error::BuildResult;
use crate::expr::{Arguments, BinaryOp, ExprKind, Expression, UnaryOp};
use crate::member::{MemberHandle, MemberKind};
use crate::value::Value;

pub trait Visitor {
    type Output;

    fn visit_constant(&mut self, expression: &Expression, value: &Value) -> Self::Output;

    fn visit_parameter(&mut self, expression: &Expression, index: usize) -> Self::Output;

    fn visit_unary(
        &mut self,
        expression: &Expression,
        op: UnaryOp,
        operand: &Expression,
    ) -> Self::Output;

    fn visit_binary(
        &mut self,
        expression: &Expression,
        op: BinaryOp,
        first: &Expression,
        second: &Expression,
        test: Option<&Expression>,
    ) -> Self::Output;

    fn visit_member(
        &mut self,
        expression: &Expression,
        member: &MemberHandle,
        instance: Option<&Expression>,
    ) -> Self::Output;

    fn visit_invocation(
        &mut self,
        expression: &Expression,
        target: &Expression,
        arguments: &[Expression],
    ) -> Self::Output;

    fn visit_lambda(
        &mut self,
        expression: &Expression,
        body: &Expression,
        parameters: &[JavaType],
    ) -> Self::Output;
}

impl Expression {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self.kind() {
            ExprKind::Constant(value) => visitor.visit_constant(self, value),
            ExprKind::Parameter(index) => visitor.visit_parameter(self, *index),
            ExprKind::Unary { op, operand } => visitor.visit_unary(self, *op, operand),
            ExprKind::Binary {
                op,
                first,
                second,
                test,
            } => visitor.visit_binary(self, *op, first, second, test.as_ref()),
            ExprKind::Member { instance, member } => {
                visitor.visit_member(self, member, instance.as_ref())
            }
            ExprKind::Invocation { target, arguments } => {
                visitor.visit_invocation(self, target, arguments)
            }
            ExprKind::Lambda { body, parameters } => visitor.visit_lambda(self, body, parameters),
        }
    }
}

/// Bottom-up tree transformation.
///
/// Override [`Rewriter::rewrite`] to intercept nodes and call [`walk`] to
/// recurse into the ones you leave alone.
pub trait Rewriter {
    fn rewrite(&mut self, expression: &Expression) -> BuildResult<Expression> {
        walk(self, expression)
    }
}

/// Rewrites the children of `expression` and rebuilds it when any of them changed.
pub fn walk<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    expression: &Expression,
) -> BuildResult<Expression> {
    let mut changed = false;
    let mut children = Vec::new();
    for child in expression.children() {
        let rewritten = rewriter.rewrite(child)?;
        changed |= !rewritten.ptr_eq(child);
        children.push(rewritten);
    }
    if !changed {
        return Ok(expression.clone());
    }
    rebuild(expression, children)
}

/// Rebuilds `expression` with new children, given in [`Expression::children`] order.
pub fn rebuild(expression: &Expression, children: Vec<Expression>) -> BuildResult<Expression> {
    let mut children = children.into_iter();
    let mut next = || {
        children
            .next()
            .ok_or_else(|| crate::error::BuildError::WrongArity {
                found: expression.expression_type(),
                expected: "rebuilt",
            })
    };

    match expression.kind() {
        ExprKind::Constant(_) | ExprKind::Parameter(_) => Ok(expression.clone()),
        ExprKind::Unary { op, .. } => build::unary(*op, expression.result_type().clone(), next()?),
        ExprKind::Binary {
            op: BinaryOp::Conditional,
            ..
        } => {
            let test = next()?;
            let first = next()?;
            let second = next()?;
            build::condition(test, first, second)
        }
        ExprKind::Binary { op, .. } => {
            let first = next()?;
            let second = next()?;
            build::binary(*op, first, second)
        }
        ExprKind::Member { instance, member } => {
            let instance = match instance {
                Some(_) => Some(next()?),
                None => None,
            };
            match member.kind() {
                MemberKind::FieldAccess => build::field(instance, member.clone()),
                MemberKind::MethodAccess => build::method(instance, member.clone()),
                MemberKind::New => build::new_instance(member.clone()),
            }
        }
        ExprKind::Invocation { arguments, .. } => {
            let target = next()?;
            let arguments = (0..arguments.len())
                .map(|_| next())
                .collect::<BuildResult<Arguments>>()?;
            build::invocation(target, arguments)
        }
        ExprKind::Lambda { parameters, .. } => build::lambda(next()?, parameters.clone()),
    }
}

/// Identity rewriter; rebuilding through it normalises a tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rebuild;

impl Rewriter for Rebuild {
    fn rewrite(&mut self, expression: &Expression) -> BuildResult<Expression> {
        let children = expression
            .children()
            .map(|child| self.rewrite(child))
            .collect::<BuildResult<Vec<_>>>()?;
        rebuild(expression, children)
    }
}
