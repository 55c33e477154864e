//! Expression nodes.
//!
//! An [`Expression`] is an immutable, reference-counted node carrying a result
//! type and a kind-specific payload ([`ExprKind`]). Cloning is a pointer copy,
//! which is what makes sharing sub-trees between several parents cheap after the
//! branch reducer duplicates arms.
//!
//! Equality and hashing are structural (with a pointer-equality fast path), so
//! two independently built trees for the same lambda body compare equal.
//!
//! Nodes are never built directly from outside this crate: every public way of
//! producing an expression goes through the smart constructors in
//! [`crate::build`], which enforce the type invariants and normalise as they go.

mod fmt;

use std::sync::{Arc, Weak};

use auto_enums::auto_enum;
use either::Either;
use jlclass::JavaType;
use smallvec::SmallVec;
use strum::{EnumIs, EnumIter};

use crate::member::{MemberHandle, MemberKind};
use crate::value::Value;

/// Argument list of an invocation.
pub type Arguments = SmallVec<Expression, 4>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumIs)]
pub enum UnaryOp {
    Negate,
    BitwiseNot,
    LogicalNot,
    ArrayLength,
    IsNull,
    IsNonNull,
    /// Conversion to the node's result type.
    Convert,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::BitwiseNot => "~",
            UnaryOp::LogicalNot => "!",
            UnaryOp::ArrayLength => "#",
            UnaryOp::IsNull => "is null",
            UnaryOp::IsNonNull => "is not null",
            UnaryOp::Convert => "convert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumIs)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    LogicalAnd,
    LogicalOr,
    ArrayIndex,
    Coalesce,
    InstanceOf,
    /// `test ? first : second`; the only operator carrying a test.
    Conditional,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::UnsignedRightShift => ">>>",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::ArrayIndex => "[]",
            BinaryOp::Coalesce => "??",
            BinaryOp::InstanceOf => "instanceof",
            BinaryOp::Conditional => "?",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::ExclusiveOr
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::LeftShift | BinaryOp::RightShift | BinaryOp::UnsignedRightShift
        )
    }

    pub fn is_comparison(self) -> bool {
        self.dual().is_some()
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    /// Comparison testing the negated predicate (`<` for `>=`, `!=` for `==`).
    pub fn dual(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Equal => BinaryOp::NotEqual,
            BinaryOp::NotEqual => BinaryOp::Equal,
            BinaryOp::GreaterThan => BinaryOp::LessThanOrEqual,
            BinaryOp::LessThanOrEqual => BinaryOp::GreaterThan,
            BinaryOp::GreaterThanOrEqual => BinaryOp::LessThan,
            BinaryOp::LessThan => BinaryOp::GreaterThanOrEqual,
            _ => return None,
        })
    }
}

/// Flat classification of a node, used in diagnostics and displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum ExpressionType {
    Constant,
    Parameter,
    Unary(UnaryOp),
    Binary(BinaryOp),
    FieldAccess,
    MethodAccess,
    New,
    Invoke,
    Lambda,
}

impl std::fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionType::Unary(op) => f.write_str(op.symbol()),
            ExpressionType::Binary(op) => f.write_str(op.symbol()),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant(Value),
    Parameter(usize),
    Unary {
        op: UnaryOp,
        operand: Expression,
    },
    Binary {
        op: BinaryOp,
        first: Expression,
        second: Expression,
        /// Present exactly for `Conditional`.
        test: Option<Expression>,
    },
    /// Field, method or constructor reference. `instance` is absent for static members and constructors.
    Member {
        instance: Option<Expression>,
        member: MemberHandle,
    },
    Invocation {
        target: Expression,
        arguments: Arguments,
    },
    Lambda {
        body: Expression,
        parameters: Arc<[JavaType]>,
    },
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Node {
    result_type: JavaType,
    kind: ExprKind,
}

#[derive(Clone)]
pub struct Expression(Arc<Node>);

/// Non-owning handle on an expression, see [`Expression::downgrade`].
#[derive(Clone, Debug)]
pub struct WeakExpression(Weak<Node>);

impl WeakExpression {
    pub fn upgrade(&self) -> Option<Expression> {
        self.0.upgrade().map(Expression)
    }
}

impl Expression {
    pub(crate) fn new(result_type: JavaType, kind: ExprKind) -> Self {
        Expression(Arc::new(Node { result_type, kind }))
    }

    pub fn result_type(&self) -> &JavaType {
        &self.0.result_type
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn expression_type(&self) -> ExpressionType {
        match self.kind() {
            ExprKind::Constant(_) => ExpressionType::Constant,
            ExprKind::Parameter(_) => ExpressionType::Parameter,
            ExprKind::Unary { op, .. } => ExpressionType::Unary(*op),
            ExprKind::Binary { op, .. } => ExpressionType::Binary(*op),
            ExprKind::Member { member, .. } => match member.kind() {
                MemberKind::FieldAccess => ExpressionType::FieldAccess,
                MemberKind::MethodAccess => ExpressionType::MethodAccess,
                MemberKind::New => ExpressionType::New,
            },
            ExprKind::Invocation { .. } => ExpressionType::Invoke,
            ExprKind::Lambda { .. } => ExpressionType::Lambda,
        }
    }

    /// Same allocation, not merely structurally equal.
    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakExpression {
        WeakExpression(Arc::downgrade(&self.0))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self.kind() {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.as_constant().is_some()
    }

    /// Value of a `boolean`-typed constant.
    pub fn as_bool_constant(&self) -> Option<bool> {
        match (self.kind(), self.result_type()) {
            (ExprKind::Constant(Value::Boolean(b)), &JavaType::BOOLEAN) => Some(*b),
            _ => None,
        }
    }

    /// Value of an integral (or `char`) constant.
    pub fn as_integral_constant(&self) -> Option<i64> {
        self.as_constant().and_then(Value::as_i64)
    }

    pub fn as_parameter(&self) -> Option<usize> {
        match self.kind() {
            ExprKind::Parameter(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_unary(&self) -> Option<(UnaryOp, &Expression)> {
        match self.kind() {
            ExprKind::Unary { op, operand } => Some((*op, operand)),
            _ => None,
        }
    }

    /// `(op, first, second, test)` of a binary node.
    pub fn as_binary(&self) -> Option<(BinaryOp, &Expression, &Expression, Option<&Expression>)> {
        match self.kind() {
            ExprKind::Binary {
                op,
                first,
                second,
                test,
            } => Some((*op, first, second, test.as_ref())),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<(&MemberHandle, Option<&Expression>)> {
        match self.kind() {
            ExprKind::Member { instance, member } => Some((member, instance.as_ref())),
            _ => None,
        }
    }

    pub fn as_invocation(&self) -> Option<(&Expression, &[Expression])> {
        match self.kind() {
            ExprKind::Invocation { target, arguments } => Some((target, arguments)),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<(&Expression, &[JavaType])> {
        match self.kind() {
            ExprKind::Lambda { body, parameters } => Some((body, parameters)),
            _ => None,
        }
    }

    /// Things that can be invoked: a member (left) or a lambda (right).
    pub fn as_invocable(
        &self,
    ) -> Option<Either<(&MemberHandle, Option<&Expression>), (&Expression, &[JavaType])>> {
        match self.kind() {
            ExprKind::Member { member, instance } if !member.kind().is_field_access() => {
                Some(Either::Left((member, instance.as_ref())))
            }
            ExprKind::Lambda { body, parameters } => Some(Either::Right((body, parameters))),
            _ => None,
        }
    }

    /// Declared parameter types of an invocable node.
    pub fn invocable_parameters(&self) -> Option<&[JavaType]> {
        self.as_invocable().map(|invocable| {
            invocable.either(|(member, _)| member.parameter_types(), |(_, params)| params)
        })
    }

    /// Direct children in evaluation order (test first for conditionals).
    #[auto_enum(Iterator)]
    pub fn children(&self) -> impl Iterator<Item = &Expression> {
        match self.kind() {
            ExprKind::Constant(_) | ExprKind::Parameter(_) => std::iter::empty(),
            ExprKind::Unary { operand, .. } => std::iter::once(operand),
            ExprKind::Binary {
                first,
                second,
                test,
                ..
            } => test.iter().chain([first, second]),
            ExprKind::Member { instance, .. } => instance.iter(),
            ExprKind::Invocation { target, arguments } => {
                std::iter::once(target).chain(arguments.iter())
            }
            ExprKind::Lambda { body, .. } => std::iter::once(body),
        }
    }

    /// Highest `Parameter` index reachable without entering a nested lambda.
    pub fn max_parameter_index(&self) -> Option<usize> {
        match self.kind() {
            ExprKind::Parameter(index) => Some(*index),
            ExprKind::Lambda { .. } => None,
            _ => self
                .children()
                .filter_map(Expression::max_parameter_index)
                .max(),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Expression {}

impl std::hash::Hash for Expression {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expression({self} : {})", self.result_type())
    }
}
