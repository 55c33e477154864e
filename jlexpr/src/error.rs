use jlclass::{DescriptorError, JavaType};
use strum::EnumIs;
use thiserror::Error;

use crate::expr::ExpressionType;

pub type BuildResult<T> = Result<T, BuildError>;

/// A smart constructor rejected its inputs.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum BuildError {
    /// Arithmetic or comparison applied to a non-numeric operand.
    #[error("Operator `{op}` requires numeric operands, found `{found}`.")]
    NotNumeric { op: ExpressionType, found: JavaType },

    /// Bitwise or shift operator applied to a non-integral operand.
    #[error("Operator `{op}` requires integral operands, found `{found}`.")]
    NotIntegral { op: ExpressionType, found: JavaType },

    /// Logical operator or conditional test that is not boolean.
    #[error("Operator `{op}` requires a boolean operand, found `{found}`.")]
    NotBoolean { op: ExpressionType, found: JavaType },

    /// `ArrayIndex` or `ArrayLength` applied to a non-array.
    #[error("Operator `{op}` requires an array operand, found `{found}`.")]
    NotArray { op: ExpressionType, found: JavaType },

    /// Operator that only accepts references received a primitive.
    #[error("Operator `{op}` does not accept the primitive type `{found}`.")]
    PrimitiveNotAllowed { op: ExpressionType, found: JavaType },

    /// The two operands cannot be brought to a common type.
    #[error("Operator `{op}` cannot combine `{first}` and `{second}`.")]
    TypeMismatch {
        op: ExpressionType,
        first: JavaType,
        second: JavaType,
    },

    /// No conversion exists between the two types (for instance `int 2` to `boolean`).
    #[error("Cannot convert `{expression}` of type `{from}` to `{to}`.")]
    IllegalConversion {
        expression: String,
        from: JavaType,
        to: JavaType,
    },

    /// A constant value does not fit its declared type; covers `null` with a primitive type.
    #[error("Constant `{value}` cannot have type `{ty}`.")]
    ConstantType { value: String, ty: JavaType },

    /// Invocation with the wrong number of arguments.
    #[error("`{target}` expects {expected} argument(s), {found} given.")]
    ArgumentCount {
        target: String,
        expected: usize,
        found: usize,
    },

    /// Invocation argument not assignable to the declared parameter type.
    #[error("Argument {position} of `{target}` has type `{found}`, which is not assignable to `{expected}`.")]
    ArgumentType {
        target: String,
        position: usize,
        expected: JavaType,
        found: JavaType,
    },

    /// A parameter refers past the end of the enclosing lambda's parameter list.
    #[error("Parameter P{index} is out of range for a lambda taking {count} parameter(s).")]
    ParameterOutOfRange { index: usize, count: usize },

    /// Only members and lambdas can be invoked.
    #[error("Expression of kind `{found}` cannot be invoked.")]
    NotInvocable { found: ExpressionType },

    /// Static members and constructors take no instance; instance members need one.
    #[error("Member `{member}` {reason}.")]
    InstanceMismatch { member: String, reason: &'static str },

    /// `unary`/`binary` dispatch received a kind of the other arity.
    #[error("`{found}` is not a {expected} operator.")]
    WrongArity {
        found: ExpressionType,
        expected: &'static str,
    },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Evaluation failed. Mirrors the exceptions the host runtime would throw.
#[derive(Debug, Clone, PartialEq, EnumIs, Error)]
pub enum EvalError {
    #[error("NullPointerException: {context}")]
    NullPointer { context: String },

    #[error("ClassCastException: `{from}` cannot be cast to `{to}`")]
    ClassCast { from: String, to: JavaType },

    #[error("ArithmeticException: {0}")]
    Arithmetic(&'static str),

    #[error("ArrayIndexOutOfBoundsException: index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds { index: i64, length: usize },

    #[error("NoSuchMember: `{member}` is not available on this host")]
    NoSuchMember { member: String },

    #[error("Lambda expects {expected} argument(s), {found} given")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Value `{value}` does not have the expected type `{expected}`")]
    TypeMismatch { value: String, expected: String },

    /// Failure reported by a host callback.
    #[error("{0}")]
    Host(String),
}
