//! Typed expression trees for lifted lambdas.
//!
//! The tree is built exclusively through the smart constructors in [`build`],
//! converted between types with [`TypeConverter`], traversed with the
//! [`visit`] traits and run with the interpreter in [`eval`].

pub mod build;
pub mod convert;
pub mod error;
pub mod eval;
pub mod expr;
pub mod member;
pub mod value;
pub mod visit;

pub use convert::TypeConverter;
pub use error::{BuildError, BuildResult, EvalError};
pub use eval::{CompiledLambda, Host, StandardHost, compile, evaluate};
pub use expr::{BinaryOp, ExprKind, Expression, ExpressionType, UnaryOp, WeakExpression};
pub use member::{MemberHandle, MemberKind};
pub use value::{ArrayValue, HostObject, Value};
pub use visit::{Rebuild, Rewriter, Visitor};
