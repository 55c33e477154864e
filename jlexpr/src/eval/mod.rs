//! Interpretation of expression trees.
//!
//! [`compile`] turns a tree into a tree of closures once; the resulting
//! [`CompiledLambda`] can then be called any number of times, from any thread.
//! Everything outside the expression itself (fields, methods, constructors,
//! type tests) goes through a [`Host`].

mod compile;
mod host;
mod ops;

use std::sync::Arc;

use jlclass::JavaType;

use crate::error::EvalError;
use crate::expr::Expression;
use crate::member::MemberHandle;
use crate::value::Value;

pub use host::{HostFunction, StandardHost};

/// The runtime an evaluated expression talks to.
pub trait Host: Send + Sync {
    /// Reads a field. `instance` is `None` for static fields.
    fn get_field(&self, member: &MemberHandle, instance: Option<&Value>) -> Result<Value, EvalError>;

    /// Calls a method. `instance` is `None` for static methods and is never `Value::Null`.
    fn invoke(
        &self,
        member: &MemberHandle,
        instance: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, EvalError>;

    fn construct(&self, member: &MemberHandle, args: &[Value]) -> Result<Value, EvalError>;

    /// `value instanceof ty`. `null` is an instance of nothing.
    fn is_instance(&self, value: &Value, ty: &JavaType) -> bool;
}

/// Evaluation context of one lambda activation.
pub struct Frame<'a> {
    pub args: &'a [Value],
    pub host: &'a Arc<dyn Host>,
}

pub(crate) type Compiled = Arc<dyn Fn(&Frame<'_>) -> Result<Value, EvalError> + Send + Sync>;

/// A lambda ready to be called.
#[derive(Clone)]
pub struct CompiledLambda {
    parameters: Arc<[JavaType]>,
    body: Compiled,
    host: Arc<dyn Host>,
}

impl CompiledLambda {
    pub fn parameters(&self) -> &[JavaType] {
        &self.parameters
    }

    /// Calls the lambda. Primitive arguments are widened to the declared parameter types.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != self.parameters.len() {
            return Err(EvalError::ArgumentCount {
                expected: self.parameters.len(),
                found: args.len(),
            });
        }
        let args = self
            .parameters
            .iter()
            .zip(args)
            .map(|(ty, value)| ops::coerce_argument(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        (self.body)(&Frame {
            args: &args,
            host: &self.host,
        })
    }
}

impl std::fmt::Debug for CompiledLambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledLambda")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Compiles `expression`. A `Lambda` node compiles to a callable taking its
/// parameters; any other expression compiles to a callable taking none.
pub fn compile(expression: &Expression, host: Arc<dyn Host>) -> CompiledLambda {
    let (body, parameters): (&Expression, Arc<[JavaType]>) = match expression.as_lambda() {
        Some((body, parameters)) => (body, parameters.into()),
        None => (expression, Arc::from([])),
    };
    CompiledLambda {
        parameters,
        body: body.accept(&mut compile::Compiler),
        host,
    }
}

/// Compiles and runs `expression` once.
pub fn evaluate(
    expression: &Expression,
    host: Arc<dyn Host>,
    args: &[Value],
) -> Result<Value, EvalError> {
    compile(expression, host).call(args)
}
