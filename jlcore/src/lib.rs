//! Reconstructs typed expression trees from compiled lambdas.
//!
//! [`Resolver::resolve`] takes a closure value, finds the method holding its
//! body, lifts that bytecode into a [`jlexpr::Expression`] and binds the
//! captured values. The result can be inspected, rewritten, or run with
//! [`compile`].

pub mod cache;
pub mod closure;
pub mod config;
pub mod error;
pub mod lift;
pub mod resolve;
pub mod source;

use std::sync::Arc;

use jlexpr::{CompiledLambda, Expression, StandardHost};

pub use cache::CachingResolver;
pub use closure::{Closure, InterfaceMethod, SerializedLambda};
pub use config::ResolverConfig;
pub use error::{Error, Result, Violation};
pub use lift::{Lifted, Receiver, lift};
pub use resolve::Resolver;
pub use source::{ClassSource, CompositeSource, DirectorySource, MemorySource};

/// Compiles a resolved lambda against the built-in [`StandardHost`].
pub fn compile(lambda: &Expression) -> CompiledLambda {
    jlexpr::compile(lambda, Arc::new(StandardHost::new()))
}
