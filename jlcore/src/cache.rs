use std::collections::HashMap;

use jlexpr::build::constant;
use jlexpr::visit::walk;
use jlexpr::{BuildResult, Expression, Rewriter, Value, WeakExpression};
use log::{debug, trace};
use parking_lot::RwLock;

use crate::closure::Closure;
use crate::error::Result;
use crate::resolve::Resolver;

/// [`Resolver`] remembering the lambdas of capture-free closures by class.
///
/// Entries are weak: a lambda stays cached only while some caller holds it.
#[derive(Debug)]
pub struct CachingResolver {
    resolver: Resolver,
    cache: RwLock<HashMap<String, WeakExpression>>,
}

impl CachingResolver {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn resolve(&self, value: &Value) -> Result<Expression> {
        let Some(closure) = Closure::from_value(value).filter(|c| c.is_capture_free()) else {
            return self.resolver.resolve(value);
        };
        let key = closure.binary_name();

        let cached = self.cache.read().get(key).and_then(WeakExpression::upgrade);
        if let Some(cached) = cached {
            trace!("Lambda cache hit for `{key}`");
            let mut replacer = InstanceReplacer {
                class: closure.internal_name(),
                value,
            };
            return Ok(replacer.rewrite(&cached)?);
        }

        let resolved = self.resolver.resolve(value)?;
        let mut cache = self.cache.write();
        cache.retain(|_, entry| entry.upgrade().is_some());
        cache.insert(key.to_string(), resolved.downgrade());
        debug!("Cached the lambda of `{key}` ({} entries)", cache.len());
        Ok(resolved)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .values()
            .filter(|entry| entry.upgrade().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Points constants holding another instance of the cached closure class at `value`.
struct InstanceReplacer<'a> {
    class: &'a str,
    value: &'a Value,
}

impl Rewriter for InstanceReplacer<'_> {
    fn rewrite(&mut self, expression: &Expression) -> BuildResult<Expression> {
        let stale = expression
            .as_constant()
            .and_then(Closure::from_value)
            .is_some_and(|closure| closure.internal_name() == self.class);
        if stale {
            return constant(self.value.clone(), expression.result_type().clone());
        }
        walk(self, expression)
    }
}
