//! Turning closure values into lambda expressions.
//!
//! Two routes lead from a closure to the method holding its body:
//!
//! * a serialisable closure names its implementation method in its
//!   [`SerializedLambda`] record, which is lifted directly;
//! * any other closure is resolved through its dumped proxy class: the proxy's
//!   functional method is lifted first, it forwards to the implementation
//!   method, which is lifted in turn.
//!
//! Captured values end up as constants in the returned tree.

use std::collections::HashMap;
use std::sync::Arc;

use jlclass::{ClassFile, JavaType, MethodDescriptor, MethodHandleKind, MethodInfo};
use jlexpr::build::{self, constant, parameter};
use jlexpr::visit::walk;
use jlexpr::{
    BuildResult, Expression, MemberHandle, MemberKind, Rewriter, TypeConverter, UnaryOp, Value,
};
use log::debug;

use crate::closure::{Closure, InterfaceMethod, SerializedLambda};
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::lift::{Lifted, Receiver, lift};
use crate::source::{ClassSource, CompositeSource, DirectorySource};

/// Name prefix of the methods javac generates for lambda bodies.
const LAMBDA_PREFIX: &str = "lambda$";

/// Resolves closures to `Lambda` expressions.
#[derive(Debug, Clone)]
pub struct Resolver {
    classes: Arc<dyn ClassSource>,
    lambda_classes: Option<Arc<dyn ClassSource>>,
}

impl Resolver {
    /// Resolver reading implementation classes from `classes`. Closures that
    /// are not serialisable need [`Resolver::with_lambda_classes`] as well.
    pub fn new(classes: impl ClassSource + 'static) -> Self {
        Self {
            classes: Arc::new(classes),
            lambda_classes: None,
        }
    }

    /// Source of the dumped proxy classes.
    pub fn with_lambda_classes(mut self, source: impl ClassSource + 'static) -> Self {
        self.lambda_classes = Some(Arc::new(source));
        self
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        let mut classes = CompositeSource::new();
        for dir in &config.class_path {
            classes.push(DirectorySource::new(dir));
        }
        let resolver = Self::new(classes);
        match &config.lambda_dump_dir {
            Some(dir) => resolver.with_lambda_classes(DirectorySource::new(dir)),
            None => resolver,
        }
    }

    /// Resolves `value` to a `Lambda` expression whose parameters are the
    /// functional method's uncaptured parameters.
    pub fn resolve(&self, value: &Value) -> Result<Expression> {
        let closure = closure_of(value)?;
        if !closure.is_synthetic() {
            return Err(Error::not_a_closure(
                closure.binary_name(),
                "its class is not synthetic",
            ));
        }
        let functional = closure.functional_method().ok_or_else(|| {
            Error::not_a_closure(closure.binary_name(), "it implements no abstract method")
        })?;

        match closure.serialized_form() {
            Some(serialized) => {
                debug!(
                    "Resolving serialisable `{}` through {}.{}{}",
                    closure.binary_name(),
                    serialized.impl_class,
                    serialized.impl_method_name,
                    serialized.impl_method_signature
                );
                self.resolve_serialized(serialized)
            }
            None => {
                debug!(
                    "Resolving `{}` through its proxy class `{}`",
                    closure.binary_name(),
                    closure.internal_name()
                );
                self.resolve_proxy(value, closure, functional)
            }
        }
    }

    fn load_class(source: &dyn ClassSource, name: &str) -> Result<ClassFile> {
        let bytes = source.load(name)?;
        ClassFile::parse(&bytes).map_err(|e| Error::class_file(name, e))
    }

    fn resolve_serialized(&self, serialized: &SerializedLambda) -> Result<Expression> {
        let owner = Self::load_class(&*self.classes, &serialized.impl_class)?;
        let method = find_method(
            &owner,
            &serialized.impl_method_name,
            &serialized.impl_method_signature,
        )?;
        if !method.is_synthetic() {
            return method_reference(serialized);
        }

        let mut captured = serialized.captured_args.iter();
        let receiver = if method.is_static() {
            Receiver::Static
        } else {
            let this = captured.next().ok_or_else(|| {
                Error::not_a_closure(
                    &*serialized.impl_class,
                    "the instance implementation method captured no receiver",
                )
            })?;
            Receiver::Captured(constant(
                this.clone(),
                JavaType::class(serialized.impl_class.clone()),
            )?)
        };

        let lifted = lift(&owner, method, receiver)?;
        let captures: Vec<Value> = captured.cloned().collect();
        self.bind_captures(&serialized.impl_class, lifted, &captures)
    }

    /// Fixes the leading parameters of `lifted` to the captured values.
    fn bind_captures(&self, class: &str, lifted: Lifted, captures: &[Value]) -> Result<Expression> {
        let Lifted {
            body, parameters, ..
        } = lifted;
        let bound = captures.len();
        if bound > parameters.len() {
            return Err(Error::not_a_closure(
                class,
                format!(
                    "{bound} values are captured but the implementation takes {}",
                    parameters.len()
                ),
            ));
        }

        let mut nested = HashMap::new();
        for (index, value) in captures.iter().enumerate() {
            let Some(closure) = Closure::from_value(value) else {
                continue;
            };
            if closure.serialized_form().is_none() {
                continue;
            }
            let Some(functional) = closure.functional_method() else {
                continue;
            };
            debug!("Inlining the closure captured as parameter {index}");
            nested.insert(index, (self.resolve(value)?, functional.name.clone()));
        }
        let body = if nested.is_empty() {
            body
        } else {
            NestedClosures { closures: &nested }.rewrite(&body)?
        };

        if bound == 0 {
            return Ok(build::lambda(body, parameters)?);
        }

        let mut arguments = Vec::with_capacity(parameters.len());
        for (value, ty) in captures.iter().zip(&parameters) {
            arguments.push(constant(value.clone(), ty.clone())?);
        }
        for (index, ty) in parameters.iter().enumerate().skip(bound) {
            arguments.push(parameter(ty.clone(), index - bound)?);
        }
        let remaining = parameters[bound..].to_vec();
        let inner = build::lambda(body, parameters)?;
        let applied = build::invocation(inner, arguments)?;
        Ok(build::lambda(applied, remaining)?)
    }

    fn resolve_proxy(
        &self,
        value: &Value,
        closure: &Closure,
        functional: &InterfaceMethod,
    ) -> Result<Expression> {
        let source = self.lambda_classes.as_deref().ok_or_else(|| {
            Error::unavailable(
                closure.internal_name(),
                "no lambda class dump directory is configured",
            )
        })?;
        let proxy = Self::load_class(source, closure.internal_name())?;
        let forwarder = find_method(&proxy, &functional.name, &functional.descriptor)?;
        let this = constant(value.clone(), JavaType::class(closure.internal_name()))?;
        let forwarded = lift(&proxy, forwarder, Receiver::Captured(this))?;

        let mut call = &forwarded.body;
        while let Some((UnaryOp::Convert, inner)) = call.as_unary() {
            call = inner;
        }
        let not_forwarding = || {
            Error::not_a_closure(
                closure.binary_name(),
                "its functional method does not forward to a method",
            )
        };
        let (target, arguments) = call.as_invocation().ok_or_else(not_forwarding)?;
        let (member, instance) = target
            .as_member()
            .filter(|(member, _)| member.kind() == MemberKind::MethodAccess)
            .ok_or_else(not_forwarding)?;

        // The owner of a plain method, often a library class, need not be
        // available.
        let owner = if member.name().starts_with(LAMBDA_PREFIX) {
            match Self::load_class(&*self.classes, member.owner()) {
                Ok(owner) => Some(owner),
                Err(Error::ResourceUnavailable { reason, .. }) => {
                    debug!("Treating {member} as a plain method: {reason}");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        let synthetic = owner.as_ref().and_then(|owner| {
            owner
                .find_method(member.name(), member.descriptor())
                .filter(|method| method.is_synthetic())
                .map(|method| (owner, method))
        });
        let Some((owner, method)) = synthetic else {
            debug!("`{}` forwards to the plain method {member}", closure.binary_name());
            return Ok(build::lambda(forwarded.body, forwarded.parameters)?);
        };

        let receiver = match instance {
            Some(instance) => Receiver::Captured(instance.clone()),
            None => Receiver::Static,
        };
        let actual = lift(owner, method, receiver)?;
        let converter = TypeConverter::new(forwarded.return_type.clone());

        let in_order = arguments.len() == actual.parameters.len()
            && arguments.len() == forwarded.parameters.len()
            && arguments
                .iter()
                .enumerate()
                .all(|(index, argument)| argument.as_parameter() == Some(index));
        if in_order {
            let body = converter.convert(&actual.body)?;
            return Ok(build::lambda(body, forwarded.parameters)?);
        }

        let inner = build::lambda(actual.body, actual.parameters)?;
        let applied = build::invocation(inner, arguments.iter().cloned())?;
        let body = converter.convert(&applied)?;
        Ok(build::lambda(body, forwarded.parameters)?)
    }
}

fn closure_of(value: &Value) -> Result<&Closure> {
    Closure::from_value(value).ok_or_else(|| {
        let class = match value {
            Value::Object(object) => object.class_name().to_string(),
            other => other
                .runtime_type()
                .map_or_else(|| "null".to_string(), |ty| ty.to_string()),
        };
        Error::not_a_closure(class, "the value is not a closure object")
    })
}

fn find_method<'a>(class: &'a ClassFile, name: &str, descriptor: &str) -> Result<&'a MethodInfo> {
    class.find_method(name, descriptor).ok_or_else(|| {
        Error::unavailable(
            format!("{}.{name}{descriptor}", class.this_class),
            "no such method",
        )
    })
}

/// Body of a method reference: a direct call of the referenced member.
fn method_reference(serialized: &SerializedLambda) -> Result<Expression> {
    let owner = &serialized.impl_class;
    let name = &serialized.impl_method_name;
    let signature = &serialized.impl_method_signature;
    let reference = || format!("{owner}.{name}{signature}");

    let instantiated = MethodDescriptor::parse(&serialized.instantiated_method_type)
        .map_err(|e| Error::unavailable(reference(), e))?;
    if instantiated.return_type.is_void() {
        return Err(Error::not_a_closure(
            reference(),
            "a void method reference is not an expression",
        ));
    }
    let parameters = instantiated.parameters;
    let mut captures = serialized.captured_args.iter();

    let (handle, instance, unbound) = match serialized.impl_method_kind {
        MethodHandleKind::InvokeStatic => (
            MemberHandle::method(owner.clone(), name.clone(), signature.clone(), true),
            None,
            false,
        ),
        MethodHandleKind::NewInvokeSpecial => (
            MemberHandle::constructor(owner.clone(), signature.clone()),
            None,
            false,
        ),
        MethodHandleKind::InvokeVirtual
        | MethodHandleKind::InvokeInterface
        | MethodHandleKind::InvokeSpecial => {
            let handle = MemberHandle::method(owner.clone(), name.clone(), signature.clone(), false);
            match captures.next() {
                Some(receiver) => (
                    handle,
                    Some(constant(receiver.clone(), JavaType::class(owner.clone()))?),
                    false,
                ),
                None => {
                    let first = parameters.first().ok_or_else(|| {
                        Error::not_a_closure(reference(), "an unbound reference takes no receiver")
                    })?;
                    (handle, Some(parameter(first.clone(), 0)?), true)
                }
            }
        }
        kind => {
            return Err(Error::not_a_closure(
                reference(),
                format!("{kind:?} references are not invocations"),
            ));
        }
    };
    let handle = handle.map_err(|e| Error::unavailable(reference(), e))?;
    debug!("Method reference to {handle}");

    let mut arguments = Vec::new();
    for (value, ty) in captures.zip(handle.parameter_types()) {
        arguments.push(constant(value.clone(), ty.clone())?);
    }
    let skip = usize::from(unbound);
    for (index, ty) in parameters.iter().enumerate().skip(skip) {
        arguments.push(parameter(ty.clone(), index)?);
    }

    let call = build::invoke(instance, handle, arguments)?;
    let body = TypeConverter::new(instantiated.return_type).convert(&call)?;
    Ok(build::lambda(body, parameters)?)
}

/// Replaces calls of the functional method on a captured closure parameter by
/// an application of that closure's resolved lambda.
struct NestedClosures<'a> {
    closures: &'a HashMap<usize, (Expression, Arc<str>)>,
}

impl Rewriter for NestedClosures<'_> {
    fn rewrite(&mut self, expression: &Expression) -> BuildResult<Expression> {
        if expression.as_lambda().is_some() {
            return Ok(expression.clone());
        }
        if let Some((target, arguments)) = expression.as_invocation() {
            if let Some((member, Some(instance))) = target.as_member() {
                let nested = instance
                    .as_parameter()
                    .and_then(|index| self.closures.get(&index))
                    .filter(|(_, method)| member.name() == &**method);
                if let Some((lambda, _)) = nested {
                    let arguments = arguments
                        .iter()
                        .map(|argument| self.rewrite(argument))
                        .collect::<BuildResult<Vec<_>>>()?;
                    let applied = build::invocation(lambda.clone(), arguments)?;
                    return TypeConverter::new(member.result_type().clone()).convert(&applied);
                }
            }
        }
        walk(self, expression)
    }
}
