//! Closure values handed to the resolver.
//!
//! A [`Closure`] is the embedding application's view of a runtime lambda
//! object: its generated class, the functional interface it implements, the
//! values it captured and, for serialisable lambdas, the serialised record the
//! host compiler attaches to it.

use std::sync::Arc;

use jlclass::{JavaType, MethodHandleKind};
use jlexpr::{HostObject, Value};

use crate::source::proxy_class_file;

/// One abstract or default method of the implemented functional interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMethod {
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub is_default: bool,
}

/// Serialised form of a lambda, as recorded by the host compiler.
///
/// Class names use the internal form (`com/acme/Main`), signatures are method
/// descriptors.
#[derive(Debug, Clone)]
pub struct SerializedLambda {
    pub capturing_class: Arc<str>,
    pub functional_interface_class: Arc<str>,
    pub functional_interface_method_name: Arc<str>,
    pub functional_interface_method_signature: Arc<str>,
    pub impl_class: Arc<str>,
    pub impl_method_name: Arc<str>,
    pub impl_method_signature: Arc<str>,
    pub impl_method_kind: MethodHandleKind,
    /// Erased-free descriptor of the functional method at the creation site.
    pub instantiated_method_type: Arc<str>,
    pub captured_args: Vec<Value>,
}

impl SerializedLambda {
    /// Record for the implementation method `impl_class.impl_method_name impl_method_signature`.
    /// The functional interface fields default to the implementation itself
    /// until [`SerializedLambda::functional_interface`] is called.
    pub fn new(
        impl_method_kind: MethodHandleKind,
        impl_class: impl Into<Arc<str>>,
        impl_method_name: impl Into<Arc<str>>,
        impl_method_signature: impl Into<Arc<str>>,
    ) -> Self {
        let impl_class = impl_class.into();
        let impl_method_name = impl_method_name.into();
        let impl_method_signature: Arc<str> = impl_method_signature.into();
        Self {
            capturing_class: impl_class.clone(),
            functional_interface_class: jlclass::types::OBJECT.into(),
            functional_interface_method_name: impl_method_name.clone(),
            functional_interface_method_signature: impl_method_signature.clone(),
            instantiated_method_type: impl_method_signature.clone(),
            impl_class,
            impl_method_name,
            impl_method_signature,
            impl_method_kind,
            captured_args: Vec::new(),
        }
    }

    pub fn functional_interface(
        mut self,
        class: impl Into<Arc<str>>,
        method: impl Into<Arc<str>>,
        signature: impl Into<Arc<str>>,
    ) -> Self {
        self.functional_interface_class = class.into();
        self.functional_interface_method_name = method.into();
        self.functional_interface_method_signature = signature.into();
        self
    }

    pub fn instantiated_method_type(mut self, descriptor: impl Into<Arc<str>>) -> Self {
        self.instantiated_method_type = descriptor.into();
        self
    }

    pub fn capturing_class(mut self, class: impl Into<Arc<str>>) -> Self {
        self.capturing_class = class.into();
        self
    }

    pub fn captured_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.captured_args = args.into_iter().collect();
        self
    }
}

/// A runtime closure object.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Binary name, possibly carrying a hidden-class `/suffix`.
    binary_name: Arc<str>,
    internal_name: Arc<str>,
    interface: Arc<str>,
    synthetic: bool,
    interface_methods: Vec<InterfaceMethod>,
    serialized: Option<SerializedLambda>,
    captured: Vec<(Arc<str>, Value)>,
}

impl Closure {
    /// Synthetic closure of class `binary_name` implementing `interface`.
    pub fn new(binary_name: impl Into<Arc<str>>, interface: impl Into<Arc<str>>) -> Self {
        let binary_name = binary_name.into();
        Self {
            internal_name: proxy_class_file(&binary_name).into(),
            binary_name,
            interface: interface.into(),
            synthetic: true,
            interface_methods: Vec::new(),
            serialized: None,
            captured: Vec::new(),
        }
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Declares an abstract method of the functional interface.
    pub fn method(mut self, name: impl Into<Arc<str>>, descriptor: impl Into<Arc<str>>) -> Self {
        self.interface_methods.push(InterfaceMethod {
            name: name.into(),
            descriptor: descriptor.into(),
            is_default: false,
        });
        self
    }

    pub fn default_method(
        mut self,
        name: impl Into<Arc<str>>,
        descriptor: impl Into<Arc<str>>,
    ) -> Self {
        self.interface_methods.push(InterfaceMethod {
            name: name.into(),
            descriptor: descriptor.into(),
            is_default: true,
        });
        self
    }

    pub fn serialized(mut self, serialized: SerializedLambda) -> Self {
        self.serialized = Some(serialized);
        self
    }

    /// Adds a captured field (`arg$1`, ...) readable by the forwarder code.
    pub fn captured_field(mut self, name: impl Into<Arc<str>>, value: Value) -> Self {
        self.captured.push((name.into(), value));
        self
    }

    pub fn into_value(self) -> Value {
        Value::object(self)
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Internal name of the class file describing this closure.
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn interface_methods(&self) -> &[InterfaceMethod] {
        &self.interface_methods
    }

    /// First abstract method of the functional interface.
    pub fn functional_method(&self) -> Option<&InterfaceMethod> {
        self.interface_methods.iter().find(|m| !m.is_default)
    }

    pub fn serialized_form(&self) -> Option<&SerializedLambda> {
        self.serialized.as_ref()
    }

    pub fn captured_fields(&self) -> &[(Arc<str>, Value)] {
        &self.captured
    }

    /// `true` when the closure carries no captured value at all.
    pub fn is_capture_free(&self) -> bool {
        self.captured.is_empty()
            && self
                .serialized
                .as_ref()
                .is_none_or(|s| s.captured_args.is_empty())
    }

    /// Borrows the closure behind a host value.
    pub fn from_value(value: &Value) -> Option<&Closure> {
        match value {
            Value::Object(object) => object.downcast_ref::<Closure>(),
            _ => None,
        }
    }
}

impl HostObject for Closure {
    fn class_name(&self) -> &str {
        &self.internal_name
    }

    fn is_instance_of(&self, ty: &JavaType) -> bool {
        ty.is_object()
            || ty
                .class_name()
                .is_some_and(|name| name == &*self.internal_name || name == &*self.interface)
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        self.captured
            .iter()
            .find(|(field, _)| &**field == name)
            .map(|(_, value)| value.clone())
    }

    fn to_java_string(&self) -> String {
        format!("{}@lambda", self.binary_name)
    }
}
