use std::fmt;
use std::sync::Arc;

use jlclass::{DescriptorError, JavaType, MethodDescriptor};
use strum::{EnumIs, IntoStaticStr};

/// What a [`MemberHandle`] designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, IntoStaticStr)]
pub enum MemberKind {
    FieldAccess,
    MethodAccess,
    New,
}

/// Portable identity of a field, method or constructor: (owner, name, descriptor).
///
/// The parsed parameter and result types are cached alongside. Handles compare
/// by identity triple, kind and static flag only.
#[derive(Clone)]
pub struct MemberHandle(Arc<HandleData>);

struct HandleData {
    owner: Arc<str>,
    name: Arc<str>,
    descriptor: Arc<str>,
    kind: MemberKind,
    is_static: bool,
    parameter_types: Arc<[JavaType]>,
    result_type: JavaType,
}

impl MemberHandle {
    pub fn field(
        owner: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        descriptor: impl Into<Arc<str>>,
        is_static: bool,
    ) -> Result<Self, DescriptorError> {
        let descriptor = descriptor.into();
        let result_type = JavaType::parse_descriptor(&descriptor)?;
        Ok(Self(Arc::new(HandleData {
            owner: owner.into(),
            name: name.into(),
            descriptor,
            kind: MemberKind::FieldAccess,
            is_static,
            parameter_types: Arc::from([]),
            result_type,
        })))
    }

    pub fn method(
        owner: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        descriptor: impl Into<Arc<str>>,
        is_static: bool,
    ) -> Result<Self, DescriptorError> {
        let descriptor = descriptor.into();
        let parsed = MethodDescriptor::parse(&descriptor)?;
        Ok(Self(Arc::new(HandleData {
            owner: owner.into(),
            name: name.into(),
            descriptor,
            kind: MemberKind::MethodAccess,
            is_static,
            parameter_types: parsed.parameters.into(),
            result_type: parsed.return_type,
        })))
    }

    /// Constructor `<init>` of `owner`; its result type is the owner class.
    pub fn constructor(
        owner: impl Into<Arc<str>>,
        descriptor: impl Into<Arc<str>>,
    ) -> Result<Self, DescriptorError> {
        let owner = owner.into();
        let descriptor = descriptor.into();
        let parsed = MethodDescriptor::parse(&descriptor)?;
        Ok(Self(Arc::new(HandleData {
            result_type: JavaType::Class(owner.clone()),
            owner,
            name: "<init>".into(),
            descriptor,
            kind: MemberKind::New,
            is_static: false,
            parameter_types: parsed.parameters.into(),
        })))
    }

    pub fn owner(&self) -> &str {
        &self.0.owner
    }

    pub fn owner_type(&self) -> JavaType {
        JavaType::Class(self.0.owner.clone())
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn descriptor(&self) -> &str {
        &self.0.descriptor
    }

    pub fn kind(&self) -> MemberKind {
        self.0.kind
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    pub fn parameter_types(&self) -> &[JavaType] {
        &self.0.parameter_types
    }

    /// Field type, method return type, or the owner class for constructors.
    pub fn result_type(&self) -> &JavaType {
        &self.0.result_type
    }

    /// `true` when `owner`, `name` and `descriptor` match.
    pub fn is(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.owner() == owner && self.name() == name && self.descriptor() == descriptor
    }
}

impl PartialEq for MemberHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.kind == other.0.kind
                && self.0.is_static == other.0.is_static
                && self.0.owner == other.0.owner
                && self.0.name == other.0.name
                && self.0.descriptor == other.0.descriptor)
    }
}

impl Eq for MemberHandle {}

impl std::hash::Hash for MemberHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
        self.0.owner.hash(state);
        self.0.name.hash(state);
        self.0.descriptor.hash(state);
    }
}

impl fmt::Debug for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.0.kind.into();
        write!(
            f,
            "{kind}({}{}.{}:{})",
            if self.0.is_static { "static " } else { "" },
            self.0.owner,
            self.0.name,
            self.0.descriptor
        )
    }
}

impl fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner_type(), self.0.name, self.0.descriptor)
    }
}
