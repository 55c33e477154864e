//! Host type model.
//!
//! `JavaType` is the result-type descriptor carried by every expression node.
//! It is deliberately small: primitives, classes identified by their internal
//! name (`java/lang/String`) and arrays. There is no class loader behind it, so
//! reference subtyping is answered from a fixed table covering the core
//! `java.lang` hierarchy; any other class is only known to be an `Object`.
//!
//! The module also owns the two fixed tables the rest of the workspace leans on:
//!
//! - the **widening table** (`byte -> short, int, long`, `short -> int, long`,
//!   `int -> long`, `float -> double`) used by assignability checks, and
//! - the **boxing table** mapping every primitive to its wrapper class together
//!   with the well-known `xxxValue()` / `valueOf(x)` conversion methods.

use std::fmt;
use std::sync::{Arc, LazyLock};

use enum_map::{Enum, EnumMap, enum_map};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumIter, IntoStaticStr};
use thiserror::Error;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";
pub const CLASS: &str = "java/lang/Class";
pub const NUMBER: &str = "java/lang/Number";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum DescriptorError {
    /// The descriptor does not follow the field or method descriptor grammar.
    #[error("Malformed type descriptor `{descriptor}`: unexpected input at position {position}.")]
    Malformed { descriptor: String, position: usize },

    /// A field descriptor was expected but a method descriptor (or trailing data) was found.
    #[error("Descriptor `{descriptor}` has trailing characters after a complete type.")]
    Trailing { descriptor: String },
}

/// The nine primitive types of the host platform, `void` included.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, EnumIter, EnumIs, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

const BYTE_WIDENS: &[PrimitiveType] = &[PrimitiveType::Short, PrimitiveType::Int, PrimitiveType::Long];
const SHORT_WIDENS: &[PrimitiveType] = &[PrimitiveType::Int, PrimitiveType::Long];
const INT_WIDENS: &[PrimitiveType] = &[PrimitiveType::Long];
const FLOAT_WIDENS: &[PrimitiveType] = &[PrimitiveType::Double];
const NO_WIDENING: &[PrimitiveType] = &[];

static WIDENING: LazyLock<EnumMap<PrimitiveType, &'static [PrimitiveType]>> = LazyLock::new(|| {
    enum_map! {
        PrimitiveType::Byte => BYTE_WIDENS,
        PrimitiveType::Short => SHORT_WIDENS,
        PrimitiveType::Int => INT_WIDENS,
        PrimitiveType::Float => FLOAT_WIDENS,
        _ => NO_WIDENING,
    }
});

static WRAPPERS: LazyLock<EnumMap<PrimitiveType, &'static str>> = LazyLock::new(|| {
    enum_map! {
        PrimitiveType::Boolean => "java/lang/Boolean",
        PrimitiveType::Byte => "java/lang/Byte",
        PrimitiveType::Char => "java/lang/Character",
        PrimitiveType::Short => "java/lang/Short",
        PrimitiveType::Int => "java/lang/Integer",
        PrimitiveType::Long => "java/lang/Long",
        PrimitiveType::Float => "java/lang/Float",
        PrimitiveType::Double => "java/lang/Double",
        PrimitiveType::Void => "java/lang/Void",
    }
});

static UNBOX_METHODS: LazyLock<EnumMap<PrimitiveType, &'static str>> = LazyLock::new(|| {
    enum_map! {
        PrimitiveType::Boolean => "booleanValue",
        PrimitiveType::Byte => "byteValue",
        PrimitiveType::Char => "charValue",
        PrimitiveType::Short => "shortValue",
        PrimitiveType::Int => "intValue",
        PrimitiveType::Long => "longValue",
        PrimitiveType::Float => "floatValue",
        PrimitiveType::Double => "doubleValue",
        PrimitiveType::Void => "",
    }
});

impl PrimitiveType {
    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            'V' => Self::Void,
            _ => return None,
        })
    }

    pub fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
            Self::Void => 'V',
        }
    }

    /// Source-level keyword (`int`, `boolean`, ...).
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Internal name of the wrapper class (`java/lang/Integer` for `int`).
    pub fn wrapper(self) -> &'static str {
        WRAPPERS[self]
    }

    pub fn from_wrapper(name: &str) -> Option<Self> {
        WRAPPERS
            .iter()
            .find_map(|(prim, wrapper)| (*wrapper == name && prim != Self::Void).then_some(prim))
    }

    /// Name of the `xxxValue()` accessor that unboxes to this primitive.
    pub fn unbox_method(self) -> &'static str {
        UNBOX_METHODS[self]
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Int | Self::Long | Self::Float | Self::Double
        )
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Number of local-variable slots a value of this type occupies.
    pub fn slot_size(self) -> usize {
        match self {
            Self::Long | Self::Double => 2,
            Self::Void => 0,
            _ => 1,
        }
    }

    /// Whether `self` widens to `to` according to the widening table. Identity is not widening.
    pub fn widens_to(self, to: PrimitiveType) -> bool {
        WIDENING[self].contains(&to)
    }

    /// Binary numeric promotion: `char`, `byte` and `short` are computed as `int`,
    /// otherwise the wider operand wins. `None` when either side is not arithmetic.
    pub fn promote(self, other: PrimitiveType) -> Option<PrimitiveType> {
        let a = self.unary_promotion()?;
        let b = other.unary_promotion()?;
        Some(if a.rank() >= b.rank() { a } else { b })
    }

    /// Unary numeric promotion (`char`, `byte`, `short` become `int`).
    pub fn unary_promotion(self) -> Option<PrimitiveType> {
        match self {
            Self::Char | Self::Byte | Self::Short | Self::Int => Some(Self::Int),
            Self::Long | Self::Float | Self::Double => Some(self),
            Self::Boolean | Self::Void => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Int => 0,
            Self::Long => 1,
            Self::Float => 2,
            Self::Double => 3,
            _ => 0,
        }
    }
}

/// A host type: primitive, class (by internal name) or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JavaType {
    Primitive(PrimitiveType),
    Class(Arc<str>),
    Array(Arc<JavaType>),
}

impl JavaType {
    pub const BOOLEAN: JavaType = JavaType::Primitive(PrimitiveType::Boolean);
    pub const BYTE: JavaType = JavaType::Primitive(PrimitiveType::Byte);
    pub const CHAR: JavaType = JavaType::Primitive(PrimitiveType::Char);
    pub const SHORT: JavaType = JavaType::Primitive(PrimitiveType::Short);
    pub const INT: JavaType = JavaType::Primitive(PrimitiveType::Int);
    pub const LONG: JavaType = JavaType::Primitive(PrimitiveType::Long);
    pub const FLOAT: JavaType = JavaType::Primitive(PrimitiveType::Float);
    pub const DOUBLE: JavaType = JavaType::Primitive(PrimitiveType::Double);
    pub const VOID: JavaType = JavaType::Primitive(PrimitiveType::Void);

    pub fn class(internal_name: impl Into<Arc<str>>) -> Self {
        JavaType::Class(internal_name.into())
    }

    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    pub fn string() -> Self {
        Self::class(STRING)
    }

    pub fn array_of(element: JavaType) -> Self {
        JavaType::Array(Arc::new(element))
    }

    /// Type named by a `CONSTANT_Class` entry. Array classes are spelled as descriptors there.
    pub fn from_class_constant(name: &str) -> Result<Self, DescriptorError> {
        if name.starts_with('[') {
            Self::parse_descriptor(name)
        } else {
            Ok(Self::class(name))
        }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            JavaType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            JavaType::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&JavaType> {
        match self {
            JavaType::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JavaType::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JavaType::Array(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Primitive(PrimitiveType::Void))
    }

    pub fn is_object(&self) -> bool {
        self.class_name() == Some(OBJECT)
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveType::is_numeric)
    }

    pub fn is_integral(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveType::is_integral)
    }

    /// `boolean` or its wrapper.
    pub fn is_boolean(&self) -> bool {
        match self {
            JavaType::Primitive(p) => *p == PrimitiveType::Boolean,
            JavaType::Class(name) => &**name == PrimitiveType::Boolean.wrapper(),
            JavaType::Array(_) => false,
        }
    }

    /// Primitive wrapped by this class, if it is one of the wrapper classes.
    pub fn unboxed(&self) -> Option<PrimitiveType> {
        self.class_name().and_then(PrimitiveType::from_wrapper)
    }

    /// Wrapper class of a primitive; reference types are returned unchanged.
    pub fn boxed(&self) -> JavaType {
        match self {
            JavaType::Primitive(p) => Self::class(p.wrapper()),
            other => other.clone(),
        }
    }

    pub fn slot_size(&self) -> usize {
        match self {
            JavaType::Primitive(p) => p.slot_size(),
            _ => 1,
        }
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaType::Primitive(p) => out.push(p.descriptor()),
            JavaType::Class(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            JavaType::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    /// Parses a complete field descriptor such as `I`, `Ljava/lang/String;` or `[[D`.
    pub fn parse_descriptor(descriptor: &str) -> Result<Self, DescriptorError> {
        let mut cursor = DescriptorCursor::new(descriptor);
        let ty = cursor.field_type()?;
        if !cursor.is_done() {
            return Err(DescriptorError::Trailing {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(ty)
    }

    /// Assignability check: identity, primitive widening, then reference subtyping
    /// against the built-in hierarchy.
    pub fn is_assignable_from(&self, from: &JavaType) -> bool {
        if self == from {
            return true;
        }

        match (self, from) {
            (JavaType::Primitive(to), JavaType::Primitive(from)) => from.widens_to(*to),
            (JavaType::Primitive(_), _) | (_, JavaType::Primitive(_)) => false,
            (JavaType::Class(to), _) if &**to == OBJECT => true,
            (JavaType::Class(to), JavaType::Array(_)) => {
                matches!(&**to, "java/lang/Cloneable" | "java/io/Serializable")
            }
            (JavaType::Array(to), JavaType::Array(from)) => {
                to.is_reference() && from.is_reference() && to.is_assignable_from(from)
            }
            (JavaType::Array(_), JavaType::Class(_)) => false,
            (JavaType::Class(to), JavaType::Class(from)) => is_subclass(from, to),
        }
    }
}

impl From<PrimitiveType> for JavaType {
    fn from(value: PrimitiveType) -> Self {
        JavaType::Primitive(value)
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(p) => f.write_str(p.name()),
            JavaType::Class(name) => {
                for (i, part) in name.split('/').enumerate() {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(part)?;
                }
                Ok(())
            }
            JavaType::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Parsed method descriptor, e.g. `(IJLjava/lang/String;)Z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MethodDescriptor {
    pub parameters: Vec<JavaType>,
    pub return_type: JavaType,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let mut cursor = DescriptorCursor::new(descriptor);
        cursor.expect('(')?;
        let mut parameters = Vec::new();
        while cursor.peek() != Some(')') {
            parameters.push(cursor.field_type()?);
        }
        cursor.expect(')')?;
        let return_type = match cursor.peek() {
            Some('V') => {
                cursor.bump();
                JavaType::VOID
            }
            _ => cursor.field_type()?,
        };
        if !cursor.is_done() {
            return Err(DescriptorError::Trailing {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(Self {
            parameters,
            return_type,
        })
    }

    /// Number of local slots taken by the parameters (without any receiver).
    pub fn parameter_slots(&self) -> usize {
        self.parameters.iter().map(JavaType::slot_size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for p in &self.parameters {
            f.write_str(&p.descriptor())?;
        }
        write!(f, "){}", self.return_type.descriptor())
    }
}

struct DescriptorCursor<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> DescriptorCursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn is_done(&self) -> bool {
        self.position >= self.source.len()
    }

    fn error(&self) -> DescriptorError {
        DescriptorError::Malformed {
            descriptor: self.source.to_string(),
            position: self.position,
        }
    }

    fn expect(&mut self, c: char) -> Result<(), DescriptorError> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn field_type(&mut self) -> Result<JavaType, DescriptorError> {
        match self.peek() {
            Some('L') => {
                self.bump();
                let rest = &self.source[self.position..];
                let end = rest.find(';').ok_or_else(|| self.error())?;
                if end == 0 {
                    return Err(self.error());
                }
                let name = &rest[..end];
                self.position += end + 1;
                Ok(JavaType::class(name))
            }
            Some('[') => {
                self.bump();
                Ok(JavaType::array_of(self.field_type()?))
            }
            Some(c) => match PrimitiveType::from_descriptor(c) {
                Some(PrimitiveType::Void) | None => Err(self.error()),
                Some(p) => {
                    self.bump();
                    Ok(JavaType::Primitive(p))
                }
            },
            None => Err(self.error()),
        }
    }
}

/// Direct supertypes of the classes the host runtime guarantees.
fn direct_supertypes(name: &str) -> &'static [&'static str] {
    const SERIALIZABLE: &str = "java/io/Serializable";
    const COMPARABLE: &str = "java/lang/Comparable";
    match name {
        STRING => &[OBJECT, SERIALIZABLE, COMPARABLE, "java/lang/CharSequence"],
        "java/lang/Integer" | "java/lang/Long" | "java/lang/Short" | "java/lang/Byte"
        | "java/lang/Float" | "java/lang/Double" | "java/math/BigInteger"
        | "java/math/BigDecimal" => &[NUMBER, COMPARABLE],
        NUMBER => &[OBJECT, SERIALIZABLE],
        "java/lang/Boolean" | "java/lang/Character" => &[OBJECT, SERIALIZABLE, COMPARABLE],
        CLASS => &[OBJECT, SERIALIZABLE],
        "java/lang/StringBuilder" => &[OBJECT, SERIALIZABLE, "java/lang/CharSequence"],
        "java/util/ArrayList" | "java/util/LinkedList" => &[
            "java/util/AbstractList",
            "java/util/List",
            SERIALIZABLE,
            "java/lang/Cloneable",
        ],
        "java/util/AbstractList" => &["java/util/AbstractCollection", "java/util/List"],
        "java/util/AbstractCollection" => &[OBJECT, "java/util/Collection"],
        "java/util/List" | "java/util/Set" | "java/util/Queue" => &["java/util/Collection"],
        "java/util/Collection" => &["java/lang/Iterable"],
        "java/util/HashMap" | "java/util/TreeMap" => &["java/util/AbstractMap", "java/util/Map"],
        "java/util/AbstractMap" => &[OBJECT, "java/util/Map"],
        _ => &[],
    }
}

fn is_subclass(from: &str, to: &str) -> bool {
    from == to
        || direct_supertypes(from)
            .iter()
            .any(|parent| is_subclass(parent, to))
}

/// Primitive produced by a well-known unboxing accessor such as `Integer.intValue()`.
///
/// Numeric wrappers (and `Number` itself) expose every numeric accessor, so
/// `Integer.longValue()` unboxes and widens in one step.
pub fn unboxing_method(owner: &str, name: &str, descriptor: &str) -> Option<PrimitiveType> {
    let target = match owner {
        NUMBER => None,
        _ => Some(PrimitiveType::from_wrapper(owner)?),
    };
    let result = descriptor
        .strip_prefix("()")
        .filter(|rest| rest.chars().count() == 1)
        .and_then(|rest| rest.chars().next())
        .and_then(PrimitiveType::from_descriptor)?;
    if result.unbox_method() != name {
        return None;
    }
    match target {
        Some(wrapped) if wrapped.is_numeric() => result.is_numeric().then_some(result),
        Some(wrapped) => (wrapped == result).then_some(result),
        None => result.is_numeric().then_some(result),
    }
}

/// Primitive boxed by a well-known `Wrapper.valueOf(primitive)` factory.
pub fn boxing_method(owner: &str, name: &str, descriptor: &str) -> Option<PrimitiveType> {
    if name != "valueOf" {
        return None;
    }
    let primitive = PrimitiveType::from_wrapper(owner)?;
    let expected = format!("({})L{};", primitive.descriptor(), owner);
    (descriptor == expected).then_some(primitive)
}
