//! Runtime values carried by `Constant` nodes and produced by evaluation.
//!
//! Boxed and primitive values share variants: an `Integer` constant and an
//! `int` constant both hold [`Value::Int`], the declared type of the node tells
//! them apart. Equality is total so that expression trees can derive `Eq` and
//! `Hash`: floating values compare by bit pattern and host objects by identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use jlclass::{JavaType, PrimitiveType};

use crate::error::EvalError;
use crate::member::MemberHandle;

/// An object owned by the embedding application (a closure, a domain object, ...).
///
/// Implementors expose just enough behaviour for evaluated expressions to read
/// fields and call methods on them. Every hook has a conservative default.
pub trait HostObject: DowncastSync + fmt::Debug {
    /// Internal name of the runtime class (`com/acme/Customer`).
    fn class_name(&self) -> &str;

    fn is_instance_of(&self, ty: &JavaType) -> bool {
        ty.is_object() || ty.class_name() == Some(self.class_name())
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Instance method call. `None` when the object does not implement `method`.
    fn invoke(&self, _method: &MemberHandle, _args: &[Value]) -> Option<Result<Value, EvalError>> {
        None
    }

    fn to_java_string(&self) -> String {
        format!(
            "{}@{:x}",
            self.class_name().replace('/', "."),
            self as *const Self as *const () as usize
        )
    }
}
impl_downcast!(sync HostObject);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayValue {
    pub element: JavaType,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    Class(JavaType),
    Array(Arc<ArrayValue>),
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Value::String(text.into())
    }

    pub fn object(object: impl HostObject) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn array(element: JavaType, items: Vec<Value>) -> Self {
        Value::Array(Arc::new(ArrayValue { element, items }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral view (`char`, `byte`, `short`, `int`, `long` sign- or zero-extended).
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::Char(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Long(_) => None,
            _ => self.as_i64().map(|v| v as i32),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Primitive type this value naturally has, `None` for references.
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Byte(_) => PrimitiveType::Byte,
            Value::Char(_) => PrimitiveType::Char,
            Value::Short(_) => PrimitiveType::Short,
            Value::Int(_) => PrimitiveType::Int,
            Value::Long(_) => PrimitiveType::Long,
            Value::Float(_) => PrimitiveType::Float,
            Value::Double(_) => PrimitiveType::Double,
            _ => return None,
        })
    }

    /// Type a constant holding this value gets when none is given.
    pub fn natural_type(&self) -> JavaType {
        match self.primitive_type() {
            Some(p) => JavaType::Primitive(p),
            None => self.runtime_type().unwrap_or_else(JavaType::object),
        }
    }

    /// Class of the boxed or referenced object. `None` for `null`.
    pub fn runtime_type(&self) -> Option<JavaType> {
        Some(match self {
            Value::Null => return None,
            Value::String(_) => JavaType::string(),
            Value::Class(_) => JavaType::class(jlclass::types::CLASS),
            Value::Array(array) => JavaType::array_of(array.element.clone()),
            Value::Object(object) => JavaType::class(object.class_name()),
            primitive => JavaType::class(primitive.primitive_type()?.wrapper()),
        })
    }

    /// Host-language primitive cast (`(int) 3.7`, `(byte) 300`, `(char) 65`).
    ///
    /// Floating to integral conversions saturate and map NaN to zero; integral
    /// narrowing truncates. Booleans only convert to themselves.
    pub fn cast(&self, to: PrimitiveType) -> Option<Value> {
        if let Value::Boolean(b) = self {
            return (to == PrimitiveType::Boolean).then_some(Value::Boolean(*b));
        }

        let value = match self {
            Value::Float(v) => Number::Float(*v as f64),
            Value::Double(v) => Number::Float(*v),
            other => Number::Integral(other.as_i64()?),
        };

        Some(match (to, value) {
            (PrimitiveType::Byte, Number::Integral(v)) => Value::Byte(v as i8),
            (PrimitiveType::Byte, Number::Float(v)) => Value::Byte(v as i32 as i8),
            (PrimitiveType::Char, Number::Integral(v)) => Value::Char(v as u16),
            (PrimitiveType::Char, Number::Float(v)) => Value::Char(v as i32 as u16),
            (PrimitiveType::Short, Number::Integral(v)) => Value::Short(v as i16),
            (PrimitiveType::Short, Number::Float(v)) => Value::Short(v as i32 as i16),
            (PrimitiveType::Int, Number::Integral(v)) => Value::Int(v as i32),
            (PrimitiveType::Int, Number::Float(v)) => Value::Int(v as i32),
            (PrimitiveType::Long, Number::Integral(v)) => Value::Long(v),
            (PrimitiveType::Long, Number::Float(v)) => Value::Long(v as i64),
            (PrimitiveType::Float, Number::Integral(v)) => Value::Float(v as f32),
            (PrimitiveType::Float, Number::Float(v)) => match self {
                Value::Float(f) => Value::Float(*f),
                _ => Value::Float(v as f32),
            },
            (PrimitiveType::Double, Number::Integral(v)) => Value::Double(v as f64),
            (PrimitiveType::Double, Number::Float(v)) => Value::Double(v),
            (PrimitiveType::Boolean | PrimitiveType::Void, _) => return None,
        })
    }

    /// `String.valueOf(value)`.
    pub fn to_java_string(&self) -> String {
        self.to_string()
    }
}

enum Number {
    Integral(i64),
    Float(f64),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Char(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Class(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Object(v) => (Arc::as_ptr(v) as *const () as usize).hash(state),
        }
    }
}

pub(crate) fn same_object(a: &Arc<dyn HostObject>, b: &Arc<dyn HostObject>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

fn write_floating(f: &mut fmt::Formatter<'_>, value: f64, shortest: String) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("NaN");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-3..1e7).contains(&magnitude) {
        // Computerized scientific notation: 1.0E10, 1.5E-5.
        let (mantissa, exponent) = shortest.split_once('e').unwrap_or((shortest.as_str(), "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{mantissa}.0")
        };
        return write!(f, "{mantissa}E{exponent}");
    }
    if shortest.contains('.') {
        f.write_str(&shortest)
    } else {
        write!(f, "{shortest}.0")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "{c}"),
                None => f.write_str("\u{fffd}"),
            },
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => {
                let magnitude = v.abs();
                let shortest = if magnitude != 0.0 && !(1e-3..1e7).contains(&magnitude) {
                    format!("{v:e}")
                } else {
                    format!("{v}")
                };
                write_floating(f, *v as f64, shortest)
            }
            Value::Double(v) => {
                let magnitude = v.abs();
                let shortest = if magnitude != 0.0 && !(1e-3..1e7).contains(&magnitude) {
                    format!("{v:e}")
                } else {
                    format!("{v}")
                };
                write_floating(f, *v, shortest)
            }
            Value::String(v) => f.write_str(v),
            Value::Class(v) => write!(f, "class {v}"),
            Value::Array(array) => {
                f.write_str("[")?;
                for (i, item) in array.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(object) => f.write_str(&object.to_java_string()),
        }
    }
}
