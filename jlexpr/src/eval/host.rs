use std::collections::HashMap;
use std::sync::Arc;

use jlclass::{JavaType, PrimitiveType, types};
use log::debug;
use parking_lot::RwLock;

use super::Host;
use crate::error::EvalError;
use crate::member::{MemberHandle, MemberKind};
use crate::value::Value;

/// Implementation of a registered member: receives the instance (if any) and the arguments.
pub type HostFunction =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Host with built-in support for strings, wrappers and a few `Math` helpers.
///
/// Members it does not know can be registered with [`StandardHost::register`].
/// Lookup order is: registered members, then the [`HostObject`](crate::HostObject)
/// receiving the call, then the built-ins.
#[derive(Default)]
pub struct StandardHost {
    members: RwLock<HashMap<MemberHandle, HostFunction>>,
}

impl StandardHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the implementation of a field, method or constructor.
    pub fn register<F>(&self, member: MemberHandle, function: F)
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        debug!("Registering host member {member:?}");
        self.members.write().insert(member, Arc::new(function));
    }

    fn registered(&self, member: &MemberHandle) -> Option<HostFunction> {
        self.members.read().get(member).cloned()
    }
}

impl std::fmt::Debug for StandardHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardHost")
            .field("members", &self.members.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn no_such_member(member: &MemberHandle) -> EvalError {
    EvalError::NoSuchMember {
        member: format!("{member:?}"),
    }
}

impl Host for StandardHost {
    fn get_field(&self, member: &MemberHandle, instance: Option<&Value>) -> Result<Value, EvalError> {
        if let Some(function) = self.registered(member) {
            return function(instance, &[]);
        }
        if let Some(Value::Object(object)) = instance {
            if let Some(value) = object.get_field(member.name()) {
                return Ok(value);
            }
        }
        match (member.owner(), member.name()) {
            ("java/lang/Boolean", "TRUE") => Ok(Value::Boolean(true)),
            ("java/lang/Boolean", "FALSE") => Ok(Value::Boolean(false)),
            _ => Err(no_such_member(member)),
        }
    }

    fn invoke(
        &self,
        member: &MemberHandle,
        instance: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        if let Some(function) = self.registered(member) {
            return function(instance, args);
        }
        let builtin = match instance {
            Some(Value::Object(object)) => match object.invoke(member, args) {
                Some(result) => return result,
                None => object_method(member, instance, args),
            },
            Some(Value::String(s)) => string_method(member, s, args),
            Some(value) => wrapper_method(member, value, args),
            None => static_method(member, args),
        };
        builtin.unwrap_or_else(|| Err(no_such_member(member)))
    }

    fn construct(&self, member: &MemberHandle, args: &[Value]) -> Result<Value, EvalError> {
        if let Some(function) = self.registered(member) {
            return function(None, args);
        }
        match (member.owner(), member.descriptor()) {
            (types::STRING, "()V") => Ok(Value::string("")),
            (types::STRING, "(Ljava/lang/String;)V") => match args {
                [Value::String(s)] => Ok(Value::String(s.clone())),
                _ => Err(no_such_member(member)),
            },
            _ => Err(no_such_member(member)),
        }
    }

    fn is_instance(&self, value: &Value, ty: &JavaType) -> bool {
        match value {
            Value::Null => false,
            Value::Object(object) => object.is_instance_of(ty),
            other => other
                .runtime_type()
                .is_some_and(|runtime| ty.is_assignable_from(&runtime)),
        }
    }
}

type Builtin = Option<Result<Value, EvalError>>;

fn object_method(member: &MemberHandle, instance: Option<&Value>, args: &[Value]) -> Builtin {
    let this = instance?;
    Some(Ok(match (member.name(), member.descriptor(), args) {
        ("equals", "(Ljava/lang/Object;)Z", [other]) => Value::Boolean(this == other),
        ("hashCode", "()I", []) => Value::Int(java_hash(this)),
        ("toString", "()Ljava/lang/String;", []) => Value::string(this.to_java_string()),
        _ => return None,
    }))
}

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn string_index(index: i64, length: usize) -> EvalError {
    EvalError::Host(format!(
        "StringIndexOutOfBoundsException: index {index}, length {length}"
    ))
}

fn substring(s: &str, begin: i64, end: Option<i64>) -> Result<Value, EvalError> {
    let units = utf16(s);
    let end = end.unwrap_or(units.len() as i64);
    if begin < 0 || end > units.len() as i64 || begin > end {
        return Err(string_index(if begin < 0 { begin } else { end }, units.len()));
    }
    Ok(Value::string(String::from_utf16_lossy(
        &units[begin as usize..end as usize],
    )))
}

fn char_to_string(c: u16) -> String {
    String::from_utf16_lossy(&[c])
}

fn string_method(member: &MemberHandle, s: &Arc<str>, args: &[Value]) -> Builtin {
    let instance = Value::String(s.clone());
    let result = match (member.name(), member.descriptor(), args) {
        ("length", "()I", []) => Value::Int(utf16(s).len() as i32),
        ("isEmpty", "()Z", []) => Value::Boolean(s.is_empty()),
        ("charAt", "(I)C", [index]) => {
            let units = utf16(s);
            let index = index.as_i64()?;
            return Some(
                usize::try_from(index)
                    .ok()
                    .and_then(|i| units.get(i).copied())
                    .map(Value::Char)
                    .ok_or_else(|| string_index(index, units.len())),
            );
        }
        ("substring", "(I)Ljava/lang/String;", [begin]) => {
            return Some(substring(s, begin.as_i64()?, None));
        }
        ("substring", "(II)Ljava/lang/String;", [begin, end]) => {
            return Some(substring(s, begin.as_i64()?, Some(end.as_i64()?)));
        }
        ("toUpperCase", "()Ljava/lang/String;", []) => Value::string(s.to_uppercase()),
        ("toLowerCase", "()Ljava/lang/String;", []) => Value::string(s.to_lowercase()),
        ("trim", "()Ljava/lang/String;", []) => {
            Value::string(s.trim_matches(|c: char| c <= ' '))
        }
        ("startsWith", "(Ljava/lang/String;)Z", [prefix]) => {
            Value::Boolean(s.starts_with(non_null(prefix)?))
        }
        ("endsWith", "(Ljava/lang/String;)Z", [suffix]) => {
            Value::Boolean(s.ends_with(non_null(suffix)?))
        }
        ("contains", "(Ljava/lang/CharSequence;)Z", [needle]) => {
            Value::Boolean(s.contains(non_null(needle)?))
        }
        ("indexOf", "(Ljava/lang/String;)I", [needle]) => {
            Value::Int(match s.find(non_null(needle)?) {
                Some(byte) => s[..byte].encode_utf16().count() as i32,
                None => -1,
            })
        }
        ("indexOf", "(I)I", [c]) => {
            let c = c.as_i64()?;
            Value::Int(
                utf16(s)
                    .iter()
                    .position(|unit| *unit as i64 == c)
                    .map_or(-1, |i| i as i32),
            )
        }
        ("concat", "(Ljava/lang/String;)Ljava/lang/String;", [other]) => {
            Value::string(format!("{s}{}", non_null(other)?))
        }
        ("replace", "(CC)Ljava/lang/String;", [from, to]) => {
            let (from, to) = (from.as_i64()? as u16, to.as_i64()? as u16);
            let replaced: Vec<u16> = utf16(s)
                .into_iter()
                .map(|unit| if unit == from { to } else { unit })
                .collect();
            Value::string(String::from_utf16_lossy(&replaced))
        }
        (
            "replace",
            "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
            [from, to],
        ) => Value::string(s.replace(non_null(from)?, non_null(to)?)),
        ("compareTo", "(Ljava/lang/String;)I" | "(Ljava/lang/Object;)I", [other]) => {
            Value::Int(compare_strings(s, non_null(other)?))
        }
        ("equalsIgnoreCase", "(Ljava/lang/String;)Z", [other]) => Value::Boolean(
            other
                .as_str()
                .is_some_and(|other| other.to_lowercase() == s.to_lowercase()),
        ),
        _ => return object_method(member, Some(&instance), args),
    };
    Some(Ok(result))
}

fn non_null(value: &Value) -> Option<&str> {
    value.as_str()
}

/// `String.compareTo`: lexicographic on UTF-16 units, then by length.
fn compare_strings(a: &str, b: &str) -> i32 {
    let (a, b) = (utf16(a), utf16(b));
    for (x, y) in a.iter().zip(&b) {
        if x != y {
            return *x as i32 - *y as i32;
        }
    }
    a.len() as i32 - b.len() as i32
}

fn wrapper_method(member: &MemberHandle, value: &Value, args: &[Value]) -> Builtin {
    if args.is_empty() {
        if let Some(p) = types::unboxing_method(member.owner(), member.name(), member.descriptor())
        {
            return value.cast(p).map(Ok);
        }
    }
    match (member.name(), args) {
        ("compareTo", [other]) => {
            let ordering = match (value.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b)? as i32,
                _ => (value.as_bool()? as i32) - (other.as_bool()? as i32),
            };
            Some(Ok(Value::Int(ordering)))
        }
        _ => object_method(member, Some(value), args),
    }
}

fn static_method(member: &MemberHandle, args: &[Value]) -> Builtin {
    if member.kind() != MemberKind::MethodAccess {
        return None;
    }
    if let Some(p) = types::boxing_method(member.owner(), member.name(), member.descriptor()) {
        return args.first()?.cast(p).map(Ok);
    }

    let result = match (member.owner(), member.name(), args) {
        ("java/lang/Math", "abs", [value]) => match value {
            Value::Int(v) => Value::Int(v.wrapping_abs()),
            Value::Long(v) => Value::Long(v.wrapping_abs()),
            Value::Float(v) => Value::Float(v.abs()),
            Value::Double(v) => Value::Double(v.abs()),
            _ => return None,
        },
        ("java/lang/Math", name @ ("max" | "min"), [a, b]) => {
            let max = name == "max";
            match (a, b) {
                (Value::Int(x), Value::Int(y)) => Value::Int(if max { *x.max(y) } else { *x.min(y) }),
                (Value::Long(x), Value::Long(y)) => {
                    Value::Long(if max { *x.max(y) } else { *x.min(y) })
                }
                (Value::Float(x), Value::Float(y)) => Value::Float(if max { x.max(*y) } else { x.min(*y) }),
                (Value::Double(x), Value::Double(y)) => {
                    Value::Double(if max { x.max(*y) } else { x.min(*y) })
                }
                _ => return None,
            }
        }
        (types::STRING, "valueOf", [value]) => match member.descriptor() {
            "(C)Ljava/lang/String;" => Value::string(char_to_string(value.as_i64()? as u16)),
            _ => Value::string(value.to_java_string()),
        },
        ("java/lang/Integer", "parseInt", [Value::String(s)]) => {
            return Some(s.trim_start_matches('+').parse::<i32>().map(Value::Int).map_err(
                |_| EvalError::Host(format!("NumberFormatException: For input string: \"{s}\"")),
            ));
        }
        ("java/lang/Long", "parseLong", [Value::String(s)]) => {
            return Some(s.trim_start_matches('+').parse::<i64>().map(Value::Long).map_err(
                |_| EvalError::Host(format!("NumberFormatException: For input string: \"{s}\"")),
            ));
        }
        ("java/lang/Integer" | "java/lang/Long" | "java/lang/Character", "compare", [a, b]) => {
            Value::Int((a.as_i64()?).cmp(&b.as_i64()?) as i32)
        }
        ("java/lang/Integer", "toString", [value]) => Value::string(value.as_i32()?.to_string()),
        ("java/lang/Character", "isDigit", [c]) => Value::Boolean(
            char::from_u32(c.as_i64()? as u32).is_some_and(|c| c.is_ascii_digit()),
        ),
        ("java/lang/Character", "isLetter", [c]) => {
            Value::Boolean(char::from_u32(c.as_i64()? as u32).is_some_and(char::is_alphabetic))
        }
        (owner, "toString", [value]) if PrimitiveType::from_wrapper(owner).is_some() => {
            Value::string(value.to_java_string())
        }
        _ => return None,
    };
    Some(Ok(result))
}

/// `Object.hashCode` for the built-in value kinds.
fn java_hash(value: &Value) -> i32 {
    match value {
        Value::Null => 0,
        Value::Boolean(b) => {
            if *b {
                1231
            } else {
                1237
            }
        }
        Value::Byte(v) => *v as i32,
        Value::Char(v) => *v as i32,
        Value::Short(v) => *v as i32,
        Value::Int(v) => *v,
        Value::Long(v) => (*v ^ ((*v as u64) >> 32) as i64) as i32,
        Value::Float(v) => v.to_bits() as i32,
        Value::Double(v) => {
            let bits = v.to_bits();
            (bits ^ (bits >> 32)) as i32
        }
        Value::String(s) => s
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32)),
        Value::Class(ty) => java_hash(&Value::string(ty.to_string())),
        Value::Array(array) => Arc::as_ptr(array) as usize as i32,
        Value::Object(object) => Arc::as_ptr(object) as *const () as usize as i32,
    }
}
