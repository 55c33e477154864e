//! Constant pool of a class file.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumIter};

use crate::error::{ClassFileError, ClassFileResult};
use crate::reader::ByteReader;
use crate::types::JavaType;

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// Raw constant-pool entry. Indices refer back into the same pool.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Constant {
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// Slot 0 and the second slot of `Long`/`Double` entries.
    Unusable,
}

/// `reference_kind` of a `CONSTANT_MethodHandle`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MethodHandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl MethodHandleKind {
    pub fn from_u8(kind: u8) -> Option<Self> {
        Some(match kind {
            1 => Self::GetField,
            2 => Self::GetStatic,
            3 => Self::PutField,
            4 => Self::PutStatic,
            5 => Self::InvokeVirtual,
            6 => Self::InvokeStatic,
            7 => Self::InvokeSpecial,
            8 => Self::NewInvokeSpecial,
            9 => Self::InvokeInterface,
            _ => return None,
        })
    }

    /// Whether the handle dispatches on a receiver.
    pub fn has_receiver(self) -> bool {
        matches!(
            self,
            Self::GetField
                | Self::PutField
                | Self::InvokeVirtual
                | Self::InvokeSpecial
                | Self::InvokeInterface
        )
    }
}

/// Resolved field or method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub interface: bool,
}

/// A constant that `ldc`, `ldc_w` or `ldc2_w` can push.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Arc<str>),
    Class(JavaType),
    MethodType(Arc<str>),
    MethodHandle { kind: MethodHandleKind, member: MemberRef },
    Dynamic { name: Arc<str>, descriptor: Arc<str> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeDynamicRef {
    pub bootstrap: u16,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> ClassFileResult<Self> {
        let count = reader.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = reader.read_u8()?;
            let entry = match tag {
                TAG_UTF8 => Constant::Utf8(reader.read_modified_utf8()?.into()),
                TAG_INTEGER => Constant::Integer(reader.read_i32()?),
                TAG_FLOAT => Constant::Float(f32::from_bits(reader.read_u32()?)),
                TAG_LONG => Constant::Long(reader.read_i64()?),
                TAG_DOUBLE => Constant::Double(f64::from_bits(reader.read_i64()? as u64)),
                TAG_CLASS => Constant::Class {
                    name: reader.read_u16()?,
                },
                TAG_STRING => Constant::String {
                    value: reader.read_u16()?,
                },
                TAG_FIELDREF => Constant::FieldRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                TAG_METHODREF => Constant::MethodRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: reader.read_u16()?,
                    descriptor: reader.read_u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: reader.read_u8()?,
                    reference: reader.read_u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType {
                    descriptor: reader.read_u16()?,
                },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                TAG_MODULE => Constant::Module {
                    name: reader.read_u16()?,
                },
                TAG_PACKAGE => Constant::Package {
                    name: reader.read_u16()?,
                },
                _ => return Err(ClassFileError::UnknownConstantTag { tag, index }),
            };

            let wide = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries
            .get(index as usize)
            .filter(|c| !c.is_unusable())
    }

    fn bad(index: u16, expected: &'static str) -> ClassFileError {
        ClassFileError::BadConstantIndex { index, expected }
    }

    pub fn utf8(&self, index: u16) -> ClassFileResult<&Arc<str>> {
        match self.get(index) {
            Some(Constant::Utf8(text)) => Ok(text),
            _ => Err(Self::bad(index, "Utf8 entry")),
        }
    }

    /// Internal name stored in a `CONSTANT_Class` entry.
    pub fn class_name(&self, index: u16) -> ClassFileResult<&Arc<str>> {
        match self.get(index) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => Err(Self::bad(index, "Class entry")),
        }
    }

    pub fn class_type(&self, index: u16) -> ClassFileResult<JavaType> {
        Ok(JavaType::from_class_constant(self.class_name(index)?)?)
    }

    pub fn name_and_type(&self, index: u16) -> ClassFileResult<(&Arc<str>, &Arc<str>)> {
        match self.get(index) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(Self::bad(index, "NameAndType entry")),
        }
    }

    /// Resolves a field, method or interface-method reference.
    pub fn member_ref(&self, index: u16) -> ClassFileResult<MemberRef> {
        let (class, name_and_type, interface) = match self.get(index) {
            Some(Constant::FieldRef {
                class,
                name_and_type,
            })
            | Some(Constant::MethodRef {
                class,
                name_and_type,
            }) => (*class, *name_and_type, false),
            Some(Constant::InterfaceMethodRef {
                class,
                name_and_type,
            }) => (*class, *name_and_type, true),
            _ => return Err(Self::bad(index, "member reference")),
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.class_name(class)?.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            interface,
        })
    }

    pub fn invoke_dynamic(&self, index: u16) -> ClassFileResult<InvokeDynamicRef> {
        match self.get(index) {
            Some(Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            }) => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok(InvokeDynamicRef {
                    bootstrap: *bootstrap,
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                })
            }
            _ => Err(Self::bad(index, "InvokeDynamic entry")),
        }
    }

    pub fn method_handle(&self, index: u16) -> ClassFileResult<(MethodHandleKind, MemberRef)> {
        match self.get(index) {
            Some(Constant::MethodHandle { kind, reference }) => {
                let kind =
                    MethodHandleKind::from_u8(*kind).ok_or(Self::bad(index, "MethodHandle kind"))?;
                Ok((kind, self.member_ref(*reference)?))
            }
            _ => Err(Self::bad(index, "MethodHandle entry")),
        }
    }

    /// Resolves an entry that a load-constant instruction may reference.
    pub fn loadable(&self, index: u16) -> ClassFileResult<Loadable> {
        Ok(match self.get(index) {
            Some(Constant::Integer(v)) => Loadable::Int(*v),
            Some(Constant::Float(v)) => Loadable::Float(*v),
            Some(Constant::Long(v)) => Loadable::Long(*v),
            Some(Constant::Double(v)) => Loadable::Double(*v),
            Some(Constant::String { value }) => Loadable::String(self.utf8(*value)?.clone()),
            Some(Constant::Class { .. }) => Loadable::Class(self.class_type(index)?),
            Some(Constant::MethodType { descriptor }) => {
                Loadable::MethodType(self.utf8(*descriptor)?.clone())
            }
            Some(Constant::MethodHandle { .. }) => {
                let (kind, member) = self.method_handle(index)?;
                Loadable::MethodHandle { kind, member }
            }
            Some(Constant::Dynamic { name_and_type, .. }) => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Loadable::Dynamic {
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                }
            }
            _ => return Err(Self::bad(index, "loadable constant")),
        })
    }
}
