//! Parsed class file.
//!
//! Only the parts the lifter consumes are kept structured: the constant pool,
//! class and member access flags, the `Code` attribute of every method and the
//! class-level `BootstrapMethods` table. Every other attribute is skipped.

use std::sync::Arc;

use bitflags::bitflags;
use log::trace;

use crate::error::{ClassFileError, ClassFileResult};
use crate::insn::{Instruction, decode};
use crate::pool::ConstantPool;
use crate::reader::ByteReader;
use crate::types::{DescriptorError, MethodDescriptor};

pub const MAGIC: u32 = 0xCAFE_BABE;

bitflags! {
    /// Access and property flags shared by classes, fields and methods.
    ///
    /// Some bits are reused with a different meaning depending on the item
    /// (`0x0020` is `ACC_SUPER` on classes and `ACC_SYNCHRONIZED` on methods).
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        /// Not present in source code; generated by the compiler.
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionHandler {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    /// Zero for `finally` handlers.
    pub catch_type: u16,
}

/// Body of a method: the `Code` attribute.
#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Arc<[u8]>,
    pub exception_table: Vec<ExceptionHandler>,
}

impl Code {
    pub fn instructions(&self) -> ClassFileResult<Vec<Instruction>> {
        decode(&self.bytecode)
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access: AccessFlags,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub code: Option<Code>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_synthetic(&self) -> bool {
        self.access.contains(AccessFlags::SYNTHETIC)
    }

    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor, DescriptorError> {
        MethodDescriptor::parse(&self.descriptor)
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access: AccessFlags,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

/// Entry of the `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    /// `CONSTANT_MethodHandle` index.
    pub method: u16,
    /// Loadable constant indices.
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: Arc<str>,
    pub super_class: Option<Arc<str>>,
    pub interfaces: Vec<Arc<str>>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> ClassFileResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        let pool = ConstantPool::read(&mut reader)?;

        let access = AccessFlags::from_bits_retain(reader.read_u16()?);
        let this_class = pool.class_name(reader.read_u16()?)?.clone();
        let super_index = reader.read_u16()?;
        let super_class = match super_index {
            0 => None,
            index => Some(pool.class_name(index)?.clone()),
        };

        let interface_count = reader.read_u16()?;
        let interfaces = (0..interface_count)
            .map(|_| Ok(pool.class_name(reader.read_u16()?)?.clone()))
            .collect::<ClassFileResult<Vec<_>>>()?;

        let field_count = reader.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let access = AccessFlags::from_bits_retain(reader.read_u16()?);
            let name = pool.utf8(reader.read_u16()?)?.clone();
            let descriptor = pool.utf8(reader.read_u16()?)?.clone();
            skip_attributes(&mut reader)?;
            fields.push(FieldInfo {
                access,
                name,
                descriptor,
            });
        }

        let method_count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(read_method(&mut reader, &pool)?);
        }

        let mut bootstrap_methods = Vec::new();
        let attribute_count = reader.read_u16()?;
        for _ in 0..attribute_count {
            let name = pool.utf8(reader.read_u16()?)?.clone();
            let len = reader.read_u32()? as usize;
            let body = reader.read_bytes(len)?;
            if &*name == "BootstrapMethods" {
                bootstrap_methods = read_bootstrap_methods(body)?;
            }
        }

        trace!(
            "parsed class `{this_class}` ({} methods, {} pool entries)",
            methods.len(),
            pool.len()
        );

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            bootstrap_methods,
        })
    }

    pub fn is_synthetic(&self) -> bool {
        self.access.contains(AccessFlags::SYNTHETIC)
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| &*m.name == name && &*m.descriptor == descriptor)
    }

    /// First method with the given name, whatever its descriptor.
    pub fn find_method_by_name(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| &*m.name == name)
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| &*f.name == name)
    }
}

fn skip_attributes(reader: &mut ByteReader<'_>) -> ClassFileResult<()> {
    let count = reader.read_u16()?;
    for _ in 0..count {
        reader.skip(2)?;
        let len = reader.read_u32()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

fn read_method(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFileResult<MethodInfo> {
    let access = AccessFlags::from_bits_retain(reader.read_u16()?);
    let name = pool.utf8(reader.read_u16()?)?.clone();
    let descriptor = pool.utf8(reader.read_u16()?)?.clone();

    let mut code = None;
    let attribute_count = reader.read_u16()?;
    for _ in 0..attribute_count {
        let attribute = pool.utf8(reader.read_u16()?)?.clone();
        let len = reader.read_u32()? as usize;
        let body = reader.read_bytes(len)?;
        if &*attribute == "Code" {
            code = Some(read_code(body)?);
        }
    }

    Ok(MethodInfo {
        access,
        name,
        descriptor,
        code,
    })
}

fn read_code(body: &[u8]) -> ClassFileResult<Code> {
    let mut reader = ByteReader::new(body);
    let max_stack = reader.read_u16()?;
    let max_locals = reader.read_u16()?;
    let code_length = reader.read_u32()? as usize;
    let bytecode: Arc<[u8]> = reader.read_bytes(code_length)?.into();

    let handler_count = reader.read_u16()?;
    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start: reader.read_u16()?,
            end: reader.read_u16()?,
            handler: reader.read_u16()?,
            catch_type: reader.read_u16()?,
        });
    }
    skip_attributes(&mut reader)?;

    if reader.has_more() {
        return Err(ClassFileError::MalformedAttribute {
            name: "Code",
            reason: format!("{} trailing bytes", reader.remaining()),
        });
    }

    Ok(Code {
        max_stack,
        max_locals,
        bytecode,
        exception_table,
    })
}

fn read_bootstrap_methods(body: &[u8]) -> ClassFileResult<Vec<BootstrapMethod>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_u16()?;
    (0..count)
        .map(|_| {
            let method = reader.read_u16()?;
            let argument_count = reader.read_u16()?;
            let arguments = (0..argument_count)
                .map(|_| reader.read_u16())
                .collect::<ClassFileResult<Vec<_>>>()?;
            Ok(BootstrapMethod { method, arguments })
        })
        .collect()
}
