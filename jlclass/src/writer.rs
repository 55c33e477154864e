//! Class-file assembler.
//!
//! Builds byte-exact class files from typed emitters. The lifter's tests use it
//! to produce the bytecode a Java compiler would emit for a given lambda, and
//! the benchmarks use it to generate large bodies.
//!
//! ```
//! use jlclass::{AccessFlags, ClassFile, ClassWriter, Opcode};
//!
//! let mut class = ClassWriter::new(AccessFlags::PUBLIC, "demo/Adder", "java/lang/Object");
//! class
//!     .method(AccessFlags::STATIC, "add", "(II)I", |code| {
//!         code.op(Opcode::Iload0).op(Opcode::Iload1).op(Opcode::Iadd).op(Opcode::Ireturn);
//!     })
//!     .unwrap();
//! let parsed = ClassFile::parse(&class.to_bytes()).unwrap();
//! assert!(parsed.find_method("add", "(II)I").is_some());
//! ```

use std::collections::HashMap;

use crate::class_file::{AccessFlags, MAGIC};
use crate::error::{ClassFileError, ClassFileResult};
use crate::opcode::Opcode;
use crate::pool::{
    MethodHandleKind, TAG_CLASS, TAG_DOUBLE, TAG_FIELDREF, TAG_FLOAT, TAG_INTEGER,
    TAG_INTERFACE_METHODREF, TAG_INVOKE_DYNAMIC, TAG_LONG, TAG_METHOD_HANDLE, TAG_METHOD_TYPE,
    TAG_METHODREF, TAG_NAME_AND_TYPE, TAG_STRING, TAG_UTF8,
};
use crate::reader::encode_modified_utf8;
use crate::types::{JavaType, MethodDescriptor, PrimitiveType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Ref(u8, u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

/// De-duplicating constant-pool encoder.
#[derive(Debug)]
pub struct ConstantPoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    known: HashMap<PoolKey, u16>,
}

impl Default for ConstantPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            known: HashMap::new(),
        }
    }

    fn intern(&mut self, key: PoolKey, encode: impl FnOnce(&mut Vec<u8>)) -> u16 {
        if let Some(index) = self.known.get(&key) {
            return *index;
        }
        let index = self.next;
        let wide = matches!(key, PoolKey::Long(_) | PoolKey::Double(_));
        encode(&mut self.bytes);
        self.next += if wide { 2 } else { 1 };
        self.known.insert(key, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        self.intern(PoolKey::Utf8(text.to_string()), |out| {
            let encoded = encode_modified_utf8(text);
            out.push(TAG_UTF8);
            out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
            out.extend_from_slice(&encoded);
        })
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.intern(PoolKey::Integer(value), |out| {
            out.push(TAG_INTEGER);
            out.extend_from_slice(&value.to_be_bytes());
        })
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.intern(PoolKey::Float(value.to_bits()), |out| {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&value.to_bits().to_be_bytes());
        })
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.intern(PoolKey::Long(value), |out| {
            out.push(TAG_LONG);
            out.extend_from_slice(&value.to_be_bytes());
        })
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.intern(PoolKey::Double(value.to_bits()), |out| {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&value.to_bits().to_be_bytes());
        })
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.intern(PoolKey::Class(name), |out| {
            out.push(TAG_CLASS);
            out.extend_from_slice(&name.to_be_bytes());
        })
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        self.intern(PoolKey::String(utf8), |out| {
            out.push(TAG_STRING);
            out.extend_from_slice(&utf8.to_be_bytes());
        })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.intern(PoolKey::NameAndType(name, descriptor), |out| {
            out.push(TAG_NAME_AND_TYPE);
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
        })
    }

    fn reference(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        self.intern(PoolKey::Ref(tag, class, name_and_type), |out| {
            out.push(tag);
            out.extend_from_slice(&class.to_be_bytes());
            out.extend_from_slice(&name_and_type.to_be_bytes());
        })
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(TAG_FIELDREF, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(TAG_METHODREF, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(TAG_INTERFACE_METHODREF, owner, name, descriptor)
    }

    pub fn method_handle(
        &mut self,
        kind: MethodHandleKind,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let reference = match kind {
            MethodHandleKind::GetField
            | MethodHandleKind::GetStatic
            | MethodHandleKind::PutField
            | MethodHandleKind::PutStatic => self.field_ref(owner, name, descriptor),
            MethodHandleKind::InvokeInterface => {
                self.interface_method_ref(owner, name, descriptor)
            }
            _ => self.method_ref(owner, name, descriptor),
        };
        let kind = kind as u8;
        self.intern(PoolKey::MethodHandle(kind, reference), |out| {
            out.push(TAG_METHOD_HANDLE);
            out.push(kind);
            out.extend_from_slice(&reference.to_be_bytes());
        })
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor = self.utf8(descriptor);
        self.intern(PoolKey::MethodType(descriptor), |out| {
            out.push(TAG_METHOD_TYPE);
            out.extend_from_slice(&descriptor.to_be_bytes());
        })
    }

    pub fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type = self.name_and_type(name, descriptor);
        self.intern(PoolKey::InvokeDynamic(bootstrap, name_and_type), |out| {
            out.push(TAG_INVOKE_DYNAMIC);
            out.extend_from_slice(&bootstrap.to_be_bytes());
            out.extend_from_slice(&name_and_type.to_be_bytes());
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.next.to_be_bytes());
        out.extend_from_slice(&self.bytes);
    }
}

/// Forward or backward jump target inside one [`CodeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug)]
struct Fixup {
    /// Offset of the instruction the displacement is relative to.
    base: usize,
    /// Where the displacement is written.
    at: usize,
    label: Label,
    wide: bool,
}

#[derive(Debug)]
struct Handler {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: u16,
}

/// Emits the body of one method.
pub struct CodeBuilder<'a> {
    pool: &'a mut ConstantPoolBuilder,
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    handlers: Vec<Handler>,
    max_stack: u16,
    max_locals: u16,
}

impl<'a> CodeBuilder<'a> {
    fn new(pool: &'a mut ConstantPoolBuilder, max_locals: u16) -> Self {
        Self {
            pool,
            code: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            handlers: Vec::new(),
            max_stack: 16,
            max_locals,
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPoolBuilder {
        &mut *self.pool
    }

    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn max_stack(&mut self, value: u16) -> &mut Self {
        self.max_stack = value;
        self
    }

    pub fn max_locals(&mut self, value: u16) -> &mut Self {
        self.max_locals = value;
        self
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current position.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    fn u8(&mut self, value: u8) {
        self.code.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Emits an instruction without operands.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.u8(opcode.as_u8());
        self
    }

    /// Pushes an `int` with the shortest encoding.
    pub fn iconst(&mut self, value: i32) -> &mut Self {
        match value {
            -1..=5 => self.u8((Opcode::Iconst0.as_u8() as i32 + value) as u8),
            -128..=127 => {
                self.u8(Opcode::Bipush.as_u8());
                self.u8(value as i8 as u8);
            }
            -32768..=32767 => {
                self.u8(Opcode::Sipush.as_u8());
                self.code.extend_from_slice(&(value as i16).to_be_bytes());
            }
            _ => {
                let index = self.pool.integer(value);
                self.ldc_index(index);
            }
        }
        self
    }

    pub fn lconst(&mut self, value: i64) -> &mut Self {
        match value {
            0 => self.op(Opcode::Lconst0),
            1 => self.op(Opcode::Lconst1),
            _ => {
                let index = self.pool.long(value);
                self.u8(Opcode::Ldc2W.as_u8());
                self.u16(index);
                self
            }
        }
    }

    pub fn fconst(&mut self, value: f32) -> &mut Self {
        if value.to_bits() == 0.0f32.to_bits() {
            self.op(Opcode::Fconst0)
        } else if value == 1.0 {
            self.op(Opcode::Fconst1)
        } else if value == 2.0 {
            self.op(Opcode::Fconst2)
        } else {
            let index = self.pool.float(value);
            self.ldc_index(index);
            self
        }
    }

    pub fn dconst(&mut self, value: f64) -> &mut Self {
        if value.to_bits() == 0.0f64.to_bits() {
            self.op(Opcode::Dconst0)
        } else if value == 1.0 {
            self.op(Opcode::Dconst1)
        } else {
            let index = self.pool.double(value);
            self.u8(Opcode::Ldc2W.as_u8());
            self.u16(index);
            self
        }
    }

    fn ldc_index(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.u8(Opcode::Ldc.as_u8());
            self.u8(index as u8);
        } else {
            self.u8(Opcode::LdcW.as_u8());
            self.u16(index);
        }
    }

    pub fn ldc_string(&mut self, value: &str) -> &mut Self {
        let index = self.pool.string(value);
        self.ldc_index(index);
        self
    }

    pub fn ldc_class(&mut self, internal_name: &str) -> &mut Self {
        let index = self.pool.class(internal_name);
        self.ldc_index(index);
        self
    }

    /// Raw local-variable instruction (`iload`, `astore`, `ret`, ...), widened when needed.
    pub fn local(&mut self, opcode: Opcode, slot: u16) -> &mut Self {
        if slot > u8::MAX as u16 {
            self.u8(Opcode::Wide.as_u8());
            self.u8(opcode.as_u8());
            self.u16(slot);
        } else {
            self.u8(opcode.as_u8());
            self.u8(slot as u8);
        }
        self
    }

    /// Typed load using the `xload_n` short forms where they exist.
    pub fn load(&mut self, ty: &JavaType, slot: u16) -> &mut Self {
        let (long_form, short_form) = match ty.as_primitive() {
            Some(PrimitiveType::Long) => (Opcode::Lload, Opcode::Lload0),
            Some(PrimitiveType::Float) => (Opcode::Fload, Opcode::Fload0),
            Some(PrimitiveType::Double) => (Opcode::Dload, Opcode::Dload0),
            Some(_) => (Opcode::Iload, Opcode::Iload0),
            None => (Opcode::Aload, Opcode::Aload0),
        };
        if slot <= 3 {
            self.u8(short_form.as_u8() + slot as u8);
            self
        } else {
            self.local(long_form, slot)
        }
    }

    /// Typed return matching `ty`.
    pub fn return_value(&mut self, ty: &JavaType) -> &mut Self {
        let opcode = match ty.as_primitive() {
            Some(PrimitiveType::Void) => Opcode::Return,
            Some(PrimitiveType::Long) => Opcode::Lreturn,
            Some(PrimitiveType::Float) => Opcode::Freturn,
            Some(PrimitiveType::Double) => Opcode::Dreturn,
            Some(_) => Opcode::Ireturn,
            None => Opcode::Areturn,
        };
        self.op(opcode)
    }

    pub fn iinc(&mut self, slot: u16, delta: i16) -> &mut Self {
        if slot > u8::MAX as u16 || delta < i8::MIN as i16 || delta > i8::MAX as i16 {
            self.u8(Opcode::Wide.as_u8());
            self.u8(Opcode::Iinc.as_u8());
            self.u16(slot);
            self.code.extend_from_slice(&delta.to_be_bytes());
        } else {
            self.u8(Opcode::Iinc.as_u8());
            self.u8(slot as u8);
            self.u8(delta as i8 as u8);
        }
        self
    }

    /// Conditional or unconditional jump to `label`.
    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        let base = self.code.len();
        let wide = matches!(opcode, Opcode::GotoW | Opcode::JsrW);
        self.u8(opcode.as_u8());
        self.fixups.push(Fixup {
            base,
            at: self.code.len(),
            label,
            wide,
        });
        if wide {
            self.i32(0);
        } else {
            self.u16(0);
        }
        self
    }

    /// `getfield`, `getstatic`, `putfield` or `putstatic`.
    pub fn field(&mut self, opcode: Opcode, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.field_ref(owner, name, descriptor);
        self.u8(opcode.as_u8());
        self.u16(index);
        self
    }

    /// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`.
    pub fn invoke(&mut self, opcode: Opcode, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        if opcode == Opcode::Invokeinterface {
            let index = self.pool.interface_method_ref(owner, name, descriptor);
            let count = MethodDescriptor::parse(descriptor)
                .map(|d| d.parameter_slots() + 1)
                .unwrap_or(1);
            self.u8(opcode.as_u8());
            self.u16(index);
            self.u8(count as u8);
            self.u8(0);
        } else {
            let index = self.pool.method_ref(owner, name, descriptor);
            self.u8(opcode.as_u8());
            self.u16(index);
        }
        self
    }

    /// `invokedynamic` through the bootstrap method at `bootstrap` (see [`ClassWriter::bootstrap_method`]).
    pub fn invokedynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.invoke_dynamic(bootstrap, name, descriptor);
        self.u8(Opcode::Invokedynamic.as_u8());
        self.u16(index);
        self.u16(0);
        self
    }

    /// `new`, `checkcast`, `instanceof` or `anewarray`.
    pub fn type_op(&mut self, opcode: Opcode, internal_name: &str) -> &mut Self {
        let index = self.pool.class(internal_name);
        self.u8(opcode.as_u8());
        self.u16(index);
        self
    }

    pub fn newarray(&mut self, element_code: u8) -> &mut Self {
        self.u8(Opcode::Newarray.as_u8());
        self.u8(element_code);
        self
    }

    fn switch_padding(&mut self) {
        while self.code.len() % 4 != 0 {
            self.u8(0);
        }
    }

    fn switch_target(&mut self, base: usize, label: Label) {
        self.fixups.push(Fixup {
            base,
            at: self.code.len(),
            label,
            wide: true,
        });
        self.i32(0);
    }

    pub fn tableswitch(&mut self, low: i32, default: Label, targets: &[Label]) -> &mut Self {
        let base = self.code.len();
        self.u8(Opcode::Tableswitch.as_u8());
        self.switch_padding();
        self.switch_target(base, default);
        self.i32(low);
        self.i32(low + targets.len() as i32 - 1);
        for target in targets {
            self.switch_target(base, *target);
        }
        self
    }

    pub fn lookupswitch(&mut self, default: Label, pairs: &[(i32, Label)]) -> &mut Self {
        let base = self.code.len();
        self.u8(Opcode::Lookupswitch.as_u8());
        self.switch_padding();
        self.switch_target(base, default);
        self.i32(pairs.len() as i32);
        for (key, target) in pairs {
            self.i32(*key);
            self.switch_target(base, *target);
        }
        self
    }

    /// Registers an exception-table entry. `catch_type` of `None` is a `finally` handler.
    pub fn try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) -> &mut Self {
        let catch_type = catch_type.map(|c| self.pool.class(c)).unwrap_or(0);
        self.handlers.push(Handler {
            start,
            end,
            handler,
            catch_type,
        });
        self
    }

    fn resolve(&self, label: Label) -> ClassFileResult<usize> {
        self.labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or_else(|| ClassFileError::MalformedAttribute {
                name: "Code",
                reason: format!("label {} is never bound", label.0),
            })
    }

    fn finish(mut self) -> ClassFileResult<Vec<u8>> {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let target = self.resolve(fixup.label)?;
            let delta = target as i64 - fixup.base as i64;
            if fixup.wide {
                self.code[fixup.at..fixup.at + 4].copy_from_slice(&(delta as i32).to_be_bytes());
            } else {
                let delta = i16::try_from(delta).map_err(|_| ClassFileError::MalformedAttribute {
                    name: "Code",
                    reason: format!("jump at {} does not fit in 16 bits", fixup.base),
                })?;
                self.code[fixup.at..fixup.at + 2].copy_from_slice(&delta.to_be_bytes());
            }
        }

        let mut body = Vec::new();
        body.extend_from_slice(&self.max_stack.to_be_bytes());
        body.extend_from_slice(&self.max_locals.to_be_bytes());
        body.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        body.extend_from_slice(&self.code);
        body.extend_from_slice(&(self.handlers.len() as u16).to_be_bytes());
        for handler in &self.handlers {
            for label in [handler.start, handler.end, handler.handler] {
                body.extend_from_slice(&(self.resolve(label)? as u16).to_be_bytes());
            }
            body.extend_from_slice(&handler.catch_type.to_be_bytes());
        }
        body.extend_from_slice(&0u16.to_be_bytes());
        Ok(body)
    }
}

/// Static argument of a bootstrap method.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapArgument {
    String(String),
    Int(i32),
    Class(String),
    MethodType(String),
    MethodHandle {
        kind: MethodHandleKind,
        owner: String,
        name: String,
        descriptor: String,
    },
}

struct MethodEntry {
    access: AccessFlags,
    name: u16,
    descriptor: u16,
    code: Option<Vec<u8>>,
}

/// Assembles a complete class file.
pub struct ClassWriter {
    pool: ConstantPoolBuilder,
    access: AccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<(AccessFlags, u16, u16)>,
    methods: Vec<MethodEntry>,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassWriter {
    pub fn new(access: AccessFlags, name: &str, super_name: &str) -> Self {
        let mut pool = ConstantPoolBuilder::new();
        let this_class = pool.class(name);
        let super_class = pool.class(super_name);
        Self {
            pool,
            access,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPoolBuilder {
        &mut self.pool
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.pool.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn field(&mut self, access: AccessFlags, name: &str, descriptor: &str) -> &mut Self {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        self.fields.push((access, name, descriptor));
        self
    }

    /// Adds a method with a body. Local slots default to the receiver plus parameters.
    pub fn method(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        build: impl FnOnce(&mut CodeBuilder<'_>),
    ) -> ClassFileResult<&mut Self> {
        let parsed = MethodDescriptor::parse(descriptor)?;
        let receiver = usize::from(!access.contains(AccessFlags::STATIC));
        let locals = (parsed.parameter_slots() + receiver) as u16;

        let name_index = self.pool.utf8(name);
        let descriptor_index = self.pool.utf8(descriptor);
        let mut code = CodeBuilder::new(&mut self.pool, locals);
        build(&mut code);
        let body = code.finish()?;

        self.methods.push(MethodEntry {
            access,
            name: name_index,
            descriptor: descriptor_index,
            code: Some(body),
        });
        Ok(self)
    }

    /// Adds a method without a `Code` attribute (abstract or native).
    pub fn abstract_method(&mut self, access: AccessFlags, name: &str, descriptor: &str) -> &mut Self {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        self.methods.push(MethodEntry {
            access: access | AccessFlags::ABSTRACT,
            name,
            descriptor,
            code: None,
        });
        self
    }

    /// Registers a bootstrap method and returns its index for `invokedynamic`.
    pub fn bootstrap_method(
        &mut self,
        kind: MethodHandleKind,
        owner: &str,
        name: &str,
        descriptor: &str,
        arguments: &[BootstrapArgument],
    ) -> u16 {
        let handle = self.pool.method_handle(kind, owner, name, descriptor);
        let arguments = arguments
            .iter()
            .map(|argument| match argument {
                BootstrapArgument::String(s) => self.pool.string(s),
                BootstrapArgument::Int(v) => self.pool.integer(*v),
                BootstrapArgument::Class(c) => self.pool.class(c),
                BootstrapArgument::MethodType(d) => self.pool.method_type(d),
                BootstrapArgument::MethodHandle {
                    kind,
                    owner,
                    name,
                    descriptor,
                } => self.pool.method_handle(*kind, owner, name, descriptor),
            })
            .collect();
        self.bootstrap_methods.push((handle, arguments));
        (self.bootstrap_methods.len() - 1) as u16
    }

    pub fn to_bytes(&mut self) -> Vec<u8> {
        let code_name = self.pool.utf8("Code");
        let bootstrap_name =
            (!self.bootstrap_methods.is_empty()).then(|| self.pool.utf8("BootstrapMethods"));

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        self.pool.write(&mut out);
        out.extend_from_slice(&self.access.bits().to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (access, name, descriptor) in &self.fields {
            out.extend_from_slice(&access.bits().to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.access.bits().to_be_bytes());
            out.extend_from_slice(&method.name.to_be_bytes());
            out.extend_from_slice(&method.descriptor.to_be_bytes());
            match &method.code {
                Some(body) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&code_name.to_be_bytes());
                    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                    out.extend_from_slice(body);
                }
                None => out.extend_from_slice(&0u16.to_be_bytes()),
            }
        }

        match bootstrap_name {
            Some(name) => {
                let mut body = Vec::new();
                body.extend_from_slice(&(self.bootstrap_methods.len() as u16).to_be_bytes());
                for (handle, arguments) in &self.bootstrap_methods {
                    body.extend_from_slice(&handle.to_be_bytes());
                    body.extend_from_slice(&(arguments.len() as u16).to_be_bytes());
                    for argument in arguments {
                        body.extend_from_slice(&argument.to_be_bytes());
                    }
                }
                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                out.extend_from_slice(&body);
            }
            None => out.extend_from_slice(&0u16.to_be_bytes()),
        }

        out
    }
}
