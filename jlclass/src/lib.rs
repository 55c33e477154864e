//! Class-file model for the lambda lifter.
//!
//! This crate knows nothing about expressions. It provides the host type model
//! ([`JavaType`] with its widening and boxing tables), the instruction set, a
//! reader for class files and an assembler producing them.

pub mod class_file;
pub mod error;
pub mod insn;
pub mod opcode;
pub mod pool;
pub mod reader;
pub mod types;
pub mod writer;

pub use class_file::{AccessFlags, BootstrapMethod, ClassFile, Code, ExceptionHandler, MethodInfo};
pub use error::{ClassFileError, ClassFileResult};
pub use insn::{Instruction, Operand};
pub use opcode::Opcode;
pub use pool::{ConstantPool, Loadable, MemberRef, MethodHandleKind};
pub use types::{DescriptorError, JavaType, MethodDescriptor, PrimitiveType};
pub use writer::{BootstrapArgument, ClassWriter, CodeBuilder, Label};
