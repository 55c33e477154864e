use strum::EnumIs;
use thiserror::Error;

use crate::types::DescriptorError;

pub type ClassFileResult<T> = Result<T, ClassFileError>;

#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum ClassFileError {
    /// The input ended in the middle of a structure.
    #[error("Unexpected end of class file at offset {0}.")]
    UnexpectedEnd(usize),

    /// The input does not start with `0xCAFEBABE`.
    #[error("Bad magic number 0x{0:08x}: the input is not a class file.")]
    BadMagic(u32),

    /// A constant-pool entry uses a tag this reader does not know.
    #[error("Unknown constant pool tag {tag} for entry #{index}.")]
    UnknownConstantTag { tag: u8, index: u16 },

    /// A constant-pool index is out of range or points at an entry of the wrong kind.
    #[error("Constant pool entry #{index} is not a valid {expected}.")]
    BadConstantIndex { index: u16, expected: &'static str },

    /// A `CONSTANT_Utf8` payload is not valid modified UTF-8.
    #[error("Invalid modified UTF-8 string at offset {0}.")]
    InvalidUtf8(usize),

    /// The bytecode contains a byte that is not an opcode.
    #[error("Invalid opcode 0x{opcode:02x} at bytecode offset {offset}.")]
    InvalidOpcode { opcode: u8, offset: usize },

    /// A jump points outside of the method body.
    #[error("Jump at bytecode offset {offset} targets {target}, outside of the method body.")]
    BadJumpTarget { offset: usize, target: i64 },

    /// A type or method descriptor could not be parsed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// An attribute is structurally inconsistent.
    #[error("Malformed `{name}` attribute: {reason}.")]
    MalformedAttribute { name: &'static str, reason: String },
}
