use jlclass::{ClassFileError, Opcode};
use jlexpr::BuildError;
use strum::EnumIs;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single `resolve` or lift. Nothing is retried and no partial
/// expression is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, EnumIs, Error)]
pub enum Error {
    /// The value is not a compiler-generated closure, or it has no functional entry point.
    #[error("`{class}` is not a lambda: {reason}.")]
    NotAClosure { class: String, reason: String },

    /// The body uses an instruction outside of the supported expression sublanguage.
    #[error("Not a lambda expression: opcode {name}{} at bytecode offset {offset} is illegal.", .opcode.map(|o| format!(" (0x{o:02x})")).unwrap_or_default())]
    UnsupportedOpcode {
        opcode: Option<u8>,
        name: &'static str,
        offset: usize,
    },

    /// The lifted code or a smart constructor broke a structural invariant.
    #[error("Invariant violated: {0}")]
    InvariantViolation(#[from] Violation),

    /// Class bytes or a member could not be located.
    #[error("Resource `{resource}` is unavailable: {reason}.")]
    ResourceUnavailable { resource: String, reason: String },
}

impl Error {
    pub(crate) fn opcode(opcode: Opcode, offset: usize) -> Self {
        Error::UnsupportedOpcode {
            opcode: Some(opcode.as_u8()),
            name: opcode.name(),
            offset,
        }
    }

    pub(crate) fn not_a_closure(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NotAClosure {
            class: class.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Error::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Maps a class-file failure while reading `class`. Undefined opcode bytes
    /// are reported as unsupported instructions, everything else as a missing resource.
    pub(crate) fn class_file(class: &str, error: ClassFileError) -> Self {
        match error {
            ClassFileError::InvalidOpcode { opcode, offset } => Error::UnsupportedOpcode {
                opcode: Some(opcode),
                name: "<undefined>",
                offset,
            },
            other => Error::unavailable(class, other),
        }
    }
}

impl From<BuildError> for Error {
    fn from(value: BuildError) -> Self {
        Error::InvariantViolation(Violation::Build(value))
    }
}

/// Broken invariant detected while lifting.
#[derive(Debug, Clone, PartialEq, EnumIs, Error)]
pub enum Violation {
    #[error(transparent)]
    Build(BuildError),

    #[error("the stack is empty at bytecode offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("a branch placeholder was used as a value at bytecode offset {offset}")]
    UnexpectedBranch { offset: usize },

    #[error("bytecode offset {offset} is unreachable")]
    UnreachableCode { offset: usize },

    #[error("the stacks merging at {target} cannot be reduced to a single branch")]
    Irreducible { target: String },

    #[error("the method leaves {count} values on the stack instead of one")]
    FinalStack { count: usize },

    #[error("slot 0 of an instance method was loaded but no receiver is bound")]
    MissingReceiver,

    #[error("constructor call at bytecode offset {offset} does not follow a `new`")]
    MalformedNew { offset: usize },
}
