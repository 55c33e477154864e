//! Instruction decoding of a `Code` attribute.

use smallvec::SmallVec;

use crate::error::{ClassFileError, ClassFileResult};
use crate::opcode::Opcode;
use crate::reader::ByteReader;

/// Decoded operand. Jump targets are absolute bytecode offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    /// `bipush` / `sipush` immediate.
    Immediate(i32),
    /// Local-variable slot of a load, store or `ret`.
    Local(u16),
    Iinc {
        slot: u16,
        delta: i16,
    },
    /// Constant-pool index (`ldc`, field and method instructions, type instructions).
    Pool(u16),
    Jump(usize),
    /// `tableswitch` and `lookupswitch`, normalised to (key, target) pairs.
    Switch {
        default: usize,
        cases: Vec<(i32, usize)>,
    },
    /// `newarray` element type code.
    ArrayType(u8),
    MultiArray {
        class: u16,
        dimensions: u8,
    },
    InvokeInterface {
        method: u16,
        count: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operand: Operand,
    /// Set when the instruction was prefixed by `wide`.
    pub wide: bool,
}

impl Instruction {
    pub fn jump_target(&self) -> Option<usize> {
        match self.operand {
            Operand::Jump(target) => Some(target),
            _ => None,
        }
    }

    /// Every offset this instruction may transfer control to, besides falling through.
    pub fn branch_targets(&self) -> SmallVec<usize, 2> {
        match &self.operand {
            Operand::Jump(target) => SmallVec::from_iter([*target]),
            Operand::Switch { default, cases } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, target)| *target))
                .collect(),
            _ => SmallVec::new(),
        }
    }
}

fn jump(offset: usize, delta: i64, len: usize) -> ClassFileResult<usize> {
    let target = offset as i64 + delta;
    if target < 0 || target as usize >= len {
        return Err(ClassFileError::BadJumpTarget { offset, target });
    }
    Ok(target as usize)
}

/// Decodes a whole method body in program order.
pub fn decode(bytecode: &[u8]) -> ClassFileResult<Vec<Instruction>> {
    let mut reader = ByteReader::new(bytecode);
    let mut out = Vec::new();
    let len = bytecode.len();

    while reader.has_more() {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let opcode =
            Opcode::from_u8(byte).ok_or(ClassFileError::InvalidOpcode { opcode: byte, offset })?;

        if opcode == Opcode::Wide {
            let inner_byte = reader.read_u8()?;
            let inner = Opcode::from_u8(inner_byte).ok_or(ClassFileError::InvalidOpcode {
                opcode: inner_byte,
                offset: offset + 1,
            })?;
            let operand = match inner {
                Opcode::Iinc => Operand::Iinc {
                    slot: reader.read_u16()?,
                    delta: reader.read_i16()?,
                },
                Opcode::Iload
                | Opcode::Lload
                | Opcode::Fload
                | Opcode::Dload
                | Opcode::Aload
                | Opcode::Istore
                | Opcode::Lstore
                | Opcode::Fstore
                | Opcode::Dstore
                | Opcode::Astore
                | Opcode::Ret => Operand::Local(reader.read_u16()?),
                _ => {
                    return Err(ClassFileError::InvalidOpcode {
                        opcode: inner_byte,
                        offset: offset + 1,
                    });
                }
            };
            out.push(Instruction {
                offset,
                opcode: inner,
                operand,
                wide: true,
            });
            continue;
        }

        let operand = match opcode {
            Opcode::Bipush => Operand::Immediate(reader.read_i8()? as i32),
            Opcode::Sipush => Operand::Immediate(reader.read_i16()? as i32),
            Opcode::Ldc | Opcode::Newarray => {
                let value = reader.read_u8()?;
                if opcode == Opcode::Ldc {
                    Operand::Pool(value as u16)
                } else {
                    Operand::ArrayType(value)
                }
            }
            Opcode::LdcW
            | Opcode::Ldc2W
            | Opcode::Getstatic
            | Opcode::Putstatic
            | Opcode::Getfield
            | Opcode::Putfield
            | Opcode::Invokevirtual
            | Opcode::Invokespecial
            | Opcode::Invokestatic
            | Opcode::New
            | Opcode::Anewarray
            | Opcode::Checkcast
            | Opcode::Instanceof => Operand::Pool(reader.read_u16()?),
            Opcode::Iload
            | Opcode::Lload
            | Opcode::Fload
            | Opcode::Dload
            | Opcode::Aload
            | Opcode::Istore
            | Opcode::Lstore
            | Opcode::Fstore
            | Opcode::Dstore
            | Opcode::Astore
            | Opcode::Ret => Operand::Local(reader.read_u8()? as u16),
            Opcode::Iinc => Operand::Iinc {
                slot: reader.read_u8()? as u16,
                delta: reader.read_i8()? as i16,
            },
            Opcode::GotoW | Opcode::JsrW => {
                Operand::Jump(jump(offset, reader.read_i32()? as i64, len)?)
            }
            op if op.is_jump() => Operand::Jump(jump(offset, reader.read_i16()? as i64, len)?),
            Opcode::Tableswitch | Opcode::Lookupswitch => {
                let padding = (4 - (reader.position() % 4)) % 4;
                reader.skip(padding)?;
                let default = jump(offset, reader.read_i32()? as i64, len)?;
                let mut cases = Vec::new();
                if opcode == Opcode::Tableswitch {
                    let low = reader.read_i32()?;
                    let high = reader.read_i32()?;
                    if high < low {
                        return Err(ClassFileError::MalformedAttribute {
                            name: "Code",
                            reason: format!("tableswitch at {offset} has low {low} > high {high}"),
                        });
                    }
                    for key in low..=high {
                        cases.push((key, jump(offset, reader.read_i32()? as i64, len)?));
                    }
                } else {
                    let pairs = reader.read_i32()?;
                    for _ in 0..pairs.max(0) {
                        let key = reader.read_i32()?;
                        cases.push((key, jump(offset, reader.read_i32()? as i64, len)?));
                    }
                }
                Operand::Switch { default, cases }
            }
            Opcode::Invokeinterface => {
                let method = reader.read_u16()?;
                let count = reader.read_u8()?;
                reader.skip(1)?;
                Operand::InvokeInterface { method, count }
            }
            Opcode::Invokedynamic => {
                let index = reader.read_u16()?;
                reader.skip(2)?;
                Operand::Pool(index)
            }
            Opcode::Multianewarray => Operand::MultiArray {
                class: reader.read_u16()?,
                dimensions: reader.read_u8()?,
            },
            _ => Operand::None,
        };

        out.push(Instruction {
            offset,
            opcode,
            operand,
            wide: false,
        });
    }

    Ok(out)
}
