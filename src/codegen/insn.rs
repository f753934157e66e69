//! Instruction model for Code arrays.
//!
//! Branch targets are [`Label`]s rather than byte offsets so that
//! instructions can be inserted or replaced without touching the jumps
//! around them. A label decoded from a class file carries the original
//! offset it was created for.

use super::error::{ClassFormatError, ClassFormatResult, CodeError, CodeResult};
use super::opcodes::*;
use super::reader::ByteReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// Marks a position; encodes to nothing.
    Label(Label),
    /// An instruction without operands.
    Op(u8),
    Bipush(i8),
    Sipush(i16),
    /// `ldc` or `ldc_w`, whichever fits the index.
    Ldc(u16),
    Ldc2W(u16),
    /// Local variable load, store or `ret` with an explicit index.
    Var { opcode: u8, index: u16 },
    Iinc { index: u16, delta: i16 },
    Jump { opcode: u8, target: Label },
    TableSwitch { default: Label, low: i32, high: i32, targets: Vec<Label> },
    LookupSwitch { default: Label, pairs: Vec<(i32, Label)> },
    Field { opcode: u8, index: u16 },
    Invoke { opcode: u8, index: u16 },
    InvokeInterface { index: u16, count: u8 },
    InvokeDynamic { index: u16 },
    /// `new`, `anewarray`, `checkcast` or `instanceof`.
    Type { opcode: u8, index: u16 },
    NewArray(u8),
    MultiANewArray { index: u16, dims: u8 },
}

impl Insn {
    /// The opcode this instruction encodes to; `None` for labels.
    pub fn opcode(&self) -> Option<u8> {
        Some(match self {
            Insn::Label(_) => return None,
            Insn::Op(op) => *op,
            Insn::Bipush(_) => BIPUSH,
            Insn::Sipush(_) => SIPUSH,
            Insn::Ldc(index) => {
                if *index <= 0xFF {
                    LDC
                } else {
                    LDC_W
                }
            }
            Insn::Ldc2W(_) => LDC2_W,
            Insn::Var { opcode, .. } => *opcode,
            Insn::Iinc { .. } => IINC,
            Insn::Jump { opcode, .. } => *opcode,
            Insn::TableSwitch { .. } => TABLESWITCH,
            Insn::LookupSwitch { .. } => LOOKUPSWITCH,
            Insn::Field { opcode, .. } | Insn::Invoke { opcode, .. } | Insn::Type { opcode, .. } => *opcode,
            Insn::InvokeInterface { .. } => INVOKEINTERFACE,
            Insn::InvokeDynamic { .. } => INVOKEDYNAMIC,
            Insn::NewArray(_) => NEWARRAY,
            Insn::MultiANewArray { .. } => MULTIANEWARRAY,
        })
    }

    /// Every label this instruction may transfer control to.
    pub fn targets(&self) -> Vec<Label> {
        match self {
            Insn::Jump { target, .. } => vec![*target],
            Insn::TableSwitch { default, targets, .. } => {
                let mut all = Vec::with_capacity(targets.len() + 1);
                all.push(*default);
                all.extend_from_slice(targets);
                all
            }
            Insn::LookupSwitch { default, pairs } => {
                let mut all = Vec::with_capacity(pairs.len() + 1);
                all.push(*default);
                all.extend(pairs.iter().map(|(_, l)| *l));
                all
            }
            _ => Vec::new(),
        }
    }

    /// Encoded size in bytes when the instruction starts at `pos`.
    pub fn encoded_len(&self, pos: u32) -> u32 {
        match self {
            Insn::Label(_) => 0,
            Insn::Op(_) => 1,
            Insn::Bipush(_) | Insn::NewArray(_) => 2,
            Insn::Sipush(_) | Insn::Ldc2W(_) => 3,
            Insn::Ldc(index) => {
                if *index <= 0xFF {
                    2
                } else {
                    3
                }
            }
            Insn::Var { index, .. } => {
                if *index <= 0xFF {
                    2
                } else {
                    4
                }
            }
            Insn::Iinc { index, delta } => {
                if *index <= 0xFF && i8::try_from(*delta).is_ok() {
                    3
                } else {
                    6
                }
            }
            Insn::Jump { opcode, .. } => {
                if matches!(*opcode, GOTO_W | JSR_W) {
                    5
                } else {
                    3
                }
            }
            Insn::TableSwitch { targets, .. } => 1 + switch_padding(pos) + 12 + 4 * targets.len() as u32,
            Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(pos) + 8 + 8 * pairs.len() as u32,
            Insn::Field { .. } | Insn::Invoke { .. } | Insn::Type { .. } => 3,
            Insn::InvokeInterface { .. } | Insn::InvokeDynamic { .. } => 5,
            Insn::MultiANewArray { .. } => 4,
        }
    }

    /// Append the encoding of this instruction, placed at `pos`, to `out`.
    pub fn encode<F>(&self, pos: u32, out: &mut Vec<u8>, resolve: &F) -> CodeResult<()>
    where
        F: Fn(Label) -> CodeResult<u32>,
    {
        let Some(opcode) = self.opcode() else {
            return Ok(());
        };
        match self {
            Insn::Label(_) | Insn::Op(_) => out.push(opcode),
            Insn::Bipush(value) => out.extend_from_slice(&[opcode, *value as u8]),
            Insn::Sipush(value) => {
                out.push(opcode);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Insn::NewArray(atype) => out.extend_from_slice(&[opcode, *atype]),
            Insn::Ldc(index) => {
                out.push(opcode);
                if opcode == LDC {
                    out.push(*index as u8);
                } else {
                    out.extend_from_slice(&index.to_be_bytes());
                }
            }
            Insn::Ldc2W(index)
            | Insn::Field { index, .. }
            | Insn::Invoke { index, .. }
            | Insn::Type { index, .. } => {
                out.push(opcode);
                out.extend_from_slice(&index.to_be_bytes());
            }
            Insn::Var { index, .. } => {
                if *index <= 0xFF {
                    out.extend_from_slice(&[opcode, *index as u8]);
                } else {
                    out.extend_from_slice(&[WIDE, opcode]);
                    out.extend_from_slice(&index.to_be_bytes());
                }
            }
            Insn::Iinc { index, delta } => match i8::try_from(*delta) {
                Ok(small) if *index <= 0xFF => out.extend_from_slice(&[IINC, *index as u8, small as u8]),
                _ => {
                    out.extend_from_slice(&[WIDE, IINC]);
                    out.extend_from_slice(&index.to_be_bytes());
                    out.extend_from_slice(&delta.to_be_bytes());
                }
            },
            Insn::Jump { target, .. } => {
                let target = resolve(*target)?;
                let relative = target as i64 - pos as i64;
                out.push(opcode);
                if matches!(opcode, GOTO_W | JSR_W) {
                    out.extend_from_slice(&(relative as i32).to_be_bytes());
                } else {
                    let short = i16::try_from(relative)
                        .map_err(|_| CodeError::BranchOffsetOverflow { at: pos, target })?;
                    out.extend_from_slice(&short.to_be_bytes());
                }
            }
            Insn::TableSwitch { default, low, high, targets } => {
                out.push(opcode);
                out.resize(out.len() + switch_padding(pos) as usize, 0);
                out.extend_from_slice(&switch_offset(pos, resolve(*default)?).to_be_bytes());
                out.extend_from_slice(&low.to_be_bytes());
                out.extend_from_slice(&high.to_be_bytes());
                for target in targets {
                    out.extend_from_slice(&switch_offset(pos, resolve(*target)?).to_be_bytes());
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                out.push(opcode);
                out.resize(out.len() + switch_padding(pos) as usize, 0);
                out.extend_from_slice(&switch_offset(pos, resolve(*default)?).to_be_bytes());
                out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
                for (key, target) in pairs {
                    out.extend_from_slice(&key.to_be_bytes());
                    out.extend_from_slice(&switch_offset(pos, resolve(*target)?).to_be_bytes());
                }
            }
            Insn::InvokeInterface { index, count } => {
                out.push(opcode);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&[*count, 0]);
            }
            Insn::InvokeDynamic { index } => {
                out.push(opcode);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&[0, 0]);
            }
            Insn::MultiANewArray { index, dims } => {
                out.push(opcode);
                out.extend_from_slice(&index.to_be_bytes());
                out.push(*dims);
            }
        }
        Ok(())
    }
}

fn switch_padding(pos: u32) -> u32 {
    (4 - (pos + 1) % 4) % 4
}

fn switch_offset(pos: u32, target: u32) -> i32 {
    (target as i64 - pos as i64) as i32
}

fn branch_target(pos: u32, relative: i32) -> ClassFormatResult<Label> {
    let target = pos as i64 + relative as i64;
    u32::try_from(target)
        .map(Label)
        .map_err(|_| ClassFormatError::BadOffset(pos))
}

/// Decode a Code array into `(offset, instruction)` pairs. Branch targets are
/// labels named after their absolute offsets; they are not yet checked
/// against instruction boundaries.
pub fn decode_instructions(code: &[u8]) -> ClassFormatResult<Vec<(u32, Insn)>> {
    let mut r = ByteReader::new(code);
    let mut out = Vec::new();
    while r.remaining() > 0 {
        let pos = r.position() as u32;
        let opcode = r.u8()?;
        let insn = match opcode {
            NOP..=DCONST_1 => Insn::Op(opcode),
            BIPUSH => Insn::Bipush(r.u8()? as i8),
            SIPUSH => Insn::Sipush(r.u16()? as i16),
            LDC => Insn::Ldc(r.u8()? as u16),
            LDC_W => Insn::Ldc(r.u16()?),
            LDC2_W => Insn::Ldc2W(r.u16()?),
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var { opcode, index: r.u8()? as u16 },
            ILOAD_0..=SALOAD | ISTORE_0..=LXOR | I2L..=DCMPG => Insn::Op(opcode),
            IINC => Insn::Iinc { index: r.u8()? as u16, delta: r.u8()? as i8 as i16 },
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let relative = r.u16()? as i16 as i32;
                Insn::Jump { opcode, target: branch_target(pos, relative)? }
            }
            GOTO_W | JSR_W => Insn::Jump { opcode, target: branch_target(pos, r.i32()?)? },
            TABLESWITCH => {
                r.bytes(switch_padding(pos) as usize)?;
                let default = branch_target(pos, r.i32()?)?;
                let low = r.i32()?;
                let high = r.i32()?;
                if high < low {
                    return Err(ClassFormatError::BadOpcode { opcode, offset: pos });
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                if count * 4 > r.remaining() {
                    return Err(ClassFormatError::Truncated(r.position()));
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(branch_target(pos, r.i32()?)?);
                }
                Insn::TableSwitch { default, low, high, targets }
            }
            LOOKUPSWITCH => {
                r.bytes(switch_padding(pos) as usize)?;
                let default = branch_target(pos, r.i32()?)?;
                let count = r.u32()? as usize;
                if count.saturating_mul(8) > r.remaining() {
                    return Err(ClassFormatError::Truncated(r.position()));
                }
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = r.i32()?;
                    pairs.push((key, branch_target(pos, r.i32()?)?));
                }
                Insn::LookupSwitch { default, pairs }
            }
            IRETURN..=RETURN | ARRAYLENGTH | ATHROW | MONITORENTER | MONITOREXIT => Insn::Op(opcode),
            GETSTATIC..=PUTFIELD => Insn::Field { opcode, index: r.u16()? },
            INVOKEVIRTUAL..=INVOKESTATIC => Insn::Invoke { opcode, index: r.u16()? },
            INVOKEINTERFACE => {
                let index = r.u16()?;
                let count = r.u8()?;
                r.u8()?;
                Insn::InvokeInterface { index, count }
            }
            INVOKEDYNAMIC => {
                let index = r.u16()?;
                r.u16()?;
                Insn::InvokeDynamic { index }
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Insn::Type { opcode, index: r.u16()? },
            NEWARRAY => Insn::NewArray(r.u8()?),
            WIDE => {
                let widened = r.u8()?;
                match widened {
                    IINC => Insn::Iinc { index: r.u16()?, delta: r.u16()? as i16 },
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var { opcode: widened, index: r.u16()? },
                    _ => return Err(ClassFormatError::BadOpcode { opcode: widened, offset: pos }),
                }
            }
            MULTIANEWARRAY => Insn::MultiANewArray { index: r.u16()?, dims: r.u8()? },
            _ => return Err(ClassFormatError::BadOpcode { opcode, offset: pos }),
        };
        out.push((pos, insn));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(label: Label) -> CodeResult<u32> {
        Ok(label.0)
    }

    #[test]
    fn ldc_picks_the_short_form_when_possible() {
        let mut out = Vec::new();
        Insn::Ldc(0x12).encode(0, &mut out, &identity).unwrap();
        Insn::Ldc(0x1234).encode(2, &mut out, &identity).unwrap();
        assert_eq!(out, vec![LDC, 0x12, LDC_W, 0x12, 0x34]);
    }

    #[test]
    fn decodes_backward_branches() {
        // 0: iconst_0, 1: pop, 2: goto -2
        let code = [0x03, POP, GOTO, 0xFF, 0xFE];
        let insns = decode_instructions(&code).unwrap();
        assert_eq!(insns[2], (2, Insn::Jump { opcode: GOTO, target: Label(0) }));
    }

    #[test]
    fn tableswitch_padding_depends_on_position() {
        // tableswitch at offset 1 needs two padding bytes.
        let insn = Insn::TableSwitch { default: Label(0), low: 0, high: 0, targets: vec![Label(0)] };
        assert_eq!(insn.encoded_len(1), 1 + 2 + 12 + 4);
        assert_eq!(insn.encoded_len(3), 1 + 12 + 4);
        let mut out = vec![NOP];
        insn.encode(1, &mut out, &identity).unwrap();
        assert_eq!(out.len(), 1 + 19);
        let decoded = decode_instructions(&out).unwrap();
        assert_eq!(decoded[1].1, insn);
    }

    #[test]
    fn short_branch_overflow_is_reported() {
        let far = |_: Label| -> CodeResult<u32> { Ok(40_000) };
        let mut out = Vec::new();
        let err = Insn::Jump { opcode: GOTO, target: Label(1) }.encode(0, &mut out, &far).unwrap_err();
        assert_eq!(err, CodeError::BranchOffsetOverflow { at: 0, target: 40_000 });
    }

    #[test]
    fn wide_forms_are_used_for_large_indices() {
        let mut out = Vec::new();
        Insn::Var { opcode: ALOAD, index: 300 }.encode(0, &mut out, &identity).unwrap();
        assert_eq!(out, vec![WIDE, ALOAD, 0x01, 0x2C]);
        let decoded = decode_instructions(&out).unwrap();
        assert_eq!(decoded[0].1, Insn::Var { opcode: ALOAD, index: 300 });
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(
            decode_instructions(&[0xCA]).unwrap_err(),
            ClassFormatError::BadOpcode { opcode: 0xCA, offset: 0 }
        );
    }
}
