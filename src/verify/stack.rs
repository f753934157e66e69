//! Operand-stack depth analysis.
//!
//! Walks every path through a method body (branches, switches, `jsr`, and
//! exception handlers entered with the exception on the stack) and records
//! the stack depth at each instruction. Depths are counted in slots, so
//! `long` and `double` values take two.

use crate::codegen::code::MethodBody;
use crate::codegen::constpool::{Constant, ConstantPool};
use crate::codegen::descriptor::{field_slots, method_slots};
use crate::codegen::insn::{Insn, Label};
use crate::codegen::opcodes::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("Stack underflow at instruction {at}: depth {depth}, pops {needed}")]
    Underflow { at: usize, depth: u16, needed: u16 },
    #[error("Inconsistent stack depth at instruction {at}: {expected} on one path, {found} on another")]
    Inconsistent { at: usize, expected: u16, found: u16 },
    #[error("Execution falls off the end of the code")]
    FallsOffEnd,
    #[error("Unresolvable constant pool reference {index} at instruction {at}")]
    BadConstant { at: usize, index: u16 },
    #[error("Jump to unbound label {0}")]
    UnboundLabel(u32),
    #[error("Stack depth {depth} exceeds max_stack {max_stack}")]
    ExceedsMaxStack { depth: u16, max_stack: u16 },
    #[error("Method body is empty")]
    EmptyCode,
}

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSummary {
    /// Deepest stack reached on any path.
    pub max_depth: u16,
    /// Number of instructions reached from the entry or a handler.
    pub reachable: usize,
}

/// Compute the maximum stack depth of `body`.
pub fn analyze(body: &MethodBody, pool: &ConstantPool) -> Result<StackSummary> {
    analyze_depths(body, pool).map(|(summary, _)| summary)
}

/// Like [`analyze`], also returning the entry depth of every instruction
/// (`None` where unreachable).
pub fn analyze_depths(body: &MethodBody, pool: &ConstantPool) -> Result<(StackSummary, Vec<Option<u16>>)> {
    let insns = &body.insns;
    if insns.iter().all(|i| matches!(i, Insn::Label(_))) {
        return Err(StackError::EmptyCode);
    }
    let positions = body.label_positions();
    let position = |label: Label| positions.get(&label).copied().ok_or(StackError::UnboundLabel(label.0));

    let mut depths: Vec<Option<u16>> = vec![None; insns.len()];
    let mut worklist: Vec<(usize, u16)> = vec![(0, 0)];
    for handler in &body.handlers {
        worklist.push((position(handler.handler)?, 1));
    }

    let mut max_depth: u16 = 0;
    while let Some((at, depth)) = worklist.pop() {
        if at >= insns.len() {
            return Err(StackError::FallsOffEnd);
        }
        match depths[at] {
            Some(expected) if expected == depth => continue,
            Some(expected) => return Err(StackError::Inconsistent { at, expected, found: depth }),
            None => depths[at] = Some(depth),
        }

        let insn = &insns[at];
        let (pops, pushes) = effect(insn, pool, at)?;
        if depth < pops {
            return Err(StackError::Underflow { at, depth, needed: pops });
        }
        let after = (depth - pops).saturating_add(pushes);
        max_depth = max_depth.max(depth).max(after);

        match insn {
            Insn::Jump { opcode: GOTO | GOTO_W, target } => worklist.push((position(*target)?, after)),
            Insn::Jump { opcode: JSR | JSR_W, target } => {
                worklist.push((position(*target)?, after));
                worklist.push((at + 1, depth));
            }
            Insn::Jump { target, .. } => {
                worklist.push((position(*target)?, after));
                worklist.push((at + 1, after));
            }
            Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
                for target in insn.targets() {
                    worklist.push((position(target)?, after));
                }
            }
            Insn::Op(opcode) | Insn::Var { opcode, .. } if ends_flow(*opcode) => {}
            _ => worklist.push((at + 1, after)),
        }
    }

    let reachable = depths.iter().filter(|d| d.is_some()).count();
    Ok((StackSummary { max_depth, reachable }, depths))
}

/// Analyze `body` and check the result against a declared `max_stack`.
pub fn check_max_stack(body: &MethodBody, pool: &ConstantPool, max_stack: u16) -> Result<StackSummary> {
    let summary = analyze(body, pool)?;
    if summary.max_depth > max_stack {
        return Err(StackError::ExceedsMaxStack { depth: summary.max_depth, max_stack });
    }
    Ok(summary)
}

/// `(pops, pushes)` of one instruction, in slots.
fn effect(insn: &Insn, pool: &ConstantPool, at: usize) -> Result<(u16, u16)> {
    let bad = |index: u16| StackError::BadConstant { at, index };
    Ok(match insn {
        Insn::Label(_) | Insn::Iinc { .. } => (0, 0),
        Insn::Op(opcode) => op_effect(*opcode),
        Insn::Bipush(_) | Insn::Sipush(_) => (0, 1),
        Insn::Ldc(index) => match pool.get(*index) {
            Some(Constant::Long(_)) | Some(Constant::Double(_)) => (0, 2),
            Some(Constant::Unusable) | None => return Err(bad(*index)),
            Some(_) => (0, 1),
        },
        Insn::Ldc2W(_) => (0, 2),
        Insn::Var { opcode, .. } => match *opcode {
            ILOAD | FLOAD | ALOAD => (0, 1),
            LLOAD | DLOAD => (0, 2),
            ISTORE | FSTORE | ASTORE => (1, 0),
            LSTORE | DSTORE => (2, 0),
            _ => (0, 0), // ret
        },
        Insn::Jump { opcode, .. } => match *opcode {
            IFEQ..=IFLE | IFNULL | IFNONNULL => (1, 0),
            IF_ICMPEQ..=IF_ACMPNE => (2, 0),
            JSR | JSR_W => (0, 1),
            _ => (0, 0),
        },
        Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => (1, 0),
        Insn::Field { opcode, index } => {
            let member = pool.member_ref(*index).ok_or_else(|| bad(*index))?;
            let size = field_slots(member.descriptor).ok_or_else(|| bad(*index))?;
            match *opcode {
                GETSTATIC => (0, size),
                PUTSTATIC => (size, 0),
                GETFIELD => (1, size),
                _ => (1 + size, 0),
            }
        }
        Insn::Invoke { opcode, index } => {
            let member = pool.member_ref(*index).ok_or_else(|| bad(*index))?;
            let (args, ret) = method_slots(member.descriptor).ok_or_else(|| bad(*index))?;
            if *opcode == INVOKESTATIC {
                (args, ret)
            } else {
                (args + 1, ret)
            }
        }
        Insn::InvokeInterface { index, .. } => {
            let member = pool.member_ref(*index).ok_or_else(|| bad(*index))?;
            let (args, ret) = method_slots(member.descriptor).ok_or_else(|| bad(*index))?;
            (args + 1, ret)
        }
        Insn::InvokeDynamic { index } => {
            let descriptor = match pool.get(*index) {
                Some(Constant::InvokeDynamic(_, nat)) => pool.name_and_type(*nat).map(|(_, d)| d),
                _ => None,
            };
            descriptor.and_then(method_slots).ok_or_else(|| bad(*index))?
        }
        Insn::Type { opcode: NEW, .. } => (0, 1),
        Insn::Type { .. } | Insn::NewArray(_) => (1, 1),
        Insn::MultiANewArray { dims, .. } => (*dims as u16, 1),
    })
}

fn op_effect(opcode: u8) -> (u16, u16) {
    match opcode {
        NOP => (0, 0),
        ACONST_NULL..=ICONST_5 | FCONST_0..=FCONST_2 => (0, 1),
        LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 => (0, 2),
        // iload_<n>, fload_<n>, aload_<n>
        0x1A..=0x1D | 0x22..=0x25 | ALOAD_0..=ALOAD_3 => (0, 1),
        // lload_<n>, dload_<n>
        0x1E..=0x21 | 0x26..=0x29 => (0, 2),
        LALOAD | DALOAD => (2, 2),
        IALOAD..=SALOAD => (2, 1),
        // istore_<n>, fstore_<n>, astore_<n>
        0x3B..=0x3E | 0x43..=0x46 | 0x4B..=ASTORE_3 => (1, 0),
        // lstore_<n>, dstore_<n>
        0x3F..=0x42 | 0x47..=0x4A => (2, 0),
        LASTORE | DASTORE => (4, 0),
        IASTORE..=SASTORE => (3, 0),
        POP => (1, 0),
        POP2 => (2, 0),
        DUP => (1, 2),
        DUP_X1 => (2, 3),
        DUP_X2 => (3, 4),
        DUP2 => (2, 4),
        DUP2_X1 => (3, 5),
        DUP2_X2 => (4, 6),
        SWAP => (2, 2),
        // Arithmetic alternates int, long, float, double.
        IADD..=DREM => {
            if (opcode - IADD) % 2 == 0 {
                (2, 1)
            } else {
                (4, 2)
            }
        }
        INEG..=DNEG => {
            if (opcode - INEG) % 2 == 0 {
                (1, 1)
            } else {
                (2, 2)
            }
        }
        ISHL..=LUSHR => {
            if (opcode - ISHL) % 2 == 0 {
                (2, 1)
            } else {
                (3, 2)
            }
        }
        IAND..=LXOR => {
            if (opcode - IAND) % 2 == 0 {
                (2, 1)
            } else {
                (4, 2)
            }
        }
        I2L | I2D | F2L | F2D => (1, 2),
        I2F | F2I => (1, 1),
        L2I | L2F | D2I | D2F => (2, 1),
        L2D | D2L => (2, 2),
        I2B..=I2S => (1, 1),
        LCMP | DCMPL | DCMPG => (4, 1),
        FCMPL | FCMPG => (2, 1),
        IRETURN | FRETURN | ARETURN => (1, 0),
        LRETURN | DRETURN => (2, 0),
        ARRAYLENGTH => (1, 1),
        ATHROW | MONITORENTER | MONITOREXIT => (1, 0),
        _ => (0, 0),
    }
}
