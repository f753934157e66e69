use crate::codegen::code::MethodBody;
use crate::codegen::constpool::ConstantPool;
use crate::codegen::error::ConstPoolResult;
use crate::codegen::insn::Insn;
use crate::codegen::opcodes::INVOKESTATIC;

use super::expand::Expander;

/// Whether the load at `position` is the fallback argument of a lookup call
/// emitted by an earlier rewrite.
fn feeds_lookup(insns: &[Insn], position: usize, pool: &ConstantPool, expander: &Expander<'_>) -> bool {
    let next = insns[position + 1..].iter().find(|insn| !matches!(insn, Insn::Label(_)));
    match next {
        Some(Insn::Invoke { opcode: INVOKESTATIC, index }) => expander.is_lookup_call(pool, *index),
        _ => false,
    }
}

/// Replace every string load whose value holds a template by its expansion.
/// Returns the number of loads replaced; the body is untouched when zero.
///
/// Fallback tokens already passed to the lookup method are left as they are,
/// so rewriting an already rewritten body changes nothing.
pub fn rewrite_body(body: &mut MethodBody, pool: &mut ConstantPool, expander: &mut Expander<'_>) -> ConstPoolResult<usize> {
    let mut replaced = 0;
    let mut out: Option<Vec<Insn>> = None;
    for (position, insn) in body.insns.iter().enumerate() {
        let expansion = match insn {
            Insn::Ldc(_) if feeds_lookup(&body.insns, position, pool, expander) => None,
            Insn::Ldc(index) => match pool.string_value(*index).map(str::to_owned) {
                Some(text) => expander.expand(&text, pool)?,
                None => None,
            },
            _ => None,
        };
        match expansion {
            Some(insns) => {
                let out = out.get_or_insert_with(|| {
                    let mut prefix = Vec::with_capacity(body.insns.len() + insns.len());
                    prefix.extend_from_slice(&body.insns[..position]);
                    prefix
                });
                out.extend(insns);
                replaced += 1;
            }
            None => {
                if let Some(out) = out.as_mut() {
                    out.push(insn.clone());
                }
            }
        }
    }
    if let Some(out) = out {
        body.insns = out;
    }
    Ok(replaced)
}
