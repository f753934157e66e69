//! Type initializer synthesis
//!
//! Deferred constants are assigned in the class's single `<clinit>`: at the
//! entry of the original one if the class has it, otherwise in a new one.

use crate::codegen::constpool::ConstantPool;
use crate::codegen::defs::STRING_DESCRIPTOR;
use crate::codegen::error::ConstPoolResult;
use crate::codegen::insn::Insn;
use crate::codegen::opcodes::{PUTSTATIC, RETURN};

use super::expand::Expander;

/// A `static final String` whose inline constant held a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredConstant {
    pub field_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializerState {
    NotStarted,
    /// The first `<clinit>`, by method index.
    FoundOriginal(usize),
    Synthesizing,
    Finalized,
}

/// What [`InitializerSynthesizer::finalize`] asks the class pass to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// Insert the assignments ahead of the existing initializer's code.
    Prepend { method_index: usize, insns: Vec<Insn> },
    /// Add a new initializer; `insns` already end in `return`.
    Synthesize { insns: Vec<Insn> },
}

#[derive(Debug)]
pub struct InitializerSynthesizer {
    state: InitializerState,
    deferred: Vec<DeferredConstant>,
}

impl Default for InitializerSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl InitializerSynthesizer {
    pub fn new() -> Self {
        Self { state: InitializerState::NotStarted, deferred: Vec::new() }
    }

    pub fn state(&self) -> InitializerState {
        self.state
    }

    pub fn deferred(&self) -> &[DeferredConstant] {
        &self.deferred
    }

    pub fn defer(&mut self, constant: DeferredConstant) {
        self.deferred.push(constant);
    }

    /// Record a `<clinit>` at `method_index`. Only the first one counts;
    /// returns whether this call recorded it.
    pub fn found_original(&mut self, method_index: usize) -> bool {
        if self.state != InitializerState::NotStarted {
            return false;
        }
        self.state = InitializerState::FoundOriginal(method_index);
        true
    }

    /// Turn the deferred constants into assignments. Runs once; later calls
    /// and calls with nothing deferred return `None`.
    pub fn finalize(
        &mut self,
        this_class: &str,
        pool: &mut ConstantPool,
        expander: &mut Expander<'_>,
    ) -> ConstPoolResult<Option<Injection>> {
        let state = self.state;
        if state == InitializerState::Finalized || state == InitializerState::Synthesizing {
            return Ok(None);
        }
        if self.deferred.is_empty() {
            self.state = InitializerState::Finalized;
            return Ok(None);
        }
        if state == InitializerState::NotStarted {
            self.state = InitializerState::Synthesizing;
        }

        let mut insns = Vec::new();
        for constant in std::mem::take(&mut self.deferred) {
            match expander.expand(&constant.text, pool)? {
                Some(expansion) => insns.extend(expansion),
                None => insns.push(Insn::Ldc(pool.add_string(&constant.text)?)),
            }
            let field = pool.add_field_ref(this_class, &constant.field_name, STRING_DESCRIPTOR)?;
            insns.push(Insn::Field { opcode: PUTSTATIC, index: field });
        }
        self.state = InitializerState::Finalized;

        Ok(Some(match state {
            InitializerState::FoundOriginal(method_index) => Injection::Prepend { method_index, insns },
            _ => {
                insns.push(Insn::Op(RETURN));
                Injection::Synthesize { insns }
            }
        }))
    }
}
