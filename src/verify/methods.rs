use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::ClassFile;
use crate::codegen::code::MethodBody;
use crate::codegen::constpool::Constant;
use crate::codegen::descriptor::return_descriptor;
use crate::codegen::error::ClassFormatError;
use crate::codegen::flag::{access_flags, has};
use crate::codegen::insn::Insn;
use crate::codegen::method::MethodInfo;
use crate::codegen::opcodes;

use super::stack::{check_max_stack, StackError};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MethodVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Method must have Code attribute unless abstract or native")]
    MissingCodeAttribute,
    #[error("Abstract or native method must not have Code attribute")]
    ForbiddenCodeAttribute,
    #[error("Duplicate method attribute: {0}")]
    DuplicateMethodAttribute(String),
    #[error("Invalid method descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Return opcode does not match descriptor: expected {expected}, found {found}")]
    ReturnMismatch { expected: &'static str, found: String },
    #[error("Undecodable code: {0}")]
    Format(#[from] ClassFormatError),
    #[error("Stack: {0}")]
    Stack(#[from] StackError),
}

pub type Result<T> = std::result::Result<T, MethodVerifyError>;

/// Verify every method of the ClassFile
pub fn verify(class_file: &ClassFile) -> Result<()> {
    for method in &class_file.methods {
        verify_method(class_file, method)?;
    }
    Ok(())
}

/// Verify one method: constant indexes, Code presence, return opcodes and
/// the operand stack.
pub fn verify_method(class_file: &ClassFile, method: &MethodInfo) -> Result<()> {
    verify_utf8_index(class_file, method.name_index)?;
    verify_utf8_index(class_file, method.descriptor_index)?;
    let descriptor = class_file
        .constant_pool
        .utf8(method.descriptor_index)
        .ok_or(MethodVerifyError::InvalidConstantPoolIndexType(method.descriptor_index))?;

    let is_abstract = has(method.access_flags, access_flags::ACC_ABSTRACT);
    let is_native = has(method.access_flags, access_flags::ACC_NATIVE);
    let mut code = None;
    for a in &method.attributes {
        if let AttributeInfo::Code(code_attr) = &a.info {
            if code.is_some() {
                return Err(MethodVerifyError::DuplicateMethodAttribute("Code".to_string()));
            }
            code = Some(code_attr);
        }
    }

    match (code, is_abstract || is_native) {
        (None, true) => Ok(()),
        (Some(_), true) => Err(MethodVerifyError::ForbiddenCodeAttribute),
        (None, false) => Err(MethodVerifyError::MissingCodeAttribute),
        (Some(code_attr), false) => {
            let body = MethodBody::decode(code_attr)?;
            verify_returns(&body, descriptor)?;
            check_max_stack(&body, &class_file.constant_pool, code_attr.max_stack)?;
            Ok(())
        }
    }
}

fn verify_utf8_index(class_file: &ClassFile, index: u16) -> Result<()> {
    match class_file.constant_pool.get(index) {
        Some(Constant::Utf8(_)) => Ok(()),
        None => Err(MethodVerifyError::InvalidConstantPoolIndex(index)),
        _ => Err(MethodVerifyError::InvalidConstantPoolIndexType(index)),
    }
}

fn verify_returns(body: &MethodBody, descriptor: &str) -> Result<()> {
    let (expected_op, expected_name) = expected_return_for_descriptor(descriptor)
        .ok_or_else(|| MethodVerifyError::InvalidDescriptor(descriptor.to_string()))?;
    for insn in &body.insns {
        if let Insn::Op(op) = insn {
            if opcodes::is_return(*op) && *op != expected_op {
                return Err(MethodVerifyError::ReturnMismatch {
                    expected: expected_name,
                    found: return_name(*op).to_string(),
                });
            }
        }
    }
    Ok(())
}

fn expected_return_for_descriptor(descriptor: &str) -> Option<(u8, &'static str)> {
    let ret = return_descriptor(descriptor)?;
    Some(match ret.as_bytes()[0] {
        b'V' => (opcodes::RETURN, "return"),
        b'Z' | b'B' | b'C' | b'S' | b'I' => (opcodes::IRETURN, "ireturn"),
        b'J' => (opcodes::LRETURN, "lreturn"),
        b'F' => (opcodes::FRETURN, "freturn"),
        b'D' => (opcodes::DRETURN, "dreturn"),
        b'L' | b'[' => (opcodes::ARETURN, "areturn"),
        _ => return None,
    })
}

fn return_name(op: u8) -> &'static str {
    match op {
        opcodes::IRETURN => "ireturn",
        opcodes::LRETURN => "lreturn",
        opcodes::FRETURN => "freturn",
        opcodes::DRETURN => "dreturn",
        opcodes::ARETURN => "areturn",
        _ => "return",
    }
}
