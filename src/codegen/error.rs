//! Specific error types for class-file decoding and re-encoding

use thiserror::Error;

/// Errors that can occur during constant pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
}

/// Errors raised while reading a class file or a Code array
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("Bad magic number: 0x{0:08x}")]
    BadMagic(u32),
    #[error("Unexpected end of class data at byte {0}")]
    Truncated(usize),
    #[error("Unknown constant pool tag {tag} at index {index}")]
    BadConstantTag { tag: u8, index: u16 },
    #[error("Attribute '{name}' length {declared} does not match its content ({actual})")]
    AttributeLength { name: String, declared: u32, actual: u32 },
    #[error("Trailing bytes after class data: {0}")]
    TrailingBytes(usize),
    #[error("Unknown opcode 0x{opcode:02x} at offset {offset}")]
    BadOpcode { opcode: u8, offset: u32 },
    #[error("Offset {0} is not on an instruction boundary")]
    BadOffset(u32),
    #[error("Invalid stack map frame type {0}")]
    BadFrameType(u8),
    #[error("Invalid verification type tag {0}")]
    BadVerificationType(u8),
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
}

/// Errors raised while re-encoding an edited instruction list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("Branch at offset {at} cannot reach {target}: 16-bit offset overflow")]
    BranchOffsetOverflow { at: u32, target: u32 },
    #[error("Code length {0} exceeds 65535 bytes")]
    CodeTooLarge(usize),
    #[error("Label {0} is not bound to a position")]
    UnboundLabel(u32),
    #[error("Stack map frames are not in increasing offset order at {0}")]
    FrameOrder(u32),
}

pub type ClassFormatResult<T> = Result<T, ClassFormatError>;
pub type ConstPoolResult<T> = Result<T, ConstPoolError>;
pub type CodeResult<T> = Result<T, CodeError>;
