//! Attributes and exception table structures for Java class files
//!
//! Only the attributes that the rewriter must inspect or relocate are decoded;
//! every other attribute is carried as opaque bytes.

use super::constpool::ConstantPool;
use super::defs::attribute_names;
use super::error::ConstPoolResult;
use super::frame::StackMapTable;

#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttribute {
    pub name_index: u16,
    pub info: AttributeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
    ConstantValue { value_index: u16 },
    Code(CodeAttribute),
    StackMapTable(StackMapTable),
    LineNumberTable(Vec<LineNumberEntry>),
    LocalVariableTable(Vec<LocalVariableEntry>),
    LocalVariableTypeTable(Vec<LocalVariableEntry>),
    Custom(Vec<u8>),
}

impl NamedAttribute {
    pub fn new(name_index: u16, info: AttributeInfo) -> Self {
        Self { name_index, info }
    }

    pub fn new_code_attribute(
        constant_pool: &mut ConstantPool,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exception_table: Vec<ExceptionTableEntry>,
        attributes: Vec<NamedAttribute>,
    ) -> ConstPoolResult<Self> {
        let name_index = constant_pool.add_utf8(attribute_names::CODE)?;
        Ok(Self::new(
            name_index,
            AttributeInfo::Code(CodeAttribute { max_stack, max_locals, code, exception_table, attributes }),
        ))
    }

    pub fn new_constant_value(constant_pool: &mut ConstantPool, value_index: u16) -> ConstPoolResult<Self> {
        let name_index = constant_pool.add_utf8(attribute_names::CONSTANT_VALUE)?;
        Ok(Self::new(name_index, AttributeInfo::ConstantValue { value_index }))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.info.to_bytes();
        let mut bytes = Vec::with_capacity(payload.len() + 6);
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        bytes
    }
}

impl AttributeInfo {
    /// Attribute payload, without the name index and length header.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AttributeInfo::ConstantValue { value_index } => value_index.to_be_bytes().to_vec(),
            AttributeInfo::Code(code) => code.to_bytes(),
            AttributeInfo::StackMapTable(table) => table.to_bytes(),
            AttributeInfo::LineNumberTable(entries) => {
                let mut bytes = Vec::with_capacity(2 + entries.len() * 4);
                bytes.extend_from_slice(&(entries.len() as u16).to_be_bytes());
                for entry in entries {
                    bytes.extend_from_slice(&entry.start_pc.to_be_bytes());
                    bytes.extend_from_slice(&entry.line_number.to_be_bytes());
                }
                bytes
            }
            AttributeInfo::LocalVariableTable(entries) | AttributeInfo::LocalVariableTypeTable(entries) => {
                let mut bytes = Vec::with_capacity(2 + entries.len() * 10);
                bytes.extend_from_slice(&(entries.len() as u16).to_be_bytes());
                for entry in entries {
                    bytes.extend_from_slice(&entry.to_bytes());
                }
                bytes
            }
            AttributeInfo::Custom(bytes) => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<NamedAttribute>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self { max_stack, max_locals, code, exception_table: Vec::new(), attributes: Vec::new() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for entry in &self.exception_table {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend_from_slice(&attribute.to_bytes());
        }
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self { start_pc, end_pc, handler_pc, catch_type }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0..2].copy_from_slice(&self.start_pc.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.end_pc.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.handler_pc.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.catch_type.to_be_bytes());
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

/// Entry of a `LocalVariableTable` or `LocalVariableTypeTable`; for the latter
/// `descriptor_index` holds the signature index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

impl LocalVariableEntry {
    pub fn to_bytes(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];
        bytes[0..2].copy_from_slice(&self.start_pc.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.length.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.name_index.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.descriptor_index.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.index.to_be_bytes());
        bytes
    }
}

/// The single `Code` attribute in a method's attribute list, if any.
pub fn find_code(attributes: &[NamedAttribute]) -> Option<&CodeAttribute> {
    attributes.iter().find_map(|a| match &a.info {
        AttributeInfo::Code(code) => Some(code),
        _ => None,
    })
}

