//! Core classfile structure

use super::attribute::{AttributeInfo, NamedAttribute};
use super::constpool::ConstantPool;
use super::defs::{attribute_names, JAVA_8, MAGIC};
use super::error::ClassFormatResult;
use super::field::FieldInfo;
use super::method::MethodInfo;
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<NamedAttribute>,
}

impl ClassFile {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: JAVA_8,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Internal name of this class, e.g. `com/example/Config`.
    pub fn this_class_name(&self) -> Option<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    pub fn method_name(&self, method: &MethodInfo) -> Option<&str> {
        self.constant_pool.utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Option<&str> {
        self.constant_pool.utf8(method.descriptor_index)
    }

    pub fn field_name(&self, field: &FieldInfo) -> Option<&str> {
        self.constant_pool.utf8(field.name_index)
    }

    /// Constant pool indices of the static arguments of every bootstrap
    /// method, in attribute order.
    pub fn bootstrap_arguments(&self) -> ClassFormatResult<Vec<u16>> {
        let mut arguments = Vec::new();
        for attribute in &self.attributes {
            let AttributeInfo::Custom(payload) = &attribute.info else {
                continue;
            };
            if self.constant_pool.utf8(attribute.name_index) != Some(attribute_names::BOOTSTRAP_METHODS) {
                continue;
            }
            let mut reader = ByteReader::new(payload);
            for _ in 0..reader.u16()? {
                let _method_ref = reader.u16()?;
                for _ in 0..reader.u16()? {
                    arguments.push(reader.u16()?);
                }
            }
        }
        Ok(arguments)
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}
