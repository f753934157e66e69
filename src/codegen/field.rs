//! FieldInfo structure

use super::attribute::{AttributeInfo, NamedAttribute};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<NamedAttribute>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }

    /// Constant-pool index held by the `ConstantValue` attribute.
    pub fn constant_value_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|a| match a.info {
            AttributeInfo::ConstantValue { value_index } => Some(value_index),
            _ => None,
        })
    }

    /// Drop the `ConstantValue` attribute; returns whether one was present.
    pub fn remove_constant_value(&mut self) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| !matches!(a.info, AttributeInfo::ConstantValue { .. }));
        self.attributes.len() != before
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.access_flags.to_be_bytes());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&self.descriptor_index.to_be_bytes());
        bytes.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend_from_slice(&attribute.to_bytes());
        }
        bytes
    }
}
