//! Constant pool and constants for Java class files
//!
//! Indices are the class-file indices (1-based). `Long` and `Double` occupy two
//! slots; the second slot is held by [`Constant::Unusable`] so that every
//! index read from a class file keeps addressing the same entry after new
//! constants are appended.

use super::error::{ConstPoolError, ConstPoolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    /// A `CONSTANT_Utf8` whose bytes do not decode to a Rust string.
    RawUtf8(Vec<u8>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
    /// Second slot of a `Long` or `Double`.
    Unusable,
}

pub(crate) mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

impl Constant {
    /// Number of pool slots this constant occupies.
    pub fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// A resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    pub(crate) constants: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new() }
    }

    /// The `constant_pool_count` value written to the class file.
    pub fn count(&self) -> u16 {
        (self.constants.len() + 1) as u16
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.constants.get(index as usize - 1)
    }

    /// Iterate `(index, constant)` pairs, skipping the unusable slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.constants
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| ((i + 1) as u16, c))
    }

    /// Append a constant without looking for an existing equal entry.
    pub fn push(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        let width = constant.width();
        if self.constants.len() + width > u16::MAX as usize - 1 {
            return Err(ConstPoolError::OutOfSpace);
        }
        let index = (self.constants.len() + 1) as u16;
        self.constants.push(constant);
        if width == 2 {
            self.constants.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Return the index of an equal constant, appending it if absent.
    pub fn insert(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        if let Some(index) = self.find(&constant) {
            return Ok(index);
        }
        self.push(constant)
    }

    pub fn find(&self, constant: &Constant) -> Option<u16> {
        self.constants
            .iter()
            .position(|c| c == constant)
            .map(|i| (i + 1) as u16)
    }

    pub fn add_utf8(&mut self, value: &str) -> ConstPoolResult<u16> {
        self.insert(Constant::Utf8(value.to_string()))
    }

    pub fn add_class(&mut self, name: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        self.insert(Constant::Class(name_index))
    }

    pub fn add_string(&mut self, value: &str) -> ConstPoolResult<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.insert(Constant::String(utf8_index))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.insert(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.insert(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.insert(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn add_long(&mut self, value: i64) -> ConstPoolResult<u16> {
        self.insert(Constant::Long(value))
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Utf8(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Text of a `CONSTANT_String`. `None` for other constants and for
    /// strings whose bytes could not be decoded.
    pub fn string_value(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::String(utf8_index)) => self.utf8(*utf8_index),
            _ => None,
        }
    }

    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType(name_index, descriptor_index)) => {
                Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => None,
        }
    }

    /// Resolve a `FieldRef`, `MethodRef` or `InterfaceMethodRef`.
    pub fn member_ref(&self, index: u16) -> Option<MemberRef<'_>> {
        match self.get(index) {
            Some(Constant::FieldRef(class_index, nat_index))
            | Some(Constant::MethodRef(class_index, nat_index))
            | Some(Constant::InterfaceMethodRef(class_index, nat_index)) => {
                let class = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*nat_index)?;
                Some(MemberRef { class, name, descriptor })
            }
            _ => None,
        }
    }
}
