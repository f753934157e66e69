//! Trait-based serialization for classfile structures

use std::io::Write;

use super::class::ClassFile;
use super::constpool::{constant_tags::*, Constant, ConstantPool};
use super::mutf8;

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to_classfile(&mut buffer);
        buffer
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;

        self.constant_pool.write_to_classfile(buffer)?;

        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;

        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }

        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            buffer.write_all(&field.to_bytes())?;
        }

        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            buffer.write_all(&method.to_bytes())?;
        }

        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            buffer.write_all(&attribute.to_bytes())?;
        }
        Ok(())
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.count().to_be_bytes())?;
        for constant in &self.constants {
            constant.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for Constant {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(value) => write_utf8(buffer, &mutf8::encode(value))?,
            Constant::RawUtf8(bytes) => write_utf8(buffer, bytes)?,
            Constant::Integer(value) => {
                buffer.write_all(&[CONSTANT_INTEGER])?;
                buffer.write_all(&value.to_be_bytes())?;
            }
            Constant::Float(value) => {
                buffer.write_all(&[CONSTANT_FLOAT])?;
                buffer.write_all(&value.to_bits().to_be_bytes())?;
            }
            Constant::Long(value) => {
                buffer.write_all(&[CONSTANT_LONG])?;
                buffer.write_all(&value.to_be_bytes())?;
            }
            Constant::Double(value) => {
                buffer.write_all(&[CONSTANT_DOUBLE])?;
                buffer.write_all(&value.to_bits().to_be_bytes())?;
            }
            Constant::Class(index) => write_u16_entry(buffer, CONSTANT_CLASS, *index)?,
            Constant::String(index) => write_u16_entry(buffer, CONSTANT_STRING, *index)?,
            Constant::MethodType(index) => write_u16_entry(buffer, CONSTANT_METHODTYPE, *index)?,
            Constant::Module(index) => write_u16_entry(buffer, CONSTANT_MODULE, *index)?,
            Constant::Package(index) => write_u16_entry(buffer, CONSTANT_PACKAGE, *index)?,
            Constant::FieldRef(a, b) => write_pair_entry(buffer, CONSTANT_FIELDREF, *a, *b)?,
            Constant::MethodRef(a, b) => write_pair_entry(buffer, CONSTANT_METHODREF, *a, *b)?,
            Constant::InterfaceMethodRef(a, b) => write_pair_entry(buffer, CONSTANT_INTERFACEMETHODREF, *a, *b)?,
            Constant::NameAndType(a, b) => write_pair_entry(buffer, CONSTANT_NAMEANDTYPE, *a, *b)?,
            Constant::Dynamic(a, b) => write_pair_entry(buffer, CONSTANT_DYNAMIC, *a, *b)?,
            Constant::InvokeDynamic(a, b) => write_pair_entry(buffer, CONSTANT_INVOKEDYNAMIC, *a, *b)?,
            Constant::MethodHandle(kind, index) => {
                buffer.write_all(&[CONSTANT_METHODHANDLE, *kind])?;
                buffer.write_all(&index.to_be_bytes())?;
            }
            Constant::Unusable => {}
        }
        Ok(())
    }
}

fn write_utf8<W: Write>(buffer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    buffer.write_all(&[CONSTANT_UTF8])?;
    buffer.write_all(&(bytes.len() as u16).to_be_bytes())?;
    buffer.write_all(bytes)
}

fn write_u16_entry<W: Write>(buffer: &mut W, tag: u8, index: u16) -> std::io::Result<()> {
    buffer.write_all(&[tag])?;
    buffer.write_all(&index.to_be_bytes())
}

fn write_pair_entry<W: Write>(buffer: &mut W, tag: u8, first: u16, second: u16) -> std::io::Result<()> {
    buffer.write_all(&[tag])?;
    buffer.write_all(&first.to_be_bytes())?;
    buffer.write_all(&second.to_be_bytes())
}

pub fn class_file_to_bytes(class_file: &ClassFile) -> Vec<u8> {
    class_file.to_classfile_bytes()
}
