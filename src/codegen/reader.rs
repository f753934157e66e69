//! Class-file reader: bytes to [`ClassFile`]

use super::attribute::{
    AttributeInfo, CodeAttribute, ExceptionTableEntry, LineNumberEntry, LocalVariableEntry, NamedAttribute,
};
use super::class::ClassFile;
use super::constpool::{constant_tags::*, Constant, ConstantPool};
use super::defs::{attribute_names, MAGIC};
use super::error::{ClassFormatError, ClassFormatResult};
use super::field::FieldInfo;
use super::frame::{StackMapFrame, StackMapTable, VerificationType};
use super::method::MethodInfo;
use super::mutf8;

/// Big-endian cursor over a byte slice.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> ClassFormatResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(ClassFormatError::Truncated(self.pos)),
        }
    }

    pub fn u8(&mut self) -> ClassFormatResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> ClassFormatResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> ClassFormatResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> ClassFormatResult<i32> {
        Ok(self.u32()? as i32)
    }
}

/// Parse a complete class file.
pub fn read_class(data: &[u8]) -> ClassFormatResult<ClassFile> {
    let mut r = ByteReader::new(data);
    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic(magic));
    }
    let minor_version = r.u16()?;
    let major_version = r.u16()?;
    let constant_pool = read_constant_pool(&mut r)?;
    let access_flags = r.u16()?;
    let this_class = r.u16()?;
    let super_class = r.u16()?;

    let interfaces_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(r.u16()?);
    }

    let fields_count = r.u16()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        let access_flags = r.u16()?;
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attributes = read_attributes(&mut r, &constant_pool)?;
        fields.push(FieldInfo { access_flags, name_index, descriptor_index, attributes });
    }

    let methods_count = r.u16()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        let access_flags = r.u16()?;
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attributes = read_attributes(&mut r, &constant_pool)?;
        methods.push(MethodInfo { access_flags, name_index, descriptor_index, attributes });
    }

    let attributes = read_attributes(&mut r, &constant_pool)?;
    if r.remaining() != 0 {
        return Err(ClassFormatError::TrailingBytes(r.remaining()));
    }

    Ok(ClassFile {
        magic,
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn read_constant_pool(r: &mut ByteReader<'_>) -> ClassFormatResult<ConstantPool> {
    let count = r.u16()?;
    let mut pool = ConstantPool::new();
    let mut index: u16 = 1;
    while index < count {
        let tag = r.u8()?;
        let constant = match tag {
            CONSTANT_UTF8 => {
                let len = r.u16()? as usize;
                let bytes = r.bytes(len)?;
                match mutf8::decode(bytes) {
                    Some(value) => Constant::Utf8(value),
                    None => Constant::RawUtf8(bytes.to_vec()),
                }
            }
            CONSTANT_INTEGER => Constant::Integer(r.i32()?),
            CONSTANT_FLOAT => Constant::Float(f32::from_bits(r.u32()?)),
            CONSTANT_LONG => {
                let hi = r.u32()? as u64;
                let lo = r.u32()? as u64;
                Constant::Long(((hi << 32) | lo) as i64)
            }
            CONSTANT_DOUBLE => {
                let hi = r.u32()? as u64;
                let lo = r.u32()? as u64;
                Constant::Double(f64::from_bits((hi << 32) | lo))
            }
            CONSTANT_CLASS => Constant::Class(r.u16()?),
            CONSTANT_STRING => Constant::String(r.u16()?),
            CONSTANT_FIELDREF => Constant::FieldRef(r.u16()?, r.u16()?),
            CONSTANT_METHODREF => Constant::MethodRef(r.u16()?, r.u16()?),
            CONSTANT_INTERFACEMETHODREF => Constant::InterfaceMethodRef(r.u16()?, r.u16()?),
            CONSTANT_NAMEANDTYPE => Constant::NameAndType(r.u16()?, r.u16()?),
            CONSTANT_METHODHANDLE => Constant::MethodHandle(r.u8()?, r.u16()?),
            CONSTANT_METHODTYPE => Constant::MethodType(r.u16()?),
            CONSTANT_DYNAMIC => Constant::Dynamic(r.u16()?, r.u16()?),
            CONSTANT_INVOKEDYNAMIC => Constant::InvokeDynamic(r.u16()?, r.u16()?),
            CONSTANT_MODULE => Constant::Module(r.u16()?),
            CONSTANT_PACKAGE => Constant::Package(r.u16()?),
            _ => return Err(ClassFormatError::BadConstantTag { tag, index }),
        };
        let width = constant.width() as u16;
        pool.push(constant)?;
        index = index.saturating_add(width);
    }
    Ok(pool)
}

fn read_attributes(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFormatResult<Vec<NamedAttribute>> {
    let count = r.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        attributes.push(read_attribute(r, pool)?);
    }
    Ok(attributes)
}

fn read_attribute(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFormatResult<NamedAttribute> {
    let name_index = r.u16()?;
    let length = r.u32()?;
    let payload = r.bytes(length as usize)?;
    let name = pool.utf8(name_index).unwrap_or("");
    let mut inner = ByteReader::new(payload);
    let info = match name {
        attribute_names::CONSTANT_VALUE => AttributeInfo::ConstantValue { value_index: inner.u16()? },
        attribute_names::CODE => AttributeInfo::Code(read_code(&mut inner, pool)?),
        attribute_names::STACK_MAP_TABLE => AttributeInfo::StackMapTable(read_stack_map_table(&mut inner)?),
        attribute_names::LINE_NUMBER_TABLE => {
            let count = inner.u16()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(LineNumberEntry { start_pc: inner.u16()?, line_number: inner.u16()? });
            }
            AttributeInfo::LineNumberTable(entries)
        }
        attribute_names::LOCAL_VARIABLE_TABLE => AttributeInfo::LocalVariableTable(read_local_variables(&mut inner)?),
        attribute_names::LOCAL_VARIABLE_TYPE_TABLE => {
            AttributeInfo::LocalVariableTypeTable(read_local_variables(&mut inner)?)
        }
        _ => {
            inner.bytes(payload.len())?;
            AttributeInfo::Custom(payload.to_vec())
        }
    };
    if inner.remaining() != 0 {
        return Err(ClassFormatError::AttributeLength {
            name: name.to_string(),
            declared: length,
            actual: inner.position() as u32,
        });
    }
    Ok(NamedAttribute { name_index, info })
}

fn read_code(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassFormatResult<CodeAttribute> {
    let max_stack = r.u16()?;
    let max_locals = r.u16()?;
    let code_length = r.u32()?;
    let code = r.bytes(code_length as usize)?.to_vec();
    let handlers = r.u16()?;
    let mut exception_table = Vec::with_capacity(handlers as usize);
    for _ in 0..handlers {
        exception_table.push(ExceptionTableEntry::new(r.u16()?, r.u16()?, r.u16()?, r.u16()?));
    }
    let attributes = read_attributes(r, pool)?;
    Ok(CodeAttribute { max_stack, max_locals, code, exception_table, attributes })
}

fn read_local_variables(r: &mut ByteReader<'_>) -> ClassFormatResult<Vec<LocalVariableEntry>> {
    let count = r.u16()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(LocalVariableEntry {
            start_pc: r.u16()?,
            length: r.u16()?,
            name_index: r.u16()?,
            descriptor_index: r.u16()?,
            index: r.u16()?,
        });
    }
    Ok(entries)
}

fn read_stack_map_table(r: &mut ByteReader<'_>) -> ClassFormatResult<StackMapTable> {
    let count = r.u16()?;
    let mut frames = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let frame_type = r.u8()?;
        let frame = match frame_type {
            0..=63 => StackMapFrame::Same { offset_delta: frame_type as u16 },
            64..=127 => StackMapFrame::SameLocals1StackItem {
                offset_delta: (frame_type - 64) as u16,
                stack: read_verification_type(r)?,
            },
            247 => StackMapFrame::SameLocals1StackItemExtended {
                offset_delta: r.u16()?,
                stack: read_verification_type(r)?,
            },
            248..=250 => StackMapFrame::Chop { k: 251 - frame_type, offset_delta: r.u16()? },
            251 => StackMapFrame::SameExtended { offset_delta: r.u16()? },
            252..=254 => {
                let offset_delta = r.u16()?;
                let mut locals = Vec::with_capacity((frame_type - 251) as usize);
                for _ in 0..(frame_type - 251) {
                    locals.push(read_verification_type(r)?);
                }
                StackMapFrame::Append { offset_delta, locals }
            }
            255 => {
                let offset_delta = r.u16()?;
                let locals_count = r.u16()?;
                let mut locals = Vec::with_capacity(locals_count as usize);
                for _ in 0..locals_count {
                    locals.push(read_verification_type(r)?);
                }
                let stack_count = r.u16()?;
                let mut stack = Vec::with_capacity(stack_count as usize);
                for _ in 0..stack_count {
                    stack.push(read_verification_type(r)?);
                }
                StackMapFrame::Full { offset_delta, locals, stack }
            }
            _ => return Err(ClassFormatError::BadFrameType(frame_type)),
        };
        frames.push(frame);
    }
    Ok(StackMapTable { frames })
}

fn read_verification_type(r: &mut ByteReader<'_>) -> ClassFormatResult<VerificationType> {
    let tag = r.u8()?;
    Ok(match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(r.u16()?),
        8 => VerificationType::Uninitialized(r.u16()?),
        _ => return Err(ClassFormatError::BadVerificationType(tag)),
    })
}
