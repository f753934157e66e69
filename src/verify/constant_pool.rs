use crate::codegen::attribute::AttributeInfo;
use crate::codegen::class::ClassFile;
use crate::codegen::constpool::{Constant, ConstantPool};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConstantPoolVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("BootstrapMethods attribute not defined")]
    BootstrapMethodsNotDefined,
    #[error("Constant pool has {0} entries, more than a class file can hold")]
    TooManyConstants(usize),
}

pub type Result<T> = std::result::Result<T, ConstantPoolVerifyError>;

const BOOTSTRAP_METHODS: &str = "BootstrapMethods";

/// Verify the ClassFile ConstantPool
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    if pool.constants.len() >= u16::MAX as usize {
        return Err(ConstantPoolVerifyError::TooManyConstants(pool.constants.len()));
    }
    verify_constant_indexes(class_file, pool)
}

enum Expect {
    Utf8,
    Class,
    NameAndType,
    MemberRef,
}

fn check(pool: &ConstantPool, owner: u16, target: u16, expect: Expect) -> Result<()> {
    let ok = match (pool.get(target), expect) {
        (None, _) => return Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(owner)),
        (Some(Constant::Utf8(_)) | Some(Constant::RawUtf8(_)), Expect::Utf8) => true,
        (Some(Constant::Class(_)), Expect::Class) => true,
        (Some(Constant::NameAndType(_, _)), Expect::NameAndType) => true,
        (
            Some(Constant::FieldRef(_, _)) | Some(Constant::MethodRef(_, _)) | Some(Constant::InterfaceMethodRef(_, _)),
            Expect::MemberRef,
        ) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(owner))
    }
}

fn verify_constant_indexes(class_file: &ClassFile, pool: &ConstantPool) -> Result<()> {
    for (index, constant) in pool.iter() {
        match constant {
            Constant::Class(name_index) | Constant::Module(name_index) | Constant::Package(name_index) => {
                check(pool, index, *name_index, Expect::Utf8)?
            }
            Constant::String(string_index) => check(pool, index, *string_index, Expect::Utf8)?,
            Constant::MethodType(descriptor_index) => check(pool, index, *descriptor_index, Expect::Utf8)?,
            Constant::FieldRef(class_index, nat_index)
            | Constant::MethodRef(class_index, nat_index)
            | Constant::InterfaceMethodRef(class_index, nat_index) => {
                check(pool, index, *class_index, Expect::Class)?;
                check(pool, index, *nat_index, Expect::NameAndType)?;
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                check(pool, index, *name_index, Expect::Utf8)?;
                check(pool, index, *descriptor_index, Expect::Utf8)?;
            }
            Constant::MethodHandle(_kind, reference_index) => check(pool, index, *reference_index, Expect::MemberRef)?,
            Constant::Dynamic(_bsm_index, nat_index) | Constant::InvokeDynamic(_bsm_index, nat_index) => {
                if !has_bootstrap_methods(class_file) {
                    return Err(ConstantPoolVerifyError::BootstrapMethodsNotDefined);
                }
                check(pool, index, *nat_index, Expect::NameAndType)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn has_bootstrap_methods(class_file: &ClassFile) -> bool {
    class_file.attributes.iter().any(|a| {
        matches!(a.info, AttributeInfo::Custom(_)) && class_file.constant_pool.utf8(a.name_index) == Some(BOOTSTRAP_METHODS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_string_is_rejected() {
        let mut cf = ClassFile::new();
        cf.constant_pool.push(Constant::String(9)).unwrap();
        assert_eq!(verify(&cf), Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(1)));
    }

    #[test]
    fn reference_into_a_long_second_slot_is_rejected() {
        let mut cf = ClassFile::new();
        cf.constant_pool.add_long(5).unwrap();
        cf.constant_pool.push(Constant::Class(2)).unwrap();
        assert_eq!(verify(&cf), Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(3)));
    }

    #[test]
    fn well_formed_references_pass() {
        let mut cf = ClassFile::new();
        cf.constant_pool.add_method_ref("a/B", "m", "()V").unwrap();
        cf.constant_pool.add_string("hello").unwrap();
        assert_eq!(verify(&cf), Ok(()));
    }
}
