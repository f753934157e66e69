use crate::codegen::class::ClassFile;
use crate::codegen::constpool::Constant;
use crate::codegen::flag::{access_flags, has};

use super::constant_pool::{self, ConstantPoolVerifyError};
use super::methods::{self, MethodVerifyError};

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Constant pool: {0}")]
    ConstantPool(#[from] ConstantPoolVerifyError),
    #[error("Method {method}: {source}")]
    Method {
        method: String,
        #[source]
        source: MethodVerifyError,
    },
    #[error("Invalid this_class index {0}")]
    InvalidThisClass(u16),
    #[error("Invalid super_class index {0}")]
    InvalidSuperClass(u16),
    #[error("Class declares {0} type initializers")]
    MultipleInitializers(usize),
}

/// Verify the whole ClassFile
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    let all: Vec<usize> = (0..class_file.methods.len()).collect();
    verify_methods(class_file, &all)
}

/// Verify the class-level structure and the methods at `indices`.
pub fn verify_methods(class_file: &ClassFile, indices: &[usize]) -> VerifyResult<()> {
    constant_pool::verify(class_file)?;
    verify_this_class(class_file)?;
    verify_super_class(class_file)?;
    verify_single_initializer(class_file)?;
    for &index in indices {
        let Some(method) = class_file.methods.get(index) else {
            continue;
        };
        methods::verify_method(class_file, method).map_err(|source| VerifyError::Method {
            method: describe(class_file, index),
            source,
        })?;
    }
    Ok(())
}

fn describe(class_file: &ClassFile, index: usize) -> String {
    let method = &class_file.methods[index];
    format!(
        "{}{}",
        class_file.method_name(method).unwrap_or("?"),
        class_file.method_descriptor(method).unwrap_or("")
    )
}

fn verify_this_class(class_file: &ClassFile) -> VerifyResult<()> {
    match class_file.constant_pool.get(class_file.this_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::InvalidThisClass(class_file.this_class)),
    }
}

fn verify_super_class(class_file: &ClassFile) -> VerifyResult<()> {
    let super_class = class_file.super_class;
    let class_is_interface = has(class_file.access_flags, access_flags::ACC_INTERFACE);
    // Only java/lang/Object has no superclass.
    if !class_is_interface && super_class == 0 {
        return Ok(());
    }
    match class_file.constant_pool.get(super_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::InvalidSuperClass(super_class)),
    }
}

fn verify_single_initializer(class_file: &ClassFile) -> VerifyResult<()> {
    use crate::codegen::defs::{STATIC_INITIALIZER_DESCRIPTOR, STATIC_INITIALIZER_METHOD_NAME};
    let count = class_file
        .methods
        .iter()
        .filter(|m| {
            class_file.method_name(m) == Some(STATIC_INITIALIZER_METHOD_NAME)
                && class_file.method_descriptor(m) == Some(STATIC_INITIALIZER_DESCRIPTOR)
        })
        .count();
    if count > 1 {
        return Err(VerifyError::MultipleInitializers(count));
    }
    Ok(())
}
