use thiserror::Error;

use crate::codegen::error::{ClassFormatError, CodeError, ConstPoolError};
use crate::verify::VerifyError;

/// Result type for flavorize operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the flavorize rewriter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Class format error: {0}")]
    ClassFormat(#[from] ClassFormatError),

    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),

    #[error("Code error: {0}")]
    Code(#[from] CodeError),

    #[error("Rewrite error in {class}: {message}")]
    Rewrite { class: String, message: String },

    #[error("Catalog error in {path}: {message}")]
    Catalog { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Create a rewrite error for a class
    pub fn rewrite_error(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rewrite { class: class.into(), message: message.into() }
    }

    /// Create a catalog error for an asset path
    pub fn catalog_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog { path: path.into(), message: message.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}
