//! Class-file codec
//!
//! Reads JVM class files into an editable model, decodes `Code` attributes into
//! label-addressed instruction lists, and writes both back out.

pub mod attribute;
pub mod class;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod flag;
pub mod frame;
pub mod insn;
pub mod method;
pub mod mutf8;
pub mod opcodes;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use class::ClassFile;
pub use code::MethodBody;
pub use constpool::{Constant, ConstantPool};
pub use error::{ClassFormatError, CodeError, ConstPoolError};
pub use insn::{Insn, Label};
pub use reader::read_class;
pub use writer::{class_file_to_bytes, ClassfileWritable};
