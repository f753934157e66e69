//! flavorize
//!
//! Build-time flavor delegation for compiled JVM classes. String constants that
//! embed `` `BuildConfig#<module>#<value>` `` tokens are rewritten into
//! StringBuilder sequences that ask a runtime lookup method for the value of the
//! active flavor, so several build variants can share one compiled artifact.
//!
//! ## Architecture
//!
//! - **codegen**: class-file reader and writer, label-addressed instruction codec
//! - **verify**: structural checks and operand-stack analysis of rewritten code
//! - **rewrite**: template scanning, the catalog, and the per-class rewriting pass
//! - **transform**: parallel batch driver over class directories and jars
//! - **common**: configuration, errors and input discovery
//! - **bin**: command-line interface
//!
//! ## Rewriting Flow
//!
//! ```text
//! .class bytes → read_class → fields (defer templated constants)
//!                           → methods (expand templated ldc)
//!                           → <clinit> (assign deferred constants)
//!                           → encode + verify → .class bytes
//! ```

pub mod codegen;
pub mod common;
pub mod consts;
pub mod rewrite;
pub mod transform;
pub mod verify;

pub use common::{Config, Error, LookupTarget, Result};
pub use rewrite::{rewrite_class, Catalog, TemplateBinding};
pub use transform::{TransformReport, Transformer};
