//! Structural verification of class files
//!
//! Run on every rewritten class before it is written out: constant-pool
//! reference types, class indices, the single type initializer, return
//! opcodes and operand-stack depth of the changed methods.

mod verifier;
pub mod constant_pool;
pub mod methods;
pub mod stack;

pub use constant_pool::ConstantPoolVerifyError;
pub use methods::MethodVerifyError;
pub use stack::{analyze, StackError, StackSummary};
pub use verifier::{verify, verify_methods, VerifyError, VerifyResult};
