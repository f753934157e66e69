//! Common utilities shared across modules
//!
//! Configuration, the crate-wide error type and input discovery.

pub mod classpath;
pub mod config;
pub mod error;

// Re-export commonly used items for convenience
pub use classpath::{ClassSelector, ClasspathEntry, ClasspathResolver};
pub use config::{Config, LookupTarget};
pub use error::{Error, Result};
