//! Template rewriting
//!
//! Turns string constants that embed `` `BuildConfig#<module>#<value>` ``
//! tokens into StringBuilder sequences calling the configured lookup method.
//!
//! - **template**: token pattern and scanning
//! - **catalog**: token to binding map, loaded from per-module JSON assets
//! - **expand**: the instruction sequence for one templated string
//! - **insn_rewriter**: replaces templated `ldc` loads in a method body
//! - **clinit**: moves templated `static final String` constants into `<clinit>`
//! - **class_rewriter**: the per-class pass tying the above together

pub mod catalog;
pub mod class_rewriter;
pub mod clinit;
pub mod expand;
pub mod insn_rewriter;
pub mod template;

pub use catalog::{Catalog, TemplateBinding};
pub use class_rewriter::{
    rewrite_class, scan_class, ClassRewriter, InitializerChange, Rewrite, RewriteSummary, ScanHit, BOOTSTRAP_MEMBER,
};
pub use clinit::{DeferredConstant, InitializerState, InitializerSynthesizer};
pub use expand::{Expander, ExpansionStats};
pub use template::{find_templates, TemplateMatch};
