//! Per-class rewriting pass
//!
//! Fields first, then methods in declaration order, then the type
//! initializer. Changed bodies are re-encoded with a freshly analyzed
//! `max_stack` and the class is verified before it is handed back. Any error
//! leaves the caller with the original bytes.

use std::collections::{BTreeMap, BTreeSet};

use crate::codegen::attribute::NamedAttribute;
use crate::codegen::class::ClassFile;
use crate::codegen::code::MethodBody;
use crate::codegen::constpool::{Constant, ConstantPool};
use crate::codegen::defs::{STATIC_INITIALIZER_DESCRIPTOR, STATIC_INITIALIZER_METHOD_NAME, STRING_DESCRIPTOR};
use crate::codegen::flag::{access_flags, has};
use crate::codegen::insn::{decode_instructions, Insn};
use crate::codegen::method::MethodInfo;
use crate::codegen::reader::read_class;
use crate::codegen::writer::class_file_to_bytes;
use crate::common::config::Config;
use crate::common::error::{Error, Result};
use crate::verify::{stack, verify_methods};

use super::catalog::Catalog;
use super::clinit::{DeferredConstant, InitializerSynthesizer, Injection};
use super::expand::{binds_any, ExpansionStats, Expander};
use super::insn_rewriter::rewrite_body;
use super::template::{contains_template, find_templates};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializerChange {
    /// Assignments were added at the entry of the existing `<clinit>`.
    Extended,
    /// A new `<clinit>` was appended.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    pub class_name: String,
    pub rewritten_loads: usize,
    pub deferred_constants: usize,
    pub changed_methods: Vec<String>,
    pub initializer: Option<InitializerChange>,
    pub stats: ExpansionStats,
}

#[derive(Debug)]
pub enum Rewrite {
    Unchanged(ClassFile),
    Rewritten { class_file: ClassFile, summary: RewriteSummary },
}

pub struct ClassRewriter<'a> {
    catalog: &'a Catalog,
    config: &'a Config,
}

impl<'a> ClassRewriter<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a Config) -> Self {
        Self { catalog, config }
    }

    pub fn rewrite(&self, mut class_file: ClassFile) -> Result<Rewrite> {
        if !has_templated_string(&class_file.constant_pool) {
            return Ok(Rewrite::Unchanged(class_file));
        }
        let class_name = class_file
            .this_class_name()
            .map(str::to_owned)
            .ok_or_else(|| Error::rewrite_error("<unknown>", "this_class is not a class constant"))?;

        let bootstrap = bootstrap_strings(&class_name, &class_file);
        let mut loaded = BTreeSet::new();

        let mut expander = Expander::new(self.catalog, &self.config.lookup);
        let mut synthesizer = InitializerSynthesizer::new();
        let mut pending: BTreeMap<usize, MethodBody> = BTreeMap::new();
        let mut rewritten_loads = 0;

        let ClassFile { constant_pool: pool, fields, methods, .. } = &mut class_file;

        for field in fields.iter_mut() {
            if !has(field.access_flags, access_flags::ACC_STATIC) || !has(field.access_flags, access_flags::ACC_FINAL) {
                continue;
            }
            if pool.utf8(field.descriptor_index) != Some(STRING_DESCRIPTOR) {
                continue;
            }
            let Some(text) = field.constant_value_index().and_then(|i| pool.string_value(i)) else {
                continue;
            };
            if !binds_any(text, self.catalog) {
                continue;
            }
            let field_name = pool
                .utf8(field.name_index)
                .ok_or_else(|| Error::rewrite_error(&class_name, format!("bad field name index {}", field.name_index)))?;
            log::debug!("{}: deferring {} to the type initializer", class_name, field_name);
            synthesizer.defer(DeferredConstant { field_name: field_name.to_string(), text: text.to_string() });
            field.remove_constant_value();
        }
        let deferred_constants = synthesizer.deferred().len();

        for (index, method) in methods.iter().enumerate() {
            if is_static_initializer(pool, method) && !synthesizer.found_original(index) {
                log::warn!("{}: ignoring additional type initializer at method {}", class_name, index);
                continue;
            }
            let Some(code) = method.code() else {
                continue;
            };
            let mut body = MethodBody::decode(code)?;
            loaded.extend(body.insns.iter().filter_map(|insn| match insn {
                Insn::Ldc(index) => Some(*index),
                _ => None,
            }));
            let replaced = rewrite_body(&mut body, pool, &mut expander)?;
            if replaced > 0 {
                rewritten_loads += replaced;
                pending.insert(index, body);
            }
        }

        for index in bootstrap.difference(&loaded) {
            if let Some(text) = pool.string_value(*index).filter(|t| contains_template(t)) {
                log::warn!("{}: template in bootstrap argument #{} is not rewritten: {:?}", class_name, index, text);
            }
        }

        let mut initializer = None;
        match synthesizer.finalize(&class_name, pool, &mut expander)? {
            Some(Injection::Prepend { method_index, insns }) => {
                if !pending.contains_key(&method_index) {
                    let code = methods[method_index]
                        .code()
                        .ok_or_else(|| Error::rewrite_error(&class_name, "type initializer has no code"))?;
                    pending.insert(method_index, MethodBody::decode(code)?);
                }
                if let Some(body) = pending.get_mut(&method_index) {
                    body.prepend(insns);
                }
                initializer = Some(InitializerChange::Extended);
            }
            Some(Injection::Synthesize { insns }) => {
                let name_index = pool.add_utf8(STATIC_INITIALIZER_METHOD_NAME)?;
                let descriptor_index = pool.add_utf8(STATIC_INITIALIZER_DESCRIPTOR)?;
                pending.insert(methods.len(), MethodBody::from_insns(0, insns));
                methods.push(MethodInfo::new(access_flags::ACC_STATIC, name_index, descriptor_index));
                initializer = Some(InitializerChange::Synthesized);
            }
            None => {}
        }

        if pending.is_empty() {
            return Ok(Rewrite::Unchanged(class_file));
        }

        let mut changed_methods = Vec::with_capacity(pending.len());
        for (index, mut body) in pending {
            let method_name = describe(pool, &methods[index]);
            let dropped = body.strip_opaque_attributes();
            if !dropped.is_empty() {
                let names: Vec<&str> = dropped.iter().map(|&i| pool.utf8(i).unwrap_or("?")).collect();
                log::warn!("{}.{}: dropping code attributes {:?}", class_name, method_name, names);
            }
            let summary = stack::analyze(&body, pool)
                .map_err(|e| Error::rewrite_error(&class_name, format!("{}: {}", method_name, e)))?;
            let max_stack = body.max_stack.max(summary.max_depth);
            let code = body.encode(max_stack)?;
            let method = &mut methods[index];
            if method.code().is_some() {
                method.replace_code(code);
            } else {
                method.attributes.push(NamedAttribute::new_code_attribute(
                    pool,
                    code.max_stack,
                    code.max_locals,
                    code.code,
                    code.exception_table,
                    code.attributes,
                )?);
            }
            changed_methods.push((index, method_name));
        }

        let indices: Vec<usize> = changed_methods.iter().map(|(i, _)| *i).collect();
        verify_methods(&class_file, &indices)?;

        let summary = RewriteSummary {
            class_name,
            rewritten_loads,
            deferred_constants,
            changed_methods: changed_methods.into_iter().map(|(_, name)| name).collect(),
            initializer,
            stats: expander.stats().clone(),
        };
        log::debug!(
            "{}: {} loads rewritten, {} constants deferred",
            summary.class_name,
            summary.rewritten_loads,
            summary.deferred_constants
        );
        Ok(Rewrite::Rewritten { class_file, summary })
    }

    /// Rewrite serialized class bytes; `None` when the class is unchanged.
    pub fn rewrite_bytes(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let class_file = read_class(bytes)?;
        match self.rewrite(class_file)? {
            Rewrite::Unchanged(_) => Ok(None),
            Rewrite::Rewritten { class_file, .. } => Ok(Some(class_file_to_bytes(&class_file))),
        }
    }
}

/// Rewrite one serialized class; `None` when nothing needed to change.
pub fn rewrite_class(bytes: &[u8], catalog: &Catalog, config: &Config) -> Result<Option<Vec<u8>>> {
    ClassRewriter::new(catalog, config).rewrite_bytes(bytes)
}

/// A template occurrence found by [`scan_class`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHit {
    /// `name:descriptor` of a field, `namedescriptor` of a method, or
    /// [`BOOTSTRAP_MEMBER`] for a bootstrap method argument.
    pub member: String,
    /// Bytecode offset of the load; `None` for a field constant.
    pub offset: Option<u32>,
    pub text: String,
    pub tokens: Vec<String>,
}

/// Member name given to hits in `invokedynamic` bootstrap arguments.
pub const BOOTSTRAP_MEMBER: &str = "BootstrapMethods";

/// List template occurrences in string loads, inline field constants and
/// bootstrap method arguments.
pub fn scan_class(bytes: &[u8]) -> Result<(String, Vec<ScanHit>)> {
    let class_file = read_class(bytes)?;
    let pool = &class_file.constant_pool;
    let class_name = class_file.this_class_name().unwrap_or("<unknown>").to_string();
    let mut hits = Vec::new();
    if !has_templated_string(pool) {
        return Ok((class_name, hits));
    }
    let hit = |member: String, offset: Option<u32>, text: &str| ScanHit {
        member,
        offset,
        text: text.to_string(),
        tokens: find_templates(text).into_iter().map(|m| m.raw_token).collect(),
    };

    for field in &class_file.fields {
        if let Some(text) = field.constant_value_index().and_then(|i| pool.string_value(i)) {
            if contains_template(text) {
                let member = format!(
                    "{}:{}",
                    pool.utf8(field.name_index).unwrap_or("?"),
                    pool.utf8(field.descriptor_index).unwrap_or("?")
                );
                hits.push(hit(member, None, text));
            }
        }
    }
    for method in &class_file.methods {
        let Some(code) = method.code() else {
            continue;
        };
        for (offset, insn) in decode_instructions(&code.code)? {
            if let Insn::Ldc(index) = insn {
                if let Some(text) = pool.string_value(index).filter(|t| contains_template(t)) {
                    hits.push(hit(describe(pool, method), Some(offset), text));
                }
            }
        }
    }
    for index in bootstrap_strings(&class_name, &class_file) {
        if let Some(text) = pool.string_value(index).filter(|t| contains_template(t)) {
            hits.push(hit(BOOTSTRAP_MEMBER.to_string(), None, text));
        }
    }
    Ok((class_name, hits))
}

/// Whether any `CONSTANT_String` in the pool carries a template.
fn has_templated_string(pool: &ConstantPool) -> bool {
    pool.iter().any(|(_, constant)| match constant {
        Constant::String(index) => pool.utf8(*index).is_some_and(contains_template),
        _ => false,
    })
}

/// Distinct bootstrap argument indices. A malformed attribute is reported
/// and treated as empty; it is carried through unchanged either way.
fn bootstrap_strings(class_name: &str, class_file: &ClassFile) -> BTreeSet<u16> {
    match class_file.bootstrap_arguments() {
        Ok(arguments) => arguments.into_iter().collect(),
        Err(e) => {
            log::warn!("{}: unreadable BootstrapMethods attribute: {}", class_name, e);
            BTreeSet::new()
        }
    }
}

fn is_static_initializer(pool: &ConstantPool, method: &MethodInfo) -> bool {
    pool.utf8(method.name_index) == Some(STATIC_INITIALIZER_METHOD_NAME)
        && pool.utf8(method.descriptor_index) == Some(STATIC_INITIALIZER_DESCRIPTOR)
}

fn describe(pool: &ConstantPool, method: &MethodInfo) -> String {
    format!(
        "{}{}",
        pool.utf8(method.name_index).unwrap_or("?"),
        pool.utf8(method.descriptor_index).unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_without_templates_are_unchanged() {
        let mut class_file = ClassFile::new();
        class_file.this_class = class_file.constant_pool.add_class("com/example/Plain").unwrap();
        class_file.constant_pool.add_string("just text").unwrap();
        let before = class_file.clone();

        let catalog = Catalog::new();
        let config = Config::default();
        match ClassRewriter::new(&catalog, &config).rewrite(class_file).unwrap() {
            Rewrite::Unchanged(class_file) => assert_eq!(class_file, before),
            Rewrite::Rewritten { .. } => panic!("plain class was rewritten"),
        }
    }

    #[test]
    fn templates_outside_string_constants_are_ignored() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("`BuildConfig#lib#NAME`").unwrap();
        assert!(!has_templated_string(&pool));
        pool.add_string("`BuildConfig#lib#NAME`").unwrap();
        assert!(has_templated_string(&pool));
    }
}
