//! Expansion of a templated string into a StringBuilder sequence
//!
//! Shared by the instruction rewriter (replacing an `ldc`) and the type
//! initializer synthesizer (initializing a deferred constant). The emitted
//! sequence leaves exactly one `java/lang/String` on the stack.

use crate::codegen::constpool::ConstantPool;
use crate::codegen::defs::{CONSTRUCTOR_METHOD_NAME, STRING_BUILDER_CLASS};
use crate::codegen::error::ConstPoolResult;
use crate::codegen::insn::Insn;
use crate::codegen::opcodes::{DUP, INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL, NEW};
use crate::common::config::LookupTarget;
use crate::consts::{
    NO_ARG_CONSTRUCTOR_DESCRIPTOR, STRING_BUILDER_APPEND, STRING_BUILDER_APPEND_DESCRIPTOR, TO_STRING,
    TO_STRING_DESCRIPTOR,
};

use super::catalog::{Catalog, TemplateBinding};
use super::template::find_templates;

/// A piece of the expanded string, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Lookup { binding: &'a TemplateBinding, token: &'a str },
    /// A token with no binding; emitted as its own text.
    Unresolved(&'a str),
}

/// Split `text` at its tokens. Empty literals are dropped. Returns `None`
/// when `text` holds no token at all.
pub fn plan<'a>(text: &'a str, catalog: &'a Catalog) -> Option<Vec<Segment<'a>>> {
    let matches = find_templates(text);
    if matches.is_empty() {
        return None;
    }
    let mut segments = Vec::with_capacity(matches.len() * 2 + 1);
    let mut cursor = 0;
    for m in &matches {
        if m.start_offset > cursor {
            segments.push(Segment::Literal(&text[cursor..m.start_offset]));
        }
        let token = &text[m.start_offset..m.end_offset];
        match catalog.resolve(token) {
            Some(binding) => segments.push(Segment::Lookup { binding, token }),
            None => {
                log::debug!("unresolved template {} kept as text", token);
                segments.push(Segment::Unresolved(token));
            }
        }
        cursor = m.end_offset;
    }
    if cursor < text.len() {
        segments.push(Segment::Literal(&text[cursor..]));
    }
    Some(segments)
}

/// Whether at least one token in `text` has a catalog binding. A string
/// whose tokens are all unbound renders to its own text and is left as is.
pub fn binds_any(text: &str, catalog: &Catalog) -> bool {
    find_templates(text).iter().any(|m| catalog.resolve(&m.raw_token).is_some())
}

#[derive(Debug, Clone, Copy)]
struct BuilderRefs {
    builder_class: u16,
    init: u16,
    append: u16,
    to_string: u16,
    lookup: u16,
}

/// Expansion statistics for one class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub expansions: usize,
    pub lookups: usize,
    pub unresolved: usize,
}

/// Emits expansions into one class, creating the pool entries it needs once.
pub struct Expander<'a> {
    catalog: &'a Catalog,
    lookup: &'a LookupTarget,
    refs: Option<BuilderRefs>,
    stats: ExpansionStats,
}

impl<'a> Expander<'a> {
    pub fn new(catalog: &'a Catalog, lookup: &'a LookupTarget) -> Self {
        Self { catalog, lookup, refs: None, stats: ExpansionStats::default() }
    }

    pub fn stats(&self) -> &ExpansionStats {
        &self.stats
    }

    fn refs(&mut self, pool: &mut ConstantPool) -> ConstPoolResult<BuilderRefs> {
        if let Some(refs) = self.refs {
            return Ok(refs);
        }
        let refs = BuilderRefs {
            builder_class: pool.add_class(STRING_BUILDER_CLASS)?,
            init: pool.add_method_ref(STRING_BUILDER_CLASS, CONSTRUCTOR_METHOD_NAME, NO_ARG_CONSTRUCTOR_DESCRIPTOR)?,
            append: pool.add_method_ref(STRING_BUILDER_CLASS, STRING_BUILDER_APPEND, STRING_BUILDER_APPEND_DESCRIPTOR)?,
            to_string: pool.add_method_ref(STRING_BUILDER_CLASS, TO_STRING, TO_STRING_DESCRIPTOR)?,
            lookup: pool.add_method_ref(&self.lookup.class_name, &self.lookup.method_name, self.lookup.descriptor())?,
        };
        self.refs = Some(refs);
        Ok(refs)
    }

    /// Whether `index` is a method reference to the configured lookup method.
    pub fn is_lookup_call(&self, pool: &ConstantPool, index: u16) -> bool {
        pool.member_ref(index).is_some_and(|m| {
            m.class == self.lookup.class_name
                && m.name == self.lookup.method_name
                && m.descriptor == self.lookup.descriptor()
        })
    }

    /// Instructions producing the expanded value of `text`, or `None` when it
    /// holds no token with a binding.
    pub fn expand(&mut self, text: &str, pool: &mut ConstantPool) -> ConstPoolResult<Option<Vec<Insn>>> {
        let Some(segments) = plan(text, self.catalog) else {
            return Ok(None);
        };
        if !segments.iter().any(|s| matches!(s, Segment::Lookup { .. })) {
            return Ok(None);
        }
        let refs = self.refs(pool)?;
        let append = Insn::Invoke { opcode: INVOKEVIRTUAL, index: refs.append };

        let mut insns = vec![
            Insn::Type { opcode: NEW, index: refs.builder_class },
            Insn::Op(DUP),
            Insn::Invoke { opcode: INVOKESPECIAL, index: refs.init },
        ];
        for segment in &segments {
            match segment {
                Segment::Literal(literal) => insns.push(Insn::Ldc(pool.add_string(literal)?)),
                Segment::Unresolved(token) => {
                    insns.push(Insn::Ldc(pool.add_string(token)?));
                    self.stats.unresolved += 1;
                }
                Segment::Lookup { binding, token } => {
                    insns.push(Insn::Ldc(pool.add_string(&binding.module_id)?));
                    insns.push(Insn::Ldc(pool.add_string(&binding.key)?));
                    insns.push(Insn::Ldc(pool.add_string(token)?));
                    insns.push(Insn::Invoke { opcode: INVOKESTATIC, index: refs.lookup });
                    self.stats.lookups += 1;
                }
            }
            insns.push(append.clone());
        }
        insns.push(Insn::Invoke { opcode: INVOKEVIRTUAL, index: refs.to_string });
        self.stats.expansions += 1;
        Ok(Some(insns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_bindings([TemplateBinding {
            module_id: "library".into(),
            key: "API_URL".into(),
            literal_fallback: "`BuildConfig#library#https://x`".into(),
        }])
    }

    #[test]
    fn plan_keeps_surrounding_text() {
        let catalog = catalog();
        let segments = plan("url=`BuildConfig#library#https://x`;", &catalog).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Literal("url="));
        assert!(matches!(segments[1], Segment::Lookup { token: "`BuildConfig#library#https://x`", .. }));
        assert_eq!(segments[2], Segment::Literal(";"));
    }

    #[test]
    fn plan_marks_unresolved_tokens() {
        let catalog = catalog();
        let segments = plan("`BuildConfig#other#v`", &catalog).unwrap();
        assert_eq!(segments, vec![Segment::Unresolved("`BuildConfig#other#v`")]);
        assert!(plan("no tokens here", &catalog).is_none());
    }

    #[test]
    fn expansion_shape() {
        let catalog = catalog();
        let lookup = LookupTarget::default();
        let mut pool = ConstantPool::new();
        let mut expander = Expander::new(&catalog, &lookup);
        let insns = expander.expand("a`BuildConfig#library#https://x`", &mut pool).unwrap().unwrap();

        // new, dup, <init>, ldc "a", append, 3x ldc, lookup, append, toString
        assert_eq!(insns.len(), 11);
        assert!(matches!(insns[0], Insn::Type { opcode: NEW, .. }));
        assert_eq!(insns[1], Insn::Op(DUP));
        assert!(matches!(insns[8], Insn::Invoke { opcode: INVOKESTATIC, .. }));
        assert!(matches!(insns[10], Insn::Invoke { opcode: INVOKEVIRTUAL, .. }));

        let Insn::Invoke { index, .. } = insns[8] else { unreachable!() };
        let lookup_ref = pool.member_ref(index).unwrap();
        assert_eq!(lookup_ref.class, "com/android/BuildConfigDelegate");
        assert_eq!(lookup_ref.name, "getString");

        let Insn::Ldc(module) = insns[5] else { unreachable!() };
        assert_eq!(pool.string_value(module), Some("library"));
        assert_eq!(expander.stats().lookups, 1);
    }

    #[test]
    fn pool_entries_are_shared_between_expansions() {
        let catalog = catalog();
        let lookup = LookupTarget::default();
        let mut pool = ConstantPool::new();
        let mut expander = Expander::new(&catalog, &lookup);
        expander.expand("`BuildConfig#library#https://x`", &mut pool).unwrap();
        let count = pool.count();
        expander.expand("`BuildConfig#library#https://x`", &mut pool).unwrap();
        assert_eq!(pool.count(), count);
        assert_eq!(expander.stats().expansions, 2);
    }
    #[test]
    fn unbound_strings_are_not_expanded() {
        let catalog = catalog();
        let lookup = LookupTarget::default();
        let mut pool = ConstantPool::new();
        let mut expander = Expander::new(&catalog, &lookup);
        let count = pool.count();
        assert!(expander.expand("a `BuildConfig#other#v` b", &mut pool).unwrap().is_none());
        assert_eq!(pool.count(), count);
        assert_eq!(expander.stats(), &ExpansionStats::default());

        assert!(!binds_any("a `BuildConfig#other#v` b", &catalog));
        assert!(binds_any("`BuildConfig#other#v``BuildConfig#library#https://x`", &catalog));
    }

    #[test]
    fn unbound_tokens_beside_bound_ones_stay_literal() {
        let catalog = catalog();
        let lookup = LookupTarget::default();
        let mut pool = ConstantPool::new();
        let mut expander = Expander::new(&catalog, &lookup);
        let insns = expander
            .expand("`BuildConfig#other#v``BuildConfig#library#https://x`", &mut pool)
            .unwrap()
            .unwrap();
        let Insn::Ldc(first) = insns[3] else { unreachable!() };
        assert_eq!(pool.string_value(first), Some("`BuildConfig#other#v`"));
        assert_eq!(expander.stats().unresolved, 1);
        assert_eq!(expander.stats().lookups, 1);
    }
}
