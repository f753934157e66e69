//! Template token scanning
//!
//! A token looks like `` `BuildConfig#<module>#<value>` ``. The module part is
//! ASCII word characters or `-`; the value is the shortest run up to the next
//! backtick and never crosses a line terminator.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::consts::TEMPLATE_PREFIX;

pub static TEMPLATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`BuildConfig#(?P<module>[A-Za-z0-9_-]+)#(?P<value>[^\n\r\x{85}\x{2028}\x{2029}]+?)`")
        .unwrap_or_else(|e| panic!("invalid template pattern: {}", e))
});

/// One token occurrence inside a string constant. Offsets are byte offsets into
/// the decoded string and always fall on ASCII backticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    pub start_offset: usize,
    pub end_offset: usize,
    pub module_id: String,
    pub raw_token: String,
}

/// All matches in `text`, left to right and non-overlapping.
pub fn find_templates(text: &str) -> Vec<TemplateMatch> {
    TEMPLATE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let module = caps.name("module")?;
            Some(TemplateMatch {
                start_offset: whole.start(),
                end_offset: whole.end(),
                module_id: module.as_str().to_string(),
                raw_token: whole.as_str().to_string(),
            })
        })
        .collect()
}

pub fn contains_template(text: &str) -> bool {
    TEMPLATE_PATTERN.is_match(text)
}

/// `text` is exactly one token and nothing else.
pub fn is_template_token(text: &str) -> bool {
    TEMPLATE_PATTERN.find(text).is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// Wrap a plain value as a token for `module`.
pub fn wrap_value(module: &str, value: &str) -> String {
    format!("`{}#{}#{}`", TEMPLATE_PREFIX, module, value)
}
