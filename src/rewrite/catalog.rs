//! Template catalog
//!
//! Bindings are keyed by the exact text of the full token. The catalog is
//! built once before any class is rewritten and only read afterwards, so a
//! shared `&Catalog` is all the parallel driver needs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::{Error, Result};
use crate::consts::{CATALOG_EXTENSION, CATALOG_STRING_TYPE};

use super::template::{is_template_token, wrap_value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateBinding {
    pub module_id: String,
    pub key: String,
    /// The full token text; also the fallback handed to the lookup call.
    pub literal_fallback: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    bindings: Vec<TemplateBinding>,
    by_token: HashMap<String, usize>,
}

/// One entry of a module asset as written by the build.
#[derive(Debug, Deserialize)]
struct AssetEntry {
    name: Option<String>,
    #[serde(rename = "type", default)]
    value_type: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = TemplateBinding>,
    {
        let mut catalog = Self::new();
        for binding in bindings {
            catalog.insert(binding);
        }
        catalog
    }

    /// Add a binding. The first binding for a token wins; bindings with a
    /// blank fallback are ignored. Returns whether the binding was kept.
    pub fn insert(&mut self, binding: TemplateBinding) -> bool {
        if binding.literal_fallback.trim().is_empty() {
            return false;
        }
        if let Some(&existing) = self.by_token.get(&binding.literal_fallback) {
            let kept = &self.bindings[existing];
            log::warn!(
                "token {} bound by {}.{} and {}.{}; keeping the first",
                binding.literal_fallback,
                kept.module_id,
                kept.key,
                binding.module_id,
                binding.key
            );
            return false;
        }
        self.by_token.insert(binding.literal_fallback.clone(), self.bindings.len());
        self.bindings.push(binding);
        true
    }

    /// Binding whose token equals `token` exactly.
    pub fn resolve(&self, token: &str) -> Option<&TemplateBinding> {
        self.by_token.get(token).map(|&i| &self.bindings[i])
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateBinding> {
        self.bindings.iter()
    }

    /// Load every `*.json` module asset in `dir` for `variant`. Files are read
    /// in name order so that duplicate tokens resolve the same way every run.
    pub fn load_dir(dir: &Path, variant: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::catalog_error(dir.display().to_string(), "not a directory"));
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == CATALOG_EXTENSION))
            .collect();
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let Some(module) = path.file_stem().and_then(|s| s.to_str()) else {
                log::warn!("skipping catalog file with a non UTF-8 name: {}", path.display());
                continue;
            };
            let json = std::fs::read_to_string(&path)?;
            let bindings = parse_module(module, &json, variant)
                .map_err(|message| Error::catalog_error(path.display().to_string(), message))?;
            log::debug!("catalog {}: {} bindings for variant {}", module, bindings.len(), variant);
            for binding in bindings {
                catalog.insert(binding);
            }
        }
        Ok(catalog)
    }
}

/// Bindings for `variant` in one module asset. A JSON syntax error fails the
/// file; entries of the wrong shape are skipped with a warning.
pub fn parse_module(module: &str, json: &str, variant: &str) -> std::result::Result<Vec<TemplateBinding>, String> {
    let root: serde_json::Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let Some(variants) = root.as_object() else {
        log::warn!("catalog {}: expected an object of variants", module);
        return Ok(Vec::new());
    };
    let Some(entries) = variants.get(variant) else {
        log::debug!("catalog {}: no entries for variant {}", module, variant);
        return Ok(Vec::new());
    };
    let Some(entries) = entries.as_array() else {
        log::warn!("catalog {}: variant {} is not a list", module, variant);
        return Ok(Vec::new());
    };

    let mut bindings = Vec::with_capacity(entries.len());
    for (position, raw) in entries.iter().enumerate() {
        let entry: AssetEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("catalog {}: entry {} skipped: {}", module, position, e);
                continue;
            }
        };
        if entry.value_type.as_deref() != Some(CATALOG_STRING_TYPE) {
            continue;
        }
        let (Some(name), Some(serde_json::Value::String(value))) = (entry.name, entry.value) else {
            log::warn!("catalog {}: entry {} skipped: missing name or string value", module, position);
            continue;
        };
        let literal_fallback = if is_template_token(&value) { value } else { wrap_value(module, &value) };
        bindings.push(TemplateBinding { module_id: module.to_string(), key: name, literal_fallback });
    }
    Ok(bindings)
}
