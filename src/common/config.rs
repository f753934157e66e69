//! Rewriter configuration
//!
//! Defaults, then `FLAVORIZE_*` environment overrides, then command-line flags.

use crate::consts::{
    DEFAULT_EXCLUDED_CLASSES, DEFAULT_LOOKUP_CLASS, DEFAULT_LOOKUP_METHOD, ENV_EXCLUDE, ENV_JOBS, ENV_LOOKUP_CLASS,
    ENV_LOOKUP_METHOD, LOOKUP_DESCRIPTOR,
};

use super::error::{Error, Result};

/// The static method emitted for every resolved template token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTarget {
    /// Internal name, e.g. `com/android/BuildConfigDelegate`.
    pub class_name: String,
    pub method_name: String,
}

impl LookupTarget {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self { class_name: internal_name(&class_name.into()), method_name: method_name.into() }
    }

    pub fn descriptor(&self) -> &'static str {
        LOOKUP_DESCRIPTOR
    }

    /// File name of the lookup class, e.g. `BuildConfigDelegate.class`.
    pub fn class_file_name(&self) -> String {
        let simple = self.class_name.rsplit('/').next().unwrap_or(&self.class_name);
        format!("{}.class", simple)
    }
}

impl Default for LookupTarget {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_CLASS, DEFAULT_LOOKUP_METHOD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub lookup: LookupTarget,
    /// Class file names never offered to the rewriter.
    pub excluded_classes: Vec<String>,
    /// Worker threads for the batch driver; `None` uses rayon's default.
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup: LookupTarget::default(),
            excluded_classes: DEFAULT_EXCLUDED_CLASSES.iter().map(|s| s.to_string()).collect(),
            jobs: None,
        }
    }
}

impl Config {
    /// Defaults with the process environment applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (the environment, in practice).
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(class) = var(ENV_LOOKUP_CLASS).filter(|v| !v.trim().is_empty()) {
            self.lookup.class_name = internal_name(class.trim());
        }
        if let Some(method) = var(ENV_LOOKUP_METHOD).filter(|v| !v.trim().is_empty()) {
            self.lookup.method_name = method.trim().to_string();
        }
        if let Some(extra) = var(ENV_EXCLUDE) {
            self.excluded_classes.extend(
                extra.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            );
        }
        if let Some(jobs) = var(ENV_JOBS) {
            let parsed = jobs
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::config_error(format!("{} must be a positive integer, got '{}'", ENV_JOBS, jobs)))?;
            self.jobs = Some(parsed);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup.class_name.is_empty() {
            return Err(Error::config_error("lookup class must not be empty"));
        }
        let method = &self.lookup.method_name;
        if method.is_empty() || method.contains(['.', ';', '[', '/', '<', '>']) {
            return Err(Error::config_error(format!("'{}' is not a valid lookup method name", method)));
        }
        if self.jobs == Some(0) {
            return Err(Error::config_error("jobs must be at least 1"));
        }
        Ok(())
    }
}

/// `com.example.Foo` and `com/example/Foo` both become `com/example/Foo`.
fn internal_name(name: &str) -> String {
    name.replace('.', "/")
}
