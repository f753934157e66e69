//! Input discovery and class selection
//!
//! Inputs are directories of class files, jar archives, or single class
//! files. Each command-line input may also be a path-separated list
//! (`:` on Unix, `;` on Windows), the way a classpath is written.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::consts::RESOURCE_CLASS_PREFIX;

use super::config::Config;
use super::error::{Error, Result};

/// One resolved input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClasspathEntry {
    Directory(PathBuf),
    Jar(PathBuf),
    ClassFile(PathBuf),
}

impl ClasspathEntry {
    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::Directory(p) | ClasspathEntry::Jar(p) | ClasspathEntry::ClassFile(p) => p,
        }
    }
}

pub struct ClasspathResolver;

impl ClasspathResolver {
    /// Split a classpath string into its entries
    pub fn parse_classpath_entries(classpath: &str) -> Vec<String> {
        if classpath.is_empty() {
            return vec![];
        }

        let separator = if cfg!(windows) { ';' } else { ':' };
        classpath
            .split(separator)
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect()
    }

    /// Classify every input; a missing path or an unknown file type is an error.
    pub fn resolve_entries(inputs: &[String]) -> Result<Vec<ClasspathEntry>> {
        let mut entries = Vec::new();
        for input in inputs {
            for raw in Self::parse_classpath_entries(input) {
                entries.push(Self::classify(Path::new(&raw))?);
            }
        }
        Ok(entries)
    }

    pub fn classify(path: &Path) -> Result<ClasspathEntry> {
        if path.is_dir() {
            return Ok(ClasspathEntry::Directory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(Error::config_error(format!("input {} does not exist", path.display())));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("jar") | Some("zip") => Ok(ClasspathEntry::Jar(path.to_path_buf())),
            Some("class") => Ok(ClasspathEntry::ClassFile(path.to_path_buf())),
            _ => Err(Error::config_error(format!("input {} is not a directory, jar or class file", path.display()))),
        }
    }

    /// Every class file under `dir`, in path order.
    pub fn class_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_class_name(&entry.file_name().to_string_lossy()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

pub fn is_class_name(name: &str) -> bool {
    name.ends_with(".class")
}

/// Decides which class files are offered to the rewriter.
#[derive(Debug, Clone)]
pub struct ClassSelector {
    excluded: Vec<String>,
    lookup_file: String,
}

impl ClassSelector {
    pub fn new(config: &Config) -> Self {
        Self { excluded: config.excluded_classes.clone(), lookup_file: config.lookup.class_file_name() }
    }

    /// `entry_name` is a jar entry name or a path relative to an input
    /// directory; only its last segment is inspected.
    pub fn accepts(&self, entry_name: &str) -> bool {
        let file_name = entry_name.rsplit(['/', '\\']).next().unwrap_or(entry_name);
        if !is_class_name(file_name) {
            return false;
        }
        if file_name.starts_with(RESOURCE_CLASS_PREFIX) || file_name == self.lookup_file {
            return false;
        }
        !self.excluded.iter().any(|e| e == file_name)
    }
}
