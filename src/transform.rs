//! Batch driver
//!
//! Feeds every selected class of the inputs to the rewriter. Classes are
//! rewritten in parallel on a rayon pool and share the catalog read-only; a
//! class that fails keeps its original bytes and is listed in the report.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::common::classpath::{ClassSelector, ClasspathEntry, ClasspathResolver};
use crate::common::config::Config;
use crate::common::error::{Error, Result};
use crate::rewrite::catalog::Catalog;
use crate::rewrite::class_rewriter::ClassRewriter;

/// Result of rewriting one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rewritten(Vec<u8>),
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedClass {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Names of the rewritten classes, in input order.
    pub rewritten: Vec<String>,
    pub unchanged: usize,
    /// Class files not offered to the rewriter.
    pub skipped: usize,
    pub failed: Vec<FailedClass>,
}

impl TransformReport {
    fn record(&mut self, name: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Rewritten(_) => self.rewritten.push(name.to_string()),
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Failed(reason) => self.failed.push(FailedClass { name: name.to_string(), reason: reason.clone() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct ArchivedEntry {
    name: String,
    is_dir: bool,
    compression: CompressionMethod,
    data: Vec<u8>,
}

pub struct Transformer<'a> {
    rewriter: ClassRewriter<'a>,
    selector: ClassSelector,
    jobs: Option<usize>,
}

impl<'a> Transformer<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a Config) -> Self {
        Self { rewriter: ClassRewriter::new(catalog, config), selector: ClassSelector::new(config), jobs: config.jobs }
    }

    /// Rewrite every input. Without `output`, inputs are rewritten in place;
    /// with it, directories are mirrored into `output` and jars and single
    /// class files are written there under their file names.
    pub fn transform_inputs(&self, inputs: &[ClasspathEntry], output: Option<&Path>) -> Result<TransformReport> {
        let mut report = TransformReport::default();
        for input in inputs {
            log::info!("processing {}", input.path().display());
            match input {
                ClasspathEntry::Directory(dir) => self.transform_directory(dir, output, &mut report)?,
                ClasspathEntry::Jar(jar) => {
                    let target = output.map(|o| o.join(file_name(jar)));
                    self.transform_jar(jar, target.as_deref(), &mut report)?
                }
                ClasspathEntry::ClassFile(path) => {
                    let target = output.map(|o| o.join(file_name(path)));
                    self.transform_class_file(path, target.as_deref(), &mut report)?
                }
            }
        }
        log::info!(
            "{} rewritten, {} unchanged, {} skipped, {} failed",
            report.rewritten.len(),
            report.unchanged,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// Rewrite one class, turning every error into [`Outcome::Failed`].
    pub fn process(&self, name: &str, bytes: &[u8]) -> Outcome {
        match self.rewriter.rewrite_bytes(bytes) {
            Ok(Some(rewritten)) => {
                log::debug!("rewrote {}", name);
                Outcome::Rewritten(rewritten)
            }
            Ok(None) => Outcome::Unchanged,
            Err(e) => {
                log::warn!("{} left unrewritten: {}", name, e);
                Outcome::Failed(e.to_string())
            }
        }
    }

    pub fn transform_directory(&self, dir: &Path, output: Option<&Path>, report: &mut TransformReport) -> Result<()> {
        let classes: Vec<PathBuf> = ClasspathResolver::class_files(dir)?;
        let outcomes: Vec<(String, Option<Outcome>)> = self.run(|| {
            classes
                .par_iter()
                .map(|path| -> Result<(String, Option<Outcome>)> {
                    let name = relative_name(dir, path);
                    if !self.selector.accepts(&name) {
                        return Ok((name, None));
                    }
                    let bytes = fs::read(path)?;
                    let outcome = self.process(&name, &bytes);
                    Ok((name, Some(outcome)))
                })
                .collect::<Result<Vec<_>>>()
        })??;

        for ((name, outcome), path) in outcomes.iter().zip(&classes) {
            match outcome {
                Some(outcome) => report.record(name, outcome),
                None => report.skipped += 1,
            }
            let target = match output {
                Some(out) => out.join(path.strip_prefix(dir).unwrap_or(path)),
                None => path.clone(),
            };
            match outcome {
                Some(Outcome::Rewritten(bytes)) => write_file(&target, bytes)?,
                _ if output.is_some() => copy_file(path, &target)?,
                _ => {}
            }
        }

        if let Some(out) = output {
            let classes: HashSet<&Path> = classes.iter().map(PathBuf::as_path).collect();
            for entry in WalkDir::new(dir) {
                let entry = entry.map_err(std::io::Error::from)?;
                let path = entry.path();
                if entry.file_type().is_file() && !classes.contains(path) {
                    copy_file(path, &out.join(path.strip_prefix(dir).unwrap_or(path)))?;
                }
            }
        }
        Ok(())
    }

    /// Entries are read in order, rewritten in parallel and written back in
    /// their original order. Without `output` the jar is replaced only when a
    /// class changed.
    pub fn transform_jar(&self, jar: &Path, output: Option<&Path>, report: &mut TransformReport) -> Result<()> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(jar)?))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let mut data = Vec::with_capacity(presize(entry.size()));
            entry.read_to_end(&mut data)?;
            entries.push(ArchivedEntry {
                name: entry.name().to_string(),
                is_dir: entry.is_dir(),
                compression: entry.compression(),
                data,
            });
        }

        let outcomes: Vec<Option<Outcome>> = self.run(|| {
            entries
                .par_iter()
                .map(|entry| {
                    if entry.is_dir || !entry.name.ends_with(".class") {
                        return None;
                    }
                    if !self.selector.accepts(&entry.name) {
                        return Some(None);
                    }
                    Some(Some(self.process(&entry.name, &entry.data)))
                })
                .collect::<Vec<Option<Option<Outcome>>>>()
        })?
        .into_iter()
        .zip(&entries)
        .map(|(outcome, entry)| {
            match &outcome {
                Some(Some(outcome)) => report.record(&entry.name, outcome),
                Some(None) => report.skipped += 1,
                None => {}
            }
            outcome.flatten()
        })
        .collect();

        let changed = outcomes.iter().any(|o| matches!(o, Some(Outcome::Rewritten(_))));
        if output.is_none() && !changed {
            return Ok(());
        }

        let target = output.unwrap_or(jar);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        replace_file(target, |file| write_entries(file, &entries, &outcomes))
    }

    pub fn transform_class_file(&self, path: &Path, output: Option<&Path>, report: &mut TransformReport) -> Result<()> {
        let name = file_name(path);
        if !self.selector.accepts(&name) {
            report.skipped += 1;
            if let Some(target) = output {
                copy_file(path, target)?;
            }
            return Ok(());
        }
        let bytes = fs::read(path)?;
        let outcome = self.process(&name, &bytes);
        report.record(&name, &outcome);
        match (&outcome, output) {
            (Outcome::Rewritten(rewritten), Some(target)) => write_file(target, rewritten),
            (Outcome::Rewritten(rewritten), None) => write_file(path, rewritten),
            (_, Some(target)) => write_file(target, &bytes),
            (_, None) => Ok(()),
        }
    }

    /// Run `f` on a pool sized by `jobs`, or on the global pool.
    fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match self.jobs {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::config_error(format!("cannot start {} workers: {}", threads, e)))?;
                Ok(pool.install(f))
            }
            None => Ok(f()),
        }
    }
}

/// Upper bound on the buffer reserved from a jar entry's declared size.
const MAX_PRESIZE: usize = 64 << 20;

fn presize(declared: u64) -> usize {
    usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PRESIZE)
}

/// Write `entries` as a jar, using the rewritten bytes where a class changed.
/// Stored entries stay stored; everything else is deflated.
fn write_entries(file: &mut File, entries: &[ArchivedEntry], outcomes: &[Option<Outcome>]) -> Result<()> {
    let mut writer = ZipWriter::new(file);
    for (entry, outcome) in entries.iter().zip(outcomes) {
        let method = match entry.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);
        if entry.is_dir {
            writer.add_directory(entry.name.as_str(), options)?;
            continue;
        }
        writer.start_file(entry.name.as_str(), options)?;
        match outcome {
            Some(Outcome::Rewritten(bytes)) => writer.write_all(bytes)?,
            _ => writer.write_all(&entry.data)?,
        }
    }
    writer.finish()?;
    Ok(())
}

/// Write `path` through a temporary file next to it. The temporary replaces
/// `path` only when `write` succeeds and is removed otherwise.
fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new().prefix(".flavorize-").suffix(".tmp").tempfile_in(dir)?;
    write(temp.as_file_mut())?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// `/`-separated path of `path` below `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}
