use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flavorize::common::classpath::{ClassSelector, ClasspathEntry, ClasspathResolver};
use flavorize::rewrite::{scan_class, Catalog};
use flavorize::{Config, LookupTarget, Transformer};

#[derive(Parser)]
#[command(name = "flavorize")]
#[command(about = "Rewrite templated string constants in compiled classes into per-flavor lookups")]
#[command(version)]
struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite class directories, jars or class files
    Rewrite {
        /// Directory holding one JSON asset per module
        #[arg(long, value_name = "DIR")]
        catalog: PathBuf,

        /// Build variant whose entries are used
        #[arg(long)]
        variant: String,

        /// Write results here instead of rewriting in place
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Internal or dotted name of the lookup class
        #[arg(long, value_name = "CLASS")]
        lookup_class: Option<String>,

        /// Name of the static lookup method
        #[arg(long, value_name = "METHOD")]
        lookup_method: Option<String>,

        /// Inputs: directories, jars or class files
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,
    },

    /// List template occurrences without rewriting
    Scan {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,
    },

    /// Print the bindings a catalog yields for a variant
    Catalog {
        #[arg(long, value_name = "DIR")]
        catalog: PathBuf,

        #[arg(long)]
        variant: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Rewrite { catalog, variant, output, jobs, lookup_class, lookup_method, inputs } => {
            let mut config = Config::from_env()?;
            if lookup_class.is_some() || lookup_method.is_some() {
                config.lookup = LookupTarget::new(
                    lookup_class.unwrap_or(config.lookup.class_name),
                    lookup_method.unwrap_or(config.lookup.method_name),
                );
            }
            if jobs.is_some() {
                config.jobs = jobs;
            }
            config.validate()?;
            rewrite(&config, &catalog, &variant, output.as_deref(), &inputs)
        }
        Commands::Scan { inputs } => scan(&inputs),
        Commands::Catalog { catalog, variant } => print_catalog(&catalog, &variant),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn rewrite(config: &Config, catalog_dir: &Path, variant: &str, output: Option<&Path>, inputs: &[String]) -> Result<()> {
    let catalog = Catalog::load_dir(catalog_dir, variant)
        .with_context(|| format!("loading catalog from {}", catalog_dir.display()))?;
    if catalog.is_empty() {
        log::warn!("catalog for variant {} is empty; every token stays literal", variant);
    }
    let entries = ClasspathResolver::resolve_entries(inputs)?;
    let report = Transformer::new(&catalog, config).transform_inputs(&entries, output)?;

    for name in &report.rewritten {
        log::debug!("rewritten: {}", name);
    }
    for failed in &report.failed {
        eprintln!("failed: {}: {}", failed.name, failed.reason);
    }
    println!(
        "{} rewritten, {} unchanged, {} skipped, {} failed",
        report.rewritten.len(),
        report.unchanged,
        report.skipped,
        report.failed.len()
    );
    if !report.is_success() {
        bail!("{} classes could not be rewritten", report.failed.len());
    }
    Ok(())
}

fn scan(inputs: &[String]) -> Result<()> {
    let selector = ClassSelector::new(&Config::from_env()?);
    for entry in ClasspathResolver::resolve_entries(inputs)? {
        for (name, bytes) in read_classes(&entry)? {
            if !selector.accepts(&name) {
                continue;
            }
            let (class_name, hits) = match scan_class(&bytes) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("{}: {}", name, e);
                    continue;
                }
            };
            for hit in hits {
                let at = hit.offset.map(|o| format!("@{}", o)).unwrap_or_default();
                println!("{} {}{}: {}", class_name, hit.member, at, hit.tokens.join(", "));
            }
        }
    }
    Ok(())
}

fn print_catalog(catalog_dir: &Path, variant: &str) -> Result<()> {
    let catalog = Catalog::load_dir(catalog_dir, variant)?;
    let bindings: Vec<_> = catalog.iter().collect();
    println!("{}", serde_json::to_string_pretty(&bindings)?);
    Ok(())
}

/// `(name, bytes)` of every class file in one input.
fn read_classes(entry: &ClasspathEntry) -> Result<Vec<(String, Vec<u8>)>> {
    use std::io::Read;

    let mut classes = Vec::new();
    match entry {
        ClasspathEntry::Directory(dir) => {
            for path in ClasspathResolver::class_files(dir)? {
                let name = path.strip_prefix(dir).unwrap_or(&path).to_string_lossy().replace('\\', "/");
                classes.push((name, std::fs::read(&path)?));
            }
        }
        ClasspathEntry::Jar(jar) => {
            let file = std::fs::File::open(jar).with_context(|| format!("opening {}", jar.display()))?;
            let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
            for index in 0..archive.len() {
                let mut file = archive.by_index(index)?;
                if file.is_dir() || !file.name().ends_with(".class") {
                    continue;
                }
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                classes.push((file.name().to_string(), bytes));
            }
        }
        ClasspathEntry::ClassFile(path) => {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            classes.push((name, std::fs::read(path)?));
        }
    }
    Ok(classes)
}
