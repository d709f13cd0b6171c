// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use repomirror::config::Config;
use repomirror::packages::{PackageSet, Versioned};
use repomirror::repository::parsers::{self, ManifestReader, MetadataParser, PrimaryReader};
use repomirror::repository::{SyncPlan, open_metadata};
use repomirror::resolver::{PackageIndex, Solver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(author, version, about = "Inspect RPM repository metadata: dependencies, retention and sync plans", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sections of a repomd.xml
    Repomd {
        /// Path to repomd.xml
        path: PathBuf,
    },
    /// List the packages of a primary.xml (plain, .gz, .zst or .xz)
    Packages {
        /// Path to primary.xml
        primary: PathBuf,
    },
    /// Show the dependency closure of packages
    Deps {
        /// Path to primary.xml
        primary: PathBuf,
        /// Package names; the newest version of each is resolved
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show which packages a retention policy would remove
    Retain {
        /// Path to primary.xml
        primary: PathBuf,
        /// Versions to keep per package (defaults to sync.retain_newest)
        #[arg(short, long)]
        keep: Option<i64>,
    },
    /// Plan a sync of a remote primary.xml into a local one
    Diff {
        /// Remote primary.xml
        remote: PathBuf,
        /// Local primary.xml, taken as both stored and associated content
        local: PathBuf,
    },
    /// Validate a manifest list
    Manifest {
        /// Path to the manifest
        path: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_packages(path: &Path) -> Result<PackageSet> {
    let reader: PrimaryReader<_> = parsers::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let units = reader
        .collect_records()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(units.into_iter().collect())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Repomd { path } => {
            let repomd = parsers::parse_repomd(open_metadata(&path)?)?;
            if cli.json {
                return print_json(&repomd);
            }
            if let Some(revision) = &repomd.revision {
                println!("Revision: {}", revision);
            }
            for record in &repomd.records {
                println!("{}", record.data_type);
                println!("  Location: {}", record.relative_path);
                if let Some(size) = record.size {
                    println!("  Size: {} bytes", size);
                }
                if let Some(checksum) = &record.checksum {
                    println!("  Checksum: {} {}", checksum.algorithm, checksum.digest);
                }
                if let Some(timestamp) = record.timestamp_datetime() {
                    println!("  Timestamp: {}", timestamp.to_rfc3339());
                }
            }
            println!("\nTotal: {} section(s)", repomd.records.len());
            Ok(())
        }
        Commands::Packages { primary } => {
            let packages = load_packages(&primary)?;
            if cli.json {
                let units: Vec<_> = packages.iter().map(Arc::as_ref).collect();
                return print_json(&units);
            }
            for unit in &packages {
                println!("{}", unit);
            }
            println!("\nTotal: {} package(s)", packages.len());
            Ok(())
        }
        Commands::Deps { primary, names } => {
            let packages = load_packages(&primary)?;
            let index = PackageIndex::build(packages.iter().cloned());

            let mut start = PackageSet::new();
            for name in &names {
                let newest = index
                    .newest(name)
                    .ok_or_else(|| anyhow::anyhow!("Package '{}' not found in {}", name, primary.display()))?;
                start.insert(Arc::clone(newest));
            }

            let closure = Solver::new(&index).closure(&start);
            info!("Resolved {} package(s) in {} round(s)", closure.units.len(), closure.rounds);
            let deps = closure.dependencies();
            if cli.json {
                let units: Vec<String> = deps.iter().map(|u| u.to_string()).collect();
                return print_json(&units);
            }
            if deps.is_empty() {
                println!("No dependencies found in {}.", primary.display());
            } else {
                println!("Dependencies:");
                for unit in &deps {
                    println!("  {}", unit);
                }
            }
            println!("\nTotal: {} package(s) after {} round(s)", closure.units.len(), closure.rounds);
            Ok(())
        }
        Commands::Retain { primary, keep } => {
            let policy = match keep {
                Some(keep) => repomirror::repository::RetentionPolicy::new(keep)?,
                None => config
                    .retention_policy()?
                    .context("No retention count given (use --keep or sync.retain_newest)")?,
            };
            let packages = load_packages(&primary)?;
            let removed = policy.apply(&packages);
            if cli.json {
                let keys: Vec<_> = removed.keys().collect();
                return print_json(&keys);
            }
            for unit in &removed {
                println!("{} {}", if unit.is_source() { "src" } else { "bin" }, unit);
            }
            println!(
                "\nKeeping {} version(s) per package: {} of {} package(s) would be removed",
                policy.keep(),
                removed.len(),
                packages.len()
            );
            Ok(())
        }
        Commands::Diff { remote, local } => {
            let remote = load_packages(&remote)?;
            let local = load_packages(&local)?;
            let plan = SyncPlan::compute(&remote, &local, &local, &config.sync_options()?);
            if cli.json {
                return print_json(&plan);
            }
            let sections = [
                ("Download", &plan.to_download),
                ("Associate", &plan.to_associate),
                ("Remove", &plan.to_remove),
                ("Purge", &plan.to_purge),
            ];
            for (title, keys) in sections {
                println!("{} ({}):", title, keys.len());
                for key in keys {
                    println!("  {}", key);
                }
            }
            if plan.is_empty() {
                println!("Local content is up to date.");
            }
            Ok(())
        }
        Commands::Manifest { path } => {
            let mut entries = Vec::new();
            let mut invalid = 0;
            for record in ManifestReader::from_reader(open_metadata(&path)?) {
                match record {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        warn!("{}", e);
                        invalid += 1;
                    }
                }
            }
            if cli.json {
                print_json(&entries)?;
            } else {
                let total: u64 = entries.iter().map(|e| e.size).sum();
                println!("{}: {} file(s), {} bytes", path.display(), entries.len(), total);
            }
            if invalid > 0 {
                anyhow::bail!("{} invalid line(s) in {}", invalid, path.display());
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "repomirror", &mut std::io::stdout());
            Ok(())
        }
    }
}
