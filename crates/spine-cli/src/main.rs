//! Spine known types CLI
//!
//! Diagnostics over the known types registry:
//! - `dump`: every known type URL, optionally limited to a package
//! - `resolve`: the generated class bound to a type URL
//! - `files`: the descriptor files a set of sources contributes
//! - `merge`: write the merged descriptor set of several sources

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use spine_known_types::{
    ClassName, FileDescriptorSuperset, KnownTypes, KnownTypesConfig, MergedDescriptorSet, TypeName,
    TypeUrl, UnknownTypeError,
};

#[derive(Parser)]
#[command(name = "spine-types")]
#[command(author, version, about = "Inspect the Spine known types registry")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON configuration file (defaults to the environment).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not seed the registry with the protobuf well-known types.
    #[arg(long, global = true)]
    no_well_known: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every known type URL, sorted.
    Dump {
        /// Descriptor sources (`.desc` files, directories, jars) to add.
        sources: Vec<PathBuf>,
        /// Only list types in this package.
        #[arg(long)]
        package: Option<String>,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the generated class bound to a type URL or a fully qualified type name.
    Resolve {
        /// `prefix/pkg.Type` or `pkg.Type`.
        target: String,
        /// Descriptor sources to add before resolving.
        sources: Vec<PathBuf>,
    },

    /// List the descriptor files contributed by the given sources.
    Files {
        /// Descriptor sources.
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Merge descriptor sources into a single descriptor set file.
    Merge {
        /// Descriptor sources.
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Output descriptor set.
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.global.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.global)?;
    match cli.command {
        Commands::Dump {
            sources,
            package,
            json,
        } => cmd_dump(&config, &sources, package.as_deref(), json),
        Commands::Resolve { target, sources } => cmd_resolve(&config, &target, &sources),
        Commands::Files { sources } => cmd_files(&config, &sources),
        Commands::Merge { sources, out } => cmd_merge(&config, &sources, &out),
    }
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn load_config(args: &GlobalArgs) -> Result<KnownTypesConfig> {
    let mut config = match &args.config {
        Some(path) => KnownTypesConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => KnownTypesConfig::from_env(),
    };
    if args.no_well_known {
        config.include_well_known = false;
    }
    Ok(config)
}

fn merge_sources(config: &KnownTypesConfig, sources: &[PathBuf]) -> Result<MergedDescriptorSet> {
    let mut superset = FileDescriptorSuperset::with_config(config);
    for source in sources {
        superset
            .add_source(source)
            .with_context(|| format!("reading {}", source.display()))?;
    }
    Ok(superset.merge())
}

/// A registry seeded from `config` and extended with `sources`.
fn load_registry(config: &KnownTypesConfig, sources: &[PathBuf]) -> Result<KnownTypes> {
    let registry = KnownTypes::new(config).context("seeding known types")?;
    if sources.is_empty() {
        return Ok(registry);
    }
    let merged = merge_sources(config, sources)?;
    let report = merged
        .commit_to_known_types(&registry)
        .context("extending known types")?;
    for name in &report.conflicts {
        eprintln!(
            "{} `{}` is already bound; keeping the existing binding",
            "warning:".yellow().bold(),
            name
        );
    }
    Ok(registry)
}

fn cmd_dump(
    config: &KnownTypesConfig,
    sources: &[PathBuf],
    package: Option<&str>,
    json: bool,
) -> Result<()> {
    let registry = load_registry(config, sources)?;

    if json {
        let types = match package {
            Some(package) => registry.all_from_package(package),
            None => {
                let snapshot = registry.snapshot();
                snapshot.catalog().all_types().cloned().collect()
            }
        };
        let entries: Vec<serde_json::Value> = types
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type_url": t.url().to_string(),
                    "class_name": t.class_name().as_str(),
                    "file": t.file(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    match package {
        Some(package) => {
            let urls = registry.all_urls_in(package);
            eprintln!(
                "{} {} types in `{}`",
                "ok".green().bold(),
                urls.len(),
                package
            );
            for url in urls {
                println!("{url}");
            }
        }
        None => print!("{}", registry.print_all_types()),
    }
    Ok(())
}

fn parse_target(target: &str) -> Result<TypeUrl> {
    if !target.contains('/') {
        return Err(anyhow!("not a type URL: `{target}`"));
    }
    Ok(target.parse::<TypeUrl>()?)
}

/// Resolve a type URL, or a bare type name under its configured prefix.
fn resolve(registry: &KnownTypes, target: &str) -> Result<(TypeUrl, ClassName)> {
    let url = match parse_target(target) {
        Ok(url) => url,
        Err(_) => registry
            .find(&TypeName::new(target))
            .map(|t| t.url().clone())
            .ok_or_else(|| UnknownTypeError {
                type_name: TypeName::new(target).to_string(),
            })?,
    };
    let class_name = registry.class_name_of(&url)?;
    Ok((url, class_name))
}

fn cmd_resolve(config: &KnownTypesConfig, target: &str, sources: &[PathBuf]) -> Result<()> {
    let registry = load_registry(config, sources)?;
    let (url, class_name) = resolve(&registry, target)?;

    println!("{class_name}");
    if let Some(descriptor) = registry.find_by_url(&url) {
        eprintln!(
            "{} {} ({})",
            url.to_string().bold(),
            format!("{:?}", descriptor.kind()).to_lowercase(),
            descriptor.file()
        );
    }
    Ok(())
}

fn cmd_files(config: &KnownTypesConfig, sources: &[PathBuf]) -> Result<()> {
    let merged = merge_sources(config, sources)?;
    let by_name = merged.as_file_set()?;
    for name in by_name.keys() {
        println!("{name}");
    }
    eprintln!("{} {} files", "ok".green().bold(), by_name.len());
    Ok(())
}

fn cmd_merge(config: &KnownTypesConfig, sources: &[PathBuf], out: &Path) -> Result<()> {
    let merged = merge_sources(config, sources)?;
    // Fail on conflicting files before writing anything.
    let catalog = merged.as_type_catalog()?;
    merged
        .write_to(out)
        .with_context(|| format!("writing {}", out.display()))?;
    eprintln!(
        "{} {} ({} files, {} types)",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        merged.len(),
        catalog.len()
    );
    Ok(())
}
