//! rpcgen CLI
//!
//! Generate code from RPC definition files.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use rpcgen::generator::{backend_for, supported_language_names, Generator, GeneratorOptions};
use rpcgen::{loader, GenConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rpcgen")]
#[command(about = "Generate code from RPC definition files")]
struct Cli {
    /// Target language (ts, py, go)
    #[arg(long)]
    lang: String,

    /// Definition document(s), YAML
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory. Mutually exclusive with --out-file.
    #[arg(long, conflicts_with = "out_file")]
    out_dir: Option<PathBuf>,

    /// Output file. Mutually exclusive with --out-dir.
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Dump every file that would be written to stdout instead
    #[arg(long)]
    dry_run: bool,

    /// Config file (defaults to rpcgen.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the Go package name
    #[arg(long)]
    package: Option<String>,

    /// Show full error context on failure
    #[arg(long)]
    debug: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let debug = cli.debug || std::env::var_os("RPCGEN_DEBUG").is_some();

    if let Err(e) = run(cli) {
        if debug {
            eprintln!("Error: {:?}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Validate the language before doing any file work.
    if backend_for(&cli.lang, &GenConfig::default()).is_err() {
        bail!(
            "Unknown language: {} (supported: {})",
            cli.lang,
            supported_language_names().join("|")
        );
    }

    let definition = loader::load_all(&cli.files)?;

    let mut config = GenConfig::load(cli.config.as_deref())?;
    if let Some(package) = cli.package {
        config.go.package = package;
    }

    let first_file_stem = cli
        .files
        .first()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .unwrap_or_else(|| "definition".to_string());

    let generator = Generator::new(definition, GeneratorOptions {
        first_file_stem,
        config,
    });
    let files = generator.generate(&cli.lang)?;

    if files.len() > 1 && !cli.dry_run && cli.out_dir.is_none() {
        bail!(
            "Generated {} files, must use --out-dir",
            files.len()
        );
    }

    for (relative, contents) in &files {
        if cli.dry_run {
            println!("--- {} ---\n{}\n-------", relative, contents);
        } else if let Some(out_dir) = &cli.out_dir {
            let path = out_dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            println!("Writing {}", path.display());
            std::fs::write(&path, contents)
                .with_context(|| format!("writing {}", path.display()))?;
        } else if let Some(out_file) = &cli.out_file {
            println!("Writing {}", out_file.display());
            std::fs::write(out_file, contents)
                .with_context(|| format!("writing {}", out_file.display()))?;
        } else {
            print!("{}", contents);
        }
    }
    Ok(())
}
