//! Validate a jem manifest and print the parsed package spec.
//!
//! Usage:
//!   jem-manifest --file vendor/foo/jem.json
//!   jem-manifest < jem.json

use anyhow::{Context, Result};
use clap::Parser;
use jemloader::{init_logging, manifest};
use std::fs;
use std::io::{Read, stdin};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jem-manifest")]
#[command(about = "Validate a jem manifest and print the parsed spec as JSON")]
struct Cli {
    /// Manifest file; reads stdin when omitted.
    #[arg(long)]
    file: Option<PathBuf>,
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("reading manifest {}", path.display())),
        None => {
            let mut buf = String::new();
            stdin()
                .read_to_string(&mut buf)
                .context("reading manifest from stdin")?;
            Ok(buf)
        }
    }
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let raw = read_input(cli.file)?;
    let spec = manifest::parse(&raw).context("invalid manifest")?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
