//! Activate one or more jems and print the resulting search path as JSON.
//!
//! Usage:
//!   jem-activate --home ~/.jems vendor/foo vendor/bar
//!   jem-activate --seed /usr/lib/site --on-duplicate overwrite ./pkg/jem.json
//!
//! Without `--home` (or `JEMS_HOME`) the store lives in a temporary directory
//! that is removed when the command exits, so the printed locations are only
//! useful for inspection.

use anyhow::{Context, Result};
use clap::Parser;
use jemloader::{
    ActivationContext, ActivatorConfig, DuplicateBehavior, JemStore, MissingIndexPolicy,
    SearchPath, StoreConfig, init_logging,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jem-activate")]
#[command(about = "Activate jems onto a search path and print the result")]
struct Cli {
    /// Package directories (or paths to their jem.json), activated in order.
    #[arg(required = true)]
    packages: Vec<String>,
    /// Store home; overrides JEMS_HOME.
    #[arg(long)]
    home: Option<PathBuf>,
    /// Extra read-only package root, searched after the home. Repeatable.
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
    /// Pre-existing search path entry, in priority order. Repeatable.
    #[arg(long = "seed")]
    seeds: Vec<String>,
    /// What to do when a package is already installed in the store.
    #[arg(long, value_parser = ["skip", "overwrite", "fail"])]
    on_duplicate: Option<String>,
    /// Treat a missing index marker as an empty resource root instead of an error.
    #[arg(long)]
    allow_missing_index: bool,
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

    let mut store_config = StoreConfig::from_env();
    if let Some(home) = cli.home {
        store_config.home = Some(home);
    }
    store_config.extra_roots.extend(cli.roots);
    if let Some(raw) = cli.on_duplicate.as_deref() {
        store_config.on_duplicate = DuplicateBehavior::try_from(raw)?;
    }

    let mut activator_config = ActivatorConfig::from_env();
    if cli.allow_missing_index {
        activator_config.missing_index = MissingIndexPolicy::Degenerate;
    }

    let store = JemStore::open(store_config).context("opening package store")?;
    let context = ActivationContext::new(store)
        .with_config(activator_config)
        .with_search_path(cli.seeds.into_iter().collect::<SearchPath>());

    let outcomes = context
        .activate_all(&cli.packages)
        .context("activating packages")?;

    let report = json!({
        "packages": outcomes,
        "active": context.active_names(),
        "search_path": context.search_path(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
