//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: solvra_autoload CLI entry point
// Objective: Resolve identifiers against configured base paths from the shell,
//            persisting learned bindings between invocations
//=====================================================

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser as ClapParser, Subcommand};
use serde::Serialize;
use solvra_autoload::config::display_base;
use solvra_autoload::{AutoloadConfig, ChainContext, Resolution, Resolver};
use tracing_subscriber::EnvFilter;

#[derive(Debug, ClapParser)]
#[command(
    name = "solvra_autoload",
    about = "Resolves hierarchical identifiers to source files across ordered base paths.",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve one or more identifiers.
    Resolve {
        #[command(flatten)]
        setup: SetupArgs,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,

        /// Identifiers such as `Acme\Widget` or `Zend_Db_Table`.
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Remove the persisted binding cache for this configuration.
    Clear {
        #[command(flatten)]
        setup: SetupArgs,
    },
}

#[derive(Debug, ClapArgs)]
struct SetupArgs {
    /// TOML configuration file.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Base path to search; may be repeated, order matters.
    #[arg(long = "base-path", short = 'b')]
    base_paths: Vec<PathBuf>,

    /// Also search the entries of SOLVRA_AUTOLOAD_PATH.
    #[arg(long)]
    include_env: bool,

    /// File extension appended to identifier paths.
    #[arg(long)]
    extension: Option<String>,

    /// Identity key for the persisted cache.
    #[arg(long)]
    cache_key: Option<String>,

    /// Directory holding persisted caches.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Do not load or save learned bindings.
    #[arg(long)]
    no_persist: bool,
}

impl SetupArgs {
    fn into_config(self) -> Result<AutoloadConfig> {
        let mut config = match &self.config {
            Some(path) => AutoloadConfig::load(path)?,
            None => AutoloadConfig::default(),
        };
        config.base_paths.extend(self.base_paths);
        config.include_env_paths |= self.include_env;
        if let Some(extension) = self.extension {
            config.extension = extension;
        }
        if self.cache_key.is_some() {
            config.cache_key = self.cache_key;
        }
        if self.cache_dir.is_some() {
            config.cache_dir = self.cache_dir;
        }
        if self.no_persist {
            config.persist = false;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct ResolutionReport {
    identifier: String,
    found: bool,
    path: Option<PathBuf>,
    source: String,
}

impl From<&Resolution> for ResolutionReport {
    fn from(value: &Resolution) -> Self {
        Self {
            identifier: value.identifier.clone(),
            found: value.found,
            path: value.path.clone(),
            source: format!("{:?}", value.source),
        }
    }
}

fn main() -> Result<ExitCode> {
    install_tracing();
    let args = Args::parse();
    match args.command {
        Command::Resolve {
            setup,
            json,
            identifiers,
        } => run_resolve(setup, json, &identifiers),
        Command::Clear { setup } => run_clear(setup),
    }
}

fn install_tracing() {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Ok(directive) = "solvra_autoload=info".parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_resolve(setup: SetupArgs, json: bool, identifiers: &[String]) -> Result<ExitCode> {
    let config = setup.into_config()?;
    let store = config.open_store();
    let mut resolver = Resolver::new(config).context("invalid autoload configuration")?;
    for base in resolver.base_paths() {
        tracing::debug!(base = %display_base(base), "search root");
    }
    resolver.restore(store.as_ref());

    let mut reports = Vec::with_capacity(identifiers.len());
    let mut all_found = true;
    for identifier in identifiers {
        let mut ctx = ChainContext::new(1);
        let resolution = resolver.lookup_in_chain(identifier, &mut ctx);
        all_found &= resolution.found;
        reports.push(ResolutionReport::from(&resolution));
    }
    resolver.persist(store.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            match &report.path {
                Some(path) => println!("{} -> {}", report.identifier, path.display()),
                None => println!("{} -> not found", report.identifier),
            }
        }
    }
    Ok(if all_found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_clear(setup: SetupArgs) -> Result<ExitCode> {
    let config = setup.into_config()?;
    let store = config.open_store();
    let resolver = Resolver::new(config).context("invalid autoload configuration")?;
    let key = resolver.config().store_key(resolver.fingerprint());
    store
        .remove(&key)
        .with_context(|| format!("removing binding cache '{}'", key))?;
    println!("cleared binding cache '{}'", key);
    Ok(ExitCode::SUCCESS)
}
