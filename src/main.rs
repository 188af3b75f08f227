// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
#![forbid(unsafe_code)]

//! Entry point for the nbprovision gate server.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};

use nbprovision::resolver::ConfigSource;
use nbprovision::server::GateServer;
use nbprovision::{AppId, ServerConfig, YamlConfigStore};

#[derive(Debug, Parser)]
#[command(author = "Lukas Bower", version, about = "Provision notebook apps on first request")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gate in front of the app runtime.
    Serve(ServeArgs),
    /// Show which notebook source an identifier resolves to.
    Check {
        /// App identifier as it appears after /start/.
        id: String,
        /// Data directory holding <id>/config.yaml.
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Parser)]
struct ServeArgs {
    /// Listen address.
    #[arg(long)]
    bind: Option<String>,
    /// Directory for materialized notebooks.
    #[arg(long, value_name = "DIR")]
    apps_dir: Option<PathBuf>,
    /// Directory holding <id>/config.yaml records.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Base URL of the app runtime receiving pass-through traffic.
    #[arg(long, value_name = "URL")]
    upstream: Option<String>,
    /// Path to the uv executable.
    #[arg(long, value_name = "PATH")]
    uv: Option<PathBuf>,
    /// Do not install notebook dependencies.
    #[arg(long, default_value_t = false)]
    skip_install: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path).with_context(|| format!("load {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn serve(mut cfg: ServerConfig, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(dir) = args.apps_dir {
        cfg.apps_dir = dir;
    }
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(upstream) = args.upstream {
        cfg.upstream = Some(upstream);
    }
    if let Some(uv) = args.uv {
        cfg.uv_program = uv;
    }
    cfg.skip_install |= args.skip_install;
    cfg.validate()?;

    let layout = cfg.layout();
    layout.ensure_dirs().with_context(|| {
        format!(
            "create {} and {}",
            layout.apps_dir().display(),
            layout.data_dir().display()
        )
    })?;

    let server = GateServer::bind(&cfg.bind, cfg.build_gate(), cfg.build_upstream())?
        .with_workers(cfg.workers);
    let addr = server
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|| cfg.bind.clone());
    info!(
        "listening on {addr} with {} workers, apps in {}, data in {}",
        cfg.workers,
        layout.apps_dir().display(),
        layout.data_dir().display()
    );
    match &cfg.upstream {
        Some(upstream) => info!("forwarding other traffic to {upstream}"),
        None => info!("no upstream configured; non-start requests get 404"),
    }
    server.run();
    Ok(())
}

fn check(cfg: ServerConfig, id: &str, data_dir: Option<PathBuf>) -> Result<()> {
    let id = AppId::parse(id).map_err(|e| anyhow!("{id:?}: {e}"))?;
    let store = YamlConfigStore::new(data_dir.unwrap_or(cfg.data_dir));
    let path = store.config_path(&id);
    match store.resolve(&id)? {
        None => println!("{id}: no config record at {}", path.display()),
        Some(record) => match (record.notebook_url, record.notebook_code) {
            (Some(url), _) => println!("{id}: notebookUrl {url}"),
            (None, Some(code)) => println!("{id}: notebookCode ({} bytes)", code.len()),
            (None, None) => println!("{id}: record at {} names no source", path.display()),
        },
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Serve(args) => serve(cfg, args),
        Command::Check { id, data_dir } => check(cfg, &id, data_dir),
    }
}
