use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use theater_common::credentials::{parse_cookie_store, to_storage_state_json};
use theater_config::{TheaterConfig, TheaterConfigLoader};
use tracing::info;

use crate::packager::package_session;
use crate::pipeline::{BrowserHarvester, PostHarvester};
use crate::server::{router, AppState, NO_IMAGES_MESSAGE};

const DEFAULT_CONFIG_FILE: &str = "theater.yaml";

#[derive(Debug, Parser)]
#[command(name = "theater", version, about = "Download every photo of a social-media post")]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON). Defaults to ./theater.yaml when present.
    #[arg(long, global = true, env = "THEATER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Harvest one post into a new session directory.
    Harvest {
        url: String,
        /// Root directory for session folders.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also package the session as a zip archive.
        #[arg(long)]
        zip: bool,
    },
    /// Serve the web front end.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    Cookies {
        #[command(subcommand)]
        action: CookiesCommand,
    },
    /// Print the effective configuration as YAML.
    Config,
}

#[derive(Debug, Subcommand)]
pub enum CookiesCommand {
    /// Convert a cookie export (Netscape or JSON) to storage-state JSON.
    Convert { input: PathBuf, output: PathBuf },
}

pub fn load_config(path: Option<&Path>) -> Result<TheaterConfig> {
    let loader = match path {
        Some(path) => TheaterConfigLoader::new().with_file(path),
        None => TheaterConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("failed to load configuration")
}

pub async fn run(command: Command, config: TheaterConfig) -> Result<()> {
    match command {
        Command::Harvest { url, output, zip } => harvest(config, &url, output, zip).await,
        Command::Serve { bind } => serve(config, bind).await,
        Command::Cookies {
            action: CookiesCommand::Convert { input, output },
        } => convert_cookies(&input, &output).await,
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

async fn harvest(config: TheaterConfig, url: &str, output: Option<PathBuf>, zip: bool) -> Result<()> {
    let root = output.unwrap_or_else(|| config.session.download_root.clone());
    let report = BrowserHarvester::new(config).harvest(url, &root).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.found_images() {
        eprintln!("{NO_IMAGES_MESSAGE}");
        return Ok(());
    }
    if zip {
        let archive = package_session(&report.output_dir).await?;
        println!("archive: {}", archive.display());
    }
    Ok(())
}

async fn serve(config: TheaterConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let root = config.session.download_root.clone();
    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("failed to create download root {}", root.display()))?;

    let state = AppState::new(Arc::new(BrowserHarvester::new(config)), root);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(target: "app.server", %bind, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn convert_cookies(input: &Path, output: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("cookie file not found: {}", input.display()))?;
    let cookies = parse_cookie_store(&raw)
        .map_err(|reason| anyhow::anyhow!("{}: {reason}", input.display()))?;
    let count = cookies.len();
    tokio::fs::write(output, to_storage_state_json(cookies)?).await?;
    println!("Converted {count} cookies to {}", output.display());
    Ok(())
}
