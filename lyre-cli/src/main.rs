//! lyre: the instrument of the day from the command line
//!
//! # Subcommands
//! - `refresh`                   — pick the current item and record it in history
//! - `ids [--count]`             — list candidate item ids
//! - `show <id> [--lang <code>]` — resolve the wiki article for one item
//! - `history [--json]`          — show what the user has already seen

use std::sync::Arc;

use clap::{Parser, Subcommand};
use lyre_core::history::{read_history, sort_by_time_desc};
use lyre_core::{
    resolve_content, ItemSource, LeanCloudStore, LyreConfig, LyreError, Refresher, SessionStore,
    WikidataClient,
};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "lyre", version, about = "Musical instrument of the day")]
struct Cli {
    /// Config file (TOML); missing files fall back to defaults
    #[arg(short, long, default_value = "lyre.toml")]
    config: String,

    /// LeanCloud session token (overrides backend.session_token)
    #[arg(long, env = "LYRE_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pick the item to show and record it in the user's history
    Refresh,

    /// List candidate item ids
    Ids {
        /// Print only the number of candidates
        #[arg(long)]
        count: bool,
    },

    /// Resolve the wiki article for one item
    Show {
        /// Item id, e.g. Q6607
        id: String,

        /// Preferred language code (defaults to selection.language)
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Show the user's viewing history, newest first
    History {
        /// Output the history as a JSON array
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn session_token(cli: &Cli, config: &LyreConfig) -> Result<String, LyreError> {
    let token = cli
        .session_token
        .clone()
        .unwrap_or_else(|| config.backend.session_token.clone());
    if token.is_empty() {
        return Err(LyreError::MissingSession);
    }
    Ok(token)
}

async fn do_refresh(cli: &Cli, config: &LyreConfig) -> anyhow::Result<()> {
    let token = session_token(cli, config)?;
    let source = WikidataClient::new(config.wikidata.clone())?;
    let store = LeanCloudStore::new(config.backend.clone())?;
    let refresher = Refresher::new(Arc::new(source), Arc::new(store), config.selection.clone());

    let item = refresher.refresh_token(&token).await?;
    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(())
}

async fn do_ids(config: &LyreConfig, count: bool) -> anyhow::Result<()> {
    let source = WikidataClient::new(config.wikidata.clone())?;
    let ids = source.all_item_ids().await?;

    if count {
        println!("{}", ids.len());
    } else {
        for id in &ids {
            println!("{}", id);
        }
    }
    Ok(())
}

async fn do_show(config: &LyreConfig, id: &str, lang: Option<&str>) -> anyhow::Result<()> {
    let source = WikidataClient::new(config.wikidata.clone())?;
    let lang = lang.unwrap_or(config.selection.language.as_str());

    let item = resolve_content(&source, id, lang).await?;
    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(())
}

async fn do_history(cli: &Cli, config: &LyreConfig, json: bool) -> anyhow::Result<()> {
    let token = session_token(cli, config)?;
    let store = LeanCloudStore::new(config.backend.clone())?;
    let session = store.current_user(&token).await?;

    let mut history = read_history(&session);
    sort_by_time_desc(&mut history);

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else if history.is_empty() {
        eprintln!("No history yet");
    } else {
        for entry in &history {
            println!("{}  {}", entry.time.format("%Y-%m-%d %H:%M"), entry.id);
        }
    }
    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match LyreConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout stays machine-readable
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Refresh => do_refresh(&cli, &config).await,
        Commands::Ids { count } => do_ids(&config, *count).await,
        Commands::Show { id, lang } => do_show(&config, id, lang.as_deref()).await,
        Commands::History { json } => do_history(&cli, &config, *json).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("lyre: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
