use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use url::Url;

use tidings::config::Config;
use tidings::remote::{Authenticator, Remote};
use tidings::store::{ContentStore, Store, StoreError};
use tidings::sync::Syncer;

/// Environment variable carrying the reader login token. Credential storage
/// and the login handshake belong to the embedding application.
const TOKEN_ENV: &str = "TIDINGS_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "tidings", about = "Sync a Google Reader compatible account into a local cache")]
struct Args {
    /// Config file path (default: ~/.config/tidings/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cache directory override
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full sync pipeline (flags, ids, items) plus subscriptions
    Sync,
    /// Refresh only the subscription/label snapshot
    Subscriptions,
    /// Show cache status (unread count, pending mutations)
    Status,
}

fn config_path(args: &Args) -> Result<PathBuf> {
    if let Some(path) = &args.config {
        return Ok(path.clone());
    }
    let dir = dirs::config_dir().context("Could not determine the config directory")?;
    Ok(dir.join("tidings").join("config.toml"))
}

fn login_token() -> Result<SecretString> {
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{TOKEN_ENV} is not set; export your reader login token"))?;
    Ok(SecretString::from(token))
}

async fn open_store(config: &Config) -> Result<(Store, ContentStore)> {
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

    let db_path = config.db_path()?;
    let db_path_str = db_path
        .to_str()
        .context("Invalid UTF-8 in database path")?;
    let store = match Store::open(db_path_str).await {
        Ok(store) => store,
        Err(StoreError::Locked) => {
            eprintln!("Error: another instance of tidings appears to be running.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open cache database: {e}")),
    };
    let content = ContentStore::open(config.content_dir()?)?;
    Ok((store, content))
}

fn build_syncer(config: &Config, store: Store, content: ContentStore) -> Result<Syncer> {
    let base = Url::parse(&config.api_base)
        .with_context(|| format!("Invalid api_base url: {}", config.api_base))?;
    let remote = Remote::new(base, Authenticator::new(login_token()?))
        .context("Failed to build remote client")?;
    Ok(Syncer::new(
        Arc::new(remote),
        store,
        content,
        config.cache_items,
    ))
}

async fn run_sync_pass(syncer: &Syncer) -> Result<()> {
    let (report, subscriptions) = tokio::join!(syncer.sync_all(), syncer.sync_subscriptions());
    match report? {
        Some(report) => {
            println!(
                "Synced: {} flags acked ({} failed batches), ids {}, {} items fetched, {} collected, {} evicted",
                report.flags.acked,
                report.flags.failed_batches,
                if report.ids_refreshed { "refreshed" } else { "unchanged" },
                report.items.fetched,
                report.items.collected,
                report.items.evicted,
            );
        }
        None => println!("A sync pass is already running."),
    }
    if !subscriptions? {
        println!("Subscription refresh failed; kept the previous snapshot.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&config_path(&args)?)?;
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }

    let (store, content) = open_store(&config).await?;

    match args.command {
        Command::Status => {
            let unread = store.unread_count().await?;
            let pending = store.pending_flag_count().await?;
            let subscriptions = store.subscriptions().await?.len();
            println!("{unread} unread items");
            println!("{pending} pending flag mutations");
            println!("{subscriptions} subscriptions");
        }
        Command::Subscriptions => {
            let syncer = build_syncer(&config, store, content)?;
            if syncer.sync_subscriptions().await? {
                println!("Subscriptions refreshed.");
            } else {
                println!("Subscription refresh failed; kept the previous snapshot.");
            }
        }
        Command::Sync => {
            let syncer = build_syncer(&config, store, content)?;
            run_sync_pass(&syncer).await?;

            if config.refresh_minutes > 0 {
                let period = Duration::from_secs(config.refresh_minutes * 60);
                tracing::info!(minutes = config.refresh_minutes, "entering periodic sync");
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // first tick fires immediately
                loop {
                    ticker.tick().await;
                    if let Err(e) = run_sync_pass(&syncer).await {
                        tracing::error!(error = %e, "periodic sync pass failed");
                    }
                }
            }
        }
    }

    Ok(())
}
