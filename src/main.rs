use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use talkdigest::config::Config;
use talkdigest::digest::{DigestCache, DigestContext, GroupedResult};
use talkdigest::feed::{DigestFilter, WikiClient};
use talkdigest::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/talkdigest/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("talkdigest"))
}

#[derive(Parser, Debug)]
#[command(
    name = "talkdigest",
    about = "Digest of recent talk-page discussions on a MediaWiki wiki"
)]
struct Args {
    /// Config file (defaults to ~/.config/talkdigest/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only show activity in this namespace id (never cached)
    #[arg(long, value_name = "NS")]
    namespace: Option<i64>,

    /// Ignore the cached digest and fetch live
    #[arg(long)]
    refresh: bool,

    /// Re-fetch content for records that have none
    #[arg(long)]
    retry_failed: bool,

    /// Clear the cached digest before loading
    #[arg(long)]
    reset_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config_dir.join("cache.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The cache database is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let http = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("talkdigest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let client = WikiClient::new(http, &config).context("Invalid wiki endpoint in config")?;
    let cache = DigestCache::new(db, config.cache_slot.clone(), config.cache_ttl_secs);
    let offset = *chrono::Local::now().offset();
    let ctx = DigestContext::new(client, cache, offset);

    if args.reset_cache {
        let cleared = ctx.cache().clear().await.context("Failed to clear cache")?;
        tracing::info!(cleared, "Cache reset");
    }

    let filter = DigestFilter {
        namespace: args.namespace,
    };

    let mut digest = match ctx.load(&filter, args.refresh).await {
        Ok(digest) => digest,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if args.retry_failed {
        let loaded = ctx.retry_failed(&mut digest).await;
        println!("Reloaded {loaded} record(s)");
        if loaded > 0 {
            ctx.store(&filter, &digest).await;
        }
    }

    print_digest(&digest);
    Ok(())
}

fn print_digest(digest: &GroupedResult) {
    if digest.is_empty() {
        println!("No recent discussions.");
        return;
    }

    for group in &digest.groups {
        println!("{}", group.label);
        for record in &group.records {
            let time = record
                .timestamp
                .map(|ts| ts.with_timezone(&chrono::Local).format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string());
            let heading = record
                .heading
                .as_deref()
                .map(|h| format!(" § {h}"))
                .unwrap_or_default();
            let who = if record.is_anonymous {
                format!("{} (anonymous)", record.username)
            } else {
                record.username.clone()
            };
            println!("  {time}  {}{heading}  by {who}", record.page_title);
            match &record.contents {
                Some(text) if !text.is_empty() => println!("    {text}"),
                Some(_) => {}
                None => println!("    [content unavailable, try --retry-failed]"),
            }
        }
        println!();
    }
}
