//! # Jarbot — Telegram donation raffle bot
//!
//! Runs timed donation raffles in group chats: picks a random registered
//! member and assigns a small random donation to the chat's fundraising
//! jar. Raffles start from the /raffle command, from configured trigger
//! words (cooldown-gated), or from a per-chat recurrence schedule.
//!
//! Usage:
//!   jarbot                        # Run with ~/.jarbot/config.toml
//!   jarbot --config bot.toml      # Custom config path
//!   jarbot --db-path ./dev.sqlite # Override the database location

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jarbot_core::traits::{Outbound, RandomSource, Store, ThreadRandom};
use jarbot_core::JarbotConfig;
use jarbot_raffle::RaffleRunner;
use jarbot_scheduler::spawn_schedule_loop;
use jarbot_store::SqliteStore;
use jarbot_telegram::{RaffleBot, TelegramApi};

#[derive(Parser)]
#[command(name = "jarbot", version, about = "🎲 Jarbot — Telegram donation raffle bot")]
struct Cli {
    /// Config file path (default: ~/.jarbot/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config)
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "jarbot=debug,jarbot_raffle=debug,jarbot_scheduler=debug,jarbot_telegram=debug"
    } else {
        "jarbot=info,jarbot_raffle=info,jarbot_scheduler=info,jarbot_telegram=info,jarbot_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => JarbotConfig::load_from(path)?,
        None => JarbotConfig::load()?,
    };
    if let Some(db_path) = cli.db_path {
        config.storage.db_path = db_path;
    }
    if config.telegram.bot_token.is_empty() {
        anyhow::bail!(
            "Telegram bot token is required (set [telegram].bot_token or JARBOT_BOT_TOKEN)"
        );
    }

    let db_path = shellexpand::tilde(&config.storage.db_path).to_string();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(Path::new(&db_path))?);

    let api = TelegramApi::new(&config.telegram.bot_token);
    let outbound: Arc<dyn Outbound> = Arc::new(api.clone());
    let random: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
    let runner = RaffleRunner::new(
        store.clone(),
        outbound,
        random,
        config.raffle.clone(),
    );

    let _schedule_loop = spawn_schedule_loop(store.clone(), runner.clone(), config.schedule.clone());

    let mut bot = RaffleBot::new(api, store, runner, config);
    bot.run().await?;
    Ok(())
}
