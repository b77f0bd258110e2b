//! torrelay - relay torrent metafiles from chat to a download daemon.
//!
//! Receives `.torrent` documents through a Telegram bot, submits them to
//! a Transmission daemon over its session-gated RPC endpoint, and replies
//! with one progress snapshot per submission.

use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use torrelay_core::{Bridge, BridgeConfig};
use torrelay_daemon::DaemonClient;
use torrelay_telegram::TelegramAdapter;

/// Telegram-to-Transmission bridge bot.
#[derive(Parser, Debug)]
#[command(
    name = "torrelay",
    author,
    version,
    about = "Relay torrent metafiles from a Telegram bot to a Transmission daemon"
)]
struct Args {
    /// Path to the configuration file (default: ./torrelay.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration; secrets may come from the environment instead.
    let mut config = BridgeConfig::load_or_default(args.config.as_deref())?;
    config.apply_env_overrides();
    config.validate()?;

    let daemon = DaemonClient::new(
        config.daemon.url.clone(),
        config.daemon.username.clone(),
        config.daemon.password.clone(),
        config.daemon.rpc_timeout(),
    )?;
    let chat =
        TelegramAdapter::new(config.telegram.bot_token.clone(), config.telegram.poll_timeout())?;

    Bridge::new(daemon, chat, config.flow.clone()).run().await;
    Ok(())
}
