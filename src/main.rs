mod collectors;
mod config;
mod discord;
mod report;
mod ssh;
mod state;

use chrono::Local;
use clap::Parser;
use config::Config;
use discord::DiscordClient;
use ssh::SshConnector;
use state::StatusMessageHandle;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleetmond")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Run a single status cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let token = match resolve_bot_token(&cfg) {
        Ok(token) => token,
        Err(err) => {
            error!(error = %err, "failed to resolve Discord bot token");
            std::process::exit(1);
        }
    };

    let chat = match DiscordClient::login(token).await {
        Ok(chat) => chat,
        Err(err) => {
            error!(error = %err, "failed to authenticate with Discord");
            std::process::exit(1);
        }
    };
    if let Err(err) = chat.fetch_channel(&cfg.discord.channel_id).await {
        error!(error = %err, channel = %cfg.discord.channel_id, "status channel is not reachable");
        std::process::exit(1);
    }

    info!(
        channel = %cfg.discord.channel_id,
        interval_secs = cfg.interval_secs,
        servers = cfg.servers.len(),
        "fleetmond started"
    );

    let shell = SshConnector::new(Duration::from_secs(cfg.remote_timeout_secs));
    let mut handle = StatusMessageHandle::new();

    if cli.once {
        run_cycle(&cfg, &chat, &shell, &mut handle).await;
        return;
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    run_cycle(&cfg, &chat, &shell, &mut handle).await;
                }
            }
        }
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;
}

/// One full cycle: poll every server in configuration order, render the
/// report, upsert the status message. Failures are logged and swallowed so
/// the next tick always gets its chance.
async fn run_cycle(
    cfg: &Config,
    chat: &DiscordClient,
    shell: &SshConnector,
    handle: &mut StatusMessageHandle,
) {
    let results = collectors::collect_fleet(cfg, shell).await;
    let text = report::render(&results, Local::now().naive_local());

    match state::upsert_status(chat, &cfg.discord.channel_id, handle, &text).await {
        Ok(outcome) => info!(?outcome, "status message updated"),
        Err(err) => error!(error = %err, "status message upsert failed"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_bot_token(cfg: &Config) -> Result<String, String> {
    let env_name = &cfg.discord.bot_token_env;
    if let Ok(value) = std::env::var(env_name) {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }

    if let Some(value) = cfg
        .discord
        .bot_token
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        return Ok(value);
    }

    Err(format!(
        "no Discord token found: set '{env_name}' in the environment or discord.bot_token in the config"
    ))
}
