//! CLI entry point for the magnet-relay tool.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use magnet_relay::cli::{Args, Command, ConfigCommand, DomainsCommand, HistoryCommand, LogsCommand};
use magnet_relay::commands::{
    run_config_set_retention, run_config_set_token, run_config_show, run_domains_add,
    run_domains_list, run_domains_reset, run_domains_set, run_history_clear, run_history_list,
    run_history_sweep, run_logs_clear, run_logs_show, run_submit_command, run_watch_command,
    AppContext,
};
use magnet_relay::notify::TerminalNotifier;
use magnet_relay::Database;

const DEFAULT_DB_DIR: &str = ".magnet-relay";
const DEFAULT_DB_FILE: &str = "relay.db";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let db_path = match &args.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };

    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let ctx = AppContext::new(db, Arc::new(TerminalNotifier));

    // Startup sweep keeps the history bounded even for one-shot commands
    match ctx.settings.retention_window().await {
        Ok(window) => {
            if let Err(e) = ctx.history.sweep_expired(window).await {
                warn!(error = %e, "startup sweep failed");
            }
        }
        Err(e) => warn!(error = %e, "retention lookup failed, startup sweep skipped"),
    }

    let result = dispatch(&ctx, &args.command).await;

    ctx.db.clone().close().await;
    result
}

async fn dispatch(ctx: &AppContext, command: &Command) -> Result<()> {
    match command {
        Command::Submit { inputs, origin } => {
            run_submit_command(ctx, inputs, origin.as_deref()).await
        }
        Command::Watch { origin } => {
            info!("starting watch mode");
            run_watch_command(ctx, origin.as_deref()).await
        }
        Command::Domains { command } => match command {
            DomainsCommand::List => run_domains_list(ctx).await,
            DomainsCommand::Set { domains } => run_domains_set(ctx, domains).await,
            DomainsCommand::Add { domain } => run_domains_add(ctx, domain).await,
            DomainsCommand::Reset => run_domains_reset(ctx).await,
        },
        Command::Logs { command } => match command {
            LogsCommand::Show {
                level,
                component,
                limit,
            } => run_logs_show(ctx, level.as_deref(), component.as_deref(), *limit).await,
            LogsCommand::Clear => run_logs_clear(ctx).await,
        },
        Command::History { command } => match command {
            HistoryCommand::List { limit } => run_history_list(ctx, *limit).await,
            HistoryCommand::Clear => run_history_clear(ctx).await,
            HistoryCommand::Sweep => run_history_sweep(ctx).await,
        },
        Command::Config { command } => match command {
            ConfigCommand::SetToken { token } => run_config_set_token(ctx, token).await,
            ConfigCommand::SetRetention { days } => run_config_set_retention(ctx, *days).await,
            ConfigCommand::Show => run_config_show(ctx).await,
        },
    }
}

fn default_db_path() -> Result<PathBuf> {
    let dir = PathBuf::from(DEFAULT_DB_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    Ok(dir.join(DEFAULT_DB_FILE))
}
