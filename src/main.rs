//! mirror-sync
//!
//! Polls a project-management service for changed tasks and keeps mirror
//! tasks in step with their originals.

use anyhow::{Result, bail};
use clap::Parser;
use mirror_sync::api::{HttpTaskService, TaskService};
use mirror_sync::cli::{Cli, Command};
use mirror_sync::config::{
    Config, ConfigLoader, ConfigPaths, ENV_API_TOKEN, SyncPreferences, SyncRules,
};
use mirror_sync::db::Database;
use mirror_sync::logging::{LogLevel, LogLevelFilter, Logger};
use mirror_sync::sync::{ChangeManager, PassOutcome};
use serde_json::json;
use std::fs::OpenOptions;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_tracing(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    // RUST_LOG wins over the -v switch when set.
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
    };
    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_with(
            ConfigPaths::discover().with_explicit_file(path),
            |name| std::env::var(name).ok(),
        )?,
        None => ConfigLoader::load()?,
    };

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    if let Some(rules_path) = &cli.rules {
        config.sync.rules_path = rules_path.into();
    }
    Ok(loader.into_config())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let config = load_config(&cli)?;

    if cli.command == Command::ExampleRules {
        print!("{}", SyncPreferences::example().to_yaml()?);
        return Ok(());
    }

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging.level
    };
    let log = Logger::new()
        .with_level_filter(Arc::new(LogLevelFilter::new(level)))
        .with_name("mirror_sync");

    let rules = SyncPreferences::load(&config.sync.rules_path)?.compile(&log);
    if rules.is_empty() {
        log.warning_with(
            "No mirror rules configured",
            json!({"rules_path": config.sync.rules_path.display().to_string()}),
        );
    }

    if config.service.api_token.is_empty() {
        bail!("no API token configured: set service.api_token or {ENV_API_TOKEN}");
    }
    let db = Database::open(&config.store.db_path)?;
    let api: Arc<dyn TaskService> = Arc::new(HttpTaskService::new(
        config.service.base_url.clone(),
        config.service.api_token.clone(),
        config.service.request_timeout(),
        log.clone(),
    )?);
    let manager = ChangeManager::new(api, db, &log);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::ExampleRules => {}
        Command::Sync => {
            for team_id in rules.all_team_ids() {
                match manager.resync_stored(&rules, &team_id).await {
                    Ok(synced) => log.info_with(
                        "Resynced stored tasks",
                        json!({"team_id": team_id, "num_tasks": synced}),
                    ),
                    Err(err) => log.warning_with(
                        "Failed to resync stored tasks",
                        json!({"team_id": team_id, "error": format!("{err:#}")}),
                    ),
                }
            }
            poll_all_teams(&manager, &rules, &cancel, &log).await;
        }
        Command::DbSync => {
            for team_id in rules.all_team_ids() {
                match manager.force_sync_all(&rules, &team_id, &cancel).await {
                    Ok(summary) => log.info_with(
                        "Finished db sync",
                        json!({
                            "team_id": team_id,
                            "checked": summary.checked,
                            "deleted": summary.deleted,
                            "failed": summary.failed,
                        }),
                    ),
                    Err(err) => log.warning_with(
                        "Failed db sync",
                        json!({"team_id": team_id, "error": format!("{err:#}")}),
                    ),
                }
            }
        }
        Command::Watch => {
            let mut interval = tokio::time::interval(config.sync.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log.info_with(
                "Watching for changes",
                json!({"poll_interval_seconds": config.sync.poll_interval().as_secs()}),
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                poll_all_teams(&manager, &rules, &cancel, &log).await;
            }
            log.info("Interrupted, stopping");
        }
    }

    Ok(())
}

/// One pass per team. Failures are logged and the next team is polled.
async fn poll_all_teams(
    manager: &ChangeManager,
    rules: &SyncRules,
    cancel: &CancellationToken,
    log: &Logger,
) {
    for team_id in rules.all_team_ids() {
        if cancel.is_cancelled() {
            return;
        }
        match manager.poll_team(rules, &team_id, cancel).await {
            Ok(PassOutcome::Completed(_)) => {}
            Ok(PassOutcome::Aborted { reason }) => log.warning_with(
                "Team pass aborted, cursor unchanged",
                json!({"team_id": team_id, "reason": reason}),
            ),
            Ok(PassOutcome::Cancelled) => {
                log.info_with("Team pass cancelled", json!({"team_id": team_id}));
                return;
            }
            Err(err) => log.warning_with(
                "Team pass failed",
                json!({"team_id": team_id, "error": format!("{err:#}")}),
            ),
        }
    }
}
