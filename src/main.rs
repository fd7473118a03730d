mod adapters;
mod api;
mod arbiter;
mod cache;
mod cli;
mod config;
mod disk;
mod engine;
mod errors;
mod history;
mod http;
mod logging;
mod scheduler;
mod tags;

use clap::Parser;
use cli::{Cli, Command};
use engine::Pipeline;
use history::HistoryStore;
use http::{JellyfinClient, PlaybackStatsClient, RadarrClient, SonarrClient};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = logging::setup_logging(args.log_level.clone()) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::from(2);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<errors::EngineError>() {
            Some(errors::EngineError::Configuration(msg)) => {
                log::error!("configuration invalid: {msg}");
                ExitCode::from(1)
            }
            _ => {
                log::error!("fatal runtime error: {e:#}");
                ExitCode::from(2)
            }
        },
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let mut config = config::Config::load(&args.config).await?;
    if args.dry_run {
        config.engine.dry_run = true;
    }

    let jellyfin = JellyfinClient::new(&config.jellyfin)?;
    validate_libraries_against_server(&config, &jellyfin).await?;

    let playback = Arc::new(PlaybackStatsClient::new(
        &config.playback_stats.base_url,
        &config.playback_stats.api_key,
        config.playback_stats.backend,
        &config.playback_stats.server_id,
    )?);

    let sonarr = SonarrClient::new(&config.sonarr.base_url, &config.sonarr.api_key, config.engine.dry_run)?;
    let radarr = RadarrClient::new(&config.radarr.base_url, &config.radarr.api_key, config.engine.dry_run)?;

    let cache = cache::PrefixedCache::new();
    let _sweeper = cache.spawn_sweeper();

    let tv: Arc<dyn adapters::TvManagerAdapter> = Arc::new(adapters::TvAdapter::new(sonarr, cache.clone()));
    let movie: Arc<dyn adapters::ManagerAdapter> = Arc::new(adapters::MovieAdapter::new(radarr, cache.clone()));

    let history = HistoryStore::connect(&config.engine.history_db_path).await?;
    let notifier: Arc<dyn engine::Notifier> = Arc::new(engine::pipeline::LoggingNotifier);

    let pipeline = Arc::new(Pipeline::new(
        jellyfin,
        playback,
        tv,
        movie,
        history,
        notifier,
        config.libraries.clone(),
        config.engine.cleanup_mode,
        config.engine.keep_count,
        config.engine.adapter_concurrency,
        config.engine.dry_run,
    ));

    match args.command {
        Command::Serve => serve(pipeline, &config.engine.cleanup_schedule).await,
    }
}

/// Resolves every configured, enabled `[[libraries]]` entry against the
/// streaming server's own library list. An unresolvable library is a
/// startup-fatal configuration error, never a silently-dropped title per
/// run (spec §9's library-naming Open Question).
async fn validate_libraries_against_server(config: &config::Config, jellyfin: &JellyfinClient) -> anyhow::Result<()> {
    let known: std::collections::HashSet<String> =
        jellyfin.libraries().await?.into_iter().map(|l| l.name).collect();

    for library in &config.libraries {
        if library.enabled && !known.contains(&library.name) {
            return Err(errors::EngineError::Configuration(format!(
                "configured library {:?} does not exist on the streaming server",
                library.name
            ))
            .into());
        }
    }
    Ok(())
}

async fn serve(pipeline: Arc<Pipeline>, cleanup_schedule: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut scheduler = scheduler::Scheduler::new(pipeline, cleanup_schedule, cancel.clone()).await?;
    scheduler.start().await?;

    log::info!("jellysweep is running; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received, draining scheduler");
    scheduler.shutdown().await?;

    Ok(())
}
