use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "jellysweep",
    version,
    about = "A scheduled janitor that marks, warns, retains, and deletes watched media across Jellyfin, Sonarr and Radarr."
)]
pub struct Cli {
    /// Path to the config file
    #[clap(short, long, global = true, default_value = "jellysweep.toml")]
    pub config: PathBuf,

    /// Override `engine.dry_run` from the config file: log every mutation
    /// instead of performing it.
    #[clap(long, global = true)]
    pub dry_run: bool,

    /// Set the log level; accepts the same `target=level` syntax as
    /// `RUST_LOG` (e.g. `off,jellysweep=debug,reqwest=info`).
    #[clap(short, long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: crate::logging::LoggingSettings,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the cron scheduler and run cleanup passes on the configured
    /// schedule until shut down. The HTTP front-end is out of scope for this
    /// crate; `serve` only drives the engine.
    Serve,
}
