use brroyale_service::config::{self, ServiceConfig, DEFAULT_CONFIG_PATH};
use brroyale_service::ingest::noaa::NoaaClient;
use brroyale_service::logging;
use brroyale_service::model::ServiceError;
use brroyale_service::pipeline::{run_history, run_update};
use brroyale_service::snapshot::SnapshotStore;
use brroyale_service::stations::load_cities;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brroyale", version, about = "Battle Brr-oyale snowfall and cold leaderboards")]
struct Cli {
    /// Minimum log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: LevelFilter,

    /// Also append log entries to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<String>,

    /// Prefix console output with UTC timestamps (for cron runs)
    #[arg(long, global = true)]
    timestamps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the current-season leaderboards
    Update {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Backfill the multi-season snowfall archive
    History {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// First season (start year) to fetch
        #[arg(long, value_name = "YYYY")]
        start_season: Option<i32>,

        /// Last season (start year) to fetch
        #[arg(long, value_name = "YYYY")]
        end_season: Option<i32>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logger(cli.log_level, cli.log_file.as_deref(), cli.timestamps) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    if let Err(e) = run(cli.command) {
        error!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), ServiceError> {
    // Checked before anything else so a misconfigured cron job fails fast.
    let token = config::load_token()?;

    match command {
        Command::Update { config } => {
            let config = ServiceConfig::load(&config)?;
            let cities = load_cities(&config.cities_path)?;
            let mut client = NoaaClient::from_config(&config, token)?;
            let store = SnapshotStore::new(&config.output_dir);

            info!("❄️ Battle Brr-oyale update");
            let report = run_update(
                &config,
                &cities,
                &mut client,
                &store,
                Local::now().date_naive(),
                Utc::now(),
            )?;
            info!(
                "Done: {} snapshots written, {} storm events",
                report.written.len(),
                report.storm_events.len()
            );
        }
        Command::History {
            config,
            start_season,
            end_season,
        } => {
            let config = ServiceConfig::load(&config)?;
            let cities = load_cities(&config.cities_path)?;
            let mut client = NoaaClient::from_config(&config, token)?;
            let store = SnapshotStore::new(&config.output_dir);

            info!("❄️ Battle Brr-oyale history backfill");
            let archive = run_history(
                &config,
                &cities,
                &mut client,
                &store,
                start_season.unwrap_or(config.history_start_season),
                end_season.unwrap_or(config.history_end_season),
                Utc::now(),
            )?;
            info!("Done: {} cities archived", archive.cities.len());
        }
    }

    Ok(())
}
