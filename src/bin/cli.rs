//! Course Watch CLI
//!
//! Local execution entry point. For AWS Lambda, use `course-watch-lambda`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use course_watch::{
    config,
    error::{AppError, Result},
    models::{Config, CourseSnapshot},
    pipeline::{self, Monitor},
    storage,
};

/// Course Watch - e-learning course change monitor
#[derive(Parser, Debug)]
#[command(
    name = "course-watch",
    version,
    about = "Watches e-learning course pages and reports changes"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every course once
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check courses on the configured schedule until interrupted
    Watch,

    /// Validate the configuration file
    Validate,

    /// Show the stored snapshot of a course
    Show {
        /// Course id as used in the store
        course_id: String,
    },

    /// Diff two stored snapshot documents offline
    Diff {
        previous: PathBuf,
        current: PathBuf,
    },
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn read_snapshot(path: &Path) -> Result<CourseSnapshot> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded environment from {}", path.display());
    }

    let configured_level = Config::load_or_default(&cli.config).logging.level;
    init_logging(cli.verbose, &configured_level);

    match cli.command {
        Command::Run { json } => {
            let config = config::load_config(&cli.config)?;
            let monitor = Monitor::from_config(&config).await?;

            let summary = monitor.run_once(&config.courses()).await?;
            summary.log();

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }

        Command::Watch => {
            let config = config::load_config(&cli.config)?;
            let interval = config.monitor.interval()?;
            let monitor = Monitor::from_config(&config).await?;

            monitor
                .watch(&config.courses(), interval, config.monitor.run_on_startup)
                .await?;
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            let config = match config::load_config(&cli.config) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Config validation failed: {}", e);
                    return Err(e);
                }
            };

            log::info!(
                "✓ Config OK: {} course(s), {:?} storage, every {:?}",
                config.courses.len(),
                config.storage.backend,
                config.monitor.interval()?
            );
            if config.telegram.bot_token.is_none() {
                log::warn!("No Telegram bot token; notifications will only be logged");
            }
        }

        Command::Show { course_id } => {
            let config = config::load_config(&cli.config)?;
            let store = storage::open_store(&config.storage).await?;

            let Some(snapshot) = store.get_snapshot(&course_id).await? else {
                log::info!("No snapshot stored for {} yet.", course_id);
                return Ok(());
            };

            println!("{} ({})", snapshot.course_name, snapshot.course_id);
            println!("  url:     {}", snapshot.url);
            println!("  fetched: {}", snapshot.fetched_at);
            println!("  hash:    {}", snapshot.content_hash);
            println!("  items:   {}", snapshot.item_count());
            for item in &snapshot.items {
                let context = item.context.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default();
                println!("    {:<8} {}{}", item.kind.as_str(), item.title, context);
            }
        }

        Command::Diff { previous, current } => {
            let previous = read_snapshot(&previous)?;
            let current = read_snapshot(&current)?;
            if previous.course_id != current.course_id {
                return Err(AppError::validation(format!(
                    "snapshots belong to different courses: {} vs {}",
                    previous.course_id, current.course_id
                )));
            }

            if previous.content_hash == current.content_hash {
                println!("No changes (content hash {}).", current.content_hash);
                return Ok(());
            }

            let changes = pipeline::diff_snapshots(&previous, &current);
            println!("{} change(s) for {}", changes.len(), current.course_name);
            for change in &changes {
                println!("  {}", change.describe());
            }
        }
    }

    Ok(())
}
