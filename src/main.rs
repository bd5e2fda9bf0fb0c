use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "levelup")]
#[command(about = "Gamification reward engine - points, XP levels and daily streaks")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.levelup/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the rewards database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a rewardable event and apply the reward rules
    Record {
        #[arg(long)]
        user: String,

        /// Event type tag (e.g. lesson_complete, test_solved)
        #[arg(long = "type")]
        event_type: String,

        /// JSON payload (e.g. '{"firstAttempt": true}')
        #[arg(long)]
        payload: Option<String>,
    },

    /// Record today's login and advance the streak
    Login {
        #[arg(long)]
        user: String,
    },

    /// Apply a raw XP adjustment (may be negative)
    Xp {
        #[arg(long)]
        user: String,

        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
    },

    /// Show balance, level and streak for a user
    Show {
        #[arg(long)]
        user: String,
    },

    /// Show the point ledger for a user
    History {
        #[arg(long)]
        user: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Show recorded events instead of ledger rows
        #[arg(long)]
        events: bool,
    },

    /// Show the top users by lifetime XP
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Check balances against the point ledger
    Audit {
        /// Audit a single user (defaults to everyone)
        #[arg(long)]
        user: Option<String>,
    },

    /// Initialize a new config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = cli.config;
    let db_path = cli.db;
    let engine = || cli::open_engine(config_path.as_deref(), db_path.clone());

    match cli.command {
        Commands::Record {
            user,
            event_type,
            payload,
        } => {
            cli::record::record_command(&engine()?, &user, &event_type, payload).await?;
        }
        Commands::Login { user } => {
            cli::record::login_command(&engine()?, &user).await?;
        }
        Commands::Xp { user, delta } => {
            cli::record::xp_command(&engine()?, &user, delta).await?;
        }
        Commands::Show { user } => {
            cli::show::show_command(&engine()?, &user).await?;
        }
        Commands::History {
            user,
            limit,
            events,
        } => {
            cli::show::history_command(&engine()?, &user, limit, events).await?;
        }
        Commands::Leaderboard { limit } => {
            cli::show::leaderboard_command(&engine()?, limit).await?;
        }
        Commands::Audit { user } => {
            cli::audit::audit_command(&engine()?, user).await?;
        }
        Commands::Init { force } => {
            cli::init::init_command(config_path.clone(), force).await?;
        }
    }

    Ok(())
}
