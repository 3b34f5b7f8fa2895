//! Counterline CLI - command-line interface for the terminal client.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use terminal_config_and_utils::{init_logging, Config, Paths};

/// Counterline CLI for authentication and session management.
#[derive(Parser)]
#[command(name = "counterline")]
#[command(about = "Counterline terminal authentication and session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Keep the session across restarts
        #[arg(short, long)]
        remember: bool,
    },

    /// Register a new account with email and password
    Register {
        /// Keep the session across restarts
        #[arg(short, long)]
        remember: bool,
    },

    /// SMS one-time password login
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },

    /// Check authentication status
    Status,

    /// Logout and clear session
    Logout,

    /// Run the session health loop in the foreground
    Watch,
}

#[derive(Subcommand)]
enum OtpCommands {
    /// Request an OTP for a phone number (E.164, e.g. +15551230000)
    Request { phone: String },
    /// Verify an OTP code
    Verify {
        phone: String,
        code: String,
        /// Keep the session across restarts
        #[arg(short, long)]
        remember: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let paths = Paths::new()?;
    let config = Config::load(&paths)?;
    tracing::debug!(config_file = %paths.config_file().display(), "Configuration loaded");
    let coordinator = commands::build_coordinator(&config, &paths)?;

    match cli.command {
        Commands::Login { remember } => {
            commands::auth::login(coordinator, remember, &cli.format).await
        }
        Commands::Register { remember } => {
            commands::auth::register(coordinator, remember, &cli.format).await
        }
        Commands::Otp { command } => match command {
            OtpCommands::Request { phone } => {
                commands::auth::otp_request(coordinator, &phone, &cli.format).await
            }
            OtpCommands::Verify {
                phone,
                code,
                remember,
            } => {
                commands::auth::otp_verify(coordinator, &phone, &code, remember, &cli.format)
                    .await
            }
        },
        Commands::Status => commands::auth::status(coordinator, &cli.format).await,
        Commands::Logout => commands::auth::logout(coordinator, &cli.format).await,
        Commands::Watch => {
            commands::auth::watch(
                coordinator,
                config.health_check_interval_secs,
                &cli.format,
            )
            .await
        }
    }
}
