//! Postboard CLI - drive the client session from a terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use postboard_config::{init_logging, Config, Paths};
use tracing::debug;

/// Postboard CLI - Manage the Postboard sign-in session.
#[derive(Parser)]
#[command(name = "postboard")]
#[command(about = "Postboard CLI for account and session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with email and password
    Signup,

    /// Login with email and password
    Login,

    /// Logout and clear stored credentials
    Logout,

    /// Check authentication status
    Status,

    /// Follow session changes until interrupted, refreshing tokens as needed
    Watch,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, config.log_format);
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    config.validate()?;

    let mut client = commands::Client::open(&paths, &config)?;
    let result = match cli.command {
        Commands::Signup => commands::signup(&mut client, &cli.format).await,
        Commands::Login => commands::login(&mut client, &cli.format).await,
        Commands::Logout => commands::logout(&mut client, &cli.format).await,
        Commands::Status => commands::status(&mut client, &cli.format).await,
        Commands::Watch => commands::watch(&mut client, &cli.format).await,
    };
    client.close();
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&e.to_string(), &format);
        std::process::exit(1);
    }
}
