//! polymath: command-line client for Polymath content interactions
//!
//! Talks to the hosted backend through `polymath-sdk`: hydrate and toggle
//! likes/bookmarks, read counts, load feeds, comment, chat and search.

use std::path::PathBuf;

use clap::Parser;
use polymath_cli::{App, Command, Config};
use polymath_client::PostgrestClient;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polymath")]
#[command(about = "Command-line client for Polymath content interactions")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "polymath.toml")]
    config: PathBuf,

    /// Backend URL (overrides config file)
    #[arg(long, env = "POLYMATH_URL")]
    url: Option<String>,

    /// Public anon key (overrides config file)
    #[arg(long, env = "POLYMATH_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    /// Signed-in user's access token (overrides config file)
    #[arg(long, env = "POLYMATH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Acting user id; commands that write need one
    #[arg(short, long, env = "POLYMATH_USER_ID")]
    user_id: Option<String>,

    /// Log level for polymath crates
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env feeds the clap env fallbacks below
    let dotenv = dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("polymath={},info", cli.log_level))),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let mut config = Config::load(&cli.config)?;
    config.apply_overrides(cli.url, cli.anon_key, cli.access_token);
    config.validate()?;

    info!(url = %config.backend.url, policy = ?config.interactions.counter_policy, "Connecting to backend");

    let client = PostgrestClient::new(config.client_config())?;
    let app = App::new(client, config.interactions.counter_policy, cli.user_id);

    match app.execute(cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
