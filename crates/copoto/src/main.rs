//! Copoto - command-line client for the Copoto community board
//!
//! Main entry point for the Copoto CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod navigator;

use commands::{config, login, logout, request, resume, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Copoto - command-line client for the Copoto community board
#[derive(Parser)]
#[command(name = "copoto")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: current context, then http://localhost:8080)
    #[arg(long, global = true, env = "COPOTO_SERVER_URL")]
    pub server: Option<String>,

    /// Named context from client.yaml
    #[arg(long, global = true, env = "COPOTO_CONTEXT")]
    pub context: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store session credentials
    Login(login::LoginArgs),

    /// Sign out and clear stored credentials
    Logout(logout::LogoutArgs),

    /// Show session status
    Status(status::StatusArgs),

    /// Send an authenticated API request
    Request(request::RequestArgs),

    /// Return to where the last session ended
    Resume(resume::ResumeArgs),

    /// Manage server contexts
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "copoto=debug,copoto_client=debug,copoto_config=debug,info"
    } else {
        "copoto=info,copoto_client=info,warn"
    };

    let log_dir = copoto_config::log_dir().unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "copoto.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "copoto=trace,copoto_client=trace,copoto_config=trace,info",
                )),
        )
        .init();

    let client_config = copoto_config::load_client_config()?;
    let server_url =
        client_config.resolve_server(cli.server.as_deref(), cli.context.as_deref())?;
    let timeout = client_config.resolve_timeout(cli.context.as_deref())?;

    let ctx = commands::Context {
        server_url,
        context: cli.context.or(client_config.current_context.clone()),
        timeout,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Login(args) => login::run(args, &ctx).await,
        Commands::Logout(args) => logout::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Request(args) => request::run(args, &ctx).await,
        Commands::Resume(args) => resume::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
