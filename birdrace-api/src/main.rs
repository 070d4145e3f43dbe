//! BirdRace API (birdrace-api) - Main entry point
//!
//! Runs the HTTP service, or imports an eBird export from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use birdrace_api::auth::magic_link::normalize_email;
use birdrace_api::db::users;
use birdrace_api::{email, import, AppState};
use birdrace_common::config::{Config, ConfigOverrides};
use birdrace_common::db::init_database;

/// Command-line arguments for birdrace-api
#[derive(Parser, Debug)]
#[command(name = "birdrace-api")]
#[command(about = "Big year birding competition service")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "BIRDRACE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Competition year
    #[arg(long, global = true)]
    year: Option<i32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Import an eBird CSV export for a user
    Import {
        /// Owner of the observations; the account is created if new
        #[arg(long)]
        email: String,
        /// Path to the eBird CSV export
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before config loading so config problems are logged
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        config_file: cli.config.clone(),
        data_folder: cli.data_folder.clone(),
        bind_address: cli.bind.clone(),
        port: cli.port,
        target_year: cli.year,
    };
    let config = Config::load(&overrides).context("Failed to load configuration")?;
    config
        .ensure_data_folder()
        .context("Failed to create data folder")?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::Import { email, file } => run_import(pool, config, &email, &file).await,
    }
}

async fn serve(pool: sqlx::SqlitePool, config: Config) -> Result<()> {
    info!("Starting birdrace-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Competition year: {}", config.target_year);

    let addr = format!("{}:{}", config.bind_address, config.port);

    let mailer = email::create_provider(&config.email).context("Failed to configure email")?;
    info!("Email provider: {}", mailer.name());

    let state = AppState::new(pool, config, mailer).context("Failed to build application state")?;
    let app = birdrace_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_import(
    pool: sqlx::SqlitePool,
    config: Config,
    email: &str,
    file: &Path,
) -> Result<()> {
    let email = normalize_email(email)
        .ok_or_else(|| anyhow::anyhow!("Invalid email address: {}", email))?;
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let user = users::get_or_create_user(&pool, &email).await?;
    info!(
        "Importing {} for {} ({})",
        file.display(),
        user.email,
        config.target_year
    );

    let stats = import::import_file(&pool, &bytes, user.id, config.target_year).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
