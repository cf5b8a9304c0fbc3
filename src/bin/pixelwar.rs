//! # pixelwar CLI
//!
//! `serve` runs the map server; `cell-key` prints the grid key for a
//! coordinate, which is handy when poking at the WebSocket by hand.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pixelwar::auth::Ed25519Verifier;
use pixelwar::server::{self, AppState};
use pixelwar::store::{DurableStore, MemoryStore, SqliteStore};
use pixelwar::{CellKey, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelwar")]
#[command(about = "Real-time collaborative pixel map server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server
    Serve {
        /// JSON config file; missing file means defaults
        #[arg(short, long, default_value = "pixelwar.json")]
        config: PathBuf,
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite database path
        #[arg(short, long)]
        database: Option<PathBuf>,
        /// Keep everything in memory (nothing survives a restart)
        #[arg(long)]
        memory: bool,
    },
    /// Print the cell key for a latitude/longitude
    CellKey {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        step: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pixelwar=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            database,
            memory,
        } => {
            let mut settings = ServerConfig::load(&config).await?;
            settings.apply_env()?;
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(database) = database {
                settings.database_path = database;
            }
            settings.validate()?;

            let store: Arc<dyn DurableStore> = if memory {
                tracing::warn!("Using in-memory store; paints are lost on exit");
                Arc::new(MemoryStore::new())
            } else {
                let path = settings.database_path.clone();
                Arc::new(
                    SqliteStore::open(&path)
                        .await
                        .with_context(|| format!("opening {}", path.display()))?,
                )
            };

            let addr = settings.socket_addr()?;
            let state = AppState::build(store, Arc::new(Ed25519Verifier), settings)
                .await
                .context("hydrating grid from store")?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {}", addr))?;

            server::serve(listener, state, shutdown_signal()).await?;
        }
        Commands::CellKey { lat, lng, step } => {
            let step = step.unwrap_or_else(|| ServerConfig::default().grid_step);
            let key = CellKey::from_coords(lat, lng, step).with_context(|| {
                format!("no grid cell for ({}, {}) at step {}", lat, lng, step)
            })?;
            println!("{}", key);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl-C received");
}
