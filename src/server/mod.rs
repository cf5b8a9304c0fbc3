//! HTTP and WebSocket surface.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/profile` | signed profile upsert |
//! | GET | `/api/user/{wallet}` | user with alliance embedded |
//! | POST | `/api/alliance/create` | signed alliance creation |
//! | POST | `/api/alliance/join` | signed join by tag or id |
//! | POST | `/api/alliance/kick` | signed leader-only kick |
//! | GET | `/api/alliance/{id}` | alliance record |
//! | GET | `/api/alliances` | alliances by member count |
//! | GET | `/api/leaderboard` | alliances by painted cells |
//! | GET | `/ws` | real-time session |

mod handlers;
mod ws;

use crate::alliance::{AllianceService, ProfileService};
use crate::auth::SignatureVerifier;
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::store::DurableStore;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub alliances: AllianceService,
    pub profiles: ProfileService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Start the engine (hydrating the grid) and build the request services.
    pub async fn build(
        store: Arc<dyn DurableStore>,
        verifier: Arc<dyn SignatureVerifier>,
        config: ServerConfig,
    ) -> Result<Self> {
        let engine = Engine::start(store.clone(), &config).await?;
        Ok(Self {
            engine: Arc::new(engine),
            alliances: AllianceService::new(
                store.clone(),
                verifier.clone(),
                config.default_alliance_color.clone(),
            ),
            profiles: ProfileService::new(store, verifier),
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile", post(handlers::update_profile))
        .route("/api/user/{wallet}", get(handlers::get_user))
        .route("/api/alliance/create", post(handlers::create_alliance))
        .route("/api/alliance/join", post(handlers::join_alliance))
        .route("/api/alliance/kick", post(handlers::kick_member))
        .route("/api/alliance/{id}", get(handlers::get_alliance))
        .route("/api/alliances", get(handlers::list_alliances))
        .route("/api/leaderboard", get(handlers::leaderboard))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain the persistence queue.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = state.engine.clone();
    tracing::info!("Pixel map listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Shutting down, flushing pending writes");
    engine.flush().await;
    let stats = engine.persist().stats();
    tracing::info!(
        "Persistence totals: {} stored, {} failed, {} retries",
        stats.succeeded,
        stats.failed,
        stats.retried
    );
    Ok(())
}
