//! The real-time synchronization engine.
//!
//! [`Engine`] wires together the grid cache, the delta fan-out, the room
//! registry and the persistence queue, and maps each [`ClientEvent`] onto
//! them. The WebSocket layer only moves frames in and out; everything it does
//! with a decoded event goes through [`Engine::dispatch`].

pub mod coordinator;
pub mod fanout;
pub mod grid;
pub mod persist;
pub mod rooms;

pub use coordinator::Coordinator;
pub use fanout::Fanout;
pub use grid::GridCache;
pub use persist::{
    PersistJob, PersistOutcome, PersistQueue, PersistStats, PersistStatsSnapshot, RetryPolicy,
};
pub use rooms::{Room, RoomManager, Session, SessionId};

use crate::alliance::AllianceResolver;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::{ChatMessage, ClientEvent};
use crate::store::DurableStore;
use std::sync::Arc;

pub struct Engine {
    coordinator: Coordinator,
    rooms: RoomManager,
    persist: PersistQueue,
}

impl Engine {
    /// Hydrate the grid from `store` and start the persistence worker.
    ///
    /// A store failure here is fatal: the engine never serves an unknown grid.
    pub async fn start(store: Arc<dyn DurableStore>, config: &ServerConfig) -> Result<Self> {
        let cells = store.load_cells().await?;
        let mut grid = GridCache::new();
        let loaded = grid.hydrate(cells);
        tracing::info!("Hydrated grid with {} cells", loaded);

        let policy = RetryPolicy::default()
            .with_max_retries(config.persist_max_retries)
            .with_initial_backoff(config.persist_retry_backoff());
        let (persist, _worker) =
            PersistQueue::spawn(store.clone(), policy, config.persist_queue_capacity);

        let resolver = AllianceResolver::new(store);
        let coordinator = Coordinator::new(
            grid,
            Fanout::new(config.broadcast_capacity),
            persist.clone(),
            resolver.clone(),
            config.validate_keys,
        );

        Ok(Self {
            coordinator,
            rooms: RoomManager::new(resolver, config.session_queue_capacity),
            persist,
        })
    }

    /// Apply one client event on behalf of `session`.
    pub async fn dispatch(&self, session: SessionId, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::PaintPixel {
                key,
                color,
                wallet_address,
            } => {
                self.coordinator.paint(key, color, wallet_address).await?;
            }
            ClientEvent::ErasePixel {
                key,
                wallet_address,
            } => {
                self.coordinator.erase(key, wallet_address)?;
            }
            ClientEvent::BatchPaint {
                updates,
                wallet_address,
            } => {
                self.coordinator.batch(updates, wallet_address)?;
            }
            ClientEvent::JoinAllianceRoom {
                alliance_id,
                wallet_address,
            } => {
                self.rooms
                    .join_alliance(session, &alliance_id, &wallet_address)
                    .await;
            }
            ClientEvent::JoinGlobalRoom => {
                self.rooms.join_global(session);
            }
            ClientEvent::AllianceChatMessage {
                alliance_id,
                message,
                sender,
                tag,
            } => {
                self.rooms
                    .alliance_chat(session, &alliance_id, ChatMessage::now(message, sender, tag));
            }
            ClientEvent::GlobalChatMessage {
                message,
                sender,
                tag,
            } => {
                self.rooms
                    .global_chat(ChatMessage::now(message, sender, tag));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    #[must_use]
    pub fn persist(&self) -> &PersistQueue {
        &self.persist
    }

    /// Wait for every queued durable write to finish.
    pub async fn flush(&self) {
        self.persist.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Cell, CellKey};

    #[tokio::test]
    async fn test_start_hydrates_from_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_cell(&Cell::new(CellKey::new("4,2"), "#FF0000"))
            .await
            .unwrap();
        let engine = Engine::start(store, &ServerConfig::default()).await.unwrap();
        assert_eq!(
            engine.coordinator().snapshot(),
            vec![(CellKey::new("4,2"), "#FF0000".to_string())]
        );
    }

    #[tokio::test]
    async fn test_start_fails_when_store_unreadable() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_reads(true);
        assert!(Engine::start(store, &ServerConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_routes_events() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::start(store.clone(), &ServerConfig::default())
            .await
            .unwrap();
        let (session, mut rx) = engine.rooms().register();

        let paint = ClientEvent::from_json(
            r##"{"event":"paint_pixel","data":{"key":"1,1","color":"#ABCDEF"}}"##,
        )
        .unwrap();
        engine.dispatch(session, paint).await.unwrap();
        engine
            .dispatch(session, ClientEvent::JoinGlobalRoom)
            .await
            .unwrap();
        engine
            .dispatch(
                session,
                ClientEvent::GlobalChatMessage {
                    message: "gm".into(),
                    sender: "anon".into(),
                    tag: None,
                },
            )
            .await
            .unwrap();
        engine.flush().await;

        assert_eq!(store.cell("1,1").unwrap().color, "#ABCDEF");
        assert_eq!(rx.recv().await.unwrap().name(), "global_message");
    }
}
