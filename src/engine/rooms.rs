//! Viewer sessions and room membership.
//!
//! Every live connection owns a [`Session`] entry holding an outbound queue and
//! the set of rooms it was admitted to. Scoped chat is delivered by walking the
//! registry and pushing onto the queues of members of the target room. Queues
//! are bounded: a viewer that stops reading loses chat lines, not memory.
//!
//! # Session Lifecycle
//!
//! ```text
//! register ──► Connected{} ──► join_global / join_alliance ──► Connected{rooms}
//!                  │                                                │
//!                  └──────────────► unregister (terminal) ◄─────────┘
//! ```
//!
//! Dropping a session drops its memberships; there is no resume.

use crate::alliance::AllianceResolver;
use crate::protocol::{ChatMessage, ServerEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

pub type SessionId = Uuid;

/// A chat room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Global,
    Alliance(String),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Global => f.write_str("global"),
            Room::Alliance(id) => write!(f, "alliance_{}", id),
        }
    }
}

/// Registry entry for one connection.
#[derive(Debug)]
pub struct Session {
    tx: mpsc::Sender<Arc<ServerEvent>>,
    rooms: HashSet<Room>,
}

/// Tracks connected viewers and their room memberships.
///
/// # Thread Safety
///
/// The registry sits behind a `parking_lot::Mutex`; the lock is never held
/// across an `.await`.
pub struct RoomManager {
    sessions: Mutex<HashMap<SessionId, Session>>,
    resolver: AllianceResolver,
    queue_capacity: usize,
}

impl RoomManager {
    /// `queue_capacity` bounds the scoped events pending for each session.
    pub fn new(resolver: AllianceResolver, queue_capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            resolver,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection with no rooms. The receiver yields scoped
    /// events addressed to this session.
    pub fn register(&self) -> (SessionId, mpsc::Receiver<Arc<ServerEvent>>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.sessions.lock().insert(
            id,
            Session {
                tx,
                rooms: HashSet::new(),
            },
        );
        tracing::info!("Session {} connected", id);
        (id, rx)
    }

    pub fn unregister(&self, session: SessionId) {
        if self.sessions.lock().remove(&session).is_some() {
            tracing::info!("Session {} disconnected", session);
        }
    }

    /// Admit the session to the global room. Returns `false` for unknown sessions.
    pub fn join_global(&self, session: SessionId) -> bool {
        self.admit(session, Room::Global)
    }

    /// Admit the session to `alliance_<id>` if `wallet` is a stored member of
    /// that alliance. Requests that fail the check are ignored.
    pub async fn join_alliance(&self, session: SessionId, alliance_id: &str, wallet: &str) -> bool {
        if !self.resolver.is_member_of(wallet, alliance_id).await {
            tracing::debug!(
                "Session {} denied alliance room {} for {}",
                session,
                alliance_id,
                wallet
            );
            return false;
        }
        self.admit(session, Room::Alliance(alliance_id.to_string()))
    }

    fn admit(&self, session: SessionId, room: Room) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(&session) else {
            return false;
        };
        tracing::info!("Session {} joined {}", session, room);
        entry.rooms.insert(room);
        true
    }

    /// Deliver an alliance chat line. Dropped unless the sender's session was
    /// itself admitted to the room. Returns the number of recipients.
    pub fn alliance_chat(&self, sender: SessionId, alliance_id: &str, chat: ChatMessage) -> usize {
        let room = Room::Alliance(alliance_id.to_string());
        let admitted = self
            .sessions
            .lock()
            .get(&sender)
            .is_some_and(|s| s.rooms.contains(&room));
        if !admitted {
            tracing::debug!("Dropping chat from {} to {}: not a member", sender, room);
            return 0;
        }
        self.deliver(&room, ServerEvent::AllianceMessage(chat))
    }

    /// Deliver a global chat line to every global room member.
    pub fn global_chat(&self, chat: ChatMessage) -> usize {
        self.deliver(&Room::Global, ServerEvent::GlobalMessage(chat))
    }

    fn deliver(&self, room: &Room, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let sessions = self.sessions.lock();
        let mut delivered = 0;
        for (id, session) in sessions.iter().filter(|(_, s)| s.rooms.contains(room)) {
            match session.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Session {} is not reading, dropping {} line", id, room);
                }
                // The connection task is already gone; unregister follows.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    #[must_use]
    pub fn rooms_of(&self, session: SessionId) -> Vec<Room> {
        self.sessions
            .lock()
            .get(&session)
            .map(|s| s.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
