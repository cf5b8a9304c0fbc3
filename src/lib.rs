//! pixelwar: real-time collaborative pixel map server.
//!
//! The crate is organised around a synchronization engine and the request
//! surface that sits on top of it:
//!
//! - **engine**: grid cache, paint/erase coordinator, delta fan-out, rooms and
//!   the background persistence queue.
//! - **alliance**: alliance membership resolution, alliance lifecycle and
//!   user profiles.
//! - **store**: the durable store abstraction with SQLite and in-memory
//!   backends.
//! - **server**: axum routes and the WebSocket session loop.

pub mod alliance;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;
pub mod types;

// Top-level re-exports for common usage
pub use crate::config::ServerConfig;
pub use crate::engine::Engine;
pub use crate::error::{PixelError, Result};
pub use crate::protocol::{ClientEvent, ServerEvent};
pub use crate::types::{Cell, CellDelta, CellKey};
