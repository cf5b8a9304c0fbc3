//! Real-time channel event contract.
//!
//! Every frame exchanged over the WebSocket is one of the tagged variants in
//! [`events`], encoded as JSON `{"event": "<name>", "data": <payload>}`.

mod events;

pub use events::{ChatMessage, ClientEvent, ServerEvent};
