//! Tagged client and server events.
//!
//! # Event Table
//!
//! | Direction | Event | Payload |
//! |-----------|-------|---------|
//! | server→client | `init_state` | `[[key, color], ...]` |
//! | client→server | `paint_pixel` | `{key, color, walletAddress?}` |
//! | client→server | `erase_pixel` | `{key, walletAddress?}` |
//! | client→server | `batch_paint` | `{updates: [{key, color}], walletAddress?}` |
//! | server→client | `pixel_update` | `{key, color}` |
//! | server→client | `pixel_erase` | `{key}` |
//! | server→client | `batch_update` | `[{key, color}]` |
//! | client→server | `join_alliance_room` | `{allianceId, walletAddress}` |
//! | client→server | `join_global_room` | none |
//! | client→server | `alliance_chat_message` | `{allianceId, message, sender, tag?}` |
//! | client→server | `global_chat_message` | `{message, sender, tag?}` |
//! | server→client | `alliance_message` / `global_message` | `{message, sender, tag?, timestamp}` |
//!
//! # Examples
//!
//! ```
//! use pixelwar::protocol::ClientEvent;
//!
//! let event = ClientEvent::from_json(
//!     r##"{"event":"paint_pixel","data":{"key":"4,2","color":"#FF0000"}}"##,
//! ).unwrap();
//! assert!(matches!(event, ClientEvent::PaintPixel { .. }));
//! ```

use crate::error::Result;
use crate::types::{CellDelta, CellKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    PaintPixel {
        key: CellKey,
        color: String,
        #[serde(default)]
        wallet_address: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ErasePixel {
        key: CellKey,
        #[serde(default)]
        wallet_address: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    BatchPaint {
        updates: Vec<CellDelta>,
        #[serde(default)]
        wallet_address: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    JoinAllianceRoom {
        alliance_id: String,
        wallet_address: String,
    },
    JoinGlobalRoom,
    #[serde(rename_all = "camelCase")]
    AllianceChatMessage {
        alliance_id: String,
        message: String,
        sender: String,
        #[serde(default)]
        tag: Option<String>,
    },
    GlobalChatMessage {
        message: String,
        sender: String,
        #[serde(default)]
        tag: Option<String>,
    },
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::PaintPixel { .. } => "paint_pixel",
            ClientEvent::ErasePixel { .. } => "erase_pixel",
            ClientEvent::BatchPaint { .. } => "batch_paint",
            ClientEvent::JoinAllianceRoom { .. } => "join_alliance_room",
            ClientEvent::JoinGlobalRoom => "join_global_room",
            ClientEvent::AllianceChatMessage { .. } => "alliance_chat_message",
            ClientEvent::GlobalChatMessage { .. } => "global_chat_message",
        }
    }
}

/// A chat line as delivered to room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    #[must_use]
    pub fn now(message: String, sender: String, tag: Option<String>) -> Self {
        Self {
            message,
            sender,
            tag,
            timestamp: Utc::now(),
        }
    }
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full grid snapshot, unicast to a joining viewer.
    InitState(Vec<(CellKey, String)>),
    PixelUpdate(CellDelta),
    PixelErase { key: CellKey },
    BatchUpdate(Vec<CellDelta>),
    AllianceMessage(ChatMessage),
    GlobalMessage(ChatMessage),
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::InitState(_) => "init_state",
            ServerEvent::PixelUpdate(_) => "pixel_update",
            ServerEvent::PixelErase { .. } => "pixel_erase",
            ServerEvent::BatchUpdate(_) => "batch_update",
            ServerEvent::AllianceMessage(_) => "alliance_message",
            ServerEvent::GlobalMessage(_) => "global_message",
        }
    }

    /// Whether this is a grid delta (as opposed to a snapshot or chat).
    #[must_use]
    pub fn is_delta(&self) -> bool {
        matches!(
            self,
            ServerEvent::PixelUpdate(_) | ServerEvent::PixelErase { .. } | ServerEvent::BatchUpdate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paint_pixel_without_wallet() {
        let event = ClientEvent::from_json(
            r##"{"event":"paint_pixel","data":{"key":"4,2","color":"#FF0000"}}"##,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::PaintPixel {
                key: CellKey::new("4,2"),
                color: "#FF0000".into(),
                wallet_address: None,
            }
        );
    }

    #[test]
    fn test_batch_paint_camel_case_wallet() {
        let event = ClientEvent::from_json(
            r##"{"event":"batch_paint","data":{"updates":[{"key":"0,0","color":"#111111"}],"walletAddress":"W"}}"##,
        )
        .unwrap();
        match event {
            ClientEvent::BatchPaint {
                updates,
                wallet_address,
            } => {
                assert_eq!(updates, vec![CellDelta::new("0,0", "#111111")]);
                assert_eq!(wallet_address.as_deref(), Some("W"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_join_global_room_has_no_payload() {
        let event = ClientEvent::from_json(r#"{"event":"join_global_room"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinGlobalRoom);
        assert_eq!(event.name(), "join_global_room");
    }

    #[test]
    fn test_join_alliance_room_fields() {
        let event = ClientEvent::from_json(
            r#"{"event":"join_alliance_room","data":{"allianceId":"a1","walletAddress":"W"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinAllianceRoom {
                alliance_id: "a1".into(),
                wallet_address: "W".into(),
            }
        );
    }

    #[test]
    fn test_unknown_event_is_error() {
        assert!(ClientEvent::from_json(r#"{"event":"nuke_map","data":{}}"#).is_err());
    }

    #[test]
    fn test_init_state_wire_shape() {
        let event = ServerEvent::InitState(vec![(CellKey::new("1,1"), "#000000".into())]);
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "init_state", "data": [["1,1", "#000000"]]}));
    }

    #[test]
    fn test_delta_wire_shapes() {
        let update = ServerEvent::PixelUpdate(CellDelta::new("4,2", "#00FF00"));
        let value: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"event": "pixel_update", "data": {"key": "4,2", "color": "#00FF00"}})
        );

        let erase = ServerEvent::PixelErase {
            key: CellKey::new("4,2"),
        };
        let value: serde_json::Value = serde_json::to_value(&erase).unwrap();
        assert_eq!(value, json!({"event": "pixel_erase", "data": {"key": "4,2"}}));
        assert!(erase.is_delta());
    }

    #[test]
    fn test_chat_message_omits_missing_tag() {
        let msg = ChatMessage::now("hi".into(), "bob".into(), None);
        let value = serde_json::to_value(ServerEvent::GlobalMessage(msg)).unwrap();
        assert!(value["data"].get("tag").is_none());
        assert!(value["data"].get("timestamp").is_some());
    }
}
