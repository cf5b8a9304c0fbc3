use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Initial and maximum droplet budget of a fresh user record.
pub const DEFAULT_DROPLETS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllianceRole {
    #[default]
    Member,
    Leader,
    Officer,
}

impl AllianceRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AllianceRole::Member => "Member",
            AllianceRole::Leader => "Leader",
            AllianceRole::Officer => "Officer",
        }
    }

    /// Parse a stored role name; unknown values fall back to `Member`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Leader" => AllianceRole::Leader,
            "Officer" => AllianceRole::Officer,
            _ => AllianceRole::Member,
        }
    }
}

/// A wallet's profile.
///
/// Users are created implicitly on first profile update, first paint with a
/// wallet, or first alliance action, and are never deleted. The droplet
/// fields are persisted but no mutation path reads or spends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub wallet_address: String,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub droplets: u32,
    pub max_droplets: u32,
    pub last_refill: DateTime<Utc>,
    /// Net painted cells; erases decrement without a floor.
    pub total_pixels: i64,
    pub alliance_id: Option<String>,
    pub alliance_role: AllianceRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(wallet_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            wallet_address: wallet_address.into(),
            username: None,
            avatar: None,
            droplets: DEFAULT_DROPLETS,
            max_droplets: DEFAULT_DROPLETS,
            last_refill: now,
            total_pixels: 0,
            alliance_id: None,
            alliance_role: AllianceRole::Member,
            created_at: now,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_allied(&self) -> bool {
        self.alliance_id.is_some()
    }
}
