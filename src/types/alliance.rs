use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AllianceId = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllianceStats {
    pub total_pixels: i64,
    pub rank: u32,
}

/// A named, uniquely colored group of wallets with one leader.
///
/// # Invariants
///
/// - `leader` is always contained in `members`
/// - `name`, `tag` and `color` are unique among alliances at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alliance {
    pub id: AllianceId,
    pub name: String,
    pub tag: String,
    pub leader: String,
    pub members: Vec<String>,
    pub description: String,
    pub color: String,
    pub avatar: String,
    pub stats: AllianceStats,
    pub created_at: DateTime<Utc>,
}

impl Alliance {
    /// New alliance led (and solely populated) by `leader`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        leader: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        let leader = leader.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            tag: tag.into(),
            members: vec![leader.clone()],
            leader,
            description: String::new(),
            color: color.into(),
            avatar: "default".to_string(),
            stats: AllianceStats::default(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_member(&self, wallet: &str) -> bool {
        self.members.iter().any(|m| m == wallet)
    }

    /// Append a member, keeping the set free of duplicates.
    pub fn add_member(&mut self, wallet: &str) {
        if !self.is_member(wallet) {
            self.members.push(wallet.to_string());
        }
    }

    /// Remove a member. Returns `false` if the wallet was not a member.
    pub fn remove_member(&mut self, wallet: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != wallet);
        self.members.len() != before
    }

    #[must_use]
    pub fn badge(&self) -> AllianceBadge {
        AllianceBadge {
            id: self.id.clone(),
            tag: self.tag.clone(),
            color: self.color.clone(),
        }
    }
}

/// The slice of an alliance the paint path needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceBadge {
    pub id: AllianceId,
    pub tag: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub alliance_id: AllianceId,
    pub name: String,
    pub tag: String,
    pub color: String,
    pub count: u64,
}
