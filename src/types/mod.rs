//! Core data types: cells, users and alliances.

mod alliance;
mod cell;
mod user;

pub use alliance::{Alliance, AllianceBadge, AllianceId, AllianceStats, LeaderboardEntry};
pub use cell::{Cell, CellDelta, CellKey, CellKeyError};
pub use user::{AllianceRole, User, DEFAULT_DROPLETS};
