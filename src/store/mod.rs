//! Durable storage for cells, users and alliances.
//!
//! The store is the source of truth; the in-memory grid cache is rebuilt from
//! it at startup. Two implementations ship with the crate:
//!
//! - [`SqliteStore`]: the production backend (rusqlite, one connection behind
//!   an async mutex)
//! - [`MemoryStore`]: an in-process store with switchable write/read failure,
//!   used by tests and `serve --memory`
//!
//! No operation is transactional with another: a cell write and the matching
//! user counter update are two independent calls.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::{Alliance, AllianceRole, Cell, CellKey, User};
use async_trait::async_trait;

/// Abstraction over the durable record store.
#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    // ========== Cells ==========

    /// Every persisted cell, in no particular order.
    async fn load_cells(&self) -> Result<Vec<Cell>>;

    /// Insert or overwrite the cell with the same key.
    async fn upsert_cell(&self, cell: &Cell) -> Result<()>;

    /// Delete a cell. Deleting an absent key is not an error.
    async fn delete_cell(&self, key: &CellKey) -> Result<()>;

    /// Number of persisted cells per non-null alliance id.
    async fn count_cells_by_alliance(&self) -> Result<Vec<(String, u64)>>;

    // ========== Users ==========

    async fn find_user(&self, wallet: &str) -> Result<Option<User>>;

    /// Set username and avatar, creating the user if absent.
    async fn upsert_profile(&self, wallet: &str, username: &str, avatar: &str) -> Result<User>;

    /// Add `delta` to the user's pixel counter.
    ///
    /// With `create_missing` an absent user is created first; otherwise the
    /// call is a no-op for unknown wallets.
    async fn adjust_total_pixels(&self, wallet: &str, delta: i64, create_missing: bool)
        -> Result<()>;

    /// Set (or clear, with `None`) the user's alliance reference, creating the
    /// user if absent. Clearing resets the role to `Member`.
    async fn set_user_alliance(
        &self,
        wallet: &str,
        membership: Option<(&str, AllianceRole)>,
    ) -> Result<()>;

    // ========== Alliances ==========

    async fn insert_alliance(&self, alliance: &Alliance) -> Result<()>;

    /// Overwrite an existing alliance record.
    async fn save_alliance(&self, alliance: &Alliance) -> Result<()>;

    async fn find_alliance(&self, id: &str) -> Result<Option<Alliance>>;

    async fn find_alliance_by_tag(&self, tag: &str) -> Result<Option<Alliance>>;

    /// Any alliance already using this name, tag or color.
    async fn find_conflicting_alliance(
        &self,
        name: &str,
        tag: &str,
        color: &str,
    ) -> Result<Option<Alliance>>;

    async fn list_alliances(&self) -> Result<Vec<Alliance>>;
}
