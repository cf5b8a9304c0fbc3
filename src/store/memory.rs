use super::DurableStore;
use crate::error::{PixelError, Result};
use crate::types::{Alliance, AllianceRole, Cell, CellKey, User};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Tables {
    cells: HashMap<CellKey, Cell>,
    users: HashMap<String, User>,
    alliances: Vec<Alliance>,
}

/// In-process [`DurableStore`].
///
/// Writes and reads can be made to fail on demand to exercise the
/// persistence-failure and fail-open paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read return a persistence error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a stored cell, bypassing failure injection.
    #[must_use]
    pub fn cell(&self, key: &str) -> Option<Cell> {
        self.tables.lock().cells.get(&CellKey::new(key)).cloned()
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.tables.lock().cells.len()
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PixelError::Persistence("store unavailable (write)".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PixelError::Persistence("store unavailable (read)".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load_cells(&self) -> Result<Vec<Cell>> {
        self.check_read()?;
        Ok(self.tables.lock().cells.values().cloned().collect())
    }

    async fn upsert_cell(&self, cell: &Cell) -> Result<()> {
        self.check_write()?;
        self.tables
            .lock()
            .cells
            .insert(cell.key.clone(), cell.clone());
        Ok(())
    }

    async fn delete_cell(&self, key: &CellKey) -> Result<()> {
        self.check_write()?;
        self.tables.lock().cells.remove(key);
        Ok(())
    }

    async fn count_cells_by_alliance(&self) -> Result<Vec<(String, u64)>> {
        self.check_read()?;
        let tables = self.tables.lock();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for cell in tables.cells.values() {
            if let Some(id) = &cell.alliance_id {
                *counts.entry(id.clone()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn find_user(&self, wallet: &str) -> Result<Option<User>> {
        self.check_read()?;
        Ok(self.tables.lock().users.get(wallet).cloned())
    }

    async fn upsert_profile(&self, wallet: &str, username: &str, avatar: &str) -> Result<User> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        let user = tables
            .users
            .entry(wallet.to_string())
            .or_insert_with(|| User::new(wallet));
        user.username = Some(username.to_string());
        user.avatar = Some(avatar.to_string());
        Ok(user.clone())
    }

    async fn adjust_total_pixels(
        &self,
        wallet: &str,
        delta: i64,
        create_missing: bool,
    ) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        if create_missing {
            tables
                .users
                .entry(wallet.to_string())
                .or_insert_with(|| User::new(wallet))
                .total_pixels += delta;
        } else if let Some(user) = tables.users.get_mut(wallet) {
            user.total_pixels += delta;
        }
        Ok(())
    }

    async fn set_user_alliance(
        &self,
        wallet: &str,
        membership: Option<(&str, AllianceRole)>,
    ) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        let user = tables
            .users
            .entry(wallet.to_string())
            .or_insert_with(|| User::new(wallet));
        match membership {
            Some((id, role)) => {
                user.alliance_id = Some(id.to_string());
                user.alliance_role = role;
            }
            None => {
                user.alliance_id = None;
                user.alliance_role = AllianceRole::Member;
            }
        }
        Ok(())
    }

    async fn insert_alliance(&self, alliance: &Alliance) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        if tables.alliances.iter().any(|a| {
            a.id == alliance.id
                || a.name == alliance.name
                || a.tag == alliance.tag
                || a.color == alliance.color
        }) {
            return Err(PixelError::Conflict("Name, Tag or Color taken".into()));
        }
        tables.alliances.push(alliance.clone());
        Ok(())
    }

    async fn save_alliance(&self, alliance: &Alliance) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        match tables.alliances.iter_mut().find(|a| a.id == alliance.id) {
            Some(slot) => {
                *slot = alliance.clone();
                Ok(())
            }
            None => Err(PixelError::NotFound("Alliance not found".into())),
        }
    }

    async fn find_alliance(&self, id: &str) -> Result<Option<Alliance>> {
        self.check_read()?;
        Ok(self
            .tables
            .lock()
            .alliances
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_alliance_by_tag(&self, tag: &str) -> Result<Option<Alliance>> {
        self.check_read()?;
        Ok(self
            .tables
            .lock()
            .alliances
            .iter()
            .find(|a| a.tag == tag)
            .cloned())
    }

    async fn find_conflicting_alliance(
        &self,
        name: &str,
        tag: &str,
        color: &str,
    ) -> Result<Option<Alliance>> {
        self.check_read()?;
        Ok(self
            .tables
            .lock()
            .alliances
            .iter()
            .find(|a| a.name == name || a.tag == tag || a.color == color)
            .cloned())
    }

    async fn list_alliances(&self) -> Result<Vec<Alliance>> {
        self.check_read()?;
        Ok(self.tables.lock().alliances.clone())
    }
}
