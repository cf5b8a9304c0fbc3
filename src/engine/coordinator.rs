//! Paint, erase and batch mutations.
//!
//! Every mutation follows the same commit order:
//!
//! 1. resolve the effective color (single paint only)
//! 2. under one lock: apply to the [`GridCache`], publish the delta and queue
//!    the durable writes on the [`PersistQueue`]
//!
//! Step 1 may suspend or fail without affecting step 2, and a failed durable
//! write never reverts the cache. Holding the grid lock across step 2 makes
//! broadcast order and persistence order identical to cache order, and lets
//! [`Coordinator::snapshot_and_subscribe`] hand a joining viewer a snapshot
//! and a receiver with no delta lost or duplicated in between. Queueing never
//! blocks, so the lock is never held across an `.await`.

use super::fanout::Fanout;
use super::grid::GridCache;
use super::persist::{PersistJob, PersistQueue};
use crate::alliance::AllianceResolver;
use crate::error::{PixelError, Result};
use crate::protocol::ServerEvent;
use crate::types::{Cell, CellDelta, CellKey};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct Coordinator {
    grid: Mutex<GridCache>,
    fanout: Fanout,
    persist: PersistQueue,
    resolver: AllianceResolver,
    validate_keys: bool,
}

impl Coordinator {
    pub fn new(
        grid: GridCache,
        fanout: Fanout,
        persist: PersistQueue,
        resolver: AllianceResolver,
        validate_keys: bool,
    ) -> Self {
        Self {
            grid: Mutex::new(grid),
            fanout,
            persist,
            resolver,
            validate_keys,
        }
    }

    /// Paint one cell. An allied wallet always paints in its alliance color.
    ///
    /// Returns the delta that was broadcast.
    pub async fn paint(
        &self,
        key: CellKey,
        color: String,
        wallet: Option<String>,
    ) -> Result<CellDelta> {
        self.check_key(&key)?;

        let badge = match wallet.as_deref() {
            Some(w) => self.resolver.resolve(w).await,
            None => None,
        };
        let color = match &badge {
            Some(b) => b.color.clone(),
            None => color,
        };

        let delta = CellDelta::new(key, color);
        let cell = Cell::new(delta.key.clone(), delta.color.clone())
            .with_owner(wallet.clone())
            .with_alliance(badge.map(|b| b.id));
        {
            let mut grid = self.grid.lock();
            grid.set(delta.key.clone(), delta.color.clone());
            self.fanout.publish(ServerEvent::PixelUpdate(delta.clone()));
            self.persist.submit(PersistJob::UpsertCell(cell));
            if let Some(wallet) = &wallet {
                self.persist.submit(PersistJob::AdjustPixels {
                    wallet: wallet.clone(),
                    delta: 1,
                    create_missing: true,
                });
            }
        }
        tracing::debug!("Painted {} {} by {:?}", delta.key, delta.color, wallet);
        Ok(delta)
    }

    /// Erase one cell. Anyone may erase any cell; erasing an empty cell still
    /// broadcasts.
    pub fn erase(&self, key: CellKey, wallet: Option<String>) -> Result<()> {
        self.check_key(&key)?;

        {
            let mut grid = self.grid.lock();
            grid.erase(&key);
            self.fanout
                .publish(ServerEvent::PixelErase { key: key.clone() });
            self.persist.submit(PersistJob::DeleteCell(key.clone()));
            if let Some(wallet) = &wallet {
                self.persist.submit(PersistJob::AdjustPixels {
                    wallet: wallet.clone(),
                    delta: -1,
                    create_missing: false,
                });
            }
        }
        tracing::debug!("Erased {} by {:?}", key, wallet);
        Ok(())
    }

    /// Paint many cells with one broadcast. Requested colors are applied as-is.
    ///
    /// Returns the number of cells applied.
    pub fn batch(&self, updates: Vec<CellDelta>, wallet: Option<String>) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        for update in &updates {
            self.check_key(&update.key)?;
        }

        let applied = updates.len();
        {
            let mut grid = self.grid.lock();
            for update in &updates {
                grid.set(update.key.clone(), update.color.clone());
            }
            self.fanout
                .publish(ServerEvent::BatchUpdate(updates.clone()));
            for update in updates {
                let cell = Cell::new(update.key, update.color).with_owner(wallet.clone());
                self.persist.submit(PersistJob::UpsertCell(cell));
            }
        }
        tracing::debug!("Batch of {} cells by {:?}", applied, wallet);
        Ok(applied)
    }

    /// Current grid contents plus a delta receiver positioned right after them.
    pub fn snapshot_and_subscribe(
        &self,
    ) -> (Vec<(CellKey, String)>, broadcast::Receiver<Arc<ServerEvent>>) {
        let grid = self.grid.lock();
        (grid.snapshot(), self.fanout.subscribe())
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<(CellKey, String)> {
        self.grid.lock().snapshot()
    }

    #[must_use]
    pub fn color_at(&self, key: &CellKey) -> Option<String> {
        self.grid.lock().get(key).map(str::to_string)
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.grid.lock().len()
    }

    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.fanout.viewer_count()
    }

    fn check_key(&self, key: &CellKey) -> Result<()> {
        if !self.validate_keys {
            return Ok(());
        }
        CellKey::parse(key.as_str()).map(drop).map_err(|e| {
            tracing::warn!("Rejecting malformed cell key: {}", e);
            PixelError::Validation(e.to_string())
        })
    }
}
