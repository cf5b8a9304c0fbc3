use crate::auth::{Credentials, SignatureVerifier};
use crate::error::{PixelError, Result};
use crate::store::DurableStore;
use crate::types::{Alliance, AllianceRole, LeaderboardEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// How a join request names its alliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllianceRef {
    Tag(String),
    Id(String),
}

/// Alliance lifecycle: create, join, kick, and the read-side queries.
///
/// Every mutating call verifies the caller's signature before touching the
/// store. Field checks come first, so a request with missing fields is
/// rejected as `Validation` even if its signature is also bad.
///
/// # Thread Safety
///
/// Create, join and kick each read an alliance and write it back whole. They
/// run one at a time behind `writes`, held across the whole sequence, so a
/// member list never loses an entry and a wallet never ends up in two
/// alliances. Clones share the lock.
#[derive(Clone)]
pub struct AllianceService {
    store: Arc<dyn DurableStore>,
    verifier: Arc<dyn SignatureVerifier>,
    default_color: String,
    writes: Arc<Mutex<()>>,
}

impl AllianceService {
    pub fn new(
        store: Arc<dyn DurableStore>,
        verifier: Arc<dyn SignatureVerifier>,
        default_color: impl Into<String>,
    ) -> Self {
        Self {
            store,
            verifier,
            default_color: default_color.into(),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Create an alliance led by the caller.
    ///
    /// # Errors
    ///
    /// - `Validation` if credentials, name or tag are missing
    /// - `Auth` if the signature does not verify
    /// - `Conflict` if the caller is already allied, or name/tag/color is taken
    pub async fn create(
        &self,
        creds: &Credentials,
        name: &str,
        tag: &str,
        color: Option<&str>,
    ) -> Result<Alliance> {
        if creds.is_incomplete() || name.is_empty() || tag.is_empty() {
            return Err(PixelError::Validation("Missing fields".into()));
        }
        creds.verify(self.verifier.as_ref())?;
        let _guard = self.writes.lock().await;
        self.ensure_unallied(&creds.wallet).await?;

        let color = color
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_color.as_str());
        if let Some(existing) = self
            .store
            .find_conflicting_alliance(name, tag, color)
            .await?
        {
            tracing::debug!("Create {} [{}] collides with {}", name, tag, existing.id);
            return Err(PixelError::Conflict("Name, Tag or Color taken".into()));
        }

        let alliance = Alliance::new(name, tag, creds.wallet.clone(), color);
        self.store.insert_alliance(&alliance).await?;
        self.store
            .set_user_alliance(&creds.wallet, Some((&alliance.id, AllianceRole::Leader)))
            .await?;
        tracing::info!(
            "Alliance {} [{}] created by {}",
            alliance.name,
            alliance.tag,
            creds.wallet
        );
        Ok(alliance)
    }

    /// Add the caller to an existing alliance as a `Member`.
    pub async fn join(&self, creds: &Credentials, target: &AllianceRef) -> Result<Alliance> {
        let target_empty = match target {
            AllianceRef::Tag(s) | AllianceRef::Id(s) => s.is_empty(),
        };
        if creds.is_incomplete() || target_empty {
            return Err(PixelError::Validation("Missing fields".into()));
        }
        creds.verify(self.verifier.as_ref())?;
        let _guard = self.writes.lock().await;

        let found = match target {
            AllianceRef::Tag(tag) => self.store.find_alliance_by_tag(tag).await?,
            AllianceRef::Id(id) => self.store.find_alliance(id).await?,
        };
        let mut alliance = found.ok_or_else(|| PixelError::NotFound("Alliance not found".into()))?;
        self.ensure_unallied(&creds.wallet).await?;

        alliance.add_member(&creds.wallet);
        self.store.save_alliance(&alliance).await?;
        self.store
            .set_user_alliance(&creds.wallet, Some((&alliance.id, AllianceRole::Member)))
            .await?;
        tracing::info!("{} joined alliance {}", creds.wallet, alliance.tag);
        Ok(alliance)
    }

    /// Remove `target` from the caller's alliance. Leader only.
    pub async fn kick(&self, creds: &Credentials, target: &str) -> Result<Alliance> {
        if creds.is_incomplete() || target.is_empty() {
            return Err(PixelError::Validation("Missing fields".into()));
        }
        creds.verify(self.verifier.as_ref())?;
        let _guard = self.writes.lock().await;

        let alliance_id = self
            .store
            .find_user(&creds.wallet)
            .await?
            .and_then(|u| u.alliance_id)
            .ok_or_else(|| PixelError::Conflict("Not in alliance".into()))?;
        let mut alliance = self
            .store
            .find_alliance(&alliance_id)
            .await?
            .ok_or_else(|| PixelError::NotFound("Alliance not found".into()))?;

        if alliance.leader != creds.wallet {
            return Err(PixelError::Forbidden("Only leader can kick".into()));
        }
        if target == creds.wallet {
            return Err(PixelError::Forbidden("Cannot kick self".into()));
        }
        if !alliance.remove_member(target) {
            return Err(PixelError::NotFound("Member not found".into()));
        }

        self.store.save_alliance(&alliance).await?;
        self.store.set_user_alliance(target, None).await?;
        tracing::info!("{} kicked {} from {}", creds.wallet, target, alliance.tag);
        Ok(alliance)
    }

    pub async fn get(&self, id: &str) -> Result<Alliance> {
        self.store
            .find_alliance(id)
            .await?
            .ok_or_else(|| PixelError::NotFound("Not found".into()))
    }

    /// All alliances, largest first; ties by name.
    pub async fn list(&self) -> Result<Vec<Alliance>> {
        let mut alliances = self.store.list_alliances().await?;
        alliances.sort_by(|a, b| {
            b.member_count()
                .cmp(&a.member_count())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(alliances)
    }

    /// Top `limit` alliances by persisted cell count.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let counts = self.store.count_cells_by_alliance().await?;
        let alliances: HashMap<String, Alliance> = self
            .store
            .list_alliances()
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let mut entries: Vec<LeaderboardEntry> = counts
            .into_iter()
            .filter_map(|(id, count)| {
                let alliance = alliances.get(&id)?;
                Some(LeaderboardEntry {
                    alliance_id: id,
                    name: alliance.name.clone(),
                    tag: alliance.tag.clone(),
                    color: alliance.color.clone(),
                    count,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn ensure_unallied(&self, wallet: &str) -> Result<()> {
        let allied = self
            .store
            .find_user(wallet)
            .await?
            .is_some_and(|u| u.is_allied());
        if allied {
            return Err(PixelError::Conflict("Already in an alliance".into()));
        }
        Ok(())
    }
}
