use crate::store::DurableStore;
use crate::types::AllianceBadge;
use std::sync::Arc;

/// Looks up a wallet's current alliance.
///
/// Lookups fail open: a store error is logged and treated as "no alliance",
/// so a flaky store never rejects a paint.
#[derive(Clone)]
pub struct AllianceResolver {
    store: Arc<dyn DurableStore>,
}

impl AllianceResolver {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// The wallet's alliance badge (id, tag, color), or `None`.
    pub async fn resolve(&self, wallet: &str) -> Option<AllianceBadge> {
        let alliance_id = self.alliance_id_of(wallet).await?;
        match self.store.find_alliance(&alliance_id).await {
            Ok(Some(alliance)) => Some(alliance.badge()),
            Ok(None) => {
                tracing::debug!("{} references missing alliance {}", wallet, alliance_id);
                None
            }
            Err(e) => {
                tracing::warn!("Alliance lookup for {} failed: {}", wallet, e);
                None
            }
        }
    }

    /// Whether the stored user record places `wallet` in `alliance_id`.
    pub async fn is_member_of(&self, wallet: &str, alliance_id: &str) -> bool {
        self.alliance_id_of(wallet).await.as_deref() == Some(alliance_id)
    }

    async fn alliance_id_of(&self, wallet: &str) -> Option<String> {
        match self.store.find_user(wallet).await {
            Ok(user) => user.and_then(|u| u.alliance_id),
            Err(e) => {
                tracing::warn!("User lookup for {} failed: {}", wallet, e);
                None
            }
        }
    }
}
