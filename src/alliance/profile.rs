use crate::auth::{Credentials, SignatureVerifier};
use crate::error::{PixelError, Result};
use crate::store::DurableStore;
use crate::types::{Alliance, User};
use serde::Serialize;
use std::sync::Arc;

/// A user record with its alliance embedded, as returned by the user lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub alliance: Option<Alliance>,
}

/// Signed profile updates and user lookups.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DurableStore>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DurableStore>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { store, verifier }
    }

    /// Set the caller's username and avatar seed, creating the user if needed.
    pub async fn update(&self, creds: &Credentials, username: &str, avatar: &str) -> Result<User> {
        if creds.is_incomplete() || username.is_empty() || avatar.is_empty() {
            return Err(PixelError::Validation("Missing fields".into()));
        }
        creds.verify(self.verifier.as_ref())?;

        let user = self
            .store
            .upsert_profile(&creds.wallet, username, avatar)
            .await?;
        tracing::info!("Profile updated for {}", creds.wallet);
        Ok(user)
    }

    /// The user with their alliance, or `None` if the wallet is unknown.
    pub async fn lookup(&self, wallet: &str) -> Result<Option<UserProfile>> {
        let Some(user) = self.store.find_user(wallet).await? else {
            return Ok(None);
        };
        let alliance = match &user.alliance_id {
            Some(id) => self.store.find_alliance(id).await?,
            None => None,
        };
        Ok(Some(UserProfile { user, alliance }))
    }
}
