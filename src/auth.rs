//! Wallet signature verification.
//!
//! Mutating requests carry a wallet address (a base58 ed25519 public key), a
//! plain-text message and a base58 detached signature of that message.

use crate::error::{PixelError, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Checks that `signature` over `message` was produced by `wallet`.
pub trait SignatureVerifier: Send + Sync + 'static {
    fn verify(&self, message: &str, signature: &str, wallet: &str) -> bool;
}

/// The signed part of every mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub wallet: String,
    pub signature: String,
    pub message: String,
}

impl Credentials {
    pub fn new(
        wallet: impl Into<String>,
        signature: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            signature: signature.into(),
            message: message.into(),
        }
    }

    /// Whether any of the three fields is empty.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.wallet.is_empty() || self.signature.is_empty() || self.message.is_empty()
    }

    /// `Auth` error unless the signature checks out.
    pub fn verify(&self, verifier: &dyn SignatureVerifier) -> Result<()> {
        if verifier.verify(&self.message, &self.signature, &self.wallet) {
            Ok(())
        } else {
            tracing::debug!("Signature rejected for {}", self.wallet);
            Err(PixelError::Auth("Invalid signature".into()))
        }
    }
}

/// Solana-style verifier: base58 public key and signature, ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    fn decode_key(wallet: &str) -> Option<VerifyingKey> {
        let bytes = bs58::decode(wallet).into_vec().ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }

    fn decode_signature(signature: &str) -> Option<Signature> {
        let bytes = bs58::decode(signature).into_vec().ok()?;
        Signature::from_slice(&bytes).ok()
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &str, signature: &str, wallet: &str) -> bool {
        let Some(key) = Self::decode_key(wallet) else {
            tracing::debug!("Undecodable wallet key: {}", wallet);
            return false;
        };
        let Some(signature) = Self::decode_signature(signature) else {
            tracing::debug!("Undecodable signature from {}", wallet);
            return false;
        };
        key.verify(message.as_bytes(), &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair(seed: u8) -> (SigningKey, String) {
        let signing = SigningKey::from_bytes(&[seed; 32]);
        let wallet = bs58::encode(signing.verifying_key().as_bytes()).into_string();
        (signing, wallet)
    }

    #[test]
    fn test_valid_signature() {
        let (signing, wallet) = keypair(7);
        let message = "Create Alliance: Red [RED]";
        let signature = bs58::encode(signing.sign(message.as_bytes()).to_bytes()).into_string();
        assert!(Ed25519Verifier.verify(message, &signature, &wallet));
    }

    #[test]
    fn test_wrong_message_fails() {
        let (signing, wallet) = keypair(7);
        let signature = bs58::encode(signing.sign(b"Join Alliance: RED").to_bytes()).into_string();
        assert!(!Ed25519Verifier.verify("Join Alliance: BLU", &signature, &wallet));
    }

    #[test]
    fn test_signature_from_other_wallet_fails() {
        let (signing, _) = keypair(7);
        let (_, other_wallet) = keypair(8);
        let signature = bs58::encode(signing.sign(b"hello").to_bytes()).into_string();
        assert!(!Ed25519Verifier.verify("hello", &signature, &other_wallet));
    }

    #[test]
    fn test_credentials_verify() {
        let (signing, wallet) = keypair(3);
        let signature = bs58::encode(signing.sign(b"Update Profile").to_bytes()).into_string();
        let good = Credentials::new(wallet.clone(), signature.clone(), "Update Profile");
        assert!(good.verify(&Ed25519Verifier).is_ok());

        let bad = Credentials::new(wallet, signature, "Update Profile!");
        assert!(matches!(
            bad.verify(&Ed25519Verifier),
            Err(PixelError::Auth(_))
        ));
        assert!(Credentials::new("", "sig", "msg").is_incomplete());
    }

    #[test]
    fn test_garbage_inputs_fail_closed() {
        let (_, wallet) = keypair(7);
        assert!(!Ed25519Verifier.verify("hello", "0OIl", &wallet));
        assert!(!Ed25519Verifier.verify("hello", "abc", "not-base58-0OIl"));
        assert!(!Ed25519Verifier.verify("hello", "", ""));
    }
}
