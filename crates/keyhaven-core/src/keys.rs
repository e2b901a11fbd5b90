//! Per-organization key derivation.
//!
//! Each tenant holds opaque master key material; the 256-bit encryption key
//! for that tenant is derived on demand with PBKDF2-HMAC-SHA-256, using the
//! organization id as the domain-separation salt. Derivation is
//! deterministic, so no derived key is ever stored — only the master
//! material is.
//!
//! The org id is not a random salt. That is a deliberate property of the
//! scheme: introducing a stored random salt would orphan existing
//! ciphertext, so the deterministic salt is kept and the tradeoff is
//! documented in DESIGN.md.

use std::fmt;

use sha2::Sha256;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// PBKDF2 iteration count. High enough to make brute-forcing leaked
/// ciphertext against guessed master material expensive.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A derived 256-bit per-organization encryption key, zeroized on drop.
///
/// The inner bytes are never exposed in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct OrgKey([u8; 32]);

impl OrgKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care — the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for OrgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the organization's encryption key from its master key material.
///
/// Deterministic: the same (material, org id) pair always yields the same
/// key. The org id's 16 raw bytes are the salt.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the master material is empty —
/// a tenant-configuration error, fatal for every operation on that org.
pub fn derive_org_key(master_key_material: &[u8], org_id: Uuid) -> Result<OrgKey, CryptoError> {
    if master_key_material.is_empty() {
        return Err(CryptoError::KeyDerivation {
            org_id,
            reason: "master key material is empty".to_owned(),
        });
    }

    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        master_key_material,
        org_id.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut derived,
    );
    Ok(OrgKey::from_bytes(derived))
}
