//! Error types for `keyhaven-core`.
//!
//! Each variant carries enough context to diagnose the problem without a
//! debugger. Crypto errors never include key material or plaintext — only
//! identifiers and operation descriptions.

use uuid::Uuid;

use keyhaven_store::StoreError;

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation could not run (empty or malformed master material).
    /// Fatal at tenant-configuration level.
    #[error("key derivation failed for org {org_id}: {reason}")]
    KeyDerivation { org_id: Uuid, reason: String },

    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// AES-256-GCM decryption failed (wrong key, corrupted ciphertext, or
    /// tampered tag).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// Ciphertext blob is too short to contain a valid nonce + tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },
}

/// Errors from secret engine operations.
///
/// Authorization failures are terminal and non-retryable. Integrity and
/// decryption failures indicate key mismatch or data corruption and are
/// worth alerting on. `Conflict` is the one variant a caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The principal is not authorized for this action.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The secret's live row does not exist.
    #[error("secret not found: {secret_id}")]
    NotFound { secret_id: Uuid },

    /// The organization does not exist.
    #[error("organization not found: {org_id}")]
    OrgNotFound { org_id: Uuid },

    /// The decrypted plaintext does not match the stored integrity digest.
    /// The value is never returned in this case.
    #[error("integrity digest mismatch for secret {secret_id}")]
    Integrity { secret_id: Uuid },

    /// The requested historical version does not exist.
    #[error("version {version} not found for secret {secret_id}")]
    VersionNotFound { secret_id: Uuid, version: i32 },

    /// A snapshot for this (secret, version) pair already exists —
    /// archive-before-overwrite was misused.
    #[error("version {version} already archived for secret {secret_id}")]
    DuplicateVersion { secret_id: Uuid, version: i32 },

    /// A concurrent update advanced the live row between archive and
    /// overwrite. Safe for the caller to retry once.
    #[error("concurrent update conflict on secret {secret_id}")]
    Conflict { secret_id: Uuid },

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The persistence layer failed. Terminal for the current operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
