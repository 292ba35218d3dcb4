use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque 20-byte account identifier: a worker, a validator, a
/// studio, or a payout alias target. The engine never interprets the
/// bytes beyond equality and hashing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 20 {
            return None;
        }
        let mut buf = [0u8; 20];
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// An opaque 256-bit work identifier (the "data hash" in the source
/// system).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkId(pub [u8; 32]);

impl WorkId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }
}

impl fmt::Debug for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A 256-bit collision-resistant hash output, used for commitments,
/// derived keys, and idempotence keys (§6 hash rules).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// `H`: the 256-bit collision-resistant hash used throughout §6. The
/// spec leaves the concrete primitive unspecified; this crate picks
/// SHA-256, already in the teacher's dependency stack.
pub fn h(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32(out)
}

/// `commitment = H(score_vector_bytes ‖ salt_32 ‖ work_id_32)`.
///
/// `score_vector_bytes` is one byte per dimension, values in `[0, 100]`,
/// no padding (§6 hash rules).
pub fn commitment_hash(scores: &[u8], salt: &[u8; 32], work_id: &WorkId) -> Hash32 {
    h(&[scores, salt, &work_id.0])
}

/// Per-worker consensus key: `H(work_id_32 ‖ worker_address_20)`.
pub fn worker_consensus_key(work_id: &WorkId, worker: &AccountId) -> Hash32 {
    h(&[&work_id.0, &worker.0])
}

/// Feedback idempotence key:
/// `H(work_id_32 ‖ worker_address_20 ‖ tag1_ascii ‖ score_u8)`.
pub fn feedback_idempotence_key(
    work_id: &WorkId,
    worker: &AccountId,
    tag1: &str,
    score: u8,
) -> Hash32 {
    h(&[&work_id.0, &worker.0, tag1.as_bytes(), &[score]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_changes_with_any_input() {
        let work_id = WorkId::new([1u8; 32]);
        let salt = [2u8; 32];
        let a = commitment_hash(&[80, 80, 80, 80, 80], &salt, &work_id);
        let b = commitment_hash(&[80, 80, 80, 80, 81], &salt, &work_id);
        assert_ne!(a, b);

        let mut salt2 = salt;
        salt2[0] ^= 1;
        let c = commitment_hash(&[80, 80, 80, 80, 80], &salt2, &work_id);
        assert_ne!(a, c);
    }

    #[test]
    fn commitment_is_deterministic() {
        let work_id = WorkId::new([7u8; 32]);
        let salt = [9u8; 32];
        let scores = [10, 20, 30, 40, 50];
        assert_eq!(
            commitment_hash(&scores, &salt, &work_id),
            commitment_hash(&scores, &salt, &work_id)
        );
    }

    #[test]
    fn account_id_display_is_hex() {
        let id = AccountId::new([0xabu8; 20]);
        assert_eq!(format!("{id}"), format!("0x{}", "ab".repeat(20)));
    }
}
