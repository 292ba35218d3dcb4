//! Shared plumbing for the ChaosChain verification & reward engine:
//! opaque identifiers, the hash rules of §6, the error taxonomy of §7,
//! and role bit flags. Every other crate in the workspace depends on
//! this one and nothing else above it, the way the teacher's actors
//! all sit on `fil_actors_runtime`.

pub mod address;
pub mod error;
pub mod interfaces;
pub mod roles;

pub use address::{commitment_hash, feedback_idempotence_key, h, worker_consensus_key, AccountId, Hash32, WorkId};
pub use error::{EngineError, ErrorContext};
pub use roles::RoleBits;
