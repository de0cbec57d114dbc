//! Typed error conditions that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error`; these variants are wrapped into
//! it and can be recovered with `err.downcast_ref::<EraError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EraError {
    #[error("no metadata snapshot taken.")]
    NoMetadataSnapshot,

    #[error("metadata snapshot already taken (root block {0})")]
    MetadataSnapshotExists(u64),

    #[error("metadata contains errors (run era check for details).")]
    MetadataDamaged,

    #[error("block {block} out of range (nr_blocks={nr_blocks})")]
    BlockOutOfRange { block: u64, nr_blocks: u64 },

    #[error("superblock is zeroed: not era metadata (or an aborted restore)")]
    ZeroedSuperblock,

    #[error("bad superblock: {0}")]
    BadSuperblock(String),

    #[error("node {block} damaged: {reason}")]
    NodeDamaged { block: u64, reason: String },

    #[error("store {0} is busy (locked by another process)")]
    StoreBusy(String),

    #[error("store opened read-only")]
    ReadOnlyStore,

    #[error("malformed description: {0}")]
    MalformedDescription(String),
}
