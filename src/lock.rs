//! Advisory locking of the metadata store file.
//!
//! Cross-platform (fs2) advisory locks, taken on the store file itself:
//! - Exclusive: restore (rewrites the root) and reads of the live root.
//! - Shared: reads of a frozen metadata snapshot, so a live writer may keep going.
//!
//! Locks are non-blocking: a conflicting holder fails the open with StoreBusy.
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::Path;

use crate::error::EraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = FileExt::unlock(&self.file);
    }
}

/// Try to lock an already opened store file. Returns StoreBusy if held elsewhere.
pub fn try_lock_store(file: &File, path: &Path, mode: LockMode) -> Result<LockGuard> {
    let file = file
        .try_clone()
        .with_context(|| format!("dup store handle {}", path.display()))?;
    let res = match mode {
        LockMode::Shared => FileExt::try_lock_shared(&file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
    };
    if res.is_err() {
        return Err(EraError::StoreBusy(path.display().to_string()).into());
    }
    Ok(LockGuard { file })
}
