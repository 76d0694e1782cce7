//! Disk Store: the simulated machine's persistent, key-addressed record store.
//!
//! EDUCATIONAL PURPOSE: the kernel swaps process memory out to "disk" when
//! RAM runs short. Everything that crosses into the backing medium goes
//! through the [`Disk`] trait, so the medium can be an in-memory map (tests,
//! default runs) or a directory of files without touching kernel logic.
//!
//! Semantics shared by every implementation:
//! - `write` is an upsert (last write wins)
//! - `read` of an absent key fails with [`DiskError::NotFound`]
//! - `delete` of an absent key is a no-op
//! - an optional byte capacity makes `write` fail with [`DiskError::DiskFull`]
//!   instead of silently dropping data

use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileDisk;
pub use memory::MemoryDisk;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("no record stored under key `{key}`")]
    NotFound { key: String },

    #[error("disk full: writing `{key}` needs {needed} bytes but only {available} of {capacity} are free")]
    DiskFull {
        key: String,
        needed: usize,
        available: usize,
        capacity: usize,
    },

    #[error("invalid record key `{0}`")]
    InvalidKey(String),

    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, DiskError>;

/// Key-addressed persistent record store.
pub trait Disk: std::fmt::Debug {
    /// Stores `payload` under `key`, replacing any previous record.
    fn write(&mut self, key: &str, payload: &[u8]) -> Result<()>;

    /// Returns a copy of the record stored under `key`.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Removes the record under `key`. Absent keys are ignored.
    fn delete(&mut self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> bool;

    /// All stored keys in ascending order.
    fn keys(&self) -> Vec<String>;

    /// Sum of all payload sizes.
    fn used_bytes(&self) -> usize;

    /// Optional byte quota; `None` means unbounded.
    fn capacity(&self) -> Option<usize>;
}

/// Checks whether replacing a record of `old_len` bytes with `new_len` bytes
/// fits under `capacity`. Shared by the implementations.
pub(crate) fn check_capacity(
    key: &str,
    capacity: Option<usize>,
    used: usize,
    old_len: usize,
    new_len: usize,
) -> Result<()> {
    let Some(capacity) = capacity else {
        return Ok(());
    };
    let available = capacity.saturating_sub(used.saturating_sub(old_len));
    if new_len > available {
        log::warn!("disk full: `{}` needs {} bytes, {} available", key, new_len, available);
        return Err(DiskError::DiskFull {
            key: key.to_string(),
            needed: new_len,
            available,
            capacity,
        });
    }
    Ok(())
}
