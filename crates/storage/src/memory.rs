use std::collections::BTreeMap;

use crate::{check_capacity, Disk, DiskError, Result};

/// Disk backed by an ordered in-memory map.
///
/// EDUCATIONAL: BTreeMap gives deterministic key order, which keeps swap
/// listings and test expectations stable. Nothing survives the process; use
/// [`crate::FileDisk`] when records must outlive a run.
#[derive(Debug, Default)]
pub struct MemoryDisk {
    map: BTreeMap<String, Vec<u8>>,
    capacity: Option<usize>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disk that refuses writes once `capacity` payload bytes are stored.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: BTreeMap::new(),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Disk for MemoryDisk {
    fn write(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(DiskError::InvalidKey(key.to_string()));
        }
        let old_len = self.map.get(key).map_or(0, Vec::len);
        check_capacity(key, self.capacity, self.used_bytes(), old_len, payload.len())?;
        self.map.insert(key.to_string(), payload.to_vec());
        log::debug!("disk write `{}` ({} bytes)", key, payload.len());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.map.get(key).cloned().ok_or_else(|| DiskError::NotFound {
            key: key.to_string(),
        })
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.map.remove(key).is_some() {
            log::debug!("disk delete `{}`", key);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    fn used_bytes(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
