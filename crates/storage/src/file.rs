use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{check_capacity, Disk, DiskError, Result};

const RECORD_EXT: &str = "rec";

/// Disk backed by a directory: one file per record.
///
/// Keys are hex-encoded into file names so any key string is a valid,
/// collision-free file name (`swap:3` becomes `737761703a33.rec`).
#[derive(Debug)]
pub struct FileDisk {
    root: PathBuf,
    capacity: Option<usize>,
}

impl FileDisk {
    /// Opens (creating if needed) the directory at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        log::info!("file disk opened at {}", root.display());
        Ok(Self { root, capacity: None })
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex::encode(key.as_bytes()), RECORD_EXT))
    }

    fn record_len(&self, key: &str) -> usize {
        fs::metadata(self.record_path(key)).map_or(0, |m| m.len() as usize)
    }

    fn decode_key(path: &Path) -> Option<String> {
        if path.extension()? != RECORD_EXT {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let raw = hex::decode(stem).ok()?;
        String::from_utf8(raw).ok()
    }

    fn record_paths(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| Self::decode_key(p).is_some())
                .collect(),
            Err(e) => {
                log::warn!("cannot list {}: {}", self.root.display(), e);
                Vec::new()
            }
        }
    }
}

impl Disk for FileDisk {
    fn write(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(DiskError::InvalidKey(key.to_string()));
        }
        let old_len = self.record_len(key);
        check_capacity(key, self.capacity, self.used_bytes(), old_len, payload.len())?;
        fs::write(self.record_path(key), payload)?;
        log::debug!("disk write `{}` ({} bytes)", key, payload.len());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DiskError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => {
                log::debug!("disk delete `{}`", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.record_path(key).is_file()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .record_paths()
            .iter()
            .filter_map(|p| Self::decode_key(p))
            .collect();
        keys.sort();
        keys
    }

    fn used_bytes(&self) -> usize {
        self.record_paths()
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len() as usize)
            .sum()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
