//! Blob storage adapters.
//!
//! Both implement [`StoragePort`] and [`ConfigPort`]:
//!
//! - [`MemoryStore`]: in-process map, for tests and throwaway simulations.
//! - [`FileStore`]: one file per key under `<root>/<namespace>/<key>`, plus
//!   `<root>/config.json` for the controller configuration.  Writes go to a
//!   temporary sibling first and are renamed into place, so a power cut
//!   leaves either the old or the new value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::KilnConfig;

const CONFIG_NAMESPACE: &str = "kiln";
const CONFIG_KEY: &str = "config";
const CONFIG_FILE: &str = "config.json";

// ───────────────────────────────────────────────────────────────
// MemoryStore
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    store: RefCell<HashMap<String, Vec<u8>>>,
    /// Fail every write (persistence fault injection).
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }
}

impl StoragePort for MemoryStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.borrow().get(&Self::composite_key(namespace, key)) {
            Some(data) if data.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(data) => {
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .borrow_mut()
            .remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&Self::composite_key(namespace, key))
    }
}

impl ConfigPort for MemoryStore {
    fn load(&self) -> Result<KilnConfig, ConfigError> {
        match self
            .store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
        {
            Some(bytes) => {
                let text = core::str::from_utf8(bytes).map_err(|_| ConfigError::Corrupted)?;
                KilnConfig::from_json(text)
            }
            None => {
                info!("MemoryStore: no stored config, using defaults");
                Ok(KilnConfig::default())
            }
        }
    }

    fn save(&self, config: &KilnConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string(config).map_err(|_| ConfigError::IoError)?;
        self.store.borrow_mut().insert(
            Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY),
            text.into_bytes(),
        );
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// FileStore
// ───────────────────────────────────────────────────────────────

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            warn!("FileStore: cannot create {}: {e}", root.display());
            StorageError::IoError
        })?;
        info!("FileStore: rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_component(namespace) || !is_plain_component(key) {
            return Err(StorageError::IoError);
        }
        Ok(self.root.join(namespace).join(key))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

/// One path segment: no separators, no `.`/`..`, not empty.
fn is_plain_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

/// Write `data` to `path` via a temporary sibling and a rename.  The data is
/// synced before the rename and the directory entry after it, so a power
/// cut leaves either the old or the new file, never a truncated one.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent();
    if let Some(parent) = parent {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    if let Some(parent) = parent {
        sync_dir(parent)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

// No portable directory sync outside unix.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn io_error(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl StoragePort for FileStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let path = self.key_path(namespace, key)?;
        let data = fs::read(&path).map_err(|e| io_error(&e))?;
        if data.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.key_path(namespace, key)?;
        write_atomic(&path, data).map_err(|e| {
            warn!("FileStore: write {} failed: {e}", path.display());
            io_error(&e)
        })?;
        debug!("FileStore: wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&e)),
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.key_path(namespace, key)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }
}

impl ConfigPort for FileStore {
    fn load(&self) -> Result<KilnConfig, ConfigError> {
        let path = self.config_path();
        match fs::read_to_string(&path) {
            Ok(text) => {
                let cfg = KilnConfig::from_json(&text)?;
                info!("FileStore: loaded config from {}", path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "FileStore: no config at {}, using defaults",
                    path.display()
                );
                Ok(KilnConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &KilnConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::IoError)?;
        write_atomic(&self.config_path(), text.as_bytes()).map_err(|_| ConfigError::IoError)?;
        info!("FileStore: config saved");
        Ok(())
    }
}
