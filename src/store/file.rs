use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{CacheSnapshot, PersistentBindingStore};
use crate::error::{StoreError, StoreResult};
use crate::fingerprint::hash_hex;

const MAGIC: &[u8; 4] = b"SAB1";
const VERSION: u16 = 1;
const FILE_EXTENSION: &str = "sab";

/// One snapshot file per key below a cache directory.
///
/// Writes land in a temporary file in the same directory and are renamed
/// into place, so readers see either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileBindingStore {
    dir: PathBuf,
}

impl FileBindingStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the per-user cache directory.
    pub fn in_user_cache() -> StoreResult<Self> {
        let base = dirs::cache_dir().ok_or(StoreError::NoCacheDir)?;
        Ok(Self::new(base.join("solvra_autoload")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hash_hex(key.as_bytes()), FILE_EXTENSION))
    }

    fn encode(snapshot: &CacheSnapshot) -> StoreResult<Vec<u8>> {
        let payload =
            bincode::serialize(snapshot).map_err(|err| StoreError::Encode(err.to_string()))?;
        let mut bytes = Vec::with_capacity(MAGIC.len() + 2 + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    fn decode<R: Read>(mut reader: R) -> StoreResult<CacheSnapshot> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| StoreError::InvalidHeader)?;
        if &magic != MAGIC {
            return Err(StoreError::InvalidHeader);
        }
        let mut version_bytes = [0u8; 2];
        reader
            .read_exact(&mut version_bytes)
            .map_err(|_| StoreError::InvalidHeader)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }
        bincode::deserialize_from(reader).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

impl PersistentBindingStore for FileBindingStore {
    fn load(&self, key: &str) -> StoreResult<Option<CacheSnapshot>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(StoreError::Io { path, error }),
        };
        debug!(path = %path.display(), bytes = bytes.len(), "read binding snapshot");
        Self::decode(&bytes[..]).map(Some)
    }

    fn store(&self, key: &str, snapshot: &CacheSnapshot) -> StoreResult<()> {
        let bytes = Self::encode(snapshot)?;
        fs::create_dir_all(&self.dir).map_err(|error| StoreError::Io {
            path: self.dir.clone(),
            error,
        })?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|error| StoreError::Io {
            path: self.dir.clone(),
            error,
        })?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|error| StoreError::Io {
                path: tmp.path().to_path_buf(),
                error,
            })?;
        let target = self.path_for(key);
        tmp.persist(&target).map_err(|err| StoreError::Io {
            path: target.clone(),
            error: err.error,
        })?;
        debug!(path = %target.display(), bytes = bytes.len(), "wrote binding snapshot");
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StoreError::Io { path, error }),
        }
    }
}
