//! File-system blob store.
//!
//! On-disk layout under the store root:
//!
//! ```text
//! hoard-store.json                      store marker (format version, creation time)
//! content/<hh>/<hex>.bytes              blob content
//! content/<hh>/<hex>.headers.json       blob headers
//! ```
//!
//! `<hh>` is the first two hex characters of the blob id. Every file is
//! written to a temp file in its final directory and renamed into place, so
//! a reader never sees a partial blob. The presence of the `.bytes` file is
//! what makes a blob exist; headers are written first.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hoard_types::{BlobId, BlobStoreConfiguration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::blob::{Blob, Headers};
use crate::error::{StoreError, StoreResult};
use crate::lifecycle::{Lifecycle, StoreState};
use crate::traits::BlobStore;

/// Type tag of file-system stores.
pub const FILE_TYPE: &str = "file";
/// Attribute section read by file-system stores.
pub const FILE_SECTION: &str = "file";
/// Attribute holding the store root directory.
pub const PATH_KEY: &str = "path";

const MARKER_FILE: &str = "hoard-store.json";
const CONTENT_DIR: &str = "content";
const BYTES_SUFFIX: &str = ".bytes";
const HEADERS_SUFFIX: &str = ".headers.json";
const FORMAT_VERSION: u32 = 1;

/// Contents of the store marker file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct StoreMarker {
    format_version: u32,
    created_at: DateTime<Utc>,
}

/// Blob store rooted at a directory.
///
/// The directory belongs to the backend, not to the registered name: a
/// store unregistered and rebuilt under a new name from the same `file.path`
/// sees every blob written before.
pub struct FileBlobStore {
    config: BlobStoreConfiguration,
    root: PathBuf,
    lifecycle: Lifecycle,
}

impl FileBlobStore {
    pub fn new(config: BlobStoreConfiguration, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Build a store from its configuration. A relative `file.path` is
    /// resolved against `base_dir`.
    pub fn from_configuration(
        config: BlobStoreConfiguration,
        base_dir: &Path,
    ) -> StoreResult<Self> {
        let raw = config
            .attribute(FILE_SECTION, PATH_KEY)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                StoreError::invalid_config(
                    config.name.clone(),
                    format!("missing attribute {FILE_SECTION}.{PATH_KEY}"),
                )
            })?;
        let path = Path::new(raw);
        let root = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        Ok(Self::new(config, root))
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted ids of every blob on disk.
    pub fn blob_ids(&self) -> StoreResult<Vec<BlobId>> {
        let content = self.root.join(CONTENT_DIR);
        if !content.try_exists()? {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in WalkDir::new(&content).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?;
            let file_name = entry.file_name().to_string_lossy();
            if let Some(hex) = file_name.strip_suffix(BYTES_SUFFIX) {
                match BlobId::from_hex(hex) {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        debug!(path = %entry.path().display(), error = %e, "skipping foreign file")
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn shard_dir(&self, id: &BlobId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(CONTENT_DIR).join(&hex[..2])
    }

    fn bytes_path(&self, id: &BlobId) -> PathBuf {
        self.shard_dir(id).join(format!("{}{BYTES_SUFFIX}", id.to_hex()))
    }

    fn headers_path(&self, id: &BlobId) -> PathBuf {
        self.shard_dir(id).join(format!("{}{HEADERS_SUFFIX}", id.to_hex()))
    }

    fn open_root(&self) -> StoreResult<()> {
        fs::create_dir_all(self.root.join(CONTENT_DIR))?;
        let marker_path = self.root.join(MARKER_FILE);
        if marker_path.try_exists()? {
            let raw = fs::read(&marker_path)?;
            let marker: StoreMarker =
                serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptMetadata {
                    path: marker_path.display().to_string(),
                    reason: e.to_string(),
                })?;
            if marker.format_version != FORMAT_VERSION {
                return Err(StoreError::CorruptMetadata {
                    path: marker_path.display().to_string(),
                    reason: format!("unsupported format version {}", marker.format_version),
                });
            }
            debug!(
                root = %self.root.display(),
                created_at = %marker.created_at,
                "opened existing store"
            );
        } else {
            let marker = StoreMarker {
                format_version: FORMAT_VERSION,
                created_at: Utc::now(),
            };
            write_atomic(&marker_path, &serde_json::to_vec_pretty(&marker)?)?;
            info!(root = %self.root.display(), "initialized new store");
        }
        Ok(())
    }
}

/// Write `data` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Backend(format!("{} has no parent", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl BlobStore for FileBlobStore {
    fn configuration(&self) -> &BlobStoreConfiguration {
        &self.config
    }

    fn start(&self) -> StoreResult<()> {
        self.lifecycle.start_with(|| self.open_root())
    }

    fn stop(&self) -> StoreResult<()> {
        self.lifecycle.stop_with(|| Ok(()))
    }

    fn state(&self) -> StoreState {
        self.lifecycle.state()
    }

    fn get(&self, id: &BlobId) -> StoreResult<Option<Blob>> {
        self.lifecycle.ensure_started(self.name())?;
        let data = match fs::read(self.bytes_path(id)) {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let headers: Headers = match fs::read(self.headers_path(id)) {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Headers::new(),
            Err(e) => return Err(e.into()),
        };
        let blob = Blob {
            id: *id,
            data,
            headers,
        };
        if !blob.verify() {
            return Err(StoreError::HashMismatch(*id));
        }
        Ok(Some(blob))
    }

    fn put(&self, data: Bytes, headers: Headers) -> StoreResult<BlobId> {
        self.lifecycle.ensure_started(self.name())?;
        let id = BlobId::for_content(&data);
        let bytes_path = self.bytes_path(&id);
        if bytes_path.try_exists()? {
            return Ok(id);
        }
        fs::create_dir_all(self.shard_dir(&id))?;
        write_atomic(&self.headers_path(&id), &serde_json::to_vec(&headers)?)?;
        write_atomic(&bytes_path, &data)?;
        debug!(store = %self.name(), blob = %id.short_hex(), size = data.len(), "blob written");
        Ok(id)
    }

    fn delete(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        let existed = remove_if_present(&self.bytes_path(id))?;
        remove_if_present(&self.headers_path(id))?;
        Ok(existed)
    }

    fn exists(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        Ok(self.bytes_path(id).try_exists()?)
    }
}

impl std::fmt::Debug for FileBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlobStore")
            .field("name", &self.config.name)
            .field("root", &self.root)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{headers, CONTENT_TYPE_HEADER};

    fn config(name: &str, path: &str) -> BlobStoreConfiguration {
        BlobStoreConfiguration::new(name, FILE_TYPE).with_attribute(FILE_SECTION, PATH_KEY, path)
    }

    fn started(dir: &Path) -> FileBlobStore {
        let store = FileBlobStore::from_configuration(config("default", "blobs"), dir).unwrap();
        store.start().unwrap();
        store
    }

    #[test]
    fn relative_path_resolves_against_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FileBlobStore::from_configuration(config("default", "blobs"), dir.path()).unwrap();
        assert_eq!(store.root(), dir.path().join("blobs"));
    }

    #[test]
    fn missing_path_is_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileBlobStore::from_configuration(
            BlobStoreConfiguration::new("default", FILE_TYPE),
            dir.path(),
        );
        assert!(matches!(result, Err(StoreError::InvalidConfiguration { .. })));
    }

    #[test]
    fn start_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = started(dir.path());
        assert!(store.root().join(MARKER_FILE).exists());
        assert_eq!(store.state(), StoreState::Started);
    }

    #[test]
    fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = started(dir.path());
        let id = store
            .put(
                Bytes::from_static(b"artifact bytes"),
                headers([(CONTENT_TYPE_HEADER, "application/java-archive")]),
            )
            .unwrap();

        assert!(store.exists(&id).unwrap());
        let blob = store.fetch(&id).unwrap();
        assert_eq!(&blob.data[..], b"artifact bytes");
        assert_eq!(blob.headers[CONTENT_TYPE_HEADER], "application/java-archive");

        assert!(store.delete(&id).unwrap());
        assert!(!store.exists(&id).unwrap());
        assert!(store.get(&id).unwrap().is_none());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn data_survives_restart_under_new_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = started(dir.path());
        let id = store.put(Bytes::from_static(b"keep"), Headers::new()).unwrap();
        store.stop().unwrap();

        let renamed = FileBlobStore::from_configuration(
            store.configuration().copy_as("default-promoted"),
            dir.path(),
        )
        .unwrap();
        renamed.start().unwrap();
        assert_eq!(&renamed.fetch(&id).unwrap().data[..], b"keep");
    }

    #[test]
    fn corrupt_marker_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blobs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(MARKER_FILE), b"{ not json").unwrap();

        let store =
            FileBlobStore::from_configuration(config("default", "blobs"), dir.path()).unwrap();
        assert!(matches!(store.start(), Err(StoreError::CorruptMetadata { .. })));
        assert_eq!(store.state(), StoreState::Failed);
    }

    #[test]
    fn root_that_is_a_file_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blobs"), b"occupied").unwrap();
        let store =
            FileBlobStore::from_configuration(config("default", "blobs"), dir.path()).unwrap();
        assert!(store.start().is_err());
    }

    #[test]
    fn tampered_content_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let store = started(dir.path());
        let id = store.put(Bytes::from_static(b"original"), Headers::new()).unwrap();
        fs::write(store.bytes_path(&id), b"tampered").unwrap();
        assert!(matches!(store.get(&id), Err(StoreError::HashMismatch(bad)) if bad == id));
    }

    #[test]
    fn blob_ids_lists_written_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = started(dir.path());
        let a = store.put(Bytes::from_static(b"a"), Headers::new()).unwrap();
        let b = store.put(Bytes::from_static(b"b"), Headers::new()).unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.blob_ids().unwrap(), expected);
    }

    #[test]
    fn operations_require_start() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FileBlobStore::from_configuration(config("default", "blobs"), dir.path()).unwrap();
        assert!(matches!(
            store.exists(&BlobId::for_content(b"x")),
            Err(StoreError::NotStarted { .. })
        ));
    }
}
