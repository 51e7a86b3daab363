// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed blob store
//!
//! Containers are directories under a root. A blob is a file plus a JSON
//! sidecar holding its generation, digest and lease. Mutations hold an
//! exclusive advisory lock on a per-blob lock file and replace files by
//! rename, so readers see either the old or the new blob.

use crate::StorageError;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use lrep_core::config::is_valid_container_name;
use lrep_core::{BlobPath, ETag, LeaseId, WriteCondition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

const META_SUFFIX: &str = ".lrep-meta";
const LOCK_SUFFIX: &str = ".lrep-lock";
const TEMP_SUFFIX: &str = ".lrep-tmp";

/// Blob contents with the version they were read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub etag: ETag,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BlobMeta {
    generation: u64,
    digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lease: Option<LeaseRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    id: String,
    expires_at: DateTime<Utc>,
}

impl BlobMeta {
    fn etag(&self) -> ETag {
        ETag::new(format!(
            "{}-{}",
            self.generation,
            &self.digest[..self.digest.len().min(16)]
        ))
    }

    fn active_lease(&self, now: DateTime<Utc>) -> Option<&LeaseRecord> {
        self.lease.as_ref().filter(|l| l.expires_at > now)
    }
}

/// Blob store rooted at a local directory
#[derive(Debug, Clone)]
pub struct BlobDir {
    root: PathBuf,
}

impl BlobDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        Ok(self.container_dir(container)?.is_dir())
    }

    /// Create a container; returns false if it already existed
    pub fn create_container(&self, container: &str) -> Result<bool, StorageError> {
        let dir = self.container_dir(container)?;
        std::fs::create_dir_all(&self.root)?;
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a blob
    ///
    /// A missing blob is `Ok(None)`; a missing container is an error. Nothing
    /// is created on either path.
    pub fn read(&self, path: &BlobPath) -> Result<Option<StoredBlob>, StorageError> {
        let file = self.blob_file(path)?;
        if !self.container_exists(&path.container)? {
            return Err(StorageError::ContainerNotFound(path.container.clone()));
        }
        if !file.is_file() {
            return Ok(None);
        }

        let lock = lock_file(&file)?;
        lock.lock_shared()?;
        let read = read_locked(&file);
        let unlocked = FileExt::unlock(&lock);
        let stored = read?;
        unlocked?;
        Ok(stored)
    }

    /// Write a blob if `condition` holds; returns the new version
    ///
    /// An active lease blocks every write that does not present it.
    pub fn write(
        &self,
        path: &BlobPath,
        data: &[u8],
        condition: &WriteCondition,
        now: DateTime<Utc>,
    ) -> Result<ETag, StorageError> {
        self.with_blob_locked(path, |file, meta| {
            check_lease(path, meta.as_ref(), condition, now)?;
            match condition {
                WriteCondition::IfMatch(expected) => {
                    let current = meta.as_ref().map(BlobMeta::etag);
                    if current.as_ref() != Some(expected) {
                        return Err(StorageError::PreconditionFailed {
                            path: path.to_string(),
                            reason: format!(
                                "expected {}, found {}",
                                expected,
                                current.map_or_else(|| "nothing".to_string(), |t| t.to_string())
                            ),
                        });
                    }
                }
                WriteCondition::IfNoneMatch if meta.is_some() => {
                    return Err(StorageError::PreconditionFailed {
                        path: path.to_string(),
                        reason: "blob already exists".to_string(),
                    });
                }
                _ => {}
            }

            let next = BlobMeta {
                generation: meta.as_ref().map_or(0, |m| m.generation) + 1,
                digest: digest(data),
                lease: meta.and_then(|m| m.lease),
            };
            replace(file, data)?;
            write_meta(file, &next)?;
            Ok(next.etag())
        })
    }

    /// Take an exclusive lease on an existing blob
    pub fn acquire_lease(
        &self,
        path: &BlobPath,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<LeaseId, StorageError> {
        self.with_blob_locked(path, |file, meta| {
            let Some(mut meta) = meta else {
                return Err(StorageError::BlobNotFound(path.to_string()));
            };
            if meta.active_lease(now).is_some() {
                return Err(StorageError::LeaseConflict(path.to_string()));
            }

            let span = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
            let id = uuid::Uuid::new_v4().to_string();
            meta.lease = Some(LeaseRecord {
                id: id.clone(),
                expires_at: now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC),
            });
            write_meta(file, &meta)?;
            Ok(LeaseId::new(id))
        })
    }

    /// Release a lease; releasing an unleased blob is a no-op
    pub fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), StorageError> {
        self.with_blob_locked(path, |file, meta| {
            let Some(mut meta) = meta else {
                return Ok(());
            };
            let held_by_caller = match &meta.lease {
                None => return Ok(()),
                Some(held) => held.id == lease.0,
            };
            if !held_by_caller {
                return Err(StorageError::LeaseMismatch(path.to_string()));
            }
            meta.lease = None;
            write_meta(file, &meta)
        })
    }

    fn with_blob_locked<T>(
        &self,
        path: &BlobPath,
        f: impl FnOnce(&Path, Option<BlobMeta>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let file = self.blob_file(path)?;
        if !self.container_exists(&path.container)? {
            return Err(StorageError::ContainerNotFound(path.container.clone()));
        }
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = lock_file(&file)?;
        lock.lock_exclusive()?;
        let result = load_meta(&file).and_then(|meta| f(&file, meta));
        let unlocked = FileExt::unlock(&lock);
        let value = result?;
        unlocked?;
        Ok(value)
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_container_name(container) {
            return Err(StorageError::InvalidName(container.to_string()));
        }
        Ok(self.root.join(container))
    }

    fn blob_file(&self, path: &BlobPath) -> Result<PathBuf, StorageError> {
        let name = Path::new(&path.name);
        let plain = name
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        let reserved = [META_SUFFIX, LOCK_SUFFIX, TEMP_SUFFIX]
            .iter()
            .any(|s| path.name.ends_with(s));
        if path.name.is_empty() || !plain || reserved {
            return Err(StorageError::InvalidName(path.name.clone()));
        }
        Ok(self.container_dir(&path.container)?.join(name))
    }
}

fn sidecar(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn lock_file(file: &Path) -> Result<File, StorageError> {
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(sidecar(file, LOCK_SUFFIX))?)
}

fn load_meta(file: &Path) -> Result<Option<BlobMeta>, StorageError> {
    if !file.is_file() {
        return Ok(None);
    }
    match std::fs::read(sidecar(file, META_SUFFIX)) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        // Blob placed by hand without a sidecar
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let data = std::fs::read(file)?;
            Ok(Some(BlobMeta {
                generation: 0,
                digest: digest(&data),
                lease: None,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

fn read_locked(file: &Path) -> Result<Option<StoredBlob>, StorageError> {
    let data = match std::fs::read(file) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let etag = load_meta(file)?.unwrap_or_default().etag();
    Ok(Some(StoredBlob { data, etag }))
}

fn write_meta(file: &Path, meta: &BlobMeta) -> Result<(), StorageError> {
    replace(&sidecar(file, META_SUFFIX), &serde_json::to_vec(meta)?)
}

/// Atomically replace `target` with `data`
fn replace(target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let temp = sidecar(target, TEMP_SUFFIX);
    let mut out = File::create(&temp)?;
    out.write_all(data)?;
    out.sync_all()?;
    std::fs::rename(&temp, target)?;
    Ok(())
}

fn check_lease(
    path: &BlobPath,
    meta: Option<&BlobMeta>,
    condition: &WriteCondition,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let active = meta.and_then(|m| m.active_lease(now));
    match (active, condition) {
        (Some(held), WriteCondition::Lease(presented)) if held.id == presented.0 => Ok(()),
        (_, WriteCondition::Lease(_)) => Err(StorageError::LeaseMismatch(path.to_string())),
        (Some(_), _) => Err(StorageError::LeaseConflict(path.to_string())),
        (None, _) => Ok(()),
    }
}

fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "blob_dir_tests.rs"]
mod tests;
