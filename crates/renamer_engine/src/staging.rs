use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use renamer_logging::{renamer_debug, renamer_warn};
use thiserror::Error;

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid staged file id {0:?}")]
    InvalidId(String),
    #[error("staged file not found: {0}")]
    NotFound(String),
    #[error("staged file already exists: {0}")]
    AlreadyExists(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Holds the bytes of staged files, addressed by their current filename.
///
/// `list_ids` returns files in staging order, which is also the order a
/// rename job processes them. `rename` keeps a file's position.
pub trait StagingArea: Send + Sync {
    fn put(&self, id: &str, content: Bytes) -> Result<(), StorageError>;
    fn read(&self, id: &str) -> Result<Bytes, StorageError>;
    /// Fails with [`StorageError::AlreadyExists`] rather than replacing a
    /// different staged file. Renaming a file onto itself is a no-op.
    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;
    fn delete(&self, id: &str) -> Result<(), StorageError>;
    fn list_ids(&self) -> Result<Vec<String>, StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// A staged id must be a single, plain path component.
pub(crate) fn validate_id(id: &str) -> Result<(), StorageError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if invalid {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory staging area, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStagingArea {
    files: Mutex<Vec<(String, Bytes)>>,
}

impl MemoryStagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate in iteration order.
    ///
    /// Panics on an invalid id: test setup that is wrong should not pass.
    pub fn with_files(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<Bytes>)>,
    ) -> Self {
        let staging = Self::new();
        for (id, content) in files {
            let id = id.into();
            if let Err(err) = staging.put(&id, content.into()) {
                panic!("MemoryStagingArea::with_files: {err}");
            }
        }
        staging
    }
}

impl StagingArea for MemoryStagingArea {
    fn put(&self, id: &str, content: Bytes) -> Result<(), StorageError> {
        validate_id(id)?;
        let mut files = lock(&self.files);
        match files.iter_mut().find(|(existing, _)| existing == id) {
            Some(entry) => entry.1 = content,
            None => files.push((id.to_string(), content)),
        }
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Bytes, StorageError> {
        lock(&self.files)
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        validate_id(to)?;
        let mut files = lock(&self.files);
        let index = files
            .iter()
            .position(|(existing, _)| existing == from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        if from == to {
            return Ok(());
        }
        if files.iter().any(|(existing, _)| existing == to) {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        files[index].0 = to.to_string();
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut files = lock(&self.files);
        let index = files
            .iter()
            .position(|(existing, _)| existing == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        files.remove(index);
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(lock(&self.files).iter().map(|(id, _)| id.clone()).collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        lock(&self.files).clear();
        Ok(())
    }
}

/// Staging area backed by a directory, one regular file per staged id.
///
/// Staging order is tracked in memory. Files already present when the area is
/// opened are adopted in name order.
#[derive(Debug)]
pub struct DirStagingArea {
    writer: AtomicFileWriter,
    order: Mutex<Vec<String>>,
}

impl DirStagingArea {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        ensure_dir(&dir)?;

        let mut existing: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| validate_id(name).is_ok())
            .collect();
        existing.sort();
        if !existing.is_empty() {
            renamer_debug!(
                "Adopted {} staged file(s) from {:?}",
                existing.len(),
                dir
            );
        }

        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            order: Mutex::new(existing),
        })
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    fn path_of(&self, id: &str) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        Ok(self.dir().join(id))
    }
}

fn not_found_as(id: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |err| {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(id.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}

/// Whether both paths resolve to the same file on disk.
fn same_entry(a: &Path, b: &Path) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
        Ok(a.dev() == b.dev() && a.ino() == b.ino())
    }
    #[cfg(not(unix))]
    {
        Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
    }
}

impl StagingArea for DirStagingArea {
    fn put(&self, id: &str, content: Bytes) -> Result<(), StorageError> {
        validate_id(id)?;
        let mut order = lock(&self.order);
        self.writer.write(id, &content)?;
        if !order.iter().any(|existing| existing == id) {
            order.push(id.to_string());
        }
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Bytes, StorageError> {
        let path = self.path_of(id)?;
        let content = fs::read(&path).map_err(not_found_as(id))?;
        Ok(Bytes::from(content))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from_path = self.path_of(from)?;
        let to_path = self.path_of(to)?;
        let mut order = lock(&self.order);
        let index = order
            .iter()
            .position(|existing| existing == from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        if from == to {
            return Ok(());
        }
        if order.iter().any(|existing| existing == to) {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        // On a case-insensitive filesystem `photo.jpg` -> `Photo.jpg` finds
        // the source itself at the target path.
        if to_path.exists() && !same_entry(&from_path, &to_path)? {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        fs::rename(&from_path, &to_path).map_err(not_found_as(from))?;
        order[index] = to.to_string();
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_of(id)?;
        let mut order = lock(&self.order);
        fs::remove_file(&path).map_err(not_found_as(id))?;
        order.retain(|existing| existing != id);
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(lock(&self.order).clone())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut order = lock(&self.order);
        // Ids leave the order only once their file is gone.
        while let Some(id) = order.last().cloned() {
            let path = self.dir().join(&id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    renamer_warn!("Staged file {:?} vanished before clear", path);
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
            order.pop();
        }
        Ok(())
    }
}
