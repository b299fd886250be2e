//! Directory-based document backend for persistent storage.

use crate::backend::{check_expected, Document, DocumentBackend, Version};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOCK_FILE: &str = ".remision.lock";

/// A directory-based document backend.
///
/// Each document is one file in the root directory. Data survives process
/// restarts.
///
/// # Durability
///
/// - New content is written to a temporary file in the same directory,
///   synced, then renamed over the old file; readers see the old or the new
///   document, never a torn one
/// - The version check and the rename run under an exclusive lock on a lock
///   file, so separate processes sharing the directory serialize their writes
///
/// # Example
///
/// ```no_run
/// use remision_storage::{DocumentBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data")).unwrap();
/// let version = backend.put("secuencia.json", b"{\"ultima\":\"00000000\"}", None).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Opens a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, name: &str) -> StorageResult<PathBuf> {
        let valid = !name.is_empty()
            && name != LOCK_FILE
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn read_current(path: &Path) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl DocumentBackend for FileBackend {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        let path = self.document_path(name)?;
        Ok(Self::read_current(&path)?.map(|content| Document {
            version: Version::of(&content),
            content,
        }))
    }

    fn put(
        &self,
        name: &str,
        content: &[u8],
        expected: Option<&Version>,
    ) -> StorageResult<Version> {
        let path = self.document_path(name)?;

        let _guard = self.write_lock.lock();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        lock_file.lock_exclusive()?;

        let current = Self::read_current(&path)?.map(|c| Version::of(&c));
        check_expected(name, current.as_ref(), expected)?;

        let mut staged = NamedTempFile::new_in(&self.root)?;
        staged.write_all(content)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        tracing::trace!(document = name, bytes = content.len(), "document replaced");

        // Dropping the handle releases the lock.
        drop(lock_file);
        Ok(Version::of(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("ledger");

        let backend = FileBackend::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(backend.root(), root);
    }

    #[test]
    fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let version = backend.put("historial.json", b"[]", None).unwrap();
        let doc = backend.get("historial.json").unwrap().unwrap();
        assert_eq!(doc.content, b"[]");
        assert_eq!(doc.version, version);
    }

    #[test]
    fn file_missing_document_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.get("historial.json").unwrap().is_none());
    }

    #[test]
    fn file_stale_version_conflicts_and_keeps_content() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let v1 = backend.put("a.json", b"one", None).unwrap();
        backend.put("a.json", b"two", Some(&v1)).unwrap();

        let err = backend.put("a.json", b"three", Some(&v1)).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(backend.get("a.json").unwrap().unwrap().content, b"two");
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.put("a.json", b"persistent", None).unwrap();
        }

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            let doc = backend.get("a.json").unwrap().unwrap();
            assert_eq!(doc.content, b"persistent");
            assert_eq!(doc.version, Version::of(b"persistent"));
        }
    }

    #[test]
    fn file_rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        for name in ["", "../x", "a/b", ".remision.lock", ".hidden"] {
            let result = backend.put(name, b"x", None);
            assert!(
                matches!(result, Err(StorageError::InvalidName(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn file_leaves_no_staging_files() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let v = backend.put("a.json", b"1", None).unwrap();
        backend.put("a.json", b"2", Some(&v)).unwrap();

        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec![LOCK_FILE.to_string(), "a.json".to_string()]);
    }
}
