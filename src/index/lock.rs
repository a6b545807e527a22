//! Advisory single-writer lock next to the index database.

use crate::error::{ContextError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Held for the duration of an indexing run; released on drop.
#[derive(Debug)]
pub struct IndexWriteLock {
    file: File,
    path: PathBuf,
}

impl IndexWriteLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_path_for_db(db_path: &Path) -> PathBuf {
    let mut name = db_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    db_path.with_file_name(name)
}

/// Take the writer lock without blocking.
///
/// Fails with [`ContextError::Locked`] when another run holds it.
pub fn try_acquire(db_path: &Path) -> Result<IndexWriteLock> {
    let path = lock_path_for_db(db_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).read(true).write(true).truncate(false).open(&path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(IndexWriteLock { file, path }),
        Err(err) if err.kind() == fs2::lock_contended_error().kind() => Err(ContextError::Locked(path)),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_sits_next_to_db() {
        assert_eq!(
            lock_path_for_db(Path::new("/x/.codectx/index.sqlite")),
            PathBuf::from("/x/.codectx/index.sqlite.lock")
        );
    }

    #[test]
    fn second_writer_is_rejected_until_release() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("index.sqlite");

        let first = try_acquire(&db).unwrap();
        assert!(matches!(try_acquire(&db), Err(ContextError::Locked(_))));
        drop(first);
        assert!(try_acquire(&db).is_ok());
    }
}
