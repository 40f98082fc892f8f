//! The directory holding the generated include file.
//!
//! Replacement goes through a temporary file in the same directory followed by
//! a rename, so the DHCP daemon only ever sees a complete file.

use crate::error::{Result, SyncError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Permissions given to the generated file
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// On-disk location of the generated configuration.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
    target: PathBuf,
}

impl ConfigStore {
    /// Create a store writing `target`, using `dir` for temporary files.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            target: target.into(),
        }
    }

    /// Create a store writing `target`, with temporary files next to it so the
    /// final rename never crosses a filesystem.
    #[must_use]
    pub fn for_target(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { dir, target }
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Current content of the target, or `None` when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] if the file exists but cannot be read
    pub fn read_current(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Read(e)),
        }
    }

    /// Returns `true` when the target exists and equals `content` byte for byte.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] if the target cannot be read
    pub fn is_current(&self, content: &[u8]) -> Result<bool> {
        Ok(self.read_current()?.as_deref() == Some(content))
    }

    /// Atomically replace the target with `content`.
    ///
    /// The temporary file is removed if anything fails before the rename, and
    /// the previous target is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Write`] on any filesystem failure
    pub fn replace(&self, content: &[u8]) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(SyncError::Write)?;
        temp.write_all(content).map_err(SyncError::Write)?;
        temp.as_file().sync_all().map_err(SyncError::Write)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
                .map_err(SyncError::Write)?;
        }

        temp.persist(&self.target)
            .map_err(|e| SyncError::Write(e.error))?;

        tracing::debug!(
            path = %self.target.display(),
            bytes = content.len(),
            "Replaced configuration file"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_read_current_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), dir.path().join("hosts.conf"));
        assert_eq!(store.read_current().unwrap(), None);
        assert!(!store.is_current(b"").unwrap());
    }

    #[test]
    fn test_replace_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hosts.conf");
        let store = ConfigStore::new(dir.path(), &target);

        store.replace(b"A\n").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"A\n");
        assert!(store.is_current(b"A\n").unwrap());

        store.replace(b"B\n").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"B\n");
        assert!(!store.is_current(b"A\n").unwrap());

        assert_eq!(entries(dir.path()), vec!["hosts.conf".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hosts.conf");
        let store = ConfigStore::new(dir.path(), &target);
        store.replace(b"A\n").unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, FILE_MODE);
    }

    #[test]
    fn test_replace_failure_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hosts.conf");
        fs::write(&target, b"A\n").unwrap();

        // temporary files go to a directory that does not exist
        let store = ConfigStore::new(dir.path().join("missing"), &target);
        let err = store.replace(b"B\n").unwrap_err();

        assert!(matches!(err, SyncError::Write(_)));
        assert_eq!(fs::read(&target).unwrap(), b"A\n");
    }

    #[test]
    fn test_for_target_uses_parent_for_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("dhcp");
        fs::create_dir(&sub).unwrap();
        let target = sub.join("hosts.conf");

        let store = ConfigStore::for_target(&target);
        assert_eq!(store.dir, sub);
        store.replace(b"A\n").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"A\n");
        assert_eq!(entries(&sub), vec!["hosts.conf".to_string()]);
        assert_eq!(entries(dir.path()), vec!["dhcp".to_string()]);
    }

    #[test]
    fn test_for_target_bare_file_name() {
        let store = ConfigStore::for_target("hosts.conf");
        assert_eq!(store.dir, PathBuf::from("."));
    }

    #[test]
    fn test_read_failure_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be cannot be read as one
        let target = dir.path().join("hosts.conf");
        fs::create_dir(&target).unwrap();

        let store = ConfigStore::for_target(&target);
        assert!(matches!(store.read_current(), Err(SyncError::Read(_))));
    }
}
