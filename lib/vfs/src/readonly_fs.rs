//! A decorator that makes any filesystem read-only.
//!
//! Mutating operations are rejected with [`FsError::Unsupported`] before the
//! inner filesystem is consulted; reads and stats delegate unchanged.

use crate::{
    FileOpener, FileSystem as FileSystemTrait, FsError, Metadata, OpenOptions, OpenOptionsConfig,
    ReadDir, Result, VirtualFile,
};
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct FileSystem<F: FileSystemTrait> {
    inner: F,
}

impl<F: FileSystemTrait> FileSystem<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: FileSystemTrait> FileSystemTrait for FileSystem<F> {
    fn read_dir(&self, path: &Path) -> Result<ReadDir> {
        self.inner.read_dir(path)
    }

    fn create_dir(&self, _path: &Path) -> Result<()> {
        Err(FsError::Unsupported)
    }

    fn remove_dir(&self, _path: &Path) -> Result<()> {
        Err(FsError::Unsupported)
    }

    fn remove_file(&self, _path: &Path) -> Result<()> {
        Err(FsError::Unsupported)
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<()> {
        Err(FsError::Unsupported)
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        self.inner.metadata(path)
    }

    fn set_times(&self, _path: &Path, _atime: u64, _mtime: u64) -> Result<()> {
        Err(FsError::Unsupported)
    }

    fn new_open_options(&self) -> OpenOptions<'_> {
        OpenOptions::new(self)
    }
}

impl<F: FileSystemTrait> FileOpener for FileSystem<F> {
    fn open(
        &self,
        path: &Path,
        conf: &OpenOptionsConfig,
    ) -> Result<Box<dyn VirtualFile + Send + Sync + 'static>> {
        if conf.would_mutate() {
            debug!("readonly_fs::open: rejecting mutating open of {:?}", path);
            return Err(FsError::Unsupported);
        }
        self.inner.new_open_options().options(conf.clone()).open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_fs;

    fn fixture() -> (tempfile::TempDir, FileSystem<host_fs::FileSystem>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing-file"), b"012").unwrap();
        let fs = FileSystem::new(host_fs::FileSystem::new(dir.path()).unwrap());
        (dir, fs)
    }

    #[test]
    fn test_reads_delegate() {
        let (_dir, fs) = fixture();
        assert!(fs.metadata(Path::new("existing-file")).unwrap().is_file());
        assert!(!fs.read_dir(Path::new(".")).unwrap().is_empty());
        assert!(fs
            .new_open_options()
            .read(true)
            .open("existing-file")
            .is_ok());
    }

    #[test]
    fn test_mutations_rejected() {
        let (_dir, fs) = fixture();
        assert_eq!(fs.create_dir(Path::new("d")), Err(FsError::Unsupported));
        assert_eq!(fs.remove_dir(Path::new("d")), Err(FsError::Unsupported));
        assert_eq!(
            fs.remove_file(Path::new("existing-file")),
            Err(FsError::Unsupported)
        );
        assert_eq!(
            fs.rename(Path::new("existing-file"), Path::new("other")),
            Err(FsError::Unsupported)
        );
        assert_eq!(
            fs.set_times(Path::new("existing-file"), 0, 0),
            Err(FsError::Unsupported)
        );
    }

    #[test]
    fn test_mutating_opens_rejected() {
        let (_dir, fs) = fixture();
        let base = OpenOptionsConfig {
            read: true,
            ..Default::default()
        };
        for conf in [
            OpenOptionsConfig {
                create: true,
                ..base.clone()
            },
            OpenOptionsConfig {
                truncate: true,
                ..base.clone()
            },
            OpenOptionsConfig {
                append: true,
                ..base.clone()
            },
            OpenOptionsConfig {
                write: true,
                ..base.clone()
            },
        ] {
            assert_eq!(
                fs.new_open_options().options(conf).open("existing-file").err(),
                Some(FsError::Unsupported)
            );
        }
    }
}
