//! A filesystem rooted at a directory on the host.
//!
//! Guest paths are resolved against the root; absolute paths are re-rooted
//! and `..` components can never climb above it, so the guest stays
//! sandboxed no matter what path bytes it hands us.

use crate::{
    DirEntry, FileOpener, FileSystem as FileSystemTrait, FileType, FsError, Metadata, OpenOptions,
    OpenOptionsConfig, ReadDir, Result, VirtualFile,
};
use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    /// Creates a filesystem rooted at `root`, which must name an existing
    /// directory on the host.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let md = fs::metadata(root)?;
        if !md.is_dir() {
            return Err(FsError::BaseNotDirectory);
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a guest path onto the host, never escaping the root: absolute
    /// prefixes are stripped and a `..` with nothing left to pop resolves to
    /// not-found rather than the parent of the root.
    fn host_path(&self, path: &Path) -> Result<PathBuf> {
        let mut kept: Vec<&Path> = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(c) => kept.push(c.as_ref()),
                Component::ParentDir => {
                    if kept.pop().is_none() {
                        return Err(FsError::EntryNotFound);
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        let mut out = self.root.clone();
        for c in kept {
            out.push(c);
        }
        Ok(out)
    }
}

impl FileSystemTrait for FileSystem {
    fn read_dir(&self, path: &Path) -> Result<ReadDir> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::read_dir: {}", host_path.display());
        let read_dir = fs::read_dir(&host_path)?;
        let mut data = read_dir
            .map(|entry| {
                let entry = entry?;
                let metadata = entry.metadata()?;
                Ok(DirEntry {
                    path: entry.path(),
                    metadata: Ok(metadata.try_into()?),
                })
            })
            .collect::<std::result::Result<Vec<DirEntry>, io::Error>>()
            .map_err::<FsError, _>(Into::into)?;
        data.sort_by_key(|e| e.file_name());
        Ok(ReadDir::new(data))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::create_dir: {}", host_path.display());
        fs::create_dir(&host_path).map_err(Into::into)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::remove_dir: {}", host_path.display());
        fs::remove_dir(&host_path).map_err(Into::into)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::remove_file: {}", host_path.display());
        // Unlinking a directory is EPERM on some platforms; report it
        // uniformly before asking the OS.
        if fs::metadata(&host_path)?.is_dir() {
            return Err(FsError::IsADirectory);
        }
        fs::remove_file(&host_path).map_err(Into::into)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_host = self.host_path(from)?;
        let to_host = self.host_path(to)?;
        debug!(
            "host_fs::rename: {} -> {}",
            from_host.display(),
            to_host.display()
        );
        let from_md = fs::metadata(&from_host)?;
        // Renames across entity kinds behave differently per platform; pin
        // the POSIX outcome everywhere.
        if let Ok(to_md) = fs::metadata(&to_host) {
            if from_md.is_dir() && !to_md.is_dir() {
                return Err(FsError::NotADirectory);
            }
            if !from_md.is_dir() && to_md.is_dir() {
                return Err(FsError::IsADirectory);
            }
        }
        fs::rename(&from_host, &to_host).map_err(Into::into)
    }

    fn metadata(&self, path: &Path) -> Result<Metadata> {
        let host_path = self.host_path(path)?;
        fs::metadata(&host_path)
            .and_then(TryInto::try_into)
            .map_err(Into::into)
    }

    fn set_times(&self, path: &Path, atime: u64, mtime: u64) -> Result<()> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::set_times: {}", host_path.display());
        let times = fs::FileTimes::new()
            .set_accessed(UNIX_EPOCH + Duration::from_nanos(atime))
            .set_modified(UNIX_EPOCH + Duration::from_nanos(mtime));
        let file = fs::File::open(&host_path)?;
        file.set_times(times).map_err(Into::into)
    }

    fn new_open_options(&self) -> OpenOptions<'_> {
        OpenOptions::new(self)
    }
}

impl FileOpener for FileSystem {
    fn open(
        &self,
        path: &Path,
        conf: &OpenOptionsConfig,
    ) -> Result<Box<dyn VirtualFile + Send + Sync + 'static>> {
        let host_path = self.host_path(path)?;
        debug!("host_fs::open: {}", host_path.display());
        fs::OpenOptions::new()
            .read(conf.read())
            .write(conf.write())
            .create_new(conf.create_new())
            .create(conf.create())
            .append(conf.append())
            .truncate(conf.truncate())
            .open(&host_path)
            .map_err(Into::into)
            .map(|file| {
                Box::new(File::new(file, host_path)) as Box<dyn VirtualFile + Send + Sync + 'static>
            })
    }
}

impl TryInto<Metadata> for fs::Metadata {
    type Error = io::Error;

    fn try_into(self) -> std::result::Result<Metadata, Self::Error> {
        let filetype = self.file_type();
        let (char_device, block_device, socket, fifo) = {
            #[cfg(unix)]
            {
                use std::os::unix::fs::FileTypeExt;
                (
                    filetype.is_char_device(),
                    filetype.is_block_device(),
                    filetype.is_socket(),
                    filetype.is_fifo(),
                )
            }
            #[cfg(not(unix))]
            {
                (false, false, false, false)
            }
        };

        Ok(Metadata {
            ft: FileType {
                dir: filetype.is_dir(),
                file: filetype.is_file(),
                symlink: filetype.is_symlink(),
                char_device,
                block_device,
                socket,
                fifo,
            },
            accessed: self
                .accessed()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |time| time.as_nanos() as u64),
            created: self
                .created()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |time| time.as_nanos() as u64),
            modified: self
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |time| time.as_nanos() as u64),
            len: self.len(),
        })
    }
}

/// A thin wrapper around `std::fs::File`
#[derive(Debug)]
pub struct File {
    inner: fs::File,
    pub host_path: PathBuf,
}

impl File {
    pub fn new(file: fs::File, host_path: PathBuf) -> Self {
        Self {
            inner: file,
            host_path,
        }
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.inner.read_to_end(buf)
    }
}

impl Seek for File {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }
}

impl VirtualFile for File {
    fn last_accessed(&self) -> u64 {
        self.inner
            .metadata()
            .ok()
            .and_then(|md| md.accessed().ok())
            .and_then(|ct| ct.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|ct| ct.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn last_modified(&self) -> u64 {
        self.inner
            .metadata()
            .ok()
            .and_then(|md| md.modified().ok())
            .and_then(|ct| ct.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|ct| ct.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn created_time(&self) -> u64 {
        self.inner
            .metadata()
            .ok()
            .and_then(|md| md.created().ok())
            .and_then(|ct| ct.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|ct| ct.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn size(&self) -> u64 {
        self.inner.metadata().map(|md| md.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_filesystem_sanity() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();
        let files = filesystem
            .read_dir(Path::new("."))
            .unwrap()
            .filter_map(|r| Some(r.ok()?.file_name().to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(files, vec!["hello.txt".to_string()]);
    }

    #[test]
    fn test_read_dir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ab-", "-", "a-"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let filesystem = FileSystem::new(dir.path()).unwrap();
        let files = filesystem
            .read_dir(Path::new("."))
            .unwrap()
            .filter_map(|r| Some(r.ok()?.file_name().to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(files, vec!["-", "a-", "ab-"]);
    }

    #[test]
    fn test_path_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("inside.txt"), b"").unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();

        assert_eq!(
            filesystem.metadata(Path::new("../outside.txt")),
            Err(FsError::EntryNotFound)
        );
        assert_eq!(
            filesystem.metadata(Path::new("sub/../../outside.txt")),
            Err(FsError::EntryNotFound)
        );
        // absolute paths are re-rooted, not passed to the host as-is
        assert!(filesystem.metadata(Path::new("/inside.txt")).is_ok());
    }

    #[test]
    fn test_remove_file_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();
        assert_eq!(
            filesystem.remove_file(Path::new("sub")),
            Err(FsError::IsADirectory)
        );
    }

    #[test]
    fn test_remove_dir_on_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"").unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();
        let err = filesystem.remove_dir(Path::new("file")).unwrap_err();
        // Windows reports this as not-found rather than not-a-directory.
        if cfg!(windows) {
            assert!(matches!(
                err,
                FsError::NotADirectory | FsError::EntryNotFound
            ));
        } else {
            assert_eq!(err, FsError::NotADirectory);
        }
    }

    #[test]
    fn test_rename_kind_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::create_dir(dir.path().join("sub/dir")).unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();

        assert_eq!(
            filesystem.rename(Path::new("file"), Path::new("sub/dir")),
            Err(FsError::IsADirectory)
        );
        assert_eq!(
            filesystem.rename(Path::new("sub/dir"), Path::new("file")),
            Err(FsError::NotADirectory)
        );
        assert_eq!(
            filesystem.rename(Path::new("missing"), Path::new("anything")),
            Err(FsError::EntryNotFound)
        );
    }

    #[test]
    fn test_set_times() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stamped"), b"").unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();

        let mtime = 1_609_459_200_000_000_000u64;
        filesystem
            .set_times(Path::new("stamped"), mtime, mtime)
            .unwrap();
        let md = filesystem.metadata(Path::new("stamped")).unwrap();
        assert_eq!(md.modified(), mtime);

        assert_eq!(
            filesystem.set_times(Path::new("missing"), 0, 0),
            Err(FsError::EntryNotFound)
        );
    }

    #[test]
    fn test_open_create_new_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("taken"), b"").unwrap();
        let filesystem = FileSystem::new(dir.path()).unwrap();

        let err = filesystem
            .new_open_options()
            .write(true)
            .create_new(true)
            .open("taken")
            .unwrap_err();
        assert_eq!(err, FsError::AlreadyExists);
    }
}
