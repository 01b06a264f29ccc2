//! The per-instance filesystem context: the table mapping WASI file
//! descriptors to open entries, the pre-opened root, and the directory
//! iteration cursors that make `fd_readdir` resumable.

mod builder;
mod types;

pub use self::builder::*;
pub use self::types::*;

use capstan_vfs::{DirEntry, FileSystem, OpenOptionsConfig, ReadDir, VirtualFile};
use capstan_wasi_types::{Errno, Fdflags, FIRST_USER_FD, PREOPEN_FD, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::trace;

pub use capstan_wasi_types::Fd;

/// The amount of entries pulled from the underlying directory per batch.
pub const READDIR_BATCH: usize = 9;

#[derive(Debug)]
pub struct WasiState {
    pub fs: WasiFs,
}

/// What an open descriptor refers to.
#[derive(Debug)]
pub enum Kind {
    File {
        handle: Box<dyn VirtualFile + Send + Sync + 'static>,
    },
    Dir {
        /// The path of this directory relative to the filesystem root.
        path: PathBuf,
        /// Iteration state, created lazily by the first `fd_readdir` and
        /// dropped when the entry is closed or re-seated.
        read_dir: Option<ReadDirCursor>,
    },
    CharacterDevice {
        device: Box<dyn VirtualFile + Send + Sync + 'static>,
    },
}

/// One slot in the descriptor table.
#[derive(Debug)]
pub struct FileEntry {
    /// The path this entry was opened with.
    pub name: String,
    pub flags: Fdflags,
    pub kind: Kind,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, Kind::Dir { .. })
    }
}

/// Directory iteration state.
///
/// `count_read` is the total number of entries ever pulled from the
/// underlying directory; `entries` is the unconsumed tail of those pulls,
/// retained so that a guest re-requesting the same cookie with a bigger
/// buffer sees the same entries again. The reader's own position is not
/// resumable, which is why the tail lives here.
#[derive(Debug)]
pub struct ReadDirCursor {
    pub count_read: u64,
    pub entries: Vec<DirEntry>,
    reader: ReadDir,
}

impl ReadDirCursor {
    pub fn new(reader: ReadDir) -> Self {
        Self {
            count_read: 0,
            entries: Vec::new(),
            reader,
        }
    }

    /// Pulls up to `n` more entries out of the directory into the cached
    /// tail, returning how many arrived. Zero means the directory is
    /// exhausted.
    pub fn pull(&mut self, n: usize) -> usize {
        let batch = self.reader.next_batch(n);
        let pulled = batch.len();
        self.count_read += pulled as u64;
        self.entries.extend(batch);
        pulled
    }
}

/// The descriptor table of one instance.
///
/// Descriptors 0-2 are the standard streams, 3 is the pre-opened root, and
/// everything from 4 up is handed out by `open_file`. Allocation is
/// monotonic; closed descriptors are not reused.
#[derive(Debug)]
pub struct WasiFs {
    pub root_fs: Box<dyn FileSystem>,
    pub fd_map: BTreeMap<Fd, FileEntry>,
    pub next_fd: Fd,
    pub preopen_name: String,
}

impl WasiFs {
    pub fn new(
        root_fs: Box<dyn FileSystem>,
        stdin: Box<dyn VirtualFile + Send + Sync + 'static>,
        stdout: Box<dyn VirtualFile + Send + Sync + 'static>,
        stderr: Box<dyn VirtualFile + Send + Sync + 'static>,
    ) -> Self {
        let mut fd_map = BTreeMap::new();
        fd_map.insert(
            STDIN_FILENO,
            FileEntry {
                name: "<stdin>".to_string(),
                flags: Fdflags::empty(),
                kind: Kind::CharacterDevice { device: stdin },
            },
        );
        fd_map.insert(
            STDOUT_FILENO,
            FileEntry {
                name: "<stdout>".to_string(),
                flags: Fdflags::APPEND,
                kind: Kind::CharacterDevice { device: stdout },
            },
        );
        fd_map.insert(
            STDERR_FILENO,
            FileEntry {
                name: "<stderr>".to_string(),
                flags: Fdflags::APPEND,
                kind: Kind::CharacterDevice { device: stderr },
            },
        );
        fd_map.insert(
            PREOPEN_FD,
            FileEntry {
                name: "/".to_string(),
                flags: Fdflags::empty(),
                kind: Kind::Dir {
                    path: PathBuf::new(),
                    read_dir: None,
                },
            },
        );
        Self {
            root_fs,
            fd_map,
            next_fd: FIRST_USER_FD,
            preopen_name: "/".to_string(),
        }
    }

    /// Resolves `path` against the root, opens it, and seats it at a fresh
    /// descriptor. Directories get a `Kind::Dir` entry without touching the
    /// opener; everything else goes through the filesystem's open options,
    /// which is where a read-only filesystem rejects mutation.
    pub fn open_file(
        &mut self,
        path: &Path,
        conf: OpenOptionsConfig,
        flags: Fdflags,
    ) -> Result<Fd, Errno> {
        let kind = match self.root_fs.metadata(path) {
            Ok(md) if md.is_dir() => {
                if conf.create_new() {
                    return Err(Errno::Exist);
                }
                if conf.truncate() || conf.append() {
                    return Err(Errno::Isdir);
                }
                Kind::Dir {
                    path: path.to_path_buf(),
                    read_dir: None,
                }
            }
            _ => {
                let handle = self
                    .root_fs
                    .new_open_options()
                    .options(conf)
                    .open(path)
                    .map_err(fs_error_into_wasi_err)?;
                Kind::File { handle }
            }
        };
        let name = path.to_string_lossy().into_owned();
        Ok(self.create_fd(name, flags, kind))
    }

    pub fn create_fd(&mut self, name: String, flags: Fdflags, kind: Kind) -> Fd {
        let fd = self.next_fd;
        self.next_fd += 1;
        trace!("wasi::create_fd: fd={} name={}", fd, name);
        self.fd_map.insert(fd, FileEntry { name, flags, kind });
        fd
    }

    pub fn get_fd(&self, fd: Fd) -> Option<&FileEntry> {
        self.fd_map.get(&fd)
    }

    pub fn get_fd_mut(&mut self, fd: Fd) -> Option<&mut FileEntry> {
        self.fd_map.get_mut(&fd)
    }

    pub fn close_fd(&mut self, fd: Fd) -> Result<(), Errno> {
        self.fd_map.remove(&fd).map(|_| ()).ok_or(Errno::Badf)
    }

    pub fn is_preopen(&self, fd: Fd) -> bool {
        fd == PREOPEN_FD
    }

    /// A byte sink for the given descriptor, if it has one.
    pub fn writer_for(&mut self, fd: Fd) -> Option<&mut (dyn VirtualFile + Send + Sync + 'static)> {
        match &mut self.get_fd_mut(fd)?.kind {
            Kind::File { handle } => Some(handle.as_mut()),
            Kind::CharacterDevice { device } => Some(device.as_mut()),
            Kind::Dir { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_vfs::{host_fs, NullFile};

    fn test_fs(root: &Path) -> WasiFs {
        WasiFs::new(
            Box::new(host_fs::FileSystem::new(root).unwrap()),
            Box::new(NullFile),
            Box::new(NullFile),
            Box::new(NullFile),
        )
    }

    #[test]
    fn test_reserved_fds_present() {
        let dir = tempfile::tempdir().unwrap();
        let fs = test_fs(dir.path());

        for fd in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO, PREOPEN_FD] {
            assert!(fs.get_fd(fd).is_some(), "fd {fd} missing");
        }
        assert!(fs.get_fd(FIRST_USER_FD).is_none());
        assert!(fs.is_preopen(PREOPEN_FD));
        assert!(!fs.is_preopen(STDIN_FILENO));
    }

    #[test]
    fn test_fd_allocation_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        std::fs::write(dir.path().join("b"), b"").unwrap();
        let mut fs = test_fs(dir.path());

        let read = OpenOptionsConfig {
            read: true,
            ..Default::default()
        };
        let first = fs.open_file(Path::new("a"), read.clone(), Fdflags::empty()).unwrap();
        assert_eq!(first, FIRST_USER_FD);
        fs.close_fd(first).unwrap();

        // closed descriptors are not reused
        let second = fs.open_file(Path::new("b"), read, Fdflags::empty()).unwrap();
        assert_eq!(second, FIRST_USER_FD + 1);
        assert!(fs.get_fd(first).is_none());
    }

    #[test]
    fn test_close_unknown_fd() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = test_fs(dir.path());
        assert_eq!(fs.close_fd(42), Err(Errno::Badf));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = test_fs(dir.path());
        let read = OpenOptionsConfig {
            read: true,
            ..Default::default()
        };
        assert_eq!(
            fs.open_file(Path::new("missing"), read, Fdflags::empty()),
            Err(Errno::Noent)
        );
    }

    #[test]
    fn test_writer_for() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out"), b"").unwrap();
        let mut fs = test_fs(dir.path());

        let conf = OpenOptionsConfig {
            read: true,
            write: true,
            ..Default::default()
        };
        let fd = fs.open_file(Path::new("out"), conf, Fdflags::empty()).unwrap();
        fs.writer_for(fd).unwrap().write_all(b"hello").unwrap();
        fs.close_fd(fd).unwrap();
        assert_eq!(std::fs::read(dir.path().join("out")).unwrap(), b"hello");

        assert!(fs.writer_for(PREOPEN_FD).is_none());
        assert!(fs.writer_for(99).is_none());
    }
}
