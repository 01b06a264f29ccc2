use crate::Errno;
use bitflags::bitflags;
use std::mem;

/// The type of a file descriptor or file, as reported on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filetype {
    /// The type of the file descriptor or file is unknown or is different
    /// from any of the other types specified.
    Unknown = 0,
    /// The file descriptor or file refers to a block device inode.
    BlockDevice = 1,
    /// The file descriptor or file refers to a character device inode.
    CharacterDevice = 2,
    /// The file descriptor or file refers to a directory inode.
    Directory = 3,
    /// The file descriptor or file refers to a regular file inode.
    RegularFile = 4,
    /// The file descriptor or file refers to a datagram socket.
    SocketDgram = 5,
    /// The file descriptor or file refers to a byte-stream socket.
    SocketStream = 6,
    /// The file refers to a symbolic link inode.
    SymbolicLink = 7,
}

/// The position relative to which to set the offset of the file descriptor.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Seek relative to start-of-file.
    Set = 0,
    /// Seek relative to current position.
    Cur = 1,
    /// Seek relative to end-of-file.
    End = 2,
}

impl TryFrom<u8> for Whence {
    type Error = Errno;

    fn try_from(raw: u8) -> Result<Self, Errno> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(Errno::Inval),
        }
    }
}

pub type Filesize = u64;
pub type Filedelta = i64;
/// A timestamp in nanoseconds since the Unix epoch.
pub type Timestamp = u64;

bitflags! {
    /// Open flags used by `path_open`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Oflags: u16 {
        /// Create file if it does not exist.
        const CREAT = 1 << 0;
        /// Fail if not a directory.
        const DIRECTORY = 1 << 1;
        /// Fail if file already exists.
        const EXCL = 1 << 2;
        /// Truncate file to size 0.
        const TRUNC = 1 << 3;
    }
}

bitflags! {
    /// File descriptor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Fdflags: u16 {
        /// Append mode: Data written to the file is always appended to the
        /// file's end.
        const APPEND = 1 << 0;
        /// Write according to synchronized I/O data integrity completion.
        const DSYNC = 1 << 1;
        /// Non-blocking mode.
        const NONBLOCK = 1 << 2;
        /// Synchronized read I/O operations.
        const RSYNC = 1 << 3;
        /// Write according to synchronized I/O file integrity completion.
        const SYNC = 1 << 4;
    }
}

bitflags! {
    /// Flags determining the method of how paths are resolved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Lookupflags: u32 {
        /// As long as the resolved path corresponds to a symbolic link, it is
        /// expanded.
        const SYMLINK_FOLLOW = 1 << 0;
    }
}

bitflags! {
    /// File descriptor rights, determining which actions may be performed.
    /// Accepted at the call boundary but not enforced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Rights: u64 {
        const FD_DATASYNC = 1 << 0;
        const FD_READ = 1 << 1;
        const FD_SEEK = 1 << 2;
        const FD_FDSTAT_SET_FLAGS = 1 << 3;
        const FD_SYNC = 1 << 4;
        const FD_TELL = 1 << 5;
        const FD_WRITE = 1 << 6;
        const FD_ADVISE = 1 << 7;
        const FD_ALLOCATE = 1 << 8;
        const PATH_CREATE_DIRECTORY = 1 << 9;
        const PATH_CREATE_FILE = 1 << 10;
        const PATH_LINK_SOURCE = 1 << 11;
        const PATH_LINK_TARGET = 1 << 12;
        const PATH_OPEN = 1 << 13;
        const FD_READDIR = 1 << 14;
        const PATH_READLINK = 1 << 15;
        const PATH_RENAME_SOURCE = 1 << 16;
        const PATH_RENAME_TARGET = 1 << 17;
        const PATH_FILESTAT_GET = 1 << 18;
        const PATH_FILESTAT_SET_SIZE = 1 << 19;
        const PATH_FILESTAT_SET_TIMES = 1 << 20;
        const FD_FILESTAT_GET = 1 << 21;
        const FD_FILESTAT_SET_SIZE = 1 << 22;
        const FD_FILESTAT_SET_TIMES = 1 << 23;
        const PATH_SYMLINK = 1 << 24;
        const PATH_REMOVE_DIRECTORY = 1 << 25;
        const PATH_UNLINK_FILE = 1 << 26;
        const POLL_FD_READWRITE = 1 << 27;
        const SOCK_SHUTDOWN = 1 << 28;
    }
}

/// File descriptor attributes, 24 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fdstat {
    pub fs_filetype: Filetype,
    pub fs_flags: Fdflags,
    pub fs_rights_base: Rights,
    pub fs_rights_inheriting: Rights,
}

pub const FDSTAT_SIZE: u32 = 24;

pub fn fdstat_to_le_bytes(stat: &Fdstat) -> Vec<u8> {
    let out: Vec<u8> = std::iter::empty()
        .chain([stat.fs_filetype as u8, 0])
        .chain(stat.fs_flags.bits().to_le_bytes())
        .chain([0; 4])
        .chain(stat.fs_rights_base.bits().to_le_bytes())
        .chain(stat.fs_rights_inheriting.bits().to_le_bytes())
        .collect();

    assert_eq!(out.len(), FDSTAT_SIZE as usize);
    out
}

/// File attributes, 64 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filestat {
    pub st_dev: u64,
    pub st_ino: u64,
    pub st_filetype: Filetype,
    pub st_nlink: u64,
    pub st_size: Filesize,
    pub st_atim: Timestamp,
    pub st_mtim: Timestamp,
    pub st_ctim: Timestamp,
}

pub const FILESTAT_SIZE: u32 = 64;

pub fn filestat_to_le_bytes(stat: &Filestat) -> Vec<u8> {
    let out: Vec<u8> = std::iter::empty()
        .chain(stat.st_dev.to_le_bytes())
        .chain(stat.st_ino.to_le_bytes())
        .chain([stat.st_filetype as u8, 0, 0, 0, 0, 0, 0, 0])
        .chain(stat.st_nlink.to_le_bytes())
        .chain(stat.st_size.to_le_bytes())
        .chain(stat.st_atim.to_le_bytes())
        .chain(stat.st_mtim.to_le_bytes())
        .chain(stat.st_ctim.to_le_bytes())
        .collect();

    assert_eq!(out.len(), FILESTAT_SIZE as usize);
    out
}

/// Description of a pre-opened directory, 8 bytes on the wire: a tag byte of
/// zero (`preopentype::dir`, the only defined tag), three bytes of padding,
/// and the length of the directory's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prestat {
    pub pr_name_len: u32,
}

pub const PRESTAT_SIZE: u32 = 8;

pub fn prestat_to_le_bytes(prestat: &Prestat) -> Vec<u8> {
    let out: Vec<u8> = std::iter::empty()
        .chain([0u8, 0, 0, 0])
        .chain(prestat.pr_name_len.to_le_bytes())
        .collect();

    assert_eq!(out.len(), PRESTAT_SIZE as usize);
    out
}

/// One scatter/gather region of guest memory: a buffer offset and length.
/// 8 bytes on the wire, for both `iovec` and `ciovec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iovec {
    pub buf: u32,
    pub buf_len: u32,
}

pub const IOVEC_SIZE: u32 = mem::size_of::<Iovec>() as u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdstat_to_le_bytes() {
        let stat = Fdstat {
            fs_filetype: Filetype::BlockDevice,
            fs_flags: Fdflags::APPEND,
            fs_rights_base: Rights::empty(),
            fs_rights_inheriting: Rights::empty(),
        };

        assert_eq!(
            vec![
                // fs_filetype and padding
                1, 0, //
                // fs_flags and padding
                1, 0, 0, 0, 0, 0, //
                // fs_rights_base
                0, 0, 0, 0, 0, 0, 0, 0, //
                // fs_rights_inheriting
                0, 0, 0, 0, 0, 0, 0, 0,
            ],
            fdstat_to_le_bytes(&stat)
        );
    }

    #[test]
    fn test_filestat_to_le_bytes() {
        let stat = Filestat {
            st_dev: 0,
            st_ino: 0,
            st_filetype: Filetype::RegularFile,
            st_nlink: 1,
            st_size: 30,
            st_atim: 0x1724166b80138200,
            st_mtim: 0x1724166b80138200,
            st_ctim: 0x1724166b80138200,
        };

        assert_eq!(
            vec![
                0, 0, 0, 0, 0, 0, 0, 0, // dev
                0, 0, 0, 0, 0, 0, 0, 0, // ino
                4, 0, 0, 0, 0, 0, 0, 0, // filetype + padding
                1, 0, 0, 0, 0, 0, 0, 0, // nlink
                30, 0, 0, 0, 0, 0, 0, 0, // size
                0x0, 0x82, 0x13, 0x80, 0x6b, 0x16, 0x24, 0x17, // atim
                0x0, 0x82, 0x13, 0x80, 0x6b, 0x16, 0x24, 0x17, // mtim
                0x0, 0x82, 0x13, 0x80, 0x6b, 0x16, 0x24, 0x17, // ctim
            ],
            filestat_to_le_bytes(&stat)
        );
    }

    #[test]
    fn test_prestat_to_le_bytes() {
        assert_eq!(
            vec![
                0, // tag: prestat_dir
                0, 0, 0, // padding
                1, 0, 0, 0, // pr_name_len
            ],
            prestat_to_le_bytes(&Prestat { pr_name_len: 1 })
        );
    }
}
