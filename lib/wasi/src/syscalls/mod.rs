//! The WASI `snapshot_preview1` call surface.
//!
//! One function per host export, named exactly as the guest imports it from
//! `wasi_snapshot_preview1`. Each reads its arguments from the parameters
//! and from guest memory, performs the operation against the instance's
//! [`WasiFs`], writes results back in the ABI's little-endian layouts, and
//! returns an [`Errno`].
//!
//! Pointer arguments are validated before anything observable happens: a
//! bad pointer yields `EFAULT` and leaves guest memory untouched. The one
//! deliberate exception is `path_open`, which validates its result pointer
//! only after the descriptor is allocated (see its docs).

pub mod types {
    pub use capstan_wasi_types::*;
}

use self::types::*;
use crate::memory::{mem_error_to_wasi, GuestMemory};
use crate::state::{
    fs_error_into_wasi_err, virtual_file_type_to_wasi_file_type, Kind, ReadDirCursor, WasiFs,
    READDIR_BATCH,
};
use crate::WasiEnv;
use capstan_vfs::{Metadata, OpenOptionsConfig, VirtualFile};
use std::io::{self, Read, SeekFrom, Write};
use std::path::PathBuf;
use tracing::{debug, trace};

pub const FD_ADVISE_NAME: &str = "fd_advise";
pub const FD_ALLOCATE_NAME: &str = "fd_allocate";
pub const FD_CLOSE_NAME: &str = "fd_close";
pub const FD_DATASYNC_NAME: &str = "fd_datasync";
pub const FD_FDSTAT_GET_NAME: &str = "fd_fdstat_get";
pub const FD_FDSTAT_SET_FLAGS_NAME: &str = "fd_fdstat_set_flags";
pub const FD_FDSTAT_SET_RIGHTS_NAME: &str = "fd_fdstat_set_rights";
pub const FD_FILESTAT_GET_NAME: &str = "fd_filestat_get";
pub const FD_FILESTAT_SET_SIZE_NAME: &str = "fd_filestat_set_size";
pub const FD_FILESTAT_SET_TIMES_NAME: &str = "fd_filestat_set_times";
pub const FD_PREAD_NAME: &str = "fd_pread";
pub const FD_PRESTAT_GET_NAME: &str = "fd_prestat_get";
pub const FD_PRESTAT_DIR_NAME_NAME: &str = "fd_prestat_dir_name";
pub const FD_PWRITE_NAME: &str = "fd_pwrite";
pub const FD_READ_NAME: &str = "fd_read";
pub const FD_READDIR_NAME: &str = "fd_readdir";
pub const FD_RENUMBER_NAME: &str = "fd_renumber";
pub const FD_SEEK_NAME: &str = "fd_seek";
pub const FD_SYNC_NAME: &str = "fd_sync";
pub const FD_TELL_NAME: &str = "fd_tell";
pub const FD_WRITE_NAME: &str = "fd_write";
pub const PATH_CREATE_DIRECTORY_NAME: &str = "path_create_directory";
pub const PATH_FILESTAT_GET_NAME: &str = "path_filestat_get";
pub const PATH_FILESTAT_SET_TIMES_NAME: &str = "path_filestat_set_times";
pub const PATH_LINK_NAME: &str = "path_link";
pub const PATH_OPEN_NAME: &str = "path_open";
pub const PATH_READLINK_NAME: &str = "path_readlink";
pub const PATH_REMOVE_DIRECTORY_NAME: &str = "path_remove_directory";
pub const PATH_RENAME_NAME: &str = "path_rename";
pub const PATH_SYMLINK_NAME: &str = "path_symlink";
pub const PATH_UNLINK_FILE_NAME: &str = "path_unlink_file";

fn map_io_err(err: io::Error) -> Errno {
    fs_error_into_wasi_err(err.into())
}

/// Reads and validates a whole iovec array before any data moves: first
/// every 8-byte record, then every scatter/gather target region. A partial
/// failure therefore cannot leave a half-consumed transfer behind.
fn read_iovs(memory: &GuestMemory<'_>, iovs: u32, iovs_len: u32) -> Result<Vec<Iovec>, Errno> {
    memory
        .check_bounds(iovs, iovs_len.saturating_mul(IOVEC_SIZE))
        .map_err(mem_error_to_wasi)?;
    let mut out = Vec::with_capacity(iovs_len as usize);
    for i in 0..iovs_len {
        let base = iovs + i * IOVEC_SIZE;
        let buf = memory.read_u32_le(base).map_err(mem_error_to_wasi)?;
        let buf_len = memory.read_u32_le(base + 4).map_err(mem_error_to_wasi)?;
        memory.check_bounds(buf, buf_len).map_err(mem_error_to_wasi)?;
        out.push(Iovec { buf, buf_len });
    }
    Ok(out)
}

/// Reads from `reader` into each target region in order, stopping early at
/// end-of-file, and returns the total number of bytes landed in guest
/// memory.
fn read_bytes<T: Read>(
    mut reader: T,
    memory: &mut GuestMemory<'_>,
    iovs: &[Iovec],
) -> Result<u32, Errno> {
    let mut nread: u32 = 0;
    let mut buf = Vec::new();
    for iov in iovs {
        buf.clear();
        buf.resize(iov.buf_len as usize, 0);
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..]).map_err(map_io_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        memory.write(iov.buf, &buf[..filled]).map_err(mem_error_to_wasi)?;
        nread += filled as u32;
        if filled < iov.buf_len as usize {
            break;
        }
    }
    Ok(nread)
}

/// Gathers each source region out of guest memory into `writer` and returns
/// the total byte count. The sink decides what a write means; the discard
/// device still reports the full count.
fn write_bytes<T: Write>(
    mut writer: T,
    memory: &GuestMemory<'_>,
    iovs: &[Iovec],
) -> Result<u32, Errno> {
    let mut nwritten: u32 = 0;
    for iov in iovs {
        let bytes = memory.read(iov.buf, iov.buf_len).map_err(mem_error_to_wasi)?;
        writer.write_all(bytes).map_err(map_io_err)?;
        nwritten += iov.buf_len;
    }
    writer.flush().map_err(map_io_err)?;
    Ok(nwritten)
}

fn filestat_from_metadata(md: &Metadata) -> Filestat {
    let st_filetype = virtual_file_type_to_wasi_file_type(md.file_type());
    Filestat {
        st_dev: 0,
        st_ino: 0,
        st_filetype,
        st_nlink: 1,
        // directory sizes are filesystem-dependent noise; the ABI only
        // gives them meaning for regular files
        st_size: if md.is_dir() { 0 } else { md.len() },
        st_atim: md.accessed(),
        st_mtim: md.modified(),
        st_ctim: md.created(),
    }
}

fn filestat_for_device(device: &(dyn VirtualFile + Send + Sync)) -> Filestat {
    Filestat {
        st_dev: 0,
        st_ino: 0,
        // stdio is not backed by a real file
        st_filetype: Filetype::BlockDevice,
        st_nlink: 1,
        st_size: 0,
        st_atim: device.last_accessed(),
        st_mtim: device.last_modified(),
        st_ctim: device.created_time(),
    }
}

/// Looks up `fd` and returns the directory path it is seated on, for the
/// `path_*` family: `EBADF` for unknown descriptors, `ENOTDIR` for anything
/// that is not a directory.
fn get_dir_path(fs: &WasiFs, fd: Fd) -> Result<PathBuf, Errno> {
    let entry = fs.get_fd(fd).ok_or(Errno::Badf)?;
    match &entry.kind {
        Kind::Dir { path, .. } => Ok(path.clone()),
        _ => Err(Errno::Notdir),
    }
}

/// ### `fd_close()`
/// Close an open file descriptor
/// Inputs:
/// - `Fd fd`
///     A file descriptor mapping to an open file to close
/// Errors:
/// - `Errno::Badf`
///     If `fd` is invalid or not open
pub fn fd_close(env: &mut WasiEnv, fd: Fd) -> Errno {
    debug!("wasi::fd_close: fd={}", fd);
    wasi_try!(env.state.fs.close_fd(fd));
    Errno::Success
}

/// ### `fd_fdstat_get()`
/// Get metadata of a file descriptor
/// Input:
/// - `Fd fd`
///     The file descriptor whose metadata will be accessed
/// Output:
/// - `Fdstat *buf`
///     The location where the metadata will be written
pub fn fd_fdstat_get(env: &WasiEnv, memory: &mut GuestMemory<'_>, fd: Fd, buf: u32) -> Errno {
    debug!("wasi::fd_fdstat_get: fd={}", fd);
    wasi_try_mem!(memory.check_bounds(buf, FDSTAT_SIZE));
    let entry = wasi_try!(env.state.fs.get_fd(fd), Errno::Badf);
    let fs_filetype = match &entry.kind {
        Kind::File { .. } => Filetype::RegularFile,
        Kind::Dir { .. } => Filetype::Directory,
        // stdio is not backed by a real file
        Kind::CharacterDevice { .. } => Filetype::BlockDevice,
    };
    let stat = Fdstat {
        fs_filetype,
        fs_flags: entry.flags,
        fs_rights_base: Rights::empty(),
        fs_rights_inheriting: Rights::empty(),
    };
    wasi_try_mem!(memory.write(buf, &fdstat_to_le_bytes(&stat)));
    Errno::Success
}

/// ### `fd_filestat_get()`
/// Get the attributes of an open file
/// Input:
/// - `Fd fd`
///     The file descriptor to stat
/// Output:
/// - `Filestat *buf`
///     Where the 64-byte metadata record will be written
pub fn fd_filestat_get(env: &WasiEnv, memory: &mut GuestMemory<'_>, fd: Fd, buf: u32) -> Errno {
    debug!("wasi::fd_filestat_get: fd={}", fd);
    wasi_try_mem!(memory.check_bounds(buf, FILESTAT_SIZE));
    let entry = wasi_try!(env.state.fs.get_fd(fd), Errno::Badf);
    let stat = match &entry.kind {
        Kind::File { handle } => Filestat {
            st_dev: 0,
            st_ino: 0,
            st_filetype: Filetype::RegularFile,
            st_nlink: 1,
            st_size: handle.size(),
            st_atim: handle.last_accessed(),
            st_mtim: handle.last_modified(),
            st_ctim: handle.created_time(),
        },
        Kind::Dir { path, .. } => {
            let md = wasi_try!(env
                .state
                .fs
                .root_fs
                .metadata(path)
                .map_err(fs_error_into_wasi_err));
            filestat_from_metadata(&md)
        }
        Kind::CharacterDevice { device } => filestat_for_device(device.as_ref()),
    };
    wasi_try_mem!(memory.write(buf, &filestat_to_le_bytes(&stat)));
    Errno::Success
}

/// ### `fd_read()`
/// Read data from file descriptor
/// Inputs:
/// - `Fd fd`
///     File descriptor from which data will be read
/// - `const Iovec *iovs`
///     Vectors where data will be stored
/// - `u32 iovs_len`
///     Length of the list of vectors
/// Output:
/// - `u32 *nread`
///     Number of bytes read
pub fn fd_read(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    iovs: u32,
    iovs_len: u32,
    nread: u32,
) -> Errno {
    debug!("wasi::fd_read: fd={}", fd);
    wasi_try_mem!(memory.check_bounds(nread, 4));
    let iovs_arr = wasi_try!(read_iovs(memory, iovs, iovs_len));
    let entry = wasi_try!(env.state.fs.get_fd_mut(fd), Errno::Badf);
    let bytes_read = match &mut entry.kind {
        Kind::File { handle } => wasi_try!(read_bytes(handle, memory, &iovs_arr)),
        Kind::CharacterDevice { device } => wasi_try!(read_bytes(device, memory, &iovs_arr)),
        Kind::Dir { .. } => return Errno::Isdir,
    };
    trace!("wasi::fd_read: nread={}", bytes_read);
    wasi_try_mem!(memory.write_u32_le(nread, bytes_read));
    Errno::Success
}

/// ### `fd_pread()`
/// Read from the offset given, without using and updating the file
/// descriptor's own offset
/// Inputs:
/// - `Fd fd`
///     File descriptor from which data will be read
/// - `const Iovec *iovs`
///     Vectors where data will be stored
/// - `u32 iovs_len`
///     Length of the list of vectors
/// - `Filesize offset`
///     Absolute file position to read from
/// Output:
/// - `u32 *nread`
///     Number of bytes read
/// Errors:
/// - `Errno::Fault`
///     If `offset` lies past end-of-file
pub fn fd_pread(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    iovs: u32,
    iovs_len: u32,
    offset: Filesize,
    nread: u32,
) -> Errno {
    debug!("wasi::fd_pread: fd={} offset={}", fd, offset);
    wasi_try_mem!(memory.check_bounds(nread, 4));
    let iovs_arr = wasi_try!(read_iovs(memory, iovs, iovs_len));
    let entry = wasi_try!(env.state.fs.get_fd_mut(fd), Errno::Badf);
    let bytes_read = match &mut entry.kind {
        Kind::File { handle } => {
            // a position past end-of-file is not addressable
            if offset > handle.size() {
                return Errno::Fault;
            }
            let old = wasi_try!(handle.seek(SeekFrom::Current(0)).map_err(map_io_err));
            wasi_try!(handle.seek(SeekFrom::Start(offset)).map_err(map_io_err));
            let result = read_bytes(&mut *handle, memory, &iovs_arr);
            wasi_try!(handle.seek(SeekFrom::Start(old)).map_err(map_io_err));
            wasi_try!(result)
        }
        Kind::Dir { .. } => return Errno::Isdir,
        Kind::CharacterDevice { .. } => return Errno::Badf,
    };
    trace!("wasi::fd_pread: nread={}", bytes_read);
    wasi_try_mem!(memory.write_u32_le(nread, bytes_read));
    Errno::Success
}

/// ### `fd_write()`
/// Write data to the file descriptor
/// Inputs:
/// - `Fd fd`
///     File descriptor (opened with writing permission) to write to
/// - `const Ciovec *iovs`
///     List of vectors to read data from
/// - `u32 iovs_len`
///     Length of the list of vectors
/// Output:
/// - `u32 *nwritten`
///     Number of bytes written
pub fn fd_write(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    iovs: u32,
    iovs_len: u32,
    nwritten: u32,
) -> Errno {
    debug!("wasi::fd_write: fd={}", fd);
    wasi_try_mem!(memory.check_bounds(nwritten, 4));
    let iovs_arr = wasi_try!(read_iovs(memory, iovs, iovs_len));
    let entry = wasi_try!(env.state.fs.get_fd_mut(fd), Errno::Badf);
    let bytes_written = match &mut entry.kind {
        Kind::File { handle } => wasi_try!(write_bytes(handle, memory, &iovs_arr)),
        Kind::CharacterDevice { device } => wasi_try!(write_bytes(device, memory, &iovs_arr)),
        Kind::Dir { .. } => return Errno::Isdir,
    };
    trace!("wasi::fd_write: nwritten={}", bytes_written);
    wasi_try_mem!(memory.write_u32_le(nwritten, bytes_written));
    Errno::Success
}

/// ### `fd_seek()`
/// Update file descriptor offset
/// Inputs:
/// - `Fd fd`
///     File descriptor to mutate
/// - `Filedelta offset`
///     Number of bytes to adjust offset by
/// - `Whence whence`
///     What the offset is relative to
/// Output:
/// - `Filesize *newoffset`
///     The new offset relative to the start of the file
pub fn fd_seek(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    offset: Filedelta,
    whence: u8,
    newoffset: u32,
) -> Errno {
    debug!("wasi::fd_seek: fd={} offset={} whence={}", fd, offset, whence);
    wasi_try_mem!(memory.check_bounds(newoffset, 8));
    let whence = wasi_try!(Whence::try_from(whence));
    let entry = wasi_try!(env.state.fs.get_fd_mut(fd), Errno::Badf);
    let handle = match &mut entry.kind {
        Kind::File { handle } => handle,
        Kind::Dir { .. } | Kind::CharacterDevice { .. } => return Errno::Badf,
    };
    let pos = match whence {
        Whence::Set => {
            if offset < 0 {
                return Errno::Inval;
            }
            SeekFrom::Start(offset as u64)
        }
        Whence::Cur => SeekFrom::Current(offset),
        Whence::End => SeekFrom::End(offset),
    };
    let new_offset = wasi_try!(handle.seek(pos).map_err(map_io_err));
    wasi_try_mem!(memory.write_u64_le(newoffset, new_offset));
    Errno::Success
}

/// ### `fd_readdir()`
/// Read data from directory specified by file descriptor
/// Inputs:
/// - `Fd fd`
///     File descriptor from which directory data will be read
/// - `void *buf`
///     Buffer where directory entries are stored
/// - `u32 buf_len`
///     Length of data in `buf`
/// - `Dircookie cookie`
///     Where the directory reading should start from
/// Output:
/// - `u32 *bufused`
///     The Number of bytes stored in `buf`. If less than `buf_len` then the
///     entire directory has been read.
///
/// Entries are written as a 24-byte header followed by the name bytes. When
/// the buffer cannot hold the next header, or holds only part of a name,
/// `bufused` reports the full `buf_len` so the guest re-requests the entry
/// with the same cookie and a bigger buffer.
pub fn fd_readdir(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    buf: u32,
    buf_len: u32,
    cookie: i64,
    bufused: u32,
) -> Errno {
    debug!(
        "wasi::fd_readdir: fd={} buf_len={} cookie={}",
        fd, buf_len, cookie
    );
    wasi_try_mem!(memory.check_bounds(bufused, 4));
    wasi_try_mem!(memory.check_bounds(buf, buf_len));
    let WasiFs {
        root_fs, fd_map, ..
    } = &mut env.state.fs;
    let entry = wasi_try!(fd_map.get_mut(&fd), Errno::Badf);
    let (dir_path, read_dir) = match &mut entry.kind {
        Kind::Dir { path, read_dir } => (path, read_dir),
        _ => return Errno::Badf,
    };
    if buf_len < DIRENT_SIZE {
        return Errno::Inval;
    }
    if cookie < 0 {
        return Errno::Inval;
    }
    let cookie = cookie as Dircookie;

    if read_dir.is_none() {
        if cookie != DIRCOOKIE_START {
            return Errno::Inval;
        }
        let reader = wasi_try!(root_fs.read_dir(dir_path).map_err(fs_error_into_wasi_err));
        *read_dir = Some(ReadDirCursor::new(reader));
    }
    let cursor = wasi_try!(read_dir.as_mut(), Errno::Inval);
    if cookie > cursor.count_read {
        return Errno::Inval;
    }
    // entries before the retained tail are gone; a cookie pointing at them
    // cannot be honoured
    let first_cached = cursor.count_read - cursor.entries.len() as u64;
    if cookie < first_cached {
        return Errno::Inval;
    }
    cursor.entries.drain(..(cookie - first_cached) as usize);

    let mut used: u32 = 0;
    let mut next_cookie = cookie + 1;
    let mut served = 0usize;
    let mut truncated = false;
    loop {
        if served == cursor.entries.len() && cursor.pull(READDIR_BATCH) == 0 {
            break;
        }
        if buf_len - used < DIRENT_SIZE {
            truncated = true;
            break;
        }
        let dir_entry = &cursor.entries[served];
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let d_type = match dir_entry.file_type() {
            Ok(ft) => virtual_file_type_to_wasi_file_type(ft),
            Err(_) => Filetype::Unknown,
        };
        let dirent = Dirent {
            d_next: next_cookie,
            d_ino: 0,
            d_namlen: name.len() as u32,
            d_type,
        };
        wasi_try_mem!(memory.write(buf + used, &dirent_to_le_bytes(&dirent)));
        used += DIRENT_SIZE;
        let space = (buf_len - used) as usize;
        let n = name.len().min(space);
        wasi_try_mem!(memory.write(buf + used, &name.as_bytes()[..n]));
        used += n as u32;
        if n < name.len() {
            truncated = true;
            break;
        }
        next_cookie += 1;
        served += 1;
    }

    // a buffer exhausted mid-entry reports the whole buffer as used; only a
    // fully-read directory reports the exact byte count
    let bytes_used = if truncated { buf_len } else { used };
    trace!("wasi::fd_readdir: bufused={}", bytes_used);
    wasi_try_mem!(memory.write_u32_le(bufused, bytes_used));
    Errno::Success
}

/// ### `fd_prestat_get()`
/// Get metadata about a preopened file descriptor
/// Input:
/// - `Fd fd`
///     The preopened file descriptor to query
/// Output:
/// - `Prestat *buf`
///     Where the metadata will be written
/// Errors:
/// - `Errno::Inval`
///     If `fd` is open but was not pre-opened
pub fn fd_prestat_get(env: &WasiEnv, memory: &mut GuestMemory<'_>, fd: Fd, buf: u32) -> Errno {
    debug!("wasi::fd_prestat_get: fd={}", fd);
    wasi_try_mem!(memory.check_bounds(buf, PRESTAT_SIZE));
    let state_fs = &env.state.fs;
    if state_fs.get_fd(fd).is_none() {
        return Errno::Badf;
    }
    if !state_fs.is_preopen(fd) {
        return Errno::Inval;
    }
    let prestat = Prestat {
        pr_name_len: state_fs.preopen_name.len() as u32,
    };
    wasi_try_mem!(memory.write(buf, &prestat_to_le_bytes(&prestat)));
    Errno::Success
}

/// ### `fd_prestat_dir_name()`
/// Get the name of a preopened directory
/// Input:
/// - `Fd fd`
///     The preopened file descriptor to query
/// Output:
/// - `char *path`
///     Where the name will be written, without a terminator. A `path_len`
///     shorter than the name truncates; one longer than the name is
///     `Errno::Nametoolong`.
pub fn fd_prestat_dir_name(
    env: &WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    path: u32,
    path_len: u32,
) -> Errno {
    debug!("wasi::fd_prestat_dir_name: fd={} path_len={}", fd, path_len);
    wasi_try_mem!(memory.check_bounds(path, path_len));
    let state_fs = &env.state.fs;
    if state_fs.get_fd(fd).is_none() {
        return Errno::Badf;
    }
    if !state_fs.is_preopen(fd) {
        return Errno::Inval;
    }
    let name = state_fs.preopen_name.as_bytes();
    if path_len as usize > name.len() {
        return Errno::Nametoolong;
    }
    wasi_try_mem!(memory.write(path, &name[..path_len as usize]));
    Errno::Success
}

/// ### `path_open()`
/// Open file located at the given path
/// Inputs:
/// - `Fd dirfd`
///     The fd corresponding to the directory that the file is in
/// - `Lookupflags dirflags`
///     Flags specifying how the path will be resolved
/// - `char *path`
///     The path of the file or directory to open
/// - `u32 path_len`
///     The length of the `path` string
/// - `Oflags o_flags`
///     How the file will be opened
/// - `Rights fs_rights_base`
///     The rights of the created file descriptor (accepted, not enforced)
/// - `Rights fs_rights_inheriting`
///     The rights of file descriptors derived from the created file
///     descriptor (accepted, not enforced)
/// - `Fdflags fs_flags`
///     The flags of the file descriptor
/// Output:
/// - `Fd *fd`
///     The new file descriptor
///
/// If writing the result descriptor faults, the descriptor stays allocated
/// and the call returns `Errno::Fault`; the guest can still recover it by
/// enumeration.
pub fn path_open(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    dirfd: Fd,
    dirflags: u32,
    path: u32,
    path_len: u32,
    o_flags: u16,
    fs_rights_base: u64,
    fs_rights_inheriting: u64,
    fs_flags: u16,
    fd: u32,
) -> Errno {
    let o_flags = Oflags::from_bits_truncate(o_flags);
    let fs_flags = Fdflags::from_bits_truncate(fs_flags);
    // only symlink_follow is defined, and symbolic links are not supported
    let _dirflags = Lookupflags::from_bits_truncate(dirflags);
    // rights are accepted but not enforced
    let _ = (fs_rights_base, fs_rights_inheriting);
    debug!(
        "wasi::path_open: dirfd={} oflags={:?} fdflags={:?}",
        dirfd, o_flags, fs_flags
    );

    let base = wasi_try!(get_dir_path(&env.state.fs, dirfd));
    let path_string = get_input_str!(memory, path, path_len);
    trace!("=> path_open: dirfd={}, path={}", dirfd, path_string);

    if o_flags.contains(Oflags::DIRECTORY) && o_flags.contains(Oflags::CREAT) {
        return Errno::Inval;
    }

    let full_path = base.join(&path_string);
    if o_flags.contains(Oflags::DIRECTORY) {
        match env.state.fs.root_fs.metadata(&full_path) {
            Ok(md) if !md.is_dir() => return Errno::Notdir,
            // a missing path falls through to the open below for ENOENT
            _ => {}
        }
    }

    let conf = OpenOptionsConfig {
        read: true,
        write: o_flags.contains(Oflags::CREAT) || o_flags.contains(Oflags::TRUNC),
        create_new: o_flags.contains(Oflags::CREAT) && o_flags.contains(Oflags::EXCL),
        create: o_flags.contains(Oflags::CREAT),
        append: fs_flags.contains(Fdflags::APPEND),
        truncate: o_flags.contains(Oflags::TRUNC),
    };
    let new_fd = wasi_try!(env.state.fs.open_file(&full_path, conf, fs_flags));
    trace!("wasi::path_open: returning fd={}", new_fd);
    wasi_try_mem!(memory.write_u32_le(fd, new_fd));
    Errno::Success
}

/// ### `path_create_directory()`
/// Create directory at a path
/// Inputs:
/// - `Fd fd`
///     The directory that the path is relative to
/// - `const char *path`
///     String containing path data
/// - `u32 path_len`
///     The length of `path`
pub fn path_create_directory(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    path: u32,
    path_len: u32,
) -> Errno {
    debug!("wasi::path_create_directory: fd={}", fd);
    let base = wasi_try!(get_dir_path(&env.state.fs, fd));
    let path_string = get_input_str!(memory, path, path_len);
    trace!("=> path: {}", path_string);
    wasi_try!(env
        .state
        .fs
        .root_fs
        .create_dir(&base.join(path_string))
        .map_err(fs_error_into_wasi_err));
    Errno::Success
}

/// ### `path_remove_directory()`
/// Remove a directory, which must be empty
/// Inputs:
/// - `Fd fd`
///     The directory that the path is relative to
/// - `const char *path`
///     String containing path data
/// - `u32 path_len`
///     The length of `path`
pub fn path_remove_directory(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    path: u32,
    path_len: u32,
) -> Errno {
    debug!("wasi::path_remove_directory: fd={}", fd);
    let base = wasi_try!(get_dir_path(&env.state.fs, fd));
    let path_string = get_input_str!(memory, path, path_len);
    trace!("=> path: {}", path_string);
    wasi_try!(env
        .state
        .fs
        .root_fs
        .remove_dir(&base.join(path_string))
        .map_err(fs_error_into_wasi_err));
    Errno::Success
}

/// ### `path_unlink_file()`
/// Unlink a file, deleting if the number of hardlinks is 1
/// Inputs:
/// - `Fd fd`
///     The directory that the path is relative to
/// - `const char *path`
///     String containing path data
/// - `u32 path_len`
///     The length of `path`
pub fn path_unlink_file(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    path: u32,
    path_len: u32,
) -> Errno {
    debug!("wasi::path_unlink_file: fd={}", fd);
    let base = wasi_try!(get_dir_path(&env.state.fs, fd));
    let path_string = get_input_str!(memory, path, path_len);
    trace!("=> path: {}", path_string);
    wasi_try!(env
        .state
        .fs
        .root_fs
        .remove_file(&base.join(path_string))
        .map_err(fs_error_into_wasi_err));
    Errno::Success
}

/// ### `path_rename()`
/// Rename a file or directory
/// Inputs:
/// - `Fd old_fd`
///     The base directory for `old_path`
/// - `const char* old_path`
///     Pointer to UTF8 bytes, the file to be renamed
/// - `u32 old_path_len`
///     The number of bytes to read from `old_path`
/// - `Fd new_fd`
///     The base directory for `new_path`
/// - `const char* new_path`
///     Pointer to UTF8 bytes, the new file name
/// - `u32 new_path_len`
///     The number of bytes to read from `new_path`
pub fn path_rename(
    env: &mut WasiEnv,
    memory: &mut GuestMemory<'_>,
    old_fd: Fd,
    old_path: u32,
    old_path_len: u32,
    new_fd: Fd,
    new_path: u32,
    new_path_len: u32,
) -> Errno {
    debug!("wasi::path_rename: old_fd={} new_fd={}", old_fd, new_fd);
    let old_base = wasi_try!(get_dir_path(&env.state.fs, old_fd));
    let new_base = wasi_try!(get_dir_path(&env.state.fs, new_fd));
    let old_path_str = get_input_str!(memory, old_path, old_path_len);
    let new_path_str = get_input_str!(memory, new_path, new_path_len);
    trace!("=> rename: {} -> {}", old_path_str, new_path_str);
    wasi_try!(env
        .state
        .fs
        .root_fs
        .rename(&old_base.join(old_path_str), &new_base.join(new_path_str))
        .map_err(fs_error_into_wasi_err));
    Errno::Success
}

/// ### `path_filestat_get()`
/// Access metadata about a file or directory
/// Inputs:
/// - `Fd fd`
///     The directory that `path` is relative to
/// - `Lookupflags flags`
///     Flags to control how `path` is understood
/// - `const char *path`
///     String containing the file path
/// - `u32 path_len`
///     The length of `path`
/// Output:
/// - `Filestat *buf`
///     The location where the metadata will be stored
pub fn path_filestat_get(
    env: &WasiEnv,
    memory: &mut GuestMemory<'_>,
    fd: Fd,
    flags: u32,
    path: u32,
    path_len: u32,
    buf: u32,
) -> Errno {
    // only symlink_follow is defined, and symbolic links are not supported
    let _flags = Lookupflags::from_bits_truncate(flags);
    debug!("wasi::path_filestat_get: fd={}", fd);
    let base = wasi_try!(get_dir_path(&env.state.fs, fd));
    let path_string = get_input_str!(memory, path, path_len);
    trace!("=> path: {}", path_string);
    wasi_try_mem!(memory.check_bounds(buf, FILESTAT_SIZE));
    let md = wasi_try!(env
        .state
        .fs
        .root_fs
        .metadata(&base.join(path_string))
        .map_err(fs_error_into_wasi_err));
    wasi_try_mem!(memory.write(buf, &filestat_to_le_bytes(&filestat_from_metadata(&md))));
    Errno::Success
}

// The calls below are intentionally not implemented; each still traces its
// arguments and returns `Errno::Nosys` with no side effect.

/// ### `fd_advise()`
pub fn fd_advise(
    _env: &mut WasiEnv,
    fd: Fd,
    offset: Filesize,
    len: Filesize,
    advice: u8,
) -> Errno {
    debug!(
        "wasi::fd_advise: fd={} offset={} len={} advice={} - stub",
        fd, offset, len, advice
    );
    Errno::Nosys
}

/// ### `fd_allocate()`
pub fn fd_allocate(_env: &mut WasiEnv, fd: Fd, offset: Filesize, len: Filesize) -> Errno {
    debug!("wasi::fd_allocate: fd={} offset={} len={} - stub", fd, offset, len);
    Errno::Nosys
}

/// ### `fd_datasync()`
pub fn fd_datasync(_env: &mut WasiEnv, fd: Fd) -> Errno {
    debug!("wasi::fd_datasync: fd={} - stub", fd);
    Errno::Nosys
}

/// ### `fd_fdstat_set_flags()`
pub fn fd_fdstat_set_flags(_env: &mut WasiEnv, fd: Fd, flags: u16) -> Errno {
    debug!("wasi::fd_fdstat_set_flags: fd={} flags={} - stub", fd, flags);
    Errno::Nosys
}

/// ### `fd_fdstat_set_rights()`
pub fn fd_fdstat_set_rights(
    _env: &mut WasiEnv,
    fd: Fd,
    fs_rights_base: u64,
    fs_rights_inheriting: u64,
) -> Errno {
    debug!(
        "wasi::fd_fdstat_set_rights: fd={} base={} inheriting={} - stub",
        fd, fs_rights_base, fs_rights_inheriting
    );
    Errno::Nosys
}

/// ### `fd_filestat_set_size()`
pub fn fd_filestat_set_size(_env: &mut WasiEnv, fd: Fd, st_size: Filesize) -> Errno {
    debug!("wasi::fd_filestat_set_size: fd={} size={} - stub", fd, st_size);
    Errno::Nosys
}

/// ### `fd_filestat_set_times()`
pub fn fd_filestat_set_times(
    _env: &mut WasiEnv,
    fd: Fd,
    st_atim: Timestamp,
    st_mtim: Timestamp,
    fst_flags: u16,
) -> Errno {
    debug!(
        "wasi::fd_filestat_set_times: fd={} atim={} mtim={} fst_flags={} - stub",
        fd, st_atim, st_mtim, fst_flags
    );
    Errno::Nosys
}

/// ### `fd_pwrite()`
pub fn fd_pwrite(
    _env: &mut WasiEnv,
    fd: Fd,
    ciovs: u32,
    ciovs_len: u32,
    offset: Filesize,
    nwritten: u32,
) -> Errno {
    debug!(
        "wasi::fd_pwrite: fd={} ciovs={} ciovs_len={} offset={} nwritten={} - stub",
        fd, ciovs, ciovs_len, offset, nwritten
    );
    Errno::Nosys
}

/// ### `fd_renumber()`
pub fn fd_renumber(_env: &mut WasiEnv, from: Fd, to: Fd) -> Errno {
    debug!("wasi::fd_renumber: from={} to={} - stub", from, to);
    Errno::Nosys
}

/// ### `fd_sync()`
pub fn fd_sync(_env: &mut WasiEnv, fd: Fd) -> Errno {
    debug!("wasi::fd_sync: fd={} - stub", fd);
    Errno::Nosys
}

/// ### `fd_tell()`
pub fn fd_tell(_env: &mut WasiEnv, fd: Fd, offset: u32) -> Errno {
    debug!("wasi::fd_tell: fd={} result.offset={} - stub", fd, offset);
    Errno::Nosys
}

/// ### `path_filestat_set_times()`
pub fn path_filestat_set_times(
    _env: &mut WasiEnv,
    fd: Fd,
    flags: u32,
    path: u32,
    path_len: u32,
    st_atim: Timestamp,
    st_mtim: Timestamp,
    fst_flags: u16,
) -> Errno {
    debug!(
        "wasi::path_filestat_set_times: fd={} flags={} path={} path_len={} atim={} mtim={} fst_flags={} - stub",
        fd, flags, path, path_len, st_atim, st_mtim, fst_flags
    );
    Errno::Nosys
}

/// ### `path_link()`
pub fn path_link(
    _env: &mut WasiEnv,
    old_fd: Fd,
    old_flags: u32,
    old_path: u32,
    old_path_len: u32,
    new_fd: Fd,
    new_path: u32,
    new_path_len: u32,
) -> Errno {
    debug!(
        "wasi::path_link: old_fd={} old_flags={} old_path={} old_path_len={} new_fd={} new_path={} new_path_len={} - stub",
        old_fd, old_flags, old_path, old_path_len, new_fd, new_path, new_path_len
    );
    Errno::Nosys
}

/// ### `path_readlink()`
pub fn path_readlink(
    _env: &mut WasiEnv,
    fd: Fd,
    path: u32,
    path_len: u32,
    buf: u32,
    buf_len: u32,
    buf_used: u32,
) -> Errno {
    debug!(
        "wasi::path_readlink: fd={} path={} path_len={} buf={} buf_len={} result.bufused={} - stub",
        fd, path, path_len, buf, buf_len, buf_used
    );
    Errno::Nosys
}

/// ### `path_symlink()`
pub fn path_symlink(
    _env: &mut WasiEnv,
    old_path: u32,
    old_path_len: u32,
    fd: Fd,
    new_path: u32,
    new_path_len: u32,
) -> Errno {
    debug!(
        "wasi::path_symlink: old_path={} old_path_len={} fd={} new_path={} new_path_len={} - stub",
        old_path, old_path_len, fd, new_path, new_path_len
    );
    Errno::Nosys
}
