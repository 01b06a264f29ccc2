//! Conversions between the filesystem layer's types and the WASI ABI.

use capstan_vfs::{FileType, FsError};
use capstan_wasi_types::{Errno, Filetype};

pub fn fs_error_from_wasi_err(err: Errno) -> FsError {
    match err {
        Errno::Badf => FsError::InvalidFd,
        Errno::Exist => FsError::AlreadyExists,
        Errno::Io => FsError::IOError,
        Errno::Pipe => FsError::BrokenPipe,
        Errno::Intr => FsError::Interrupted,
        Errno::Inval => FsError::InvalidInput,
        Errno::Noent => FsError::EntryNotFound,
        Errno::Notdir => FsError::NotADirectory,
        Errno::Isdir => FsError::IsADirectory,
        Errno::Notempty => FsError::DirectoryNotEmpty,
        Errno::Perm => FsError::PermissionDenied,
        Errno::Timedout => FsError::TimedOut,
        Errno::Proto => FsError::UnexpectedEof,
        Errno::Again => FsError::WouldBlock,
        Errno::Nospc => FsError::WriteZero,
        Errno::Nosys => FsError::Unsupported,
        _ => FsError::UnknownError,
    }
}

pub fn fs_error_into_wasi_err(fs_error: FsError) -> Errno {
    match fs_error {
        FsError::AlreadyExists => Errno::Exist,
        FsError::BaseNotDirectory => Errno::Notdir,
        FsError::BrokenPipe => Errno::Pipe,
        FsError::Interrupted => Errno::Intr,
        FsError::InvalidData => Errno::Io,
        FsError::InvalidFd => Errno::Badf,
        FsError::InvalidInput => Errno::Inval,
        FsError::IOError => Errno::Io,
        FsError::NotAFile => Errno::Inval,
        FsError::EntryNotFound => Errno::Noent,
        FsError::NotADirectory => Errno::Notdir,
        FsError::IsADirectory => Errno::Isdir,
        FsError::DirectoryNotEmpty => Errno::Notempty,
        FsError::PermissionDenied => Errno::Perm,
        FsError::TimedOut => Errno::Timedout,
        FsError::UnexpectedEof => Errno::Proto,
        FsError::WouldBlock => Errno::Again,
        FsError::WriteZero => Errno::Nospc,
        FsError::StorageFull => Errno::Nospc,
        FsError::Unsupported => Errno::Nosys,
        FsError::Lock | FsError::UnknownError => Errno::Io,
    }
}

pub fn virtual_file_type_to_wasi_file_type(file_type: FileType) -> Filetype {
    if file_type.is_dir() {
        Filetype::Directory
    } else if file_type.is_file() {
        Filetype::RegularFile
    } else if file_type.is_symlink() {
        Filetype::SymbolicLink
    } else if file_type.char_device {
        Filetype::CharacterDevice
    } else if file_type.block_device {
        Filetype::BlockDevice
    } else {
        Filetype::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_round_trip() {
        for err in [
            FsError::AlreadyExists,
            FsError::EntryNotFound,
            FsError::NotADirectory,
            FsError::IsADirectory,
            FsError::DirectoryNotEmpty,
            FsError::Unsupported,
        ] {
            assert_eq!(fs_error_from_wasi_err(fs_error_into_wasi_err(err)), err);
        }
    }

    #[test]
    fn test_readonly_rejection_maps_to_nosys() {
        assert_eq!(fs_error_into_wasi_err(FsError::Unsupported), Errno::Nosys);
    }
}
