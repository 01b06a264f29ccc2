//! Builder system for configuring a [`WasiState`] and creating it.

use crate::state::{WasiFs, WasiState};
use crate::WasiEnv;
use capstan_vfs::{host_fs, FileSystem, NullFile, VirtualFile};
use std::path::Path;
use thiserror::Error;

/// Convenient builder API for configuring the filesystem and stdio of a
/// guest instance.
///
/// Usage:
/// ```no_run
/// # use capstan_wasi::WasiEnv;
/// # fn main() -> Result<(), capstan_wasi::WasiStateCreationError> {
/// let env = WasiEnv::builder()
///     .preopen_dir("/srv/guest")?
///     .stdout(Box::new(capstan_vfs::Pipe::new()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct WasiStateBuilder {
    fs: Option<Box<dyn FileSystem>>,
    stdin_override: Option<Box<dyn VirtualFile + Send + Sync + 'static>>,
    stdout_override: Option<Box<dyn VirtualFile + Send + Sync + 'static>>,
    stderr_override: Option<Box<dyn VirtualFile + Send + Sync + 'static>>,
}

/// Error type returned when bad data is given to [`WasiStateBuilder`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WasiStateCreationError {
    #[error("no filesystem was supplied")]
    MissingFileSystem,
    #[error("error creating the filesystem: {0}")]
    WasiFsCreationError(String),
}

impl WasiStateBuilder {
    /// Supply the filesystem the guest sees. A writable tree is a
    /// `host_fs::FileSystem`; wrap it in `readonly_fs::FileSystem` to refuse
    /// mutation.
    pub fn fs(&mut self, fs: Box<dyn FileSystem>) -> &mut Self {
        self.fs = Some(fs);
        self
    }

    /// Shorthand for mounting a writable host directory as the root.
    pub fn preopen_dir<P: AsRef<Path>>(
        &mut self,
        dir: P,
    ) -> Result<&mut Self, WasiStateCreationError> {
        let fs = host_fs::FileSystem::new(dir)
            .map_err(|e| WasiStateCreationError::WasiFsCreationError(e.to_string()))?;
        self.fs = Some(Box::new(fs));
        Ok(self)
    }

    /// Overwrite the default WASI `stdin` (an EOF source).
    pub fn stdin(&mut self, new_file: Box<dyn VirtualFile + Send + Sync + 'static>) -> &mut Self {
        self.stdin_override = Some(new_file);
        self
    }

    /// Overwrite the default WASI `stdout` (a discard sink).
    pub fn stdout(&mut self, new_file: Box<dyn VirtualFile + Send + Sync + 'static>) -> &mut Self {
        self.stdout_override = Some(new_file);
        self
    }

    /// Overwrite the default WASI `stderr` (a discard sink).
    pub fn stderr(&mut self, new_file: Box<dyn VirtualFile + Send + Sync + 'static>) -> &mut Self {
        self.stderr_override = Some(new_file);
        self
    }

    /// Consumes the builder's configuration and produces the environment a
    /// guest instance runs against.
    pub fn build(&mut self) -> Result<WasiEnv, WasiStateCreationError> {
        let fs = self.fs.take().ok_or(WasiStateCreationError::MissingFileSystem)?;
        let stdin = self
            .stdin_override
            .take()
            .unwrap_or_else(|| Box::new(NullFile));
        let stdout = self
            .stdout_override
            .take()
            .unwrap_or_else(|| Box::new(NullFile));
        let stderr = self
            .stderr_override
            .take()
            .unwrap_or_else(|| Box::new(NullFile));

        Ok(WasiEnv::new(WasiState {
            fs: WasiFs::new(fs, stdin, stdout, stderr),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_filesystem() {
        assert_eq!(
            WasiStateBuilder::default().build().err(),
            Some(WasiStateCreationError::MissingFileSystem)
        );
    }

    #[test]
    fn test_preopen_dir_must_exist() {
        let err = WasiStateBuilder::default()
            .preopen_dir("/definitely/not/a/real/path")
            .err();
        assert!(matches!(
            err,
            Some(WasiStateCreationError::WasiFsCreationError(_))
        ));
    }
}
