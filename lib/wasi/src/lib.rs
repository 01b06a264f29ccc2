//! capstan's WASI implementation
//!
//! The host runtime hands each syscall a [`WasiEnv`] (the per-instance
//! filesystem context) and a [`GuestMemory`] view over the instance's linear
//! memory; every function in [`syscalls`] reads its arguments from those,
//! performs the operation, writes results back in the exact byte layout the
//! ABI mandates, and returns an [`Errno`](types::Errno).
//!
//! Use [`WasiEnv::builder`] to configure the filesystem and stdio before
//! instantiating a guest:
//!
//! ```no_run
//! # use capstan_wasi::WasiEnv;
//! # use capstan_vfs::host_fs;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = WasiEnv::builder()
//!     .fs(Box::new(host_fs::FileSystem::new("/srv/guest")?))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;
pub mod memory;
pub mod state;
pub mod syscalls;

pub use crate::memory::{GuestMemory, MemoryAccessError};
pub use crate::state::{
    Fd, FileEntry, Kind, ReadDirCursor, WasiFs, WasiState, WasiStateBuilder,
    WasiStateCreationError,
};
pub use crate::syscalls::types;
pub use capstan_vfs::{FsError, VirtualFile};

/// The module name guest imports resolve against.
pub const MODULE_NAME: &str = "wasi_snapshot_preview1";

/// The per-instance WASI context: everything a syscall needs besides the
/// guest's linear memory.
#[derive(Debug)]
pub struct WasiEnv {
    pub state: WasiState,
}

impl WasiEnv {
    pub fn builder() -> WasiStateBuilder {
        WasiStateBuilder::default()
    }

    pub fn new(state: WasiState) -> Self {
        Self { state }
    }
}
