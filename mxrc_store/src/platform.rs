//! POSIX shared memory primitives (Linux).
//!
//! Thin wrapper over `shm_open`/`shm_unlink`/`mmap` — the only place in this
//! crate that touches POSIX shared-memory syscalls directly.

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::{fstat, Mode};
use nix::unistd::{close, ftruncate, getpid};
use std::os::fd::{AsFd, OwnedFd};

/// Open-or-create a POSIX shared memory object and map it read-write.
///
/// `name` must start with `/` and contain no further `/` per `shm_open(3)`.
/// If the object did not previously exist it is truncated to `size` bytes,
/// which zero-fills it (a new POSIX shm object's backing pages are always
/// zero).
pub fn create_shm_mmap(name: &str, size: usize) -> ShmResult<MmapMut> {
    let fd = shm_open(
        name,
        OFlag::O_CREAT | OFlag::O_RDWR,
        Mode::S_IRUSR | Mode::S_IWUSR,
    )
    .map_err(|source| map_open_error(source, name))?;

    ftruncate(&fd, size as i64).map_err(ShmError::from)?;

    map_fd(fd, size)
}

/// Open an existing POSIX shared memory object read-write and map it.
///
/// The mapped size is taken from the object's current size as reported by
/// `fstat`, not from a caller-supplied value — callers validate the region
/// header after mapping.
pub fn open_shm_mmap(name: &str) -> ShmResult<(MmapMut, usize)> {
    let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|source| {
        if source == nix::Error::ENOENT {
            ShmError::NotFound {
                name: name.to_string(),
            }
        } else {
            map_open_error(source, name)
        }
    })?;

    let st = fstat(fd.as_fd()).map_err(ShmError::from)?;
    let size = st.st_size as usize;
    let mmap = map_fd(fd, size)?;
    Ok((mmap, size))
}

fn map_fd(fd: OwnedFd, size: usize) -> ShmResult<MmapMut> {
    // SAFETY: fd is a freshly opened/truncated shm object of exactly `size`
    // bytes; no other mapping of this process aliases it yet.
    let mmap = unsafe { MmapOptions::new().len(size).map_mut(&fd)? };
    let _ = close(fd);
    Ok(mmap)
}

fn map_open_error(source: nix::Error, name: &str) -> ShmError {
    match source {
        nix::Error::EACCES | nix::Error::EPERM => ShmError::PermissionDenied {
            name: name.to_string(),
        },
        nix::Error::ENOENT => ShmError::NotFound {
            name: name.to_string(),
        },
        nix::Error::ENOSPC | nix::Error::ENOMEM => ShmError::ResourceExhausted,
        other => ShmError::Nix { source: other },
    }
}

/// Remove a POSIX shared memory object's name from the namespace.
///
/// Existing mappings of the object survive until their owners `close`/unmap;
/// this only prevents future `shm_open` calls from finding it.
pub fn unlink_shm(name: &str) -> ShmResult<()> {
    match shm_unlink(name) {
        Ok(()) => Ok(()),
        Err(nix::Error::ENOENT) => Ok(()),
        Err(source) => Err(ShmError::Nix { source }),
    }
}

/// Check if a process is alive using `kill(pid, 0)`.
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::Error::EPERM) => true,
        Err(_) => false,
    }
}

/// Current process ID.
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}
