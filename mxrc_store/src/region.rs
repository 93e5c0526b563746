//! Shared Memory Region (§4.2): the POSIX-named mapping that hosts the
//! Data Store. Lifecycle (`create`/`open`/`close`/`unlink`) is owned
//! exclusively by the RT process; the Non-RT process only ever `open`s.

use crate::error::{ShmError, ShmResult};
use crate::platform::{create_shm_mmap, open_shm_mmap, unlink_shm};
use crate::store::SharedMemoryData;
use memmap2::MmapMut;
use mxrc_common::consts::{SHM_MAX_SIZE, SHM_MIN_SIZE};
use std::mem::size_of;
use std::sync::atomic::{fence, Ordering};

/// Magic number stamped into the first 8 bytes of every region.
///
/// "MXRCSHM1" read as a little-endian u64 — identifies this as an mxrc
/// shared memory region rather than stray `/dev/shm` contents.
pub const MXRC_SHM_MAGIC: u64 = 0x314D_4853_4352_584D;

/// Layout version of `SharedMemoryData`, derived from its size and
/// alignment. Bumped implicitly whenever the struct's shape changes —
/// `open()` on a region built from a different binary will fail instead
/// of silently misinterpreting bytes.
pub const LAYOUT_VERSION: u64 =
    (size_of::<SharedMemoryData>() as u64) ^ ((align_of::<SharedMemoryData>() as u64) << 48);

/// 16-byte header placed at the start of the mapped region, ahead of the
/// `SharedMemoryData` payload.
#[repr(C)]
struct RegionHeader {
    magic: u64,
    layout_version: u64,
}

const HEADER_SIZE: usize = size_of::<RegionHeader>();

/// Total region size: header + `SharedMemoryData`, padded up to a page
/// boundary per §6 ("Layout is `SharedMemoryData` followed by padding to
/// a page boundary").
#[must_use]
pub const fn region_size() -> usize {
    let payload = HEADER_SIZE + size_of::<SharedMemoryData>();
    payload.div_ceil(SHM_MIN_SIZE) * SHM_MIN_SIZE
}

/// A mapped POSIX shared memory region hosting one `SharedMemoryData`.
pub struct SharedMemoryRegion {
    name: String,
    mmap: MmapMut,
    owns_unlink: bool,
}

impl SharedMemoryRegion {
    /// Open-or-create the named region, sized to exactly fit one
    /// `SharedMemoryData`. A freshly created region is zero-filled by the
    /// kernel; the header is then stamped and the payload is
    /// placement-constructed in place.
    pub fn create(name: &str) -> ShmResult<Self> {
        let size = region_size();
        validate_segment_size(size)?;

        let mmap = create_shm_mmap(name, size)?;
        let mut region = Self {
            name: name.to_string(),
            mmap,
            owns_unlink: true,
        };
        region.write_header();
        region.shared_data_mut().init();
        Ok(region)
    }

    /// Open an existing region. Fails with `SizeMismatch` or
    /// `VersionMismatch` if the mapped region does not match this
    /// binary's expected `SharedMemoryData` layout.
    pub fn open(name: &str) -> ShmResult<Self> {
        let (mmap, size) = open_shm_mmap(name)?;
        let expected = region_size();
        if size != expected {
            return Err(ShmError::SizeMismatch {
                expected,
                found: size,
            });
        }

        let region = Self {
            name: name.to_string(),
            mmap,
            owns_unlink: false,
        };
        region.validate_header()?;
        Ok(region)
    }

    /// Unmap this region. The region persists in the namespace until
    /// `unlink` is called (by anyone). Equivalent to dropping the value.
    pub fn close(self) -> ShmResult<()> {
        drop(self);
        Ok(())
    }

    /// Remove this region's name from the POSIX shared memory namespace.
    /// Existing mappings (including this one, if still open) remain valid
    /// until unmapped.
    pub fn unlink(name: &str) -> ShmResult<()> {
        unlink_shm(name)
    }

    /// The region's POSIX name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared reference to the Data Store payload.
    #[must_use]
    pub fn shared_data(&self) -> &SharedMemoryData {
        // SAFETY: the mapping is exactly `region_size()` bytes, the header
        // occupies the first HEADER_SIZE bytes, and `SharedMemoryData` was
        // placement-constructed at that offset by `create` (or validated
        // to already hold one by `open`).
        unsafe { &*(self.mmap.as_ptr().add(HEADER_SIZE) as *const SharedMemoryData) }
    }

    /// Mutable reference to the Data Store payload.
    ///
    /// `SharedMemoryData`'s fields are all interior-mutable atomics, so an
    /// `&mut self` borrow here is a convenience, not a soundness
    /// requirement — both RT and Non-RT hold independent mappings and
    /// mutate through shared references in practice.
    fn shared_data_mut(&mut self) -> &mut SharedMemoryData {
        unsafe { &mut *(self.mmap.as_mut_ptr().add(HEADER_SIZE) as *mut SharedMemoryData) }
    }

    fn write_header(&mut self) {
        let header = RegionHeader {
            magic: MXRC_SHM_MAGIC,
            layout_version: LAYOUT_VERSION,
        };
        unsafe {
            std::ptr::copy_nonoverlapping(
                &header as *const RegionHeader as *const u8,
                self.mmap.as_mut_ptr(),
                HEADER_SIZE,
            );
        }
        fence(Ordering::Release);
    }

    fn validate_header(&self) -> ShmResult<()> {
        fence(Ordering::Acquire);
        let mut header = RegionHeader {
            magic: 0,
            layout_version: 0,
        };
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.mmap.as_ptr(),
                &mut header as *mut RegionHeader as *mut u8,
                HEADER_SIZE,
            );
        }
        if header.magic != MXRC_SHM_MAGIC || header.layout_version != LAYOUT_VERSION {
            return Err(ShmError::VersionMismatch {
                expected_magic: MXRC_SHM_MAGIC,
                expected_version: LAYOUT_VERSION,
                found_magic: header.magic,
                found_version: header.layout_version,
            });
        }
        Ok(())
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        if self.owns_unlink {
            let _ = unlink_shm(&self.name);
        }
    }
}

fn validate_segment_size(size: usize) -> ShmResult<()> {
    if size < SHM_MIN_SIZE || size > SHM_MAX_SIZE {
        return Err(ShmError::InvalidSize { size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/mxrc_test_region_{tag}_{}", std::process::id())
    }

    #[test]
    fn create_then_open_see_the_same_data() {
        let name = unique_name("rw");
        let _ = SharedMemoryRegion::unlink(&name);

        let writer = SharedMemoryRegion::create(&name).unwrap();
        writer.shared_data().data.set_i32(0, 42).unwrap();

        let reader = SharedMemoryRegion::open(&name).unwrap();
        let mut out = 0i32;
        reader.shared_data().data.get_i32(0, &mut out).unwrap();
        assert_eq!(out, 42);
    }

    #[test]
    fn open_missing_region_is_not_found() {
        let name = unique_name("missing");
        let _ = SharedMemoryRegion::unlink(&name);
        assert!(matches!(
            SharedMemoryRegion::open(&name),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn unlink_after_close_is_idempotent() {
        let name = unique_name("unlink");
        let _ = SharedMemoryRegion::unlink(&name);
        let region = SharedMemoryRegion::create(&name).unwrap();
        region.close().unwrap();
        SharedMemoryRegion::unlink(&name).unwrap();
        SharedMemoryRegion::unlink(&name).unwrap();
    }

    #[test]
    fn wrong_size_region_is_rejected() {
        let name = unique_name("badsize");
        let _ = unlink_shm(&name);
        create_shm_mmap(&name, 4096).unwrap();
        assert!(matches!(
            SharedMemoryRegion::open(&name),
            Err(ShmError::SizeMismatch { .. })
        ));
        let _ = unlink_shm(&name);
    }
}
