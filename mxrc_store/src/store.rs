//! Data Store (§4.3): a fixed array of typed entries, each guarded by a
//! per-entry seqlock and monotonic timestamp, plus the `SharedMemoryData`
//! envelope that is placed into the Shared Memory Region (§4.2).

use crate::error::{StoreError, StoreResult};
use crate::version::VersionCounter;
use mxrc_common::consts::MAX_KEYS;
use mxrc_common::data_type::{DataType, STRING32_LEN};
use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

/// Number of seqlock retries before a reader gives up with `VersionConflict`.
///
/// Bounds worst-case read latency under sustained write contention; a
/// writer that is still odd after this many spins is treated as stuck
/// rather than looped on forever.
const READ_RETRY_LIMIT: u32 = 16;

#[repr(C)]
struct EntryPayload {
    ty: u8,
    _pad: [u8; 7],
    timestamp_ns: u64,
    value: [u8; STRING32_LEN],
}

impl EntryPayload {
    const fn zeroed() -> Self {
        Self {
            ty: DataType::None as u8,
            _pad: [0; 7],
            timestamp_ns: 0,
            value: [0; STRING32_LEN],
        }
    }
}

/// One entry in the Data Store: a seqlock-protected `(type, timestamp,
/// value)` triple addressed by `DataKey::as_index()`.
///
/// `seq` is the only field accessed through an atomic directly; `payload`
/// is written and read only while holding the odd/even seqlock discipline,
/// matching the whole-segment seqlock already used by `VersionCounter`.
#[repr(C, align(64))]
pub struct DataEntry {
    seq: AtomicU64,
    payload: UnsafeCell<EntryPayload>,
}

// SAFETY: all access to `payload` goes through the seqlock protocol in
// `DataStore`, which serializes writers by convention (RT owns sensor
// bands, Non-RT owns command bands) and lets readers retry on torn reads.
unsafe impl Sync for DataEntry {}

impl DataEntry {
    const fn zeroed() -> Self {
        Self {
            seq: AtomicU64::new(0),
            payload: UnsafeCell::new(EntryPayload::zeroed()),
        }
    }
}

impl Default for DataEntry {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Fixed array of `MAX_KEYS` `DataEntry` slots, contiguous and of uniform
/// stride so any key indexes it in O(1).
#[repr(C)]
pub struct DataStore {
    entries: [DataEntry; MAX_KEYS],
}

impl DataStore {
    fn entry(&self, key: usize) -> StoreResult<&DataEntry> {
        self.entries
            .get(key)
            .ok_or(StoreError::InvalidKey { index: key })
    }

    fn write(&self, key: usize, ty: DataType, bytes: &[u8]) -> StoreResult<()> {
        let entry = self.entry(key)?;
        entry.seq.fetch_add(1, Ordering::Release);
        fence(Ordering::Release);
        // SAFETY: we are the sole writer between the two fetch_adds above
        // and below; readers observe an odd `seq` and retry.
        unsafe {
            let payload = &mut *entry.payload.get();
            payload.ty = ty as u8;
            payload.timestamp_ns = now_ns();
            payload.value = [0; STRING32_LEN];
            payload.value[..bytes.len()].copy_from_slice(bytes);
        }
        fence(Ordering::Release);
        entry.seq.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn read(&self, key: usize, expected: DataType) -> StoreResult<([u8; STRING32_LEN], u64)> {
        let entry = self.entry(key)?;
        for _ in 0..READ_RETRY_LIMIT {
            let seq1 = entry.seq.load(Ordering::Acquire);
            if VersionCounter::is_writing(seq1) {
                std::hint::spin_loop();
                continue;
            }
            fence(Ordering::Acquire);
            // SAFETY: we re-check `seq` below; a torn read here is
            // discarded, never published.
            let (ty, ts, value) = unsafe {
                let payload = &*entry.payload.get();
                (payload.ty, payload.timestamp_ns, payload.value)
            };
            fence(Ordering::Acquire);
            let seq2 = entry.seq.load(Ordering::Acquire);
            if seq1 != seq2 {
                std::hint::spin_loop();
                continue;
            }

            let stored = DataType::from_u8(ty).unwrap_or(DataType::None);
            if stored == DataType::None {
                return Err(StoreError::NotPresent { index: key });
            }
            if stored != expected {
                return Err(StoreError::TypeMismatch { index: key });
            }
            return Ok((value, ts));
        }
        Err(StoreError::VersionConflict { index: key })
    }

    /// Write a signed 32-bit integer.
    pub fn set_i32(&self, key: usize, value: i32) -> StoreResult<()> {
        self.write(key, DataType::Int32, &value.to_ne_bytes())
    }

    /// Read a signed 32-bit integer. Fails `InvalidKey`, `NotPresent`,
    /// `TypeMismatch`, or `VersionConflict`.
    pub fn get_i32(&self, key: usize, out: &mut i32) -> StoreResult<()> {
        let (bytes, _) = self.read(key, DataType::Int32)?;
        *out = i32::from_ne_bytes(bytes[..4].try_into().unwrap());
        Ok(())
    }

    /// Write a 32-bit float.
    pub fn set_f32(&self, key: usize, value: f32) -> StoreResult<()> {
        self.write(key, DataType::Float, &value.to_ne_bytes())
    }

    /// Read a 32-bit float.
    pub fn get_f32(&self, key: usize, out: &mut f32) -> StoreResult<()> {
        let (bytes, _) = self.read(key, DataType::Float)?;
        *out = f32::from_ne_bytes(bytes[..4].try_into().unwrap());
        Ok(())
    }

    /// Write a 64-bit float.
    pub fn set_f64(&self, key: usize, value: f64) -> StoreResult<()> {
        self.write(key, DataType::Double, &value.to_ne_bytes())
    }

    /// Read a 64-bit float.
    pub fn get_f64(&self, key: usize, out: &mut f64) -> StoreResult<()> {
        let (bytes, _) = self.read(key, DataType::Double)?;
        *out = f64::from_ne_bytes(bytes[..8].try_into().unwrap());
        Ok(())
    }

    /// Write an unsigned 64-bit integer.
    pub fn set_u64(&self, key: usize, value: u64) -> StoreResult<()> {
        self.write(key, DataType::Uint64, &value.to_ne_bytes())
    }

    /// Read an unsigned 64-bit integer.
    pub fn get_u64(&self, key: usize, out: &mut u64) -> StoreResult<()> {
        let (bytes, _) = self.read(key, DataType::Uint64)?;
        *out = u64::from_ne_bytes(bytes[..8].try_into().unwrap());
        Ok(())
    }

    /// Write a string, truncated to `STRING32_LEN - 1` bytes and always
    /// NUL-terminated.
    pub fn set_str(&self, key: usize, value: &str) -> StoreResult<()> {
        let max = STRING32_LEN - 1;
        let mut truncated = value;
        while truncated.len() > max {
            let mut end = max;
            while !truncated.is_char_boundary(end) {
                end -= 1;
            }
            truncated = &truncated[..end];
        }
        let mut bytes = [0u8; STRING32_LEN];
        bytes[..truncated.len()].copy_from_slice(truncated.as_bytes());
        self.write(key, DataType::String32, &bytes)
    }

    /// Read a string into a fixed buffer, returning the number of
    /// meaningful (pre-NUL) bytes written to `out`.
    pub fn get_str(&self, key: usize, out: &mut [u8; STRING32_LEN]) -> StoreResult<usize> {
        let (bytes, _) = self.read(key, DataType::String32)?;
        *out = bytes;
        Ok(out.iter().position(|&b| b == 0).unwrap_or(out.len()))
    }

    /// Atomically bump an entry's `seq` by one with relaxed ordering,
    /// without touching its value or type. Useful as a hint-only
    /// cross-process signal; returns the post-increment value.
    pub fn increment_seq(&self, key: usize) -> StoreResult<u64> {
        let entry = self.entry(key)?;
        Ok(entry.seq.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Monotonic-clock nanosecond timestamp of the entry's last successful
    /// write, or 0 if it has never been written.
    pub fn timestamp(&self, key: usize) -> StoreResult<u64> {
        let entry = self.entry(key)?;
        for _ in 0..READ_RETRY_LIMIT {
            let seq1 = entry.seq.load(Ordering::Acquire);
            if VersionCounter::is_writing(seq1) {
                std::hint::spin_loop();
                continue;
            }
            fence(Ordering::Acquire);
            let ts = unsafe { (*entry.payload.get()).timestamp_ns };
            fence(Ordering::Acquire);
            if entry.seq.load(Ordering::Acquire) != seq1 {
                std::hint::spin_loop();
                continue;
            }
            return Ok(ts);
        }
        Err(StoreError::VersionConflict { index: key })
    }

    /// Whether the entry was written within the last `max_age_ns`.
    pub fn is_fresh(&self, key: usize, max_age_ns: u64) -> StoreResult<bool> {
        let ts = self.timestamp(key)?;
        if ts == 0 {
            return Ok(false);
        }
        Ok(now_ns().saturating_sub(ts) <= max_age_ns)
    }
}

/// The struct placed directly into the Shared Memory Region (§4.2): the
/// Data Store plus the two cross-process coordination fields the RT and
/// Non-RT processes exchange outside the keyed data model.
#[repr(C, align(64))]
pub struct SharedMemoryData {
    /// The fixed-size array of typed, seqlock-guarded entries.
    pub data: DataStore,
    /// Non-RT process's last heartbeat, monotonic-clock nanoseconds.
    /// Written by Non-RT, read by the RT Heartbeat Monitor (§4.5).
    pub nonrt_heartbeat_ns: AtomicU64,
    /// Mirror of the RT state machine's current state code (§4.4),
    /// published for Non-RT observers.
    pub rt_state_code: AtomicU32,
    _padding: [u8; 52],
}

impl SharedMemoryData {
    /// Placement-initialize a freshly mapped (zeroed) region.
    ///
    /// All-zero bytes already satisfy every field's invariant (`seq` even,
    /// `ty` is `DataType::None`, heartbeat/state at 0), so this only
    /// exists to document the contract at the one call site that owns it.
    pub(crate) fn init(&mut self) {}
}

fn now_ns() -> u64 {
    use nix::time::{clock_gettime, ClockId};
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC).expect("CLOCK_MONOTONIC must be available");
    ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64
}
