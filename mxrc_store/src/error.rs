//! Error types for shared memory region and Data Store operations.

use thiserror::Error;

/// Errors from the Shared Memory Region (§4.2: create/open/close/unlink).
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment already exists.
    #[error("segment already exists: {name}")]
    AlreadyExists {
        /// Segment name.
        name: String,
    },

    /// Segment not found.
    #[error("segment not found: {name}")]
    NotFound {
        /// Segment name.
        name: String,
    },

    /// Invalid segment size.
    #[error("invalid segment size: {size} bytes (must be 4KB-1GB, page-aligned)")]
    InvalidSize {
        /// Attempted size in bytes.
        size: usize,
    },

    /// An existing region's layout does not match this build's expected layout.
    #[error("size/layout mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        /// Expected size.
        expected: usize,
        /// Size found in the existing segment.
        found: usize,
    },

    /// Magic number or layout version did not match on `open()`.
    #[error("layout version mismatch: expected magic {expected_magic:#x}/version {expected_version}, found {found_magic:#x}/{found_version}")]
    VersionMismatch {
        /// Expected magic number.
        expected_magic: u64,
        /// Expected layout version.
        expected_version: u64,
        /// Magic number found in the region.
        found_magic: u64,
        /// Layout version found in the region.
        found_version: u64,
    },

    /// Permission denied.
    #[error("permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name.
        name: String,
    },

    /// System resources exhausted.
    #[error("system resource exhausted - cleanup required")]
    ResourceExhausted,

    /// Memory alignment error.
    #[error("memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError {
        /// Memory address.
        address: usize,
        /// Required alignment.
        alignment: usize,
    },

    /// IO error.
    #[error("I/O error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error.
    #[error("system call error: {source}")]
    Nix {
        /// Source nix error.
        #[from]
        source: nix::Error,
    },
}

/// Result type for shared memory region operations.
pub type ShmResult<T> = Result<T, ShmError>;

/// Errors from Data Store operations (§4.3).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// `key >= MAX_KEYS`.
    #[error("invalid key index {index}")]
    InvalidKey {
        /// The out-of-range index.
        index: usize,
    },

    /// The entry's type is `NONE` — it has never been written.
    #[error("key {index} has not been written")]
    NotPresent {
        /// The queried index.
        index: usize,
    },

    /// The stored type does not match the requested accessor type.
    #[error("key {index} type mismatch")]
    TypeMismatch {
        /// The queried index.
        index: usize,
    },

    /// Reader retried past the retry budget under sustained write contention.
    #[error("seqlock read did not stabilize for key {index}")]
    VersionConflict {
        /// The queried index.
        index: usize,
    },
}

/// Result type for Data Store operations.
pub type StoreResult<T> = Result<T, StoreError>;
