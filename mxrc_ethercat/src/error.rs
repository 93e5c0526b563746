//! Errors surfaced by the EtherCAT Master port (C6) and Cycle Driver (C10).

use thiserror::Error;

/// A failure reported by an [`crate::master::EtherCatMaster`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EtherCatError {
    /// `initialize()` was not called, or failed, before use.
    #[error("EtherCAT master is not initialized")]
    NotInitialized,
    /// `activate()` was called on an already-active master.
    #[error("EtherCAT master is already active")]
    AlreadyActive,
    /// `send()` failed.
    #[error("EtherCAT frame send failed: {0}")]
    SendFailed(String),
    /// `receive()` failed.
    #[error("EtherCAT frame receive failed: {0}")]
    ReceiveFailed(String),
    /// The physical link reported as down.
    #[error("EtherCAT link is down")]
    LinkDown,
}
