//! ---
//! iw_section: "03-publishing"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Typed transport errors surfaced to device sessions."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::time::Duration;

use thiserror::Error;

/// The transport connection could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("transport rejected the connection: {0}")]
    Rejected(String),
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// A single send failed. Terminal for the owning session's loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("transport rejected the message: {0}")]
    Rejected(String),
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
}
