//! ---
//! iw_section: "04-runtime-orchestration"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Session error taxonomy."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use icewatch_publish::{ConnectError, PublishError};
use thiserror::Error;

/// Terminal causes for a device session.
///
/// Every variant is local to one session; the supervisor reports them but
/// never lets one session's error abort a sibling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Invalid interval or placeholder/malformed credentials, detected
    /// before any network activity.
    #[error("invalid device configuration: {0}")]
    Configuration(String),
    /// The transport connection could not be established.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),
    /// A send failed; the session loop does not retry.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    /// A reading could not be serialized into its wire payload.
    #[error("failed to serialize reading: {0}")]
    Serialize(String),
}

impl SessionError {
    /// Configuration failures are expected operator errors and excluded
    /// from the daemon's nonzero-exit policy.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SessionError::Configuration(_))
    }
}
