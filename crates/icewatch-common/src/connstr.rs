//! ---
//! iw_section: "01-core-functionality"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Device connection-string parsing and placeholder detection."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use thiserror::Error;

/// Marker left in sample configurations where a real shared access key belongs.
const KEY_PLACEHOLDER: &str = "...";
/// Host prefix used by sample configurations before provisioning.
const HOST_PLACEHOLDER_PREFIX: &str = "your-";

/// Errors raised while parsing a device connection string.
///
/// All variants are configuration-level: none of them involves any network
/// activity, so a session hitting one of these must fail before connecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,
    #[error("connection string segment '{0}' is not a key=value pair")]
    MalformedSegment(String),
    #[error("connection string is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("connection string field '{0}' still holds a placeholder value")]
    Placeholder(&'static str),
}

/// Parsed `key=value;` device connection string.
///
/// The simulator never interprets the credential material beyond this
/// structural check; the raw string is handed to the publisher untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: Option<String>,
    pub shared_access_key: String,
}

impl ConnectionString {
    /// Parse a connection string, rejecting placeholders from sample configs.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        if raw.trim().is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;

        for segment in raw.split(';').filter(|s| !s.trim().is_empty()) {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(ConnectionStringError::MalformedSegment(
                    segment.trim().to_owned(),
                ));
            };
            match key.trim() {
                "HostName" => host_name = Some(value.trim().to_owned()),
                "DeviceId" => device_id = Some(value.trim().to_owned()),
                // The access key may itself contain '=' padding; split_once
                // keeps everything after the first separator.
                "SharedAccessKey" => shared_access_key = Some(value.trim().to_owned()),
                _ => {}
            }
        }

        let host_name = host_name
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingField("HostName"))?;
        let shared_access_key = shared_access_key
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingField("SharedAccessKey"))?;

        if host_name.starts_with(HOST_PLACEHOLDER_PREFIX) {
            return Err(ConnectionStringError::Placeholder("HostName"));
        }
        if shared_access_key == KEY_PLACEHOLDER {
            return Err(ConnectionStringError::Placeholder("SharedAccessKey"));
        }

        Ok(Self {
            host_name,
            device_id,
            shared_access_key,
        })
    }
}
