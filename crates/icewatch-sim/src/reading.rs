//! ---
//! iw_section: "02-telemetry-generation"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Telemetry reading envelope and serialization."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One set of sensor readings produced for a device send cycle.
///
/// Serializes to the ingestion envelope: a flat JSON object holding
/// `location`, one number per configured sensor range, and `Timestamp`
/// (RFC 3339 UTC). The `Timestamp` key casing is what the downstream
/// stream-analytics job windows on; do not change it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryReading {
    pub location: String,
    #[serde(flatten)]
    pub measurements: IndexMap<String, f64>,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl TelemetryReading {
    /// Serialize the reading into its UTF-8 JSON wire payload.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
