//! ---
//! iw_section: "03-publishing"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Publisher trait, message metadata, and factory seams."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
//! Publisher abstraction used by device sessions.
//!
//! The real ingestion transport lives behind [`TelemetryPublisher`]; the
//! simulator only ever talks to this trait. [`ConsolePublisher`] stands in
//! for dry runs and [`MemoryPublisher`] backs the test suites.

pub mod console;
pub mod error;
pub mod memory;

use async_trait::async_trait;

pub use console::{ConsolePublisher, ConsolePublisherFactory};
pub use error::{ConnectError, PublishError};
pub use memory::{FailurePlan, MemoryProbe, MemoryPublisher, MemoryPublisherFactory, RecordedMessage};

/// Transport-level metadata attached to an outgoing message, distinct from
/// the payload itself. Transports without metadata support may ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pairs: Vec<(String, String)>,
}

impl MessageProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a property, replacing any previous value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs.push((key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Connection-oriented publish capability bound to a single device.
///
/// A session drives the full lifecycle: `connect` once, `publish` per
/// cycle, `close` exactly once on the way out. Implementations do not need
/// to be reusable after `close`.
#[async_trait]
pub trait TelemetryPublisher: Send {
    async fn connect(&mut self) -> Result<(), ConnectError>;

    async fn publish(
        &mut self,
        payload: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), PublishError>;

    /// Release the transport connection. Must be safe on a publisher whose
    /// `connect` never succeeded.
    async fn close(&mut self);
}

/// Builds one publisher per device session.
///
/// The connection string is passed through unexamined; structural credential
/// validation happens in the session before this is called.
pub trait PublisherFactory: Send + Sync {
    fn create(
        &self,
        device_id: &str,
        connection: &str,
    ) -> Result<Box<dyn TelemetryPublisher>, ConnectError>;
}
