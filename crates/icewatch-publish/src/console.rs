//! ---
//! iw_section: "03-publishing"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Dry-run publisher logging payloads instead of sending them."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ConnectError, PublishError};
use crate::{MessageProperties, PublisherFactory, TelemetryPublisher};

/// Publisher that logs every message through tracing instead of touching a
/// network. Used when running the simulator without a real ingestion hub.
#[derive(Debug)]
pub struct ConsolePublisher {
    device_id: String,
    connected: bool,
}

impl ConsolePublisher {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            connected: false,
        }
    }
}

#[async_trait]
impl TelemetryPublisher for ConsolePublisher {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.connected = true;
        debug!(device = %self.device_id, "console publisher connected");
        Ok(())
    }

    async fn publish(
        &mut self,
        payload: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), PublishError> {
        let body = String::from_utf8_lossy(payload);
        let sensor_type = properties.get("sensorType").unwrap_or("-");
        info!(device = %self.device_id, sensor_type = %sensor_type, %body, "telemetry message");
        Ok(())
    }

    async fn close(&mut self) {
        if self.connected {
            debug!(device = %self.device_id, "console publisher closed");
            self.connected = false;
        }
    }
}

/// Factory handing out [`ConsolePublisher`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePublisherFactory;

impl PublisherFactory for ConsolePublisherFactory {
    fn create(
        &self,
        device_id: &str,
        _connection: &str,
    ) -> Result<Box<dyn TelemetryPublisher>, ConnectError> {
        Ok(Box::new(ConsolePublisher::new(device_id)))
    }
}
