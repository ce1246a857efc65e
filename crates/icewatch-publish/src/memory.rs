//! ---
//! iw_section: "03-publishing"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Scriptable in-memory publisher backing the test suites."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ConnectError, PublishError};
use crate::{MessageProperties, PublisherFactory, TelemetryPublisher};

/// Scripted failure behaviour for a [`MemoryPublisher`].
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    /// Error returned from `connect`, if any.
    pub fail_connect: Option<ConnectError>,
    /// `(call_index, error)`: fail the nth publish call (1-based).
    pub fail_on_publish: Option<(usize, PublishError)>,
}

impl FailurePlan {
    pub fn connect_failure(error: ConnectError) -> Self {
        Self {
            fail_connect: Some(error),
            ..Self::default()
        }
    }

    pub fn publish_failure(call_index: usize, error: PublishError) -> Self {
        Self {
            fail_on_publish: Some((call_index, error)),
            ..Self::default()
        }
    }
}

/// One message captured by a [`MemoryPublisher`].
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub payload: Vec<u8>,
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Recorded {
    connect_calls: usize,
    close_calls: usize,
    messages: Vec<RecordedMessage>,
}

/// Shared view over the calls a [`MemoryPublisher`] received, for
/// assertions after the session owning the publisher has finished.
#[derive(Debug, Clone, Default)]
pub struct MemoryProbe {
    inner: Arc<Mutex<Recorded>>,
}

impl MemoryProbe {
    pub fn connect_calls(&self) -> usize {
        self.inner.lock().connect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }

    pub fn publish_count(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.inner.lock().messages.clone()
    }
}

/// In-memory publisher recording every call, optionally failing on script.
#[derive(Debug)]
pub struct MemoryPublisher {
    probe: MemoryProbe,
    plan: FailurePlan,
    publish_calls: usize,
}

impl MemoryPublisher {
    pub fn new() -> (Self, MemoryProbe) {
        Self::with_plan(FailurePlan::default())
    }

    pub fn with_plan(plan: FailurePlan) -> (Self, MemoryProbe) {
        let probe = MemoryProbe::default();
        (
            Self {
                probe: probe.clone(),
                plan,
                publish_calls: 0,
            },
            probe,
        )
    }
}

#[async_trait]
impl TelemetryPublisher for MemoryPublisher {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.probe.inner.lock().connect_calls += 1;
        match &self.plan.fail_connect {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn publish(
        &mut self,
        payload: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), PublishError> {
        self.publish_calls += 1;
        if let Some((call_index, error)) = &self.plan.fail_on_publish {
            if self.publish_calls == *call_index {
                return Err(error.clone());
            }
        }
        self.probe.inner.lock().messages.push(RecordedMessage {
            payload: payload.to_vec(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.inner.lock().close_calls += 1;
    }
}

/// Factory wiring [`MemoryPublisher`] instances into a supervisor run.
///
/// Plans are registered per device id ahead of the run; probes become
/// available once the corresponding session has acquired its publisher.
#[derive(Debug, Default)]
pub struct MemoryPublisherFactory {
    plans: Mutex<HashMap<String, FailurePlan>>,
    probes: Mutex<HashMap<String, MemoryProbe>>,
}

impl MemoryPublisherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the publisher created for `device_id`.
    pub fn set_plan(&self, device_id: impl Into<String>, plan: FailurePlan) {
        self.plans.lock().insert(device_id.into(), plan);
    }

    /// Probe for a device, if its session already acquired a publisher.
    pub fn probe(&self, device_id: &str) -> Option<MemoryProbe> {
        self.probes.lock().get(device_id).cloned()
    }
}

impl PublisherFactory for MemoryPublisherFactory {
    fn create(
        &self,
        device_id: &str,
        _connection: &str,
    ) -> Result<Box<dyn TelemetryPublisher>, ConnectError> {
        let plan = self
            .plans
            .lock()
            .get(device_id)
            .cloned()
            .unwrap_or_default();
        let (publisher, probe) = MemoryPublisher::with_plan(plan);
        self.probes.lock().insert(device_id.to_owned(), probe);
        Ok(Box::new(publisher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn records_lifecycle_calls() {
        let (mut publisher, probe) = MemoryPublisher::new();
        publisher.connect().await.expect("connect succeeds");

        let mut properties = MessageProperties::new();
        properties.insert("sensorType", "skateway");
        publisher
            .publish(b"{}", &properties)
            .await
            .expect("publish succeeds");
        publisher.close().await;

        assert_eq!(probe.connect_calls(), 1);
        assert_eq!(probe.publish_count(), 1);
        assert_eq!(probe.close_calls(), 1);
        let recorded = probe.messages();
        assert_eq!(recorded[0].payload, b"{}");
        assert_eq!(
            recorded[0].properties,
            vec![("sensorType".to_owned(), "skateway".to_owned())]
        );
    }

    #[tokio::test]
    async fn scripted_publish_failure_hits_exact_call() {
        let plan = FailurePlan::publish_failure(2, PublishError::ConnectionLost("reset".into()));
        let (mut publisher, probe) = MemoryPublisher::with_plan(plan);
        publisher.connect().await.expect("connect succeeds");

        let properties = MessageProperties::new();
        assert!(publisher.publish(b"a", &properties).await.is_ok());
        assert_eq!(
            publisher.publish(b"b", &properties).await,
            Err(PublishError::ConnectionLost("reset".into()))
        );
        // The failed call is not recorded as a delivered message.
        assert_eq!(probe.publish_count(), 1);
    }

    #[tokio::test]
    async fn factory_hands_out_scripted_publishers() {
        let factory = MemoryPublisherFactory::new();
        factory.set_plan(
            "nac",
            FailurePlan::connect_failure(ConnectError::Timeout(Duration::from_secs(1))),
        );

        let mut publisher = factory
            .create("nac", "HostName=hub.local;SharedAccessKey=abc")
            .expect("factory create succeeds");
        assert_eq!(
            publisher.connect().await,
            Err(ConnectError::Timeout(Duration::from_secs(1)))
        );
        assert_eq!(factory.probe("nac").expect("probe exists").connect_calls(), 1);
        assert!(factory.probe("dows-lake").is_none());
    }
}
