//! ---
//! iw_section: "04-runtime-orchestration"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Single-device connection lifecycle and send loop."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use icewatch_common::{ConnectionString, SensorRange};
use icewatch_publish::{
    ConnectError, MessageProperties, PublishError, PublisherFactory, TelemetryPublisher,
};
use icewatch_sim::TelemetryGenerator;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info};

use crate::error::SessionError;

/// Everything one device session needs to run.
#[derive(Clone)]
pub struct SessionSpec {
    /// Unique device identifier, also used as the reading location.
    pub device_id: String,
    /// Opaque connection string passed through to the publisher factory.
    pub connection: String,
    /// Shared read-only sensor ranges.
    pub ranges: Arc<IndexMap<String, SensorRange>>,
    /// Builds the publisher bound to this device's credentials.
    pub factory: Arc<dyn PublisherFactory>,
    /// Wait between cycles. Must be positive.
    pub interval: Duration,
    /// Bound on a single connect/publish call, so cancellation is never
    /// starved by a blocked transport.
    pub publish_timeout: Duration,
    /// Transport metadata label attached as `sensorType`.
    pub sensor_type: String,
    /// Seed for this session's private RNG stream.
    pub seed: u64,
}

/// Lifecycle states of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No publisher acquired yet.
    Disconnected,
    /// Publisher acquired, transport connecting or connected.
    Connected,
    /// Send loop running.
    Sending,
    /// Terminal error observed, cleanup pending.
    Failed,
    /// Session finished, connection released.
    Stopped,
}

/// Terminal status reported for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Clean stop, via cancellation or loop completion.
    Stopped,
    /// The session died from the recorded cause.
    Failed(SessionError),
}

/// Terminal report handed back to the supervisor.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Device this report belongs to.
    pub device_id: String,
    /// Completed generate/publish cycles.
    pub cycles: u64,
    /// Terminal status, with cause on failure.
    pub status: SessionStatus,
}

impl SessionReport {
    /// Whether the session ended without an error.
    pub fn is_clean(&self) -> bool {
        matches!(self.status, SessionStatus::Stopped)
    }

    /// The failure cause, if any.
    pub fn error(&self) -> Option<&SessionError> {
        match &self.status {
            SessionStatus::Stopped => None,
            SessionStatus::Failed(error) => Some(error),
        }
    }
}

fn transition(device_id: &str, state: &mut SessionState, next: SessionState) {
    debug!(device = %device_id, from = ?*state, to = ?next, "session state change");
    *state = next;
}

/// Run one device session to completion.
///
/// Owns the full lifecycle: validate configuration, acquire and connect a
/// publisher, loop generate→publish→wait until a terminal error or
/// cancellation, and release the connection on every exit path.
pub async fn run_session(
    spec: SessionSpec,
    mut cancel: broadcast::Receiver<()>,
) -> SessionReport {
    let device_id = spec.device_id.clone();
    let mut state = SessionState::Disconnected;
    let mut cycles = 0u64;

    // Fail fast on bad configuration before touching any transport.
    if spec.interval.is_zero() {
        let cause = SessionError::Configuration("send interval must be positive".to_owned());
        return fail(device_id, &mut state, cycles, cause);
    }
    if let Err(err) = ConnectionString::parse(&spec.connection) {
        let cause = SessionError::Configuration(err.to_string());
        return fail(device_id, &mut state, cycles, cause);
    }

    let mut publisher = match spec.factory.create(&spec.device_id, &spec.connection) {
        Ok(publisher) => publisher,
        Err(err) => return fail(device_id, &mut state, cycles, SessionError::Connect(err)),
    };
    transition(&device_id, &mut state, SessionState::Connected);

    let outcome = drive(&spec, publisher.as_mut(), &mut cancel, &mut state, &mut cycles).await;

    // Single release point: reached from success, failure, and cancellation.
    publisher.close().await;

    match outcome {
        Ok(()) => {
            transition(&device_id, &mut state, SessionState::Stopped);
            info!(device = %device_id, cycles, "session stopped");
            SessionReport {
                device_id,
                cycles,
                status: SessionStatus::Stopped,
            }
        }
        Err(cause) => fail(device_id, &mut state, cycles, cause),
    }
}

fn fail(
    device_id: String,
    state: &mut SessionState,
    cycles: u64,
    cause: SessionError,
) -> SessionReport {
    transition(&device_id, state, SessionState::Failed);
    error!(device = %device_id, cycles, error = %cause, "session failed");
    transition(&device_id, state, SessionState::Stopped);
    SessionReport {
        device_id,
        cycles,
        status: SessionStatus::Failed(cause),
    }
}

async fn drive(
    spec: &SessionSpec,
    publisher: &mut dyn TelemetryPublisher,
    cancel: &mut broadcast::Receiver<()>,
    state: &mut SessionState,
    cycles: &mut u64,
) -> Result<(), SessionError> {
    match timeout(spec.publish_timeout, publisher.connect()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err.into()),
        Err(_) => return Err(ConnectError::Timeout(spec.publish_timeout).into()),
    }
    info!(device = %spec.device_id, "device connected");
    transition(&spec.device_id, state, SessionState::Sending);

    let mut generator = TelemetryGenerator::seeded(spec.seed);
    let mut properties = MessageProperties::new();
    properties.insert("sensorType", spec.sensor_type.clone());

    // First tick completes immediately, matching the original
    // send-then-wait cadence.
    let mut ticker = interval(spec.interval);

    loop {
        tokio::select! {
            // A closed channel means the supervisor is gone; treat it the
            // same as an explicit cancellation.
            _ = cancel.recv() => {
                debug!(device = %spec.device_id, "cancellation received");
                return Ok(());
            }
            _ = ticker.tick() => {
                let reading = generator.generate(&spec.device_id, &spec.ranges);
                let payload = reading
                    .to_payload()
                    .map_err(|err| SessionError::Serialize(err.to_string()))?;
                match timeout(spec.publish_timeout, publisher.publish(&payload, &properties)).await {
                    Ok(Ok(())) => {
                        *cycles += 1;
                        info!(device = %spec.device_id, cycle = *cycles, bytes = payload.len(), "telemetry sent");
                    }
                    Ok(Err(err)) => return Err(err.into()),
                    Err(_) => return Err(PublishError::Timeout(spec.publish_timeout).into()),
                }
            }
        }
    }
}
