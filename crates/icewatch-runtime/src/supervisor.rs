//! ---
//! iw_section: "04-runtime-orchestration"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Fleet supervisor fanning out and joining device sessions."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use icewatch_common::{AppConfig, Roster, SensorRange};
use icewatch_publish::PublisherFactory;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

use crate::session::{run_session, SessionReport, SessionSpec};

/// Full description of one simulation run.
#[derive(Clone)]
pub struct SimulationPlan {
    /// Configured devices, keyed by device id.
    pub roster: Roster,
    /// Sensor ranges shared by every session.
    pub ranges: IndexMap<String, SensorRange>,
    /// Wait between telemetry cycles.
    pub interval: Duration,
    /// Bound on individual connect/publish calls.
    pub publish_timeout: Duration,
    /// Transport metadata label attached to outgoing messages.
    pub sensor_type: String,
    /// Cleanup budget after a shutdown request.
    pub grace_period: Duration,
    /// Base RNG seed; sessions derive independent streams from it.
    pub seed: u64,
    /// Publisher factory injected into every session.
    pub factory: Arc<dyn PublisherFactory>,
}

impl SimulationPlan {
    /// Build a plan from loaded configuration and a publisher factory.
    pub fn from_config(config: &AppConfig, factory: Arc<dyn PublisherFactory>) -> Self {
        Self {
            roster: config.devices.clone(),
            ranges: config.sensors.clone(),
            interval: config.send.interval,
            publish_timeout: config.send.publish_timeout,
            sensor_type: config.send.sensor_type.clone(),
            grace_period: config.supervisor.grace_period,
            seed: config.supervisor.random_seed,
            factory,
        }
    }
}

/// Errors preventing a simulation run from starting.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Every roster entry was filtered out as unconfigured.
    #[error("no active devices in roster ({} skipped); check device connection strings", skipped.len())]
    NoActiveDevices {
        /// Devices excluded for placeholder credentials.
        skipped: Vec<String>,
    },
}

/// Aggregated outcome of a simulation run.
#[derive(Debug)]
pub struct SimulationReport {
    /// Terminal report per started session, in completion order.
    pub sessions: Vec<SessionReport>,
    /// Devices excluded before start for placeholder credentials.
    pub skipped: Vec<String>,
    /// Whether the run ended through the external shutdown signal.
    pub interrupted: bool,
    /// Sessions aborted because they missed the shutdown grace period.
    pub aborted: Vec<String>,
}

impl SimulationReport {
    /// Look up the report for one device.
    pub fn session(&self, device_id: &str) -> Option<&SessionReport> {
        self.sessions
            .iter()
            .find(|report| report.device_id == device_id)
    }

    /// Whether any session failed for a non-configuration reason, or had
    /// to be aborted during shutdown. Drives the process exit code.
    pub fn has_unexpected_failures(&self) -> bool {
        if !self.aborted.is_empty() {
            return true;
        }
        self.sessions
            .iter()
            .any(|report| report.error().is_some_and(|err| !err.is_configuration()))
    }
}

/// Starts one session per active device and supervises them to completion.
#[derive(Debug, Default)]
pub struct SimulationSupervisor;

impl SimulationSupervisor {
    /// Run the simulation until every session reaches a terminal state or
    /// `shutdown` resolves, whichever comes first.
    ///
    /// On shutdown, cancellation is broadcast to every running session and
    /// the supervisor waits out the grace period before aborting stragglers.
    /// A failed session never cancels its siblings.
    pub async fn run(
        plan: SimulationPlan,
        shutdown: impl Future<Output = ()>,
    ) -> Result<SimulationReport, SupervisorError> {
        let mut skipped = Vec::new();
        let mut active = Vec::new();
        for (device_id, device) in &plan.roster {
            if device.is_configured() {
                active.push((device_id.clone(), device.connection.clone()));
            } else {
                warn!(device = %device_id, "skipping device without usable credentials");
                skipped.push(device_id.clone());
            }
        }
        if active.is_empty() {
            return Err(SupervisorError::NoActiveDevices { skipped });
        }

        let ranges = Arc::new(plan.ranges.clone());
        let (cancel_tx, _) = broadcast::channel(1);
        let mut tasks = JoinSet::new();
        let active_ids: Vec<String> = active.iter().map(|(id, _)| id.clone()).collect();

        for (index, (device_id, connection)) in active.into_iter().enumerate() {
            let spec = SessionSpec {
                device_id,
                connection,
                ranges: ranges.clone(),
                factory: plan.factory.clone(),
                interval: plan.interval,
                publish_timeout: plan.publish_timeout,
                sensor_type: plan.sensor_type.clone(),
                // Independent stream per session; wrapping keeps the
                // derivation total for any base seed.
                seed: plan.seed.wrapping_add(index as u64),
            };
            tasks.spawn(run_session(spec, cancel_tx.subscribe()));
        }
        info!(
            sessions = tasks.len(),
            skipped = skipped.len(),
            interval_secs = plan.interval.as_secs_f64(),
            "simulation started"
        );

        let mut sessions: Vec<SessionReport> = Vec::new();
        let mut interrupted = false;
        tokio::pin!(shutdown);

        while !tasks.is_empty() {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(report)) => {
                        observe(&report);
                        sessions.push(report);
                    }
                    Some(Err(err)) => error!(error = %err, "session task panicked"),
                    None => break,
                },
                _ = &mut shutdown => {
                    interrupted = true;
                    info!(running = tasks.len(), "shutdown requested; cancelling sessions");
                    let _ = cancel_tx.send(());
                    break;
                }
            }
        }

        let mut aborted = Vec::new();
        if interrupted {
            let deadline = Instant::now() + plan.grace_period;
            while !tasks.is_empty() {
                match timeout_at(deadline, tasks.join_next()).await {
                    Ok(Some(Ok(report))) => {
                        observe(&report);
                        sessions.push(report);
                    }
                    Ok(Some(Err(err))) => error!(error = %err, "session task panicked"),
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            remaining = tasks.len(),
                            grace_secs = plan.grace_period.as_secs_f64(),
                            "grace period elapsed; aborting remaining sessions"
                        );
                        tasks.abort_all();
                        while let Some(joined) = tasks.join_next().await {
                            if let Ok(report) = joined {
                                observe(&report);
                                sessions.push(report);
                            }
                        }
                        break;
                    }
                }
            }
            aborted = active_ids
                .into_iter()
                .filter(|id| !sessions.iter().any(|report| report.device_id == *id))
                .collect();
        }

        info!(
            finished = sessions.len(),
            aborted = aborted.len(),
            interrupted,
            "simulation complete"
        );
        Ok(SimulationReport {
            sessions,
            skipped,
            interrupted,
            aborted,
        })
    }
}

fn observe(report: &SessionReport) {
    match report.error() {
        None => info!(device = %report.device_id, cycles = report.cycles, "session finished cleanly"),
        Some(error) => warn!(device = %report.device_id, cycles = report.cycles, %error, "session finished with failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use icewatch_common::DeviceConfig;
    use icewatch_publish::{FailurePlan, MemoryPublisherFactory, PublishError};
    use std::future::pending;

    fn device(connection: &str) -> DeviceConfig {
        DeviceConfig {
            connection: connection.to_owned(),
            description: None,
        }
    }

    fn configured(id: &str) -> DeviceConfig {
        device(&format!(
            "HostName=hub.local;DeviceId={id};SharedAccessKey=c2VjcmV0"
        ))
    }

    fn plan_with(factory: Arc<MemoryPublisherFactory>, roster: Roster) -> SimulationPlan {
        let mut ranges = IndexMap::new();
        ranges.insert("IceThickness".to_owned(), SensorRange::new(28.0, 35.0));
        SimulationPlan {
            roster,
            ranges,
            interval: Duration::from_millis(15),
            publish_timeout: Duration::from_millis(500),
            sensor_type: "skateway".to_owned(),
            grace_period: Duration::from_secs(2),
            seed: 0x1CE0,
            factory,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_failing_device_never_disturbs_its_siblings() {
        let factory = Arc::new(MemoryPublisherFactory::new());
        factory.set_plan(
            "fifth-avenue",
            FailurePlan::publish_failure(2, PublishError::ConnectionLost("reset".into())),
        );
        let mut roster = Roster::new();
        roster.insert("dows-lake".to_owned(), configured("dows-lake"));
        roster.insert("fifth-avenue".to_owned(), configured("fifth-avenue"));
        roster.insert("nac".to_owned(), configured("nac"));

        let shutdown = tokio::time::sleep(Duration::from_millis(150));
        let report = SimulationSupervisor::run(plan_with(factory.clone(), roster), shutdown)
            .await
            .expect("run starts");

        let failed = report.session("fifth-avenue").expect("session reported");
        assert!(matches!(
            failed.status,
            SessionStatus::Failed(crate::SessionError::Publish(_))
        ));
        assert_eq!(failed.cycles, 1);

        for survivor in ["dows-lake", "nac"] {
            let session = report.session(survivor).expect("session reported");
            assert!(session.is_clean(), "{survivor} must stop cleanly");
            assert!(
                session.cycles >= 3,
                "{survivor} kept cycling after the sibling failure (saw {})",
                session.cycles
            );
        }
        assert!(report.interrupted);
        assert!(report.aborted.is_empty());
        assert!(report.has_unexpected_failures());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_stops_every_session_within_the_grace_period() {
        let factory = Arc::new(MemoryPublisherFactory::new());
        let mut roster = Roster::new();
        for id in ["dows-lake", "fifth-avenue", "nac"] {
            roster.insert(id.to_owned(), configured(id));
        }

        let shutdown = tokio::time::sleep(Duration::from_millis(80));
        let started = std::time::Instant::now();
        let report = SimulationSupervisor::run(plan_with(factory.clone(), roster), shutdown)
            .await
            .expect("run starts");

        assert!(report.interrupted);
        assert_eq!(report.sessions.len(), 3);
        assert!(report.aborted.is_empty());
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "shutdown completed inside the grace period"
        );
        for id in ["dows-lake", "fifth-avenue", "nac"] {
            assert!(report.session(id).expect("session reported").is_clean());
            let probe = factory.probe(id).expect("publisher was acquired");
            assert_eq!(probe.close_calls(), 1, "{id} released its connection once");
        }
        assert!(!report.has_unexpected_failures());
    }

    #[tokio::test]
    async fn all_placeholder_roster_yields_no_active_devices() {
        let factory = Arc::new(MemoryPublisherFactory::new());
        let mut roster = Roster::new();
        roster.insert(
            "dows-lake".to_owned(),
            device("HostName=your-iot-hub.azure-devices.net;DeviceId=dows-lake;SharedAccessKey=..."),
        );
        roster.insert("nac".to_owned(), device(""));

        let err = SimulationSupervisor::run(plan_with(factory.clone(), roster), pending())
            .await
            .expect_err("must refuse to start");

        let SupervisorError::NoActiveDevices { skipped } = err;
        assert_eq!(skipped, ["dows-lake", "nac"]);
        assert!(factory.probe("dows-lake").is_none(), "no session started");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn placeholder_devices_are_skipped_but_reported() {
        let factory = Arc::new(MemoryPublisherFactory::new());
        let mut roster = Roster::new();
        roster.insert("dows-lake".to_owned(), configured("dows-lake"));
        roster.insert(
            "nac".to_owned(),
            device("HostName=your-iot-hub.azure-devices.net;DeviceId=nac;SharedAccessKey=..."),
        );

        let shutdown = tokio::time::sleep(Duration::from_millis(60));
        let report = SimulationSupervisor::run(plan_with(factory.clone(), roster), shutdown)
            .await
            .expect("run starts");

        assert_eq!(report.skipped, ["nac"]);
        assert_eq!(report.sessions.len(), 1);
        assert!(report.session("dows-lake").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn all_sessions_failing_ends_the_run_without_shutdown() {
        let factory = Arc::new(MemoryPublisherFactory::new());
        for id in ["dows-lake", "nac"] {
            factory.set_plan(
                id,
                FailurePlan::publish_failure(1, PublishError::Rejected("quota".into())),
            );
        }
        let mut roster = Roster::new();
        roster.insert("dows-lake".to_owned(), configured("dows-lake"));
        roster.insert("nac".to_owned(), configured("nac"));

        // Shutdown never fires; the run ends because every session died.
        let report = SimulationSupervisor::run(plan_with(factory, roster), pending())
            .await
            .expect("run starts");

        assert!(!report.interrupted);
        assert_eq!(report.sessions.len(), 2);
        assert!(report.sessions.iter().all(|s| !s.is_clean()));
        assert!(report.has_unexpected_failures());
    }
}
