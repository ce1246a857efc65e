//! ---
//! iw_section: "04-runtime-orchestration"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Session and supervisor runtime coordinating the device fleet."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
//! Concurrent telemetry runtime for the Icewatch simulator.
//!
//! One [`session`] task per active device, fanned out and joined by the
//! [`supervisor`]. Session failures stay local; a single broadcast
//! cancellation drives shutdown with a bounded grace period.

#![warn(missing_docs)]

pub mod error;
pub mod session;
pub mod supervisor;

pub use error::SessionError;
pub use session::{run_session, SessionReport, SessionSpec, SessionState, SessionStatus};
pub use supervisor::{SimulationPlan, SimulationReport, SimulationSupervisor, SupervisorError};
