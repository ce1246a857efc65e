//! ---
//! iw_section: "02-telemetry-generation"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Telemetry reading model and generator exports."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
//! Synthetic telemetry generation for the Icewatch simulator.
//!
//! Every device session owns its own [`TelemetryGenerator`], so readings can
//! be produced concurrently without shared mutable state.

pub mod generator;
pub mod reading;

pub use generator::TelemetryGenerator;
pub use reading::TelemetryReading;
