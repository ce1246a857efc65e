//! ---
//! iw_section: "01-core-functionality"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Shared primitives and utilities for the simulator runtime."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
//! Core shared primitives for the Icewatch simulator workspace.
//! This crate exposes configuration loading, connection-string handling,
//! and logging setup consumed across the workspace.

pub mod config;
pub mod connstr;
pub mod logging;

pub use config::{
    AppConfig, DeviceConfig, LoggingConfig, Roster, SendConfig, SensorRange, SupervisorConfig,
};
pub use connstr::{ConnectionString, ConnectionStringError};
pub use logging::{init_tracing, LogFormat};
