//! ---
//! iw_section: "02-telemetry-generation"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Bounded-random telemetry generator."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use chrono::Utc;
use icewatch_common::SensorRange;
use indexmap::IndexMap;
use rand::prelude::*;

/// Produces synthetic sensor readings for one device.
///
/// Each session owns its own generator with an independent RNG stream, so
/// concurrent sessions never contend and seeded runs stay reproducible.
#[derive(Debug)]
pub struct TelemetryGenerator {
    rng: StdRng,
}

impl TelemetryGenerator {
    /// Generator with a deterministic stream, for seeded runs and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw one reading set for `location`.
    ///
    /// Every configured range yields a uniform value in `[min, max]` rounded
    /// to one decimal place; the measurement resolution is fixed. The
    /// timestamp is captured here, at emission time.
    pub fn generate(
        &mut self,
        location: &str,
        ranges: &IndexMap<String, SensorRange>,
    ) -> crate::TelemetryReading {
        let mut measurements = IndexMap::with_capacity(ranges.len());
        for (name, range) in ranges {
            let raw = self.rng.gen_range(range.min..=range.max);
            measurements.insert(name.clone(), round_tenths(raw));
        }
        crate::TelemetryReading {
            location: location.to_owned(),
            measurements,
            timestamp: Utc::now(),
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
