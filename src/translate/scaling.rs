//! Per-station telemetry calibration.
//!
//! Stations announce `EQNS.` coefficients once and then send raw analog
//! readings. The latest set per station is kept for the life of the process.

use std::collections::HashMap;

/// Number of analog telemetry channels.
pub const CHANNELS: usize = 5;

/// Quadratic calibration `a*v^2 + b*v + c` for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ScalingEquation {
    /// Maps every reading to itself.
    pub const IDENTITY: ScalingEquation = ScalingEquation {
        a: 0.0,
        b: 1.0,
        c: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        self.a * raw.powi(2) + self.b * raw + self.c
    }
}

impl Default for ScalingEquation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Coefficients for all five channels of one station.
pub type ScalingSet = [ScalingEquation; CHANNELS];

/// Cache of the most recent [`ScalingSet`] announced by each station.
///
/// Unbounded: one entry per distinct station that ever sent equations.
#[derive(Debug, Default)]
pub struct TelemetryScalingStore {
    stations: HashMap<String, ScalingSet>,
}

impl TelemetryScalingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the station's set wholesale; channels are never merged.
    pub fn update(&mut self, station: impl Into<String>, set: ScalingSet) {
        self.stations.insert(station.into(), set);
    }

    pub fn lookup(&self, station: &str) -> Option<&ScalingSet> {
        self.stations.get(station)
    }

    /// Calibrated value of `raw` on `channel` (0-based), identity when unknown.
    pub fn scale(&self, station: Option<&str>, channel: usize, raw: f64) -> f64 {
        station
            .and_then(|s| self.lookup(s))
            .and_then(|set| set.get(channel))
            .unwrap_or(&ScalingEquation::IDENTITY)
            .apply(raw)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
