//! Per-symbol trading constraints.

use serde::{Deserialize, Serialize};

/// Trading constraints for one instrument, snapshotted from the terminal.
///
/// Fetched fresh for every validation; the server can change these at any
/// time, so they are never cached across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConstraints {
    /// Smallest tradable volume, in lots.
    pub volume_min: f64,
    /// Largest tradable volume, in lots.
    pub volume_max: f64,
    /// Volume grid step, in lots.
    pub volume_step: f64,
    /// Price of one point.
    pub point: f64,
    /// Freeze distance from market, in points.
    pub freeze_level: i64,
    /// Filling-mode capability bitmask.
    pub filling_capability: u32,
}

impl SymbolConstraints {
    /// Freeze distance expressed in price units.
    #[must_use]
    pub fn freeze_distance(&self) -> f64 {
        self.freeze_level as f64 * self.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_distance_scales_points() {
        let constraints = SymbolConstraints {
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            point: 0.0001,
            freeze_level: 10,
            filling_capability: 2,
        };
        assert!((constraints.freeze_distance() - 0.001).abs() < 1e-12);
    }
}
