//! # Threshold-Based Selector
//!
//! Picks a quality level from the throughput history alone. The history
//! mean `tavg` and an index-weighted dispersion give a mixing weight
//!
//! ```text
//!   p = tavg / (tavg + dispersion)
//!   T = (1 − p) · max(history)      ceiling
//!   θ = p · min(history)            floor
//! ```
//!
//! and the level nearest to `T + θ` is chosen. A steady link (zero
//! dispersion) gives `p = 1` and the band collapses onto the minimum
//! sample; a noisy link pulls weight toward the maximum.

use tracing::{debug, warn};

use crate::config::{RetentionPolicy, ThresholdConfig};
use crate::manifest::QualityLevels;
use crate::throughput::ThroughputTracker;

/// Outcome of one threshold decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDecision {
    /// Index into the quality levels.
    pub index: usize,
    /// `T + θ`, the rate the chosen level is nearest to.
    pub target_bps: f64,
    /// Mixing weight `p`.
    pub weight: f64,
    /// True when a numeric guard forced the lowest level.
    pub degenerate: bool,
}

impl ThresholdDecision {
    fn lowest() -> Self {
        ThresholdDecision {
            index: 0,
            target_bps: 0.0,
            weight: 0.0,
            degenerate: true,
        }
    }
}

/// Variant A decision state. Holds nothing but its tuning: the history
/// lives in the engine's [`ThroughputTracker`].
#[derive(Debug, Clone, Default)]
pub struct ThresholdSelector {
    retention: RetentionPolicy,
}

impl ThresholdSelector {
    pub fn new(config: &ThresholdConfig) -> Self {
        ThresholdSelector {
            retention: config.retention,
        }
    }

    /// Apply retention to `history`, then choose a level.
    pub fn select(
        &self,
        history: &mut ThroughputTracker,
        levels: &QualityLevels,
    ) -> ThresholdDecision {
        history.retain(self.retention);

        let (Some(tavg), Some(max), Some(min)) = (history.mean(), history.max(), history.min())
        else {
            warn!("threshold selector has no throughput history, using lowest quality");
            return ThresholdDecision::lowest();
        };
        let dispersion = history.dispersion(tavg).unwrap_or(0.0);

        let denom = tavg + dispersion;
        if !(denom.is_finite() && denom > 0.0) {
            warn!(tavg, dispersion, "degenerate throughput history, using lowest quality");
            return ThresholdDecision::lowest();
        }

        let weight = tavg / denom;
        let ceiling = (1.0 - weight) * max;
        let floor = weight * min;
        let target_bps = ceiling + floor;
        let index = nearest_level(levels, target_bps);

        debug!(
            samples = history.len(),
            tavg,
            dispersion,
            weight,
            ceiling,
            floor,
            index,
            quality = levels.bitrate(index),
            "threshold decision"
        );

        ThresholdDecision {
            index,
            target_bps,
            weight,
            degenerate: false,
        }
    }
}

/// Index of the level nearest to `target`. Ties go to the lower level.
fn nearest_level(levels: &QualityLevels, target: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &q) in levels.as_slice().iter().enumerate() {
        let distance = (target - q as f64).abs();
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}
