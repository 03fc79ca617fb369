//! # Engine Statistics
//!
//! Point-in-time snapshot of an engine's decisions, for logging and JSON
//! export. Produced by [`AbrEngine::stats`](crate::engine::AbrEngine::stats).

use std::time::Duration;

use serde::Serialize;

use crate::config::StrategyKind;
use crate::engine::SessionPhase;

// ─── Engine Stats ───────────────────────────────────────────────────────────

/// Aggregate per-session statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Active decision strategy.
    pub strategy: StrategyKind,
    /// Position in the request/response cycle.
    pub phase: SessionPhase,
    /// Completed manifest round trips.
    pub manifest_round_trips: u64,
    /// Segment requests that received a quality decision.
    pub segments_requested: u64,
    /// Segment responses processed.
    pub segments_completed: u64,
    /// Decisions that changed quality from the previous segment.
    pub quality_switches: u64,
    /// Last chosen bitrate (bits/sec).
    pub last_quality_bps: Option<u64>,
    /// Last chosen quality index.
    pub last_quality_index: Option<usize>,
    /// Most recent throughput sample (bits/sec).
    pub last_throughput_bps: Option<f64>,
    /// Samples currently retained in the throughput history.
    pub history_len: usize,
    /// PANDA estimator state, when that strategy is active.
    pub panda: Option<PandaStats>,
}

impl EngineStats {
    /// Fraction of decisions that switched quality.
    pub fn switch_ratio(&self) -> f64 {
        if self.segments_requested <= 1 {
            0.0
        } else {
            self.quality_switches as f64 / (self.segments_requested - 1) as f64
        }
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ─── PANDA Stats ────────────────────────────────────────────────────────────

/// Latest values of the PANDA sequences.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PandaStats {
    /// Latest bandshare estimate x̂ (bits/sec).
    pub bandshare_bps: Option<f64>,
    /// Latest smoothed bandshare ŷ (bits/sec).
    pub smoothed_bps: Option<f64>,
    /// Modelled buffer occupancy (seconds).
    pub buffer_secs: f64,
    /// Buffer level below which requests are accelerated (seconds).
    pub buffer_min_secs: f64,
    /// Latest scheduled inter-request time (seconds).
    pub target_interreq_secs: Option<f64>,
    /// Suggested wait before the next segment request (ms).
    pub next_request_delay_ms: Option<u64>,
}
