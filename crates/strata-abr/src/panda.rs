//! # PANDA: Probe and Adapt
//!
//! Closed-loop bandwidth-share estimator with buffer-aware quantization
//! and request scheduling (Li et al., "Probe and Adapt: Rate Adaptation
//! for HTTP Video Streaming At Scale", 2014).
//!
//! ## Per round trip
//!
//! ```text
//!   x̂[n] = κ·(ω − max(0, x̂[n−1] − x̃[n−1] + ω))·max(T[n−1], t̂[n−1]) + x̂[n−1]
//! ```
//!
//! floored at the lowest quality level. `x̃` is the measured throughput,
//! `T` the measured round-trip time and `t̂` the scheduled one. The
//! estimate probes upward by at most `ω` per second and backs off in
//! proportion to `κ` once throughput stops keeping pace.
//!
//! ## Per segment decision
//!
//! 1. `ŷ[n]` = harmonic mean of the trailing bandshare window.
//! 2. `r[n]` = greatest level ≤ mean of the trailing `ŷ` window, shifted
//!    up by `⌊B[n−1] / B_min⌋` levels and clamped to the top.
//! 3. `t̂[n] = r[n]·τ / ŷ[n] + β·(B[n−1] − B_min)`.
//!
//! On the following response the buffer model advances:
//! `B[n] = max(0, B[n−1] + τ − t̂[n])`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PandaConfig;
use crate::error::{AbrError, Result};
use crate::manifest::{Manifest, QualityLevels};
use crate::player::PlayerState;

/// Outcome of one PANDA decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PandaDecision {
    /// Index into the quality levels.
    pub index: usize,
    /// Smoothed bandshare `ŷ[n]` (bits/sec).
    pub smoothed_bps: f64,
    /// Levels added by the buffer hysteresis (before clamping).
    pub buffer_shift: usize,
    /// Scheduled inter-request time `t̂[n]` (seconds, may be negative).
    pub target_interreq_secs: f64,
}

/// Variant B estimator state. Every sequence is append-only for the
/// lifetime of the session.
#[derive(Debug, Clone)]
pub struct PandaEstimator {
    config: PandaConfig,
    /// Segment duration τ in seconds. 1.0 until the manifest arrives.
    segment_duration: f64,
    /// Buffer level below which requests are accelerated (seconds).
    buffer_min: f64,
    /// Player buffer already converted from segments to seconds.
    buffer_rescaled: bool,

    // ─── Sequences ───
    /// Measured round-trip times T (seconds).
    interreq_time: Vec<f64>,
    /// Scheduled round-trip times t̂ (seconds), seeded with 0.
    target_interreq_time: Vec<f64>,
    /// Bandshare estimates x̂ (bits/sec).
    bandshare: Vec<f64>,
    /// Smoothed bandshare ŷ (bits/sec).
    smoothed: Vec<f64>,
    /// Chosen bitrates r (bits/sec).
    chosen: Vec<u64>,
    /// Buffer occupancy B (seconds), seeded with 0.
    buffer_duration: Vec<f64>,
}

impl PandaEstimator {
    /// `max_buffer_size` is the player's maximum buffer in segments.
    pub fn new(config: &PandaConfig, max_buffer_size: f64) -> Result<Self> {
        config.validate()?;
        let buffer_min = config.buffer_min_fraction * max_buffer_size;
        check_buffer_min(buffer_min)?;
        Ok(PandaEstimator {
            config: config.clone(),
            segment_duration: 1.0,
            buffer_min,
            buffer_rescaled: false,
            interreq_time: Vec::new(),
            target_interreq_time: vec![0.0],
            bandshare: Vec::new(),
            smoothed: Vec::new(),
            chosen: Vec::new(),
            buffer_duration: vec![0.0],
        })
    }

    // ─── Getters ────────────────────────────────────────────────────────

    pub fn segment_duration(&self) -> f64 {
        self.segment_duration
    }

    pub fn buffer_min(&self) -> f64 {
        self.buffer_min
    }

    pub fn bandshare(&self) -> &[f64] {
        &self.bandshare
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    pub fn chosen(&self) -> &[u64] {
        &self.chosen
    }

    pub fn buffer_duration(&self) -> &[f64] {
        &self.buffer_duration
    }

    pub fn target_interreq_time(&self) -> &[f64] {
        &self.target_interreq_time
    }

    /// How long the host should wait before issuing the next segment
    /// request: `max(0, t̂[n] − T[n])` for the latest completed segment.
    /// `None` before the first segment has been decided.
    pub fn next_request_delay(&self) -> Option<Duration> {
        if self.chosen.is_empty() {
            return None;
        }
        let target = *self.target_interreq_time.last()?;
        let actual = *self.interreq_time.last()?;
        let wait = target - actual;
        if wait.is_finite() && wait > 0.0 {
            Some(Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX))
        } else {
            Some(Duration::ZERO)
        }
    }

    // ─── Manifest ───────────────────────────────────────────────────────

    /// Rescale the player's maximum buffer from segments to seconds and
    /// derive `buffer_min` from it. Manifest reloads keep the first
    /// rescale.
    pub fn on_manifest(&mut self, manifest: &Manifest, player: &mut dyn PlayerState) -> Result<()> {
        self.segment_duration = manifest.segment_duration_secs();
        let rescaled = if self.buffer_rescaled {
            player.max_buffer_size()
        } else {
            let secs = player.max_buffer_size() * self.segment_duration;
            player.set_max_buffer_size(secs);
            self.buffer_rescaled = true;
            secs
        };

        let buffer_min = self.config.buffer_min_fraction * rescaled;
        check_buffer_min(buffer_min)?;
        self.buffer_min = buffer_min;

        info!(
            segment_duration = self.segment_duration,
            max_buffer = rescaled,
            buffer_min,
            "panda manifest loaded"
        );
        Ok(())
    }

    // ─── Step A: bandshare estimation ───────────────────────────────────

    /// Manifest round trip completed. The first estimate is the measured
    /// throughput itself (floored at the lowest level).
    pub fn on_manifest_round_trip(&mut self, elapsed: f64, throughput: f64, lowest: f64) {
        self.interreq_time.push(elapsed);
        self.update_bandshare(elapsed, throughput, lowest);
    }

    /// Segment round trip completed: advance the buffer model, then the
    /// bandshare estimate.
    pub fn on_segment_round_trip(&mut self, elapsed: f64, throughput: f64, lowest: f64) {
        let prev_buffer = self.buffer_duration.last().copied().unwrap_or(0.0);
        let target = self.target_interreq_time.last().copied().unwrap_or(0.0);
        let buffer = (prev_buffer + self.segment_duration - target).max(0.0);
        self.buffer_duration.push(buffer);

        self.interreq_time.push(elapsed);
        self.update_bandshare(elapsed, throughput, lowest);
    }

    fn update_bandshare(&mut self, elapsed: f64, throughput: f64, lowest: f64) {
        let prev = self.bandshare.last().copied().unwrap_or(throughput);
        let target = self.target_interreq_time.last().copied().unwrap_or(0.0);
        let next = bandshare_step(
            prev,
            throughput,
            elapsed.max(target),
            self.config.probe_inc,
            self.config.probe_conv,
        );
        let next = if next.is_finite() {
            next.max(lowest)
        } else {
            prev.max(lowest)
        };

        debug!(throughput, elapsed, bandshare = next, "panda bandshare update");
        self.bandshare.push(next);
    }

    // ─── Steps B–D: smooth, quantize, schedule ──────────────────────────

    pub fn decide(&mut self, levels: &QualityLevels) -> PandaDecision {
        let window = self.config.smoothing_window;

        // B: harmonic smoothing. The floor keeps every x̂ ≥ lowest > 0.
        let smoothed_bps = match harmonic_mean(trailing(&self.bandshare, window)) {
            Some(y) if y > 0.0 => y,
            _ => {
                warn!("no usable bandshare estimate, smoothing at lowest quality");
                levels.lowest() as f64
            }
        };
        self.smoothed.push(smoothed_bps);

        // C: quantize with buffer hysteresis
        let buffer = self.buffer_duration.last().copied().unwrap_or(0.0);
        let reference = mean(trailing(&self.smoothed, window)).unwrap_or(smoothed_bps);
        let base = levels.floor_index(reference);
        let buffer_shift = buffer_shift(buffer, self.buffer_min);
        let index = base.saturating_add(buffer_shift).min(levels.top_index());
        let quality = levels.bitrate(index);
        self.chosen.push(quality);

        // D: schedule
        let fetch_time = quality as f64 * self.segment_duration / smoothed_bps;
        let target_interreq_secs =
            fetch_time + self.config.buffer_convergence * (buffer - self.buffer_min);
        self.target_interreq_time.push(target_interreq_secs);

        debug!(
            smoothed = smoothed_bps,
            reference,
            buffer,
            buffer_shift,
            index,
            quality,
            target_interreq = target_interreq_secs,
            "panda decision"
        );

        PandaDecision {
            index,
            smoothed_bps,
            buffer_shift,
            target_interreq_secs,
        }
    }
}

fn check_buffer_min(buffer_min: f64) -> Result<()> {
    if buffer_min.is_finite() && buffer_min > 0.0 {
        Ok(())
    } else {
        Err(AbrError::InvalidBufferMin(buffer_min))
    }
}

/// One proportional-control step of the bandshare estimate (unfloored).
fn bandshare_step(prev: f64, throughput: f64, interval: f64, probe_inc: f64, probe_conv: f64) -> f64 {
    let shortfall = (prev - throughput + probe_inc).max(0.0);
    probe_conv * (probe_inc - shortfall) * interval + prev
}

fn buffer_shift(buffer: f64, buffer_min: f64) -> usize {
    let ratio = buffer / buffer_min;
    if ratio.is_nan() || ratio <= 0.0 {
        return 0;
    }
    // saturating float → int cast
    ratio.floor() as usize
}

fn trailing(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Harmonic mean; 0 if any value is 0, `None` if empty or negative.
fn harmonic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|&v| v < 0.0) {
        return None;
    }
    if values.iter().any(|&v| v == 0.0) {
        return Some(0.0);
    }
    let inv: f64 = values.iter().map(|v| 1.0 / v).sum();
    Some(values.len() as f64 / inv)
}
