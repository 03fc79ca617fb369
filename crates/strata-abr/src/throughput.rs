//! # Throughput Tracking
//!
//! Round-trip timing and the rolling history of measured link throughput
//! shared by both strategies.
//!
//! A sample is `bit_length / elapsed` for one completed request. Elapsed
//! time comes from a monotonic [`quanta::Clock`] started by the request
//! hook and read by the following response hook.

use std::collections::VecDeque;
use std::time::Duration;

use quanta::{Clock, Instant};

use crate::config::RetentionPolicy;
use crate::error::{AbrError, Result};

// ─── Request Timer ──────────────────────────────────────────────────────────

/// Timestamp of the single outstanding request.
///
/// Overwritten by every request hook and consumed by the next response
/// hook, so a response with no request in flight is detected.
#[derive(Debug, Clone)]
pub struct RequestTimer {
    clock: Clock,
    started_at: Option<Instant>,
}

impl RequestTimer {
    pub fn new(clock: Clock) -> Self {
        RequestTimer {
            clock,
            started_at: None,
        }
    }

    /// Record the current time as the request timestamp.
    pub fn start(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    /// Elapsed time since [`start`](Self::start), clearing the timestamp.
    pub fn finish(&mut self) -> Result<Duration> {
        let started = self.started_at.take().ok_or(AbrError::NoRequestInFlight)?;
        let elapsed = self.clock.now().duration_since(started);
        if elapsed.is_zero() {
            return Err(AbrError::NonPositiveElapsed { elapsed_secs: 0.0 });
        }
        Ok(elapsed)
    }
}

// ─── Throughput History ─────────────────────────────────────────────────────

/// Append-only throughput history (bits/sec), truncated from the front
/// only by a [`RetentionPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ThroughputTracker {
    samples: VecDeque<f64>,
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the sample for one completed round trip and return it.
    pub fn record(&mut self, bit_length: u64, elapsed_secs: f64) -> Result<f64> {
        if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
            return Err(AbrError::NonPositiveElapsed { elapsed_secs });
        }
        let bps = bit_length as f64 / elapsed_secs;
        self.samples.push_back(bps);
        Ok(bps)
    }

    /// Truncate the history according to `policy`.
    pub fn retain(&mut self, policy: RetentionPolicy) {
        match policy {
            RetentionPolicy::KeepAll => {}
            RetentionPolicy::KeepLastOne => {
                if self.samples.len() > 2 {
                    let drop = self.samples.len() - 1;
                    self.samples.drain(..drop);
                }
            }
            RetentionPolicy::KeepLast(n) => {
                while self.samples.len() > n {
                    self.samples.pop_front();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Index-weighted mean absolute deviation around `mean`:
    /// `Σ i·|s[i] − mean| / n`. Later samples weigh more.
    pub fn dispersion(&self, mean: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let weighted: f64 = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| i as f64 * (s - mean).abs())
            .sum();
        Some(weighted / self.samples.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(samples: &[f64]) -> ThroughputTracker {
        let mut t = ThroughputTracker::new();
        for &s in samples {
            // 1 s elapsed → sample equals bit length
            t.record(s as u64, 1.0).unwrap();
        }
        t
    }

    // ─── Request Timer ──────────────────────────────────────────────────

    #[test]
    fn timer_measures_mock_elapsed() {
        let (clock, mock) = Clock::mock();
        let mut timer = RequestTimer::new(clock);
        timer.start();
        mock.increment(Duration::from_millis(250));
        assert_eq!(timer.finish().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn finish_without_start_is_an_ordering_fault() {
        let (clock, _mock) = Clock::mock();
        let mut timer = RequestTimer::new(clock);
        assert_eq!(timer.finish(), Err(AbrError::NoRequestInFlight));
    }

    #[test]
    fn second_finish_is_an_ordering_fault() {
        let (clock, mock) = Clock::mock();
        let mut timer = RequestTimer::new(clock);
        timer.start();
        mock.increment(Duration::from_millis(10));
        timer.finish().unwrap();
        assert_eq!(timer.finish(), Err(AbrError::NoRequestInFlight));
    }

    #[test]
    fn zero_elapsed_rejected() {
        let (clock, _mock) = Clock::mock();
        let mut timer = RequestTimer::new(clock);
        timer.start();
        assert!(matches!(
            timer.finish(),
            Err(AbrError::NonPositiveElapsed { .. })
        ));
    }

    #[test]
    fn restart_overwrites_timestamp() {
        let (clock, mock) = Clock::mock();
        let mut timer = RequestTimer::new(clock);
        timer.start();
        mock.increment(Duration::from_secs(5));
        timer.start();
        mock.increment(Duration::from_secs(1));
        assert_eq!(timer.finish().unwrap(), Duration::from_secs(1));
    }

    // ─── Samples ────────────────────────────────────────────────────────

    #[test]
    fn record_divides_bits_by_elapsed() {
        let mut t = ThroughputTracker::new();
        assert_eq!(t.record(400_000, 1.0).unwrap(), 400_000.0);
        assert_eq!(t.record(1_000_000, 0.5).unwrap(), 2_000_000.0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.last(), Some(2_000_000.0));
    }

    #[test]
    fn record_rejects_non_positive_elapsed() {
        let mut t = ThroughputTracker::new();
        assert!(t.record(1, 0.0).is_err());
        assert!(t.record(1, -1.0).is_err());
        assert!(t.record(1, f64::NAN).is_err());
        assert!(t.is_empty());
    }

    #[test]
    fn zero_bits_is_a_valid_sample() {
        let mut t = ThroughputTracker::new();
        assert_eq!(t.record(0, 2.0).unwrap(), 0.0);
    }

    // ─── Statistics ─────────────────────────────────────────────────────

    #[test]
    fn empty_history_has_no_statistics() {
        let t = ThroughputTracker::new();
        assert_eq!(t.mean(), None);
        assert_eq!(t.dispersion(0.0), None);
        assert_eq!(t.min(), None);
        assert_eq!(t.max(), None);
    }

    #[test]
    fn mean_min_max() {
        let t = tracker_with(&[100.0, 300.0, 200.0]);
        assert_eq!(t.mean(), Some(200.0));
        assert_eq!(t.min(), Some(100.0));
        assert_eq!(t.max(), Some(300.0));
    }

    #[test]
    fn dispersion_is_index_weighted() {
        // |100-200|·0 + |300-200|·1 + |200-200|·2 = 100, / 3
        let t = tracker_with(&[100.0, 300.0, 200.0]);
        let d = t.dispersion(200.0).unwrap();
        assert!((d - 100.0 / 3.0).abs() < 1e-9);

        // Same values in a different order weigh differently
        let t = tracker_with(&[300.0, 200.0, 100.0]);
        let d = t.dispersion(200.0).unwrap();
        assert!((d - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn constant_history_has_zero_dispersion() {
        let t = tracker_with(&[1e6, 1e6, 1e6]);
        assert_eq!(t.dispersion(t.mean().unwrap()), Some(0.0));
    }

    // ─── Retention ──────────────────────────────────────────────────────

    #[test]
    fn keep_all_is_noop() {
        let mut t = tracker_with(&[1.0, 2.0, 3.0, 4.0]);
        t.retain(RetentionPolicy::KeepAll);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn keep_last_one_waits_for_three_samples() {
        let mut t = tracker_with(&[1.0, 2.0]);
        t.retain(RetentionPolicy::KeepLastOne);
        assert_eq!(t.len(), 2);

        let mut t = tracker_with(&[1.0, 2.0, 3.0, 4.0]);
        t.retain(RetentionPolicy::KeepLastOne);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![4.0]);
    }

    #[test]
    fn keep_last_n_drops_oldest() {
        let mut t = tracker_with(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        t.retain(RetentionPolicy::KeepLast(3));
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);

        t.retain(RetentionPolicy::KeepLast(10));
        assert_eq!(t.len(), 3);
    }
}
