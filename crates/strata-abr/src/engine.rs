//! # Rate Adaptation Engine
//!
//! The event contract between transport, player and decision strategy.
//! Hooks are invoked synchronously in strict alternation:
//!
//! ```text
//!   on_init
//!     │
//!   Idle ──manifest req──▶ ManifestInFlight ──manifest resp──▶ Ready
//!                                                             │  ▲
//!                                                  segment req│  │segment resp
//!                                                             ▼  │
//!                                                       SegmentInFlight
//!     │
//!   on_shutdown ──▶ Closed
//! ```
//!
//! Each request hook stamps the request timer; each response hook turns
//! the elapsed time and the response's bit length into a throughput
//! sample. Segment requests additionally run the active [`Strategy`] and
//! write the chosen bitrate into the outgoing message.

use std::time::Duration;

use quanta::Clock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AbrConfig, StrategyKind};
use crate::error::{AbrError, Result};
use crate::manifest::{ManifestParser, QualityLevels};
use crate::message::{ManifestRequest, ManifestResponse, SegmentRequest, SegmentResponse};
use crate::panda::PandaEstimator;
use crate::player::PlayerState;
use crate::stats::{saturating_millis, EngineStats, PandaStats};
use crate::threshold::ThresholdSelector;
use crate::throughput::{RequestTimer, ThroughputTracker};

// ─── Event Contract ─────────────────────────────────────────────────────────

/// The six hooks a rate adaptation algorithm answers.
///
/// Request/response hooks take the message by value and return it for
/// forwarding (down for requests, up for responses).
pub trait RateAdaptation {
    /// Session start. Resource setup only.
    fn on_init(&mut self) {}

    fn on_manifest_request(&mut self, msg: ManifestRequest) -> Result<ManifestRequest>;

    fn on_manifest_response(
        &mut self,
        msg: ManifestResponse,
        player: &mut dyn PlayerState,
    ) -> Result<ManifestResponse>;

    fn on_segment_request(&mut self, msg: SegmentRequest) -> Result<SegmentRequest>;

    fn on_segment_response(&mut self, msg: SegmentResponse) -> Result<SegmentResponse>;

    /// Session end. Resource teardown only.
    fn on_shutdown(&mut self) {}
}

// ─── Session Phase ──────────────────────────────────────────────────────────

/// Position in the request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// Manifest requested, response pending.
    ManifestInFlight,
    /// Manifest loaded, no segment outstanding.
    Ready,
    /// Segment requested, response pending.
    SegmentInFlight,
    /// Shut down. Every further hook is rejected.
    Closed,
}

// ─── Strategy ───────────────────────────────────────────────────────────────

/// The interchangeable decision algorithms.
#[derive(Debug, Clone)]
pub enum Strategy {
    Threshold(ThresholdSelector),
    Panda(PandaEstimator),
}

impl Strategy {
    /// Build the strategy named by `config`. `max_buffer_size` is the
    /// player's maximum buffer (segments) at construction time.
    pub fn from_config(config: &AbrConfig, max_buffer_size: f64) -> Result<Self> {
        config.validate()?;
        Ok(match config.strategy {
            StrategyKind::Threshold => Strategy::Threshold(ThresholdSelector::new(&config.threshold)),
            StrategyKind::Panda => Strategy::Panda(PandaEstimator::new(&config.panda, max_buffer_size)?),
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Threshold(_) => StrategyKind::Threshold,
            Strategy::Panda(_) => StrategyKind::Panda,
        }
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// One streaming session's decision core.
pub struct AbrEngine {
    parser: Box<dyn ManifestParser>,
    strategy: Strategy,
    phase: SessionPhase,

    timer: RequestTimer,
    history: ThroughputTracker,
    levels: Option<QualityLevels>,

    // ─── Counters ───
    manifest_round_trips: u64,
    segments_requested: u64,
    segments_completed: u64,
    quality_switches: u64,
    last_index: Option<usize>,
}

impl AbrEngine {
    /// Engine on the system monotonic clock.
    pub fn new(
        config: &AbrConfig,
        parser: impl ManifestParser + 'static,
        player: &dyn PlayerState,
    ) -> Result<Self> {
        Self::with_clock(config, parser, player, Clock::new())
    }

    /// Engine on an explicit clock (`Clock::mock()` in tests and replays).
    pub fn with_clock(
        config: &AbrConfig,
        parser: impl ManifestParser + 'static,
        player: &dyn PlayerState,
        clock: Clock,
    ) -> Result<Self> {
        let strategy = Strategy::from_config(config, player.max_buffer_size())?;
        Ok(AbrEngine {
            parser: Box::new(parser),
            strategy,
            phase: SessionPhase::Idle,
            timer: RequestTimer::new(clock),
            history: ThroughputTracker::new(),
            levels: None,
            manifest_round_trips: 0,
            segments_requested: 0,
            segments_completed: 0,
            quality_switches: 0,
            last_index: None,
        })
    }

    // ─── Getters ────────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Quality levels from the last parsed manifest.
    pub fn quality_levels(&self) -> Option<&QualityLevels> {
        self.levels.as_ref()
    }

    pub fn history(&self) -> &ThroughputTracker {
        &self.history
    }

    /// Suggested wait before the next segment request. Only the PANDA
    /// strategy schedules requests.
    pub fn next_request_delay(&self) -> Option<Duration> {
        match &self.strategy {
            Strategy::Panda(panda) => panda.next_request_delay(),
            Strategy::Threshold(_) => None,
        }
    }

    pub fn stats(&self) -> EngineStats {
        let panda = match &self.strategy {
            Strategy::Panda(p) => Some(PandaStats {
                bandshare_bps: p.bandshare().last().copied(),
                smoothed_bps: p.smoothed().last().copied(),
                buffer_secs: p.buffer_duration().last().copied().unwrap_or(0.0),
                buffer_min_secs: p.buffer_min(),
                target_interreq_secs: if p.chosen().is_empty() {
                    None
                } else {
                    p.target_interreq_time().last().copied()
                },
                next_request_delay_ms: p.next_request_delay().map(saturating_millis),
            }),
            Strategy::Threshold(_) => None,
        };
        EngineStats {
            strategy: self.strategy.kind(),
            phase: self.phase,
            manifest_round_trips: self.manifest_round_trips,
            segments_requested: self.segments_requested,
            segments_completed: self.segments_completed,
            quality_switches: self.quality_switches,
            last_quality_bps: self
                .last_index
                .zip(self.levels.as_ref())
                .map(|(i, levels)| levels.bitrate(i)),
            last_quality_index: self.last_index,
            last_throughput_bps: self.history.last(),
            history_len: self.history.len(),
            panda,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase == SessionPhase::Closed {
            return Err(AbrError::SessionClosed);
        }
        Ok(())
    }

    /// Reject a response hook that does not answer the outstanding request.
    fn expect_in_flight(&self, expected: SessionPhase) -> Result<()> {
        if self.phase != expected {
            warn!(phase = ?self.phase, ?expected, "response hook out of order");
            return Err(AbrError::NoRequestInFlight);
        }
        Ok(())
    }

    /// Consume the request timestamp and return elapsed seconds.
    fn finish_round_trip(&mut self) -> Result<f64> {
        match self.timer.finish() {
            Ok(elapsed) => Ok(elapsed.as_secs_f64()),
            Err(e) => {
                warn!(phase = ?self.phase, error = %e, "response hook out of order");
                Err(e)
            }
        }
    }
}

impl RateAdaptation for AbrEngine {
    fn on_init(&mut self) {
        debug!(strategy = %self.strategy.kind(), "abr session started");
    }

    fn on_manifest_request(&mut self, msg: ManifestRequest) -> Result<ManifestRequest> {
        self.ensure_open()?;
        self.timer.start();
        self.phase = SessionPhase::ManifestInFlight;
        Ok(msg)
    }

    fn on_manifest_response(
        &mut self,
        msg: ManifestResponse,
        player: &mut dyn PlayerState,
    ) -> Result<ManifestResponse> {
        self.ensure_open()?;
        self.expect_in_flight(SessionPhase::ManifestInFlight)?;
        let elapsed = self.finish_round_trip()?;

        let manifest = self.parser.parse(msg.payload())?;
        if let Strategy::Panda(panda) = &mut self.strategy {
            panda.on_manifest(&manifest, player)?;
        }
        let levels = manifest.quality_levels;
        let lowest = levels.lowest() as f64;

        let throughput = self.history.record(msg.bit_length(), elapsed)?;
        if let Strategy::Panda(panda) = &mut self.strategy {
            panda.on_manifest_round_trip(elapsed, throughput, lowest);
        }

        info!(
            levels = ?levels.as_slice(),
            segment_duration = manifest.segment_duration as f64 / manifest.segment_timescale as f64,
            throughput,
            elapsed,
            "manifest loaded"
        );

        self.levels = Some(levels);
        self.manifest_round_trips += 1;
        self.phase = SessionPhase::Ready;
        Ok(msg)
    }

    fn on_segment_request(&mut self, mut msg: SegmentRequest) -> Result<SegmentRequest> {
        self.ensure_open()?;
        let levels = self.levels.as_ref().ok_or(AbrError::ManifestNotLoaded)?;

        let index = match &mut self.strategy {
            Strategy::Threshold(selector) => selector.select(&mut self.history, levels).index,
            Strategy::Panda(panda) => panda.decide(levels).index,
        };
        let quality = levels.bitrate(index);

        if self.last_index.is_some_and(|prev| prev != index) {
            self.quality_switches += 1;
        }
        self.last_index = Some(index);
        self.segments_requested += 1;

        debug!(segment = msg.segment, index, quality, "segment quality chosen");

        msg.set_quality_id(quality);
        self.timer.start();
        self.phase = SessionPhase::SegmentInFlight;
        Ok(msg)
    }

    fn on_segment_response(&mut self, msg: SegmentResponse) -> Result<SegmentResponse> {
        self.ensure_open()?;
        self.expect_in_flight(SessionPhase::SegmentInFlight)?;
        let lowest = self
            .levels
            .as_ref()
            .ok_or(AbrError::ManifestNotLoaded)?
            .lowest() as f64;
        let elapsed = self.finish_round_trip()?;
        let throughput = self.history.record(msg.bit_length(), elapsed)?;

        if let Strategy::Panda(panda) = &mut self.strategy {
            panda.on_segment_round_trip(elapsed, throughput, lowest);
        }

        self.segments_completed += 1;
        self.phase = SessionPhase::Ready;
        Ok(msg)
    }

    fn on_shutdown(&mut self) {
        debug!(
            segments = self.segments_completed,
            switches = self.quality_switches,
            "abr session finished"
        );
        self.phase = SessionPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PandaConfig, RetentionPolicy};
    use crate::manifest::StaticManifest;
    use crate::player::PlayerBuffer;
    use bytes::Bytes;
    use quanta::Mock;
    use std::sync::Arc;

    const LEVELS: [u64; 4] = [100_000, 500_000, 1_000_000, 2_000_000];

    fn parser() -> StaticManifest {
        StaticManifest::from_parts(LEVELS.to_vec(), 2, 1).unwrap()
    }

    fn engine(config: AbrConfig) -> (AbrEngine, PlayerBuffer, Arc<Mock>) {
        let player = PlayerBuffer::new(4.0);
        let (clock, mock) = Clock::mock();
        let engine = AbrEngine::with_clock(&config, parser(), &player, clock).unwrap();
        (engine, player, mock)
    }

    fn load_manifest(engine: &mut AbrEngine, player: &mut PlayerBuffer, mock: &Mock) {
        engine.on_manifest_request(ManifestRequest::new("/live.mpd")).unwrap();
        mock.increment(Duration::from_secs(1));
        engine
            .on_manifest_response(ManifestResponse::with_bit_length(Bytes::new(), 400_000), player)
            .unwrap();
    }

    // ─── Ordering ───────────────────────────────────────────────────────

    #[test]
    fn segment_before_manifest_is_rejected() {
        let (mut engine, _player, _mock) = engine(AbrConfig::default());
        assert_eq!(
            engine.on_segment_request(SegmentRequest::new(0)),
            Err(AbrError::ManifestNotLoaded)
        );
    }

    #[test]
    fn response_without_request_is_rejected() {
        let (mut engine, _player, _mock) = engine(AbrConfig::default());
        assert_eq!(
            engine.on_segment_response(SegmentResponse::new(0, 1_000)),
            Err(AbrError::NoRequestInFlight)
        );
    }

    #[test]
    fn segment_response_during_manifest_fetch_is_rejected() {
        for config in [
            AbrConfig::panda(PandaConfig::default()),
            AbrConfig::threshold(RetentionPolicy::KeepAll),
        ] {
            let (mut engine, _player, mock) = engine(config);
            engine.on_manifest_request(ManifestRequest::default()).unwrap();
            mock.increment(Duration::from_secs(1));

            assert_eq!(
                engine.on_segment_response(SegmentResponse::new(0, 400_000)),
                Err(AbrError::NoRequestInFlight)
            );
            assert_eq!(engine.phase(), SessionPhase::ManifestInFlight);
            assert!(engine.history().is_empty());
            let stats = engine.stats();
            assert_eq!(stats.segments_requested, 0);
            assert_eq!(stats.segments_completed, 0);
        }
    }

    #[test]
    fn manifest_response_during_segment_fetch_is_rejected() {
        let (mut engine, mut player, mock) = engine(AbrConfig::default());
        load_manifest(&mut engine, &mut player, &mock);
        engine.on_segment_request(SegmentRequest::new(0)).unwrap();
        mock.increment(Duration::from_millis(500));

        let resp = ManifestResponse::with_bit_length(Bytes::new(), 8_000);
        assert_eq!(
            engine.on_manifest_response(resp, &mut player),
            Err(AbrError::NoRequestInFlight)
        );
        assert_eq!(engine.phase(), SessionPhase::SegmentInFlight);
        assert_eq!(engine.history().len(), 1);

        // the outstanding segment still completes normally
        engine.on_segment_response(SegmentResponse::new(0, 200_000)).unwrap();
        assert_eq!(engine.stats().segments_completed, 1);
    }

    #[test]
    fn zero_elapsed_is_rejected() {
        let (mut engine, mut player, _mock) = engine(AbrConfig::default());
        engine.on_manifest_request(ManifestRequest::default()).unwrap();
        let err = engine
            .on_manifest_response(ManifestResponse::new(Bytes::new()), &mut player)
            .unwrap_err();
        assert!(matches!(err, AbrError::NonPositiveElapsed { .. }));
    }

    #[test]
    fn phases_follow_the_hooks() {
        let (mut engine, mut player, mock) = engine(AbrConfig::default());
        engine.on_init();
        assert_eq!(engine.phase(), SessionPhase::Idle);
        load_manifest(&mut engine, &mut player, &mock);
        assert_eq!(engine.phase(), SessionPhase::Ready);
        engine.on_segment_request(SegmentRequest::new(0)).unwrap();
        assert_eq!(engine.phase(), SessionPhase::SegmentInFlight);
        mock.increment(Duration::from_millis(500));
        engine.on_segment_response(SegmentResponse::new(0, 200_000)).unwrap();
        assert_eq!(engine.phase(), SessionPhase::Ready);
        engine.on_shutdown();
        assert_eq!(engine.phase(), SessionPhase::Closed);
        assert_eq!(
            engine.on_segment_request(SegmentRequest::new(1)),
            Err(AbrError::SessionClosed)
        );
    }

    // ─── Decisions ──────────────────────────────────────────────────────

    #[test]
    fn segment_request_carries_chosen_quality() {
        let (mut engine, mut player, mock) =
            engine(AbrConfig::threshold(RetentionPolicy::KeepAll));
        load_manifest(&mut engine, &mut player, &mock);
        let req = engine.on_segment_request(SegmentRequest::new(0)).unwrap();
        // single 400 kbps sample → nearest level 500 kbps
        assert_eq!(req.quality_id(), Some(500_000));
        assert_eq!(req.segment, 0);
    }

    #[test]
    fn threshold_strategy_leaves_player_alone() {
        let (mut engine, mut player, mock) =
            engine(AbrConfig::threshold(RetentionPolicy::KeepAll));
        load_manifest(&mut engine, &mut player, &mock);
        assert_eq!(player.max_buffer_size(), 4.0);
        assert_eq!(engine.next_request_delay(), None);
        assert!(engine.stats().panda.is_none());
    }

    #[test]
    fn panda_rescales_player_and_schedules() {
        let (mut engine, mut player, mock) = engine(AbrConfig::panda(PandaConfig::default()));
        load_manifest(&mut engine, &mut player, &mock);
        assert_eq!(player.max_buffer_size(), 8.0);

        let req = engine.on_segment_request(SegmentRequest::new(0)).unwrap();
        assert_eq!(req.quality_id(), Some(100_000));
        mock.increment(Duration::from_millis(500));
        engine.on_segment_response(SegmentResponse::new(0, 200_000)).unwrap();
        assert_eq!(engine.next_request_delay(), Some(Duration::ZERO));

        let stats = engine.stats();
        let panda = stats.panda.unwrap();
        assert_eq!(panda.buffer_min_secs, 2.0);
        assert!((panda.buffer_secs - 2.5).abs() < 1e-9);
        assert_eq!(stats.segments_completed, 1);
        assert_eq!(stats.history_len, 2);
    }

    #[test]
    fn quality_switches_are_counted() {
        let (mut engine, mut player, mock) =
            engine(AbrConfig::threshold(RetentionPolicy::KeepLastOne));
        load_manifest(&mut engine, &mut player, &mock);

        for (segment, bits) in [(0, 2_000_000), (1, 2_000_000), (2, 100_000)] {
            engine.on_segment_request(SegmentRequest::new(segment)).unwrap();
            mock.increment(Duration::from_secs(1));
            engine
                .on_segment_response(SegmentResponse::new(segment, bits))
                .unwrap();
        }
        engine.on_segment_request(SegmentRequest::new(3)).unwrap();

        // 500k → 1M → 2M (only the newest sample kept) → 500k
        let stats = engine.stats();
        assert_eq!(stats.segments_requested, 4);
        assert_eq!(stats.last_quality_bps, Some(500_000));
        assert_eq!(stats.quality_switches, 3);
    }

    #[test]
    fn invalid_panda_buffer_fails_construction() {
        let player = PlayerBuffer::new(0.0);
        let result = AbrEngine::new(&AbrConfig::panda(PandaConfig::default()), parser(), &player);
        assert!(matches!(result, Err(AbrError::InvalidBufferMin(_))));
    }
}
