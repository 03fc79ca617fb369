//! ABR trace replay.
//!
//! Drives an [`AbrEngine`] through a recorded session on a mock clock and
//! prints one JSON line per segment decision followed by the final stats.
//!
//! ```toml
//! levels = [235000, 750000, 1750000, 4300000]
//! segment_duration = 4
//! timescale = 1
//! max_buffer = 15.0        # segments
//!
//! [[round_trip]]           # first entry is the manifest
//! bits = 80000
//! elapsed_ms = 120
//!
//! [[round_trip]]
//! bits = 1000000
//! elapsed_ms = 900
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::Parser;
use quanta::Clock;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use strata_abr::config::AbrConfig;
use strata_abr::engine::{AbrEngine, RateAdaptation};
use strata_abr::manifest::StaticManifest;
use strata_abr::message::{ManifestRequest, ManifestResponse, SegmentRequest, SegmentResponse};
use strata_abr::player::PlayerBuffer;
use strata_abr::stats::saturating_millis;

#[derive(Parser, Debug)]
#[command(name = "abr-replay", about = "Replay a throughput trace through the ABR engine")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded session (TOML).
    #[arg(long)]
    trace: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Trace {
    levels: Vec<u64>,
    segment_duration: u64,
    #[serde(default = "default_timescale")]
    timescale: u64,
    #[serde(default = "default_max_buffer")]
    max_buffer: f64,
    #[serde(rename = "round_trip")]
    round_trips: Vec<RoundTrip>,
}

fn default_timescale() -> u64 {
    1
}

fn default_max_buffer() -> f64 {
    60.0
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RoundTrip {
    bits: u64,
    elapsed_ms: u64,
}

/// One output line.
#[derive(Debug, Serialize)]
struct DecisionRecord {
    segment: u64,
    quality_bps: u64,
    throughput_bps: Option<f64>,
    next_request_delay_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            AbrConfig::from_toml_str(&text)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => AbrConfig::default(),
    };

    let text = std::fs::read_to_string(&cli.trace)
        .with_context(|| format!("reading trace {}", cli.trace.display()))?;
    let trace: Trace = toml::from_str(&text)
        .with_context(|| format!("parsing trace {}", cli.trace.display()))?;

    let Some((manifest_trip, segment_trips)) = trace.round_trips.split_first() else {
        bail!("trace has no round trips");
    };

    let parser = StaticManifest::from_parts(
        trace.levels.clone(),
        trace.segment_duration,
        trace.timescale,
    )
    .context("invalid manifest in trace")?;
    let mut player = PlayerBuffer::new(trace.max_buffer);
    let (clock, mock) = Clock::mock();
    let mut engine = AbrEngine::with_clock(&config, parser, &player, clock)?;

    tracing::info!(
        strategy = %config.strategy,
        levels = trace.levels.len(),
        segments = segment_trips.len(),
        "abr-replay starting"
    );

    engine.on_init();
    engine.on_manifest_request(ManifestRequest::new(cli.trace.display().to_string()))?;
    mock.increment(Duration::from_millis(manifest_trip.elapsed_ms));
    engine.on_manifest_response(
        ManifestResponse::with_bit_length(Bytes::new(), manifest_trip.bits),
        &mut player,
    )?;

    for (segment, trip) in (0u64..).zip(segment_trips) {
        let req = engine.on_segment_request(SegmentRequest::new(segment))?;
        let quality_bps = req
            .quality_id()
            .context("engine returned a segment request without a quality")?;

        mock.increment(Duration::from_millis(trip.elapsed_ms));
        engine
            .on_segment_response(SegmentResponse::new(segment, trip.bits))
            .with_context(|| format!("segment {segment}"))?;

        let record = DecisionRecord {
            segment,
            quality_bps,
            throughput_bps: engine.history().last(),
            next_request_delay_ms: engine.next_request_delay().map(saturating_millis),
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    engine.on_shutdown();
    println!("{}", serde_json::to_string(&engine.stats())?);
    Ok(())
}
