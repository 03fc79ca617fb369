//! # Manifest Boundary
//!
//! The engine never reads manifest syntax itself. A [`ManifestParser`]
//! supplied by the host turns the raw payload into a [`Manifest`]: the
//! advertised quality levels plus the segment template timing.

use crate::error::{AbrError, Result};

// ─── Quality Levels ─────────────────────────────────────────────────────────

/// Encoding bitrates (bits/sec) advertised by the manifest.
///
/// Always non-empty and strictly increasing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLevels(Vec<u64>);

impl QualityLevels {
    /// Sort and deduplicate the parser's bitrates.
    pub fn new(mut bitrates: Vec<u64>) -> Result<Self> {
        if bitrates.is_empty() {
            return Err(AbrError::InvalidQualityLevels(
                "manifest advertises no representations".into(),
            ));
        }
        if bitrates.contains(&0) {
            return Err(AbrError::InvalidQualityLevels(
                "bitrate must be positive".into(),
            ));
        }
        bitrates.sort_unstable();
        bitrates.dedup();
        Ok(QualityLevels(bitrates))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bitrate at `index`, clamped to the top level.
    pub fn bitrate(&self, index: usize) -> u64 {
        self.0[index.min(self.0.len() - 1)]
    }

    pub fn lowest(&self) -> u64 {
        self.0[0]
    }

    pub fn top_index(&self) -> usize {
        self.0.len() - 1
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Index of the greatest level not exceeding `rate`, or 0 when even
    /// the lowest level is above it.
    pub fn floor_index(&self, rate: f64) -> usize {
        self.0
            .iter()
            .rposition(|&q| q as f64 <= rate)
            .unwrap_or(0)
    }
}

// ─── Manifest ───────────────────────────────────────────────────────────────

/// What the engine needs out of a parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub quality_levels: QualityLevels,
    /// Segment duration in timescale units.
    pub segment_duration: u64,
    /// Timescale units per second.
    pub segment_timescale: u64,
}

impl Manifest {
    pub fn new(
        quality_levels: QualityLevels,
        segment_duration: u64,
        segment_timescale: u64,
    ) -> Result<Self> {
        if segment_timescale == 0 {
            return Err(AbrError::InvalidManifest("segment timescale is zero".into()));
        }
        if segment_duration == 0 {
            return Err(AbrError::InvalidManifest("segment duration is zero".into()));
        }
        Ok(Manifest {
            quality_levels,
            segment_duration,
            segment_timescale,
        })
    }

    /// Real segment duration in seconds.
    pub fn segment_duration_secs(&self) -> f64 {
        self.segment_duration as f64 / self.segment_timescale as f64
    }
}

/// Manifest parser collaborator.
pub trait ManifestParser {
    fn parse(&self, payload: &[u8]) -> Result<Manifest>;
}

/// Parser that ignores the payload and always yields the same manifest.
///
/// For hosts that already hold a parsed manifest, and for replaying
/// recorded sessions.
#[derive(Debug, Clone)]
pub struct StaticManifest {
    manifest: Manifest,
}

impl StaticManifest {
    pub fn new(manifest: Manifest) -> Self {
        StaticManifest { manifest }
    }

    /// Convenience constructor from raw bitrates and timing.
    pub fn from_parts(bitrates: Vec<u64>, segment_duration: u64, timescale: u64) -> Result<Self> {
        let levels = QualityLevels::new(bitrates)?;
        Ok(StaticManifest::new(Manifest::new(
            levels,
            segment_duration,
            timescale,
        )?))
    }
}

impl ManifestParser for StaticManifest {
    fn parse(&self, _payload: &[u8]) -> Result<Manifest> {
        Ok(self.manifest.clone())
    }
}
