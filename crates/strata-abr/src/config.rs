//! # Engine Configuration
//!
//! Configuration is an explicit value handed to the engine at
//! construction. It is read from TOML through a permissive
//! `#[serde(default)]` input layer and then resolved into a validated
//! [`AbrConfig`]; anything invalid is rejected before the first event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AbrError, Result};

pub const CONFIG_VERSION: u32 = 1;

// ─── Retention Policy ───────────────────────────────────────────────────────

/// How much throughput history the threshold selector keeps before it
/// computes its statistics.
///
/// Small windows react quickly to transient drops but make the chosen
/// quality oscillate; large windows are stable but carry stale samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Never drop samples.
    #[default]
    KeepAll,
    /// Once more than two samples exist, keep only the newest.
    KeepLastOne,
    /// Drop the oldest samples while more than `N` remain.
    KeepLast(usize),
}

impl FromStr for RetentionPolicy {
    type Err = AbrError;

    fn from_str(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        match trimmed {
            "keep-all" | "SMOOTHED" => return Ok(RetentionPolicy::KeepAll),
            "keep-last-one" | "LAST-SEGMENT" => return Ok(RetentionPolicy::KeepLastOne),
            _ => {}
        }
        let count = trimmed.strip_prefix("keep-last-").unwrap_or(trimmed);
        match count.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(RetentionPolicy::KeepLast(n)),
            _ => Err(AbrError::InvalidRetention(token.to_string())),
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::KeepAll => write!(f, "keep-all"),
            RetentionPolicy::KeepLastOne => write!(f, "keep-last-one"),
            RetentionPolicy::KeepLast(n) => write!(f, "keep-last-{n}"),
        }
    }
}

// ─── Strategy Selection ─────────────────────────────────────────────────────

/// Which decision strategy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Mean/dispersion band selector.
    Threshold,
    /// PANDA probe-and-adapt estimator with request scheduling.
    #[default]
    Panda,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Threshold => write!(f, "threshold"),
            StrategyKind::Panda => write!(f, "panda"),
        }
    }
}

// ─── Resolved Configuration ─────────────────────────────────────────────────

/// Threshold selector tuning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdConfig {
    /// History retention applied before every decision.
    pub retention: RetentionPolicy,
}

/// PANDA tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PandaConfig {
    /// Probing additive increase ω (bits/sec).
    pub probe_inc: f64,
    /// Probing convergence rate κ.
    pub probe_conv: f64,
    /// Buffer convergence coefficient β used by the request scheduler.
    pub buffer_convergence: f64,
    /// `buffer_min` as a fraction of the player's maximum buffer.
    pub buffer_min_fraction: f64,
    /// Trailing window used for smoothing and quantization.
    pub smoothing_window: usize,
}

impl Default for PandaConfig {
    fn default() -> Self {
        PandaConfig {
            probe_inc: 50_000.0,
            probe_conv: 1.9,
            buffer_convergence: 0.5,
            buffer_min_fraction: 0.25,
            smoothing_window: 5,
        }
    }
}

impl PandaConfig {
    pub fn validate(&self) -> Result<()> {
        positive("probe_inc", self.probe_inc)?;
        positive("probe_conv", self.probe_conv)?;
        positive("buffer_min_fraction", self.buffer_min_fraction)?;
        if !self.buffer_convergence.is_finite() || self.buffer_convergence < 0.0 {
            return Err(AbrError::InvalidParameter {
                name: "buffer_convergence",
                value: self.buffer_convergence,
            });
        }
        if self.smoothing_window == 0 {
            return Err(AbrError::InvalidParameter {
                name: "smoothing_window",
                value: 0.0,
            });
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AbrError::InvalidParameter { name, value })
    }
}

/// Complete, validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AbrConfig {
    pub version: u32,
    pub strategy: StrategyKind,
    pub threshold: ThresholdConfig,
    pub panda: PandaConfig,
}

impl Default for AbrConfig {
    fn default() -> Self {
        AbrConfig {
            version: CONFIG_VERSION,
            strategy: StrategyKind::default(),
            threshold: ThresholdConfig::default(),
            panda: PandaConfig::default(),
        }
    }
}

impl AbrConfig {
    /// Threshold selector with the given retention policy.
    pub fn threshold(retention: RetentionPolicy) -> Self {
        AbrConfig {
            strategy: StrategyKind::Threshold,
            threshold: ThresholdConfig { retention },
            ..Default::default()
        }
    }

    /// PANDA estimator with the given tuning.
    pub fn panda(panda: PandaConfig) -> Self {
        AbrConfig {
            strategy: StrategyKind::Panda,
            panda,
            ..Default::default()
        }
    }

    /// Check a programmatically built config. Only the active strategy's
    /// section is inspected.
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(AbrError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        match self.strategy {
            StrategyKind::Threshold => Ok(()),
            StrategyKind::Panda => self.panda.validate(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(AbrConfig::default());
        }
        let parsed: AbrConfigInput = toml::from_str(input)
            .map_err(|e| AbrError::InvalidConfig(format!("invalid config TOML: {e}")))?;
        parsed.resolve()
    }
}

// ─── TOML Input ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AbrConfigInput {
    pub version: u32,
    pub strategy: Option<StrategyKind>,
    pub threshold: ThresholdConfigInput,
    pub panda: PandaConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdConfigInput {
    pub retention: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PandaConfigInput {
    pub probe_inc: Option<f64>,
    pub probe_conv: Option<f64>,
    pub buffer_convergence: Option<f64>,
    pub buffer_min_fraction: Option<f64>,
    pub smoothing_window: Option<usize>,
}

impl AbrConfigInput {
    pub fn resolve(self) -> Result<AbrConfig> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };

        let retention = match self.threshold.retention {
            Some(token) => token.parse()?,
            None => RetentionPolicy::default(),
        };

        let defaults = PandaConfig::default();
        let panda = PandaConfig {
            probe_inc: self.panda.probe_inc.unwrap_or(defaults.probe_inc),
            probe_conv: self.panda.probe_conv.unwrap_or(defaults.probe_conv),
            buffer_convergence: self
                .panda
                .buffer_convergence
                .unwrap_or(defaults.buffer_convergence),
            buffer_min_fraction: self
                .panda
                .buffer_min_fraction
                .unwrap_or(defaults.buffer_min_fraction),
            smoothing_window: self
                .panda
                .smoothing_window
                .unwrap_or(defaults.smoothing_window),
        };

        let config = AbrConfig {
            version,
            strategy: self.strategy.unwrap_or_default(),
            threshold: ThresholdConfig { retention },
            panda,
        };
        config.validate()?;
        Ok(config)
    }
}
