//! # strata-abr
//!
//! Adaptive-bitrate decision core for segmented HTTP streaming.
//!
//! Given measured throughput and modelled buffer state, the engine picks
//! the quality level of every segment request and, with the PANDA
//! strategy, how long to wait before issuing the next one. Manifest
//! parsing, transport and the player are collaborators supplied by the
//! host.
//!
//! ## Crate structure
//!
//! - [`engine`] — Event contract, strategy dispatch, request/response state machine
//! - [`throughput`] — Request timing and throughput history
//! - [`threshold`] — Mean/dispersion band selector
//! - [`panda`] — PANDA probe-and-adapt estimator and request scheduler
//! - [`manifest`] — Quality levels and the manifest parser seam
//! - [`message`] — Transport request/response messages
//! - [`player`] — Player buffer seam
//! - [`config`] — TOML configuration
//! - [`stats`] — Serializable session statistics
//! - [`error`] — Error taxonomy
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use strata_abr::config::AbrConfig;
//! use strata_abr::engine::{AbrEngine, RateAdaptation};
//! use strata_abr::manifest::StaticManifest;
//! use strata_abr::message::{ManifestRequest, ManifestResponse, SegmentRequest};
//! use strata_abr::player::PlayerBuffer;
//!
//! let parser = StaticManifest::from_parts(vec![250_000, 1_000_000], 2, 1).unwrap();
//! let mut player = PlayerBuffer::new(30.0);
//! let mut engine = AbrEngine::new(&AbrConfig::default(), parser, &player).unwrap();
//!
//! engine.on_init();
//! let _req = engine.on_manifest_request(ManifestRequest::new("/live.mpd")).unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(2));
//! let resp = ManifestResponse::with_bit_length(Bytes::new(), 8_000);
//! engine.on_manifest_response(resp, &mut player).unwrap();
//!
//! let req = engine.on_segment_request(SegmentRequest::new(0)).unwrap();
//! assert!(req.quality_id().is_some());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod message;
pub mod panda;
pub mod player;
pub mod stats;
pub mod threshold;
pub mod throughput;

pub use config::{AbrConfig, RetentionPolicy, StrategyKind};
pub use engine::{AbrEngine, RateAdaptation};
pub use error::{AbrError, ErrorKind};
