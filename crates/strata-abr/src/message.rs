//! # Transport Messages
//!
//! The request/response pairs exchanged between the player, the engine
//! and the transport layer. Hooks take a message by value and hand it
//! back for forwarding, so a message is never forwarded twice.

use bytes::Bytes;

// ─── Manifest ───────────────────────────────────────────────────────────────

/// Outgoing manifest request. Forwarded unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRequest {
    pub uri: String,
}

impl ManifestRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        ManifestRequest { uri: uri.into() }
    }
}

/// Manifest response delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResponse {
    payload: Bytes,
    bit_length: u64,
}

impl ManifestResponse {
    /// Response whose bit length is the payload length.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let bit_length = payload.len() as u64 * 8;
        ManifestResponse {
            payload,
            bit_length,
        }
    }

    /// Response with an explicit transferred bit length (headers,
    /// compression and so on make it differ from the payload size).
    pub fn with_bit_length(payload: impl Into<Bytes>, bit_length: u64) -> Self {
        ManifestResponse {
            payload: payload.into(),
            bit_length,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn bit_length(&self) -> u64 {
        self.bit_length
    }
}

// ─── Segment ────────────────────────────────────────────────────────────────

/// Outgoing segment request. The engine writes the chosen quality into it
/// exactly once before it is forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentRequest {
    /// Segment sequence number.
    pub segment: u64,
    quality_id: Option<u64>,
}

impl SegmentRequest {
    pub fn new(segment: u64) -> Self {
        SegmentRequest {
            segment,
            quality_id: None,
        }
    }

    pub fn set_quality_id(&mut self, id: u64) {
        self.quality_id = Some(id);
    }

    /// Chosen bitrate, `None` until the engine has decided.
    pub fn quality_id(&self) -> Option<u64> {
        self.quality_id
    }
}

/// Segment response delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentResponse {
    pub segment: u64,
    bit_length: u64,
}

impl SegmentResponse {
    pub fn new(segment: u64, bit_length: u64) -> Self {
        SegmentResponse {
            segment,
            bit_length,
        }
    }

    pub fn bit_length(&self) -> u64 {
        self.bit_length
    }
}
