#![no_main]

use std::time::Duration;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use quanta::Clock;
use strata_abr::config::{AbrConfig, PandaConfig, RetentionPolicy};
use strata_abr::engine::{AbrEngine, RateAdaptation};
use strata_abr::manifest::StaticManifest;
use strata_abr::message::{ManifestRequest, ManifestResponse, SegmentRequest, SegmentResponse};
use strata_abr::player::PlayerBuffer;

const LEVELS: [u64; 5] = [200_000, 400_000, 800_000, 1_600_000, 3_200_000];

/// Fuzz the engine with arbitrary hook sequences.
///
/// Each 5-byte chunk is one event: an opcode byte followed by a u32
/// argument (bit length or clock advance in microseconds). Hooks arrive
/// in any order, so this target exercises:
/// - Out-of-order responses and requests before the manifest
/// - Zero elapsed time and zero bit lengths
/// - Both strategies and every retention policy
/// - Calls after shutdown
///
/// The engine must never panic and every quality it writes must come
/// from the manifest.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, ops)) = data.split_first() else {
        return;
    };
    let config = match selector % 4 {
        0 => AbrConfig::panda(PandaConfig::default()),
        1 => AbrConfig::threshold(RetentionPolicy::KeepAll),
        2 => AbrConfig::threshold(RetentionPolicy::KeepLastOne),
        _ => AbrConfig::threshold(RetentionPolicy::KeepLast(usize::from(selector >> 2) + 1)),
    };

    let mut player = PlayerBuffer::new(4.0);
    let (clock, mock) = Clock::mock();
    let parser = StaticManifest::from_parts(LEVELS.to_vec(), 2, 1).unwrap();
    let mut engine = AbrEngine::with_clock(&config, parser, &player, clock).unwrap();
    engine.on_init();

    let mut segment = 0u64;
    for chunk in ops.chunks_exact(5) {
        let arg = u32::from_le_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        match chunk[0] % 6 {
            0 => {
                let _ = engine.on_manifest_request(ManifestRequest::default());
            }
            1 => {
                let resp = ManifestResponse::with_bit_length(Bytes::new(), u64::from(arg));
                let _ = engine.on_manifest_response(resp, &mut player);
            }
            2 => {
                if let Ok(req) = engine.on_segment_request(SegmentRequest::new(segment)) {
                    let quality = req.quality_id().unwrap();
                    assert!(LEVELS.contains(&quality));
                    segment += 1;
                }
            }
            3 => {
                let _ = engine.on_segment_response(SegmentResponse::new(segment, u64::from(arg)));
            }
            4 => mock.increment(Duration::from_micros(u64::from(arg))),
            _ => engine.on_shutdown(),
        }
        let _ = engine.next_request_delay();
        let _ = engine.stats();
    }
});
