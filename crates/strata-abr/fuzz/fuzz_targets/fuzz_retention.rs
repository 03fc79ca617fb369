#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_abr::config::RetentionPolicy;

/// Fuzz retention token parsing. Parsed policies must survive a
/// Display → FromStr round trip.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(policy) = text.parse::<RetentionPolicy>() {
        let again: RetentionPolicy = policy.to_string().parse().unwrap();
        assert_eq!(policy, again);
    }
});
