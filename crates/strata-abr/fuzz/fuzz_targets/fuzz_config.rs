#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_abr::config::AbrConfig;

/// Fuzz the TOML configuration loader.
///
/// Any document that loads must also validate: `from_toml_str` is the
/// only gate between operator input and the estimator.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = AbrConfig::from_toml_str(text) {
        assert!(config.validate().is_ok());
    }
});
