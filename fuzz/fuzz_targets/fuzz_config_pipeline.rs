//! Fuzz target for pipeline configuration parsing.
//!
//! Every format must reject malformed input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tw_config::{validate_pipeline, ConfigFormat, PipelineConfig};

fuzz_target!(|data: &str| {
    for format in [ConfigFormat::Toml, ConfigFormat::Yaml, ConfigFormat::Json] {
        if let Ok(config) = PipelineConfig::parse_str(data, format) {
            let _ = validate_pipeline(&config);
            let _ = config.config_keys();
        }
    }
});
