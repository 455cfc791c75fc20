#![no_main]

use libfuzzer_sys::fuzz_target;
use memlens::config::ExaminerConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Anything that parses has passed validation
        if let Ok(config) = ExaminerConfig::from_toml_str(input) {
            assert!(config.validate().is_ok());
        }
    }
});
