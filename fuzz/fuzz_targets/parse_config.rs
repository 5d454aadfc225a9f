#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parse as TOML config - only attempt if valid UTF-8
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(cfg) = toml::from_str::<satbench_types::ConfigFile>(s) {
            if let Some(t) = cfg.defaults.timeout.as_deref() {
                let _ = humantime::parse_duration(t);
            }
        }
    }
});
