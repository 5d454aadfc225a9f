#![no_main]

use libfuzzer_sys::fuzz_target;
use satbench_types::Manifest;

fuzz_target!(|data: &[u8]| {
    let Ok(manifest) = serde_json::from_slice::<Manifest>(data) else {
        return;
    };
    for set in &manifest.sets {
        // Accepted names must stay single path components.
        if let Ok(dir) = set.size_dir() {
            assert!(!dir.contains('/') && dir != "..");
        }
        if let Ok(downloads) = set.downloads() {
            for d in downloads {
                assert!(!d.category.contains('/') && d.category != "..");
            }
        }
    }
});
