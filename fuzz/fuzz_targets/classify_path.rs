#![no_main]

use libfuzzer_sys::fuzz_target;
use satbench_types::Category;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(class) = satbench_domain::classify(Path::new(s)) {
        assert!(!class.size_key.is_empty());
        if class.category == Category::Unsatisfiable {
            assert!(s.contains("unsatisfiable"));
        }
    }
});
