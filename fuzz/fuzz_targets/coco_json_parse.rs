//! Fuzz target for COCO JSON decoding.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use annoconv::ir::io_coco_json::from_coco_slice;
use annoconv::ir::{CategoryCreation, CategoryRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for an annotation file.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let mut registry = CategoryRegistry::new();
    let before = registry.len();
    if from_coco_slice(data, &mut registry, CategoryCreation::Allow).is_err() {
        assert_eq!(registry.len(), before, "failed decode must not register categories");
    }
});
