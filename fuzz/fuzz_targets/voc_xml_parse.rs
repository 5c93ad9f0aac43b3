//! Fuzz target for Pascal VOC XML decoding.

#![no_main]

use annoconv::ir::io_voc_xml::from_voc_xml_slice;
use annoconv::ir::{CategoryRegistry, DecodeOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let mut registry = CategoryRegistry::new();
    let _ = from_voc_xml_slice(data, &mut registry, &DecodeOptions::default());
});
