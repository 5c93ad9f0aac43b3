//! Fuzz target for polygon-text decoding and re-encoding.

#![no_main]

use annoconv::ir::io_polytext::{from_polytext_slice, from_polytext_str, to_polytext_string};
use annoconv::ir::{CategoryRegistry, DecodeOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let mut registry = CategoryRegistry::new();
    let Ok(image) = from_polytext_slice(data, &mut registry, &DecodeOptions::default()) else {
        return;
    };

    // Anything that decodes must survive its own encoding.
    let text = to_polytext_string(&image);
    let mut again = CategoryRegistry::new();
    let reparsed = from_polytext_str(&text, &mut again, &DecodeOptions::default())
        .expect("encoded polytext must decode");
    assert_eq!(reparsed.annotations().len(), image.annotations().len());
});
