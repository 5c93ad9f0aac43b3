//! Fuzz target for the polygon-text parser on arbitrary UTF-8.

#![no_main]

use annoconv::ir::io_polytext::fuzz_parse_polytext;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = fuzz_parse_polytext(data);
});
