#![no_main]

use libfuzzer_sys::fuzz_target;
use veredicto::dataset::{read_segment_lookup, Dataset};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as an experiment file must load or fail, never panic
    let _ = Dataset::from_reader(data, None);

    // Same bytes as a segment lookup
    let _ = read_segment_lookup(data, "country");
});
