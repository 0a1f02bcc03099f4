#![no_main]
use feeder_core::LineBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|chunks: Vec<Vec<u8>>| {
    let mut buf = LineBuffer::new();
    for chunk in &chunks {
        for line in buf.push(chunk) {
            assert!(!line.contains(['\r', '\n']));
            assert!(!line.trim().is_empty());
        }
    }
    let _ = buf.take_tail();
});
