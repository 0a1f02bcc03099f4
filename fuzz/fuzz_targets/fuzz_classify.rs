#![no_main]
use feeder_core::{TelemetryKind, classify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    let t = classify(line);
    match t.kind {
        TelemetryKind::WeightReading(g) => assert!(g.is_finite()),
        TelemetryKind::Distance { cm, .. } => assert!(cm.is_finite() && cm > 0.0),
        _ => {}
    }
    let _ = t.throttle_key();
});
