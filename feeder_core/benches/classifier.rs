use criterion::{Criterion, black_box, criterion_group, criterion_main};
use feeder_core::{LineBuffer, classify};

// A capture-like stream: mostly readings, some status chatter.
fn synth_stream(lines: usize) -> String {
    let mut out = String::new();
    for i in 0..lines {
        let line = match i % 6 {
            0 => format!("Weight: {:.1}g", 100.0 + (i % 50) as f64),
            1 => format!("Distance: {:.1} cm", 3.0 + (i % 12) as f64),
            2 => "Status: OK".to_string(),
            3 => "Feeding for 5 seconds".to_string(),
            4 => "Ultrasonic timeout".to_string(),
            _ => "W: not-a-number".to_string(),
        };
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

fn bench_classify(c: &mut Criterion) {
    let stream = synth_stream(1_000);
    let lines: Vec<&str> = stream.lines().collect();

    c.bench_function("classify_1000_lines", |b| {
        b.iter(|| {
            for l in &lines {
                black_box(classify(black_box(l)));
            }
        })
    });

    c.bench_function("line_buffer_split_chunks", |b| {
        b.iter(|| {
            let mut buf = LineBuffer::new();
            let mut n = 0;
            for chunk in stream.as_bytes().chunks(64) {
                n += buf.push(chunk).len();
            }
            black_box(n)
        })
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
