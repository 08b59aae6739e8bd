//! Shared region access benchmarks

use amp::led::{ColorWord, NUM_LEDS};
use amp_shared_memory::{LedWriter, PhysicalMapping, RegionReader, Scanner};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tempfile::NamedTempFile;

const WINDOW: usize = 0x8000;
const OFFSET: usize = 0x7000;

fn open_writer(file: &NamedTempFile) -> LedWriter {
    file.as_file().set_len(WINDOW as u64).unwrap();
    let mapping = PhysicalMapping::open_at(file.path(), 0, WINDOW, OFFSET).unwrap();
    LedWriter::initialize(mapping, 50, ColorWord::OFF)
}

/// Single LED store and full-frame store
fn bench_led_writes(c: &mut Criterion) {
    let file = NamedTempFile::new().unwrap();
    let writer = open_writer(&file);

    c.bench_function("set_led", |b| {
        b.iter(|| writer.set_led(black_box(3), black_box(ColorWord::RED)).unwrap());
    });

    let mut scanner = Scanner::default();
    c.bench_function("set_leds_frame", |b| {
        b.iter(|| {
            let frame = scanner.next().unwrap_or([ColorWord::OFF; NUM_LEDS]);
            writer.set_leds(black_box(&frame)).unwrap();
        });
    });
}

/// Snapshot of every field
fn bench_snapshot(c: &mut Criterion) {
    let file = NamedTempFile::new().unwrap();
    file.as_file().set_len(WINDOW as u64).unwrap();
    let mapping = PhysicalMapping::open_at(file.path(), 0, WINDOW, OFFSET).unwrap();
    let reader = RegionReader::new(mapping.region());

    c.bench_function("region_snapshot", |b| {
        b.iter(|| black_box(reader.snapshot()));
    });
}

criterion_group!(benches, bench_led_writes, bench_snapshot);
criterion_main!(benches);
