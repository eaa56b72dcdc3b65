//! Log writer, cursor and recovery benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ftlog_bench::{insert_record, populate_log};
use ftlog_core::{
    recover, CursorOptions, LogCursor, LogRecord, LogWriter, MemoryStore, NoopHooks,
    RecoveryConfig, TxnIdPair, WriterOptions,
};
use tempfile::TempDir;

const RECORDS: u64 = 10_000;

/// Benchmark appending records without syncing.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [64, 1024].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut writer = LogWriter::open(temp_dir.path(), WriterOptions::new()).unwrap();
            let record = insert_record(1, 16, size);

            b.iter(|| {
                let lsn = writer.append(black_box(&record)).unwrap();
                black_box(lsn);
            });
        });
    }

    group.finish();
}

fn scan(c: &mut Criterion, name: &str, backward: bool) {
    let mut group = c.benchmark_group(name);
    group.sample_size(20);
    group.throughput(Throughput::Elements(RECORDS));

    // One big file, and the same records over many small ones.
    for (label, max_file_size) in [("one_file", u64::MAX), ("1mb_files", 1 << 20)] {
        let temp_dir = TempDir::new().unwrap();
        populate_log(temp_dir.path(), RECORDS, 256, max_file_size);

        group.bench_function(label, |b| {
            b.iter(|| {
                let mut cursor = LogCursor::create(temp_dir.path(), CursorOptions::new()).unwrap();
                let mut count = 0u64;
                loop {
                    let read = if backward { cursor.prev() } else { cursor.next() };
                    match read {
                        Ok(entry) => {
                            black_box(entry.lsn);
                            count += 1;
                        }
                        Err(e) if e.is_end_of_log() => break,
                        Err(e) => panic!("scan failed: {e}"),
                    }
                }
                assert_eq!(count, RECORDS);
            });
        });
    }

    group.finish();
}

/// Benchmark a full forward scan.
fn bench_forward_scan(c: &mut Criterion) {
    scan(c, "forward_scan", false);
}

/// Benchmark a full backward scan.
fn bench_backward_scan(c: &mut Criterion) {
    scan(c, "backward_scan", true);
}

/// Benchmark recovery of a log with no checkpoint and one live transaction.
fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery");
    group.sample_size(10);

    group.bench_function("replay_10k_inserts", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let mut writer = LogWriter::open(temp_dir.path(), WriterOptions::new()).unwrap();
                writer
                    .append(&LogRecord::FCreate {
                        xid: TxnIdPair::NONE,
                        filenum: ftlog_core::FileNum::new(1),
                        iname: "bench.ft".to_string(),
                        mode: 0o644,
                        treeflags: 0,
                        nodesize: 4 << 20,
                        basementnodesize: 128 << 10,
                        compression_method: 0,
                    })
                    .unwrap();
                for xid in 1..=RECORDS / 100 {
                    writer
                        .append(&LogRecord::XBegin {
                            xid: TxnIdPair::root(xid),
                            parentxid: TxnIdPair::NONE,
                        })
                        .unwrap();
                }
                for seq in 0..RECORDS {
                    writer.append(&insert_record(seq, 16, 64)).unwrap();
                }
                writer.fsync().unwrap();
                temp_dir
            },
            |temp_dir| {
                let config = RecoveryConfig::new(temp_dir.path(), temp_dir.path().join("data"));
                let outcome = recover(&config, &mut MemoryStore::new(), &mut NoopHooks).unwrap();
                black_box(outcome);
            },
            criterion::BatchSize::PerIteration,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_forward_scan,
    bench_backward_scan,
    bench_recovery
);
criterion_main!(benches);
