//! Log record codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ftlog_bench::{insert_record, payload};
use ftlog_core::wal::StillOpenInfo;
use ftlog_core::{BlockNum, FileNum, LogEntry, LogRecord, Lsn, TxnIdPair};

fn entry(record: LogRecord) -> LogEntry {
    LogEntry {
        lsn: Lsn::new(1_000_000),
        record,
    }
}

/// Benchmark encoding single records.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("comment", |b| {
        let e = entry(LogRecord::comment("checkpoint taken"));
        b.iter(|| black_box(black_box(&e).encode()));
    });

    group.bench_function("xstillopen", |b| {
        let e = entry(LogRecord::XStillOpen {
            xid: TxnIdPair::child(40, 2),
            parentxid: TxnIdPair::root(40),
            info: StillOpenInfo {
                rollentry_raw_count: 4096,
                open_filenums: (0..8).map(FileNum::new).collect(),
                force_fsync_on_commit: true,
                num_rollback_nodes: 3,
                num_rollentries: 120,
                spilled_rollback_head: BlockNum(7),
                spilled_rollback_tail: BlockNum(9),
                current_rollback: BlockNum::NONE,
            },
        });
        b.iter(|| black_box(black_box(&e).encode()));
    });

    for size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("enq_insert", size), size, |b, &size| {
            let e = entry(insert_record(7, 16, size));
            b.iter(|| black_box(black_box(&e).encode()));
        });
    }

    group.finish();
}

/// Benchmark decoding single records, including the CRC check.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("enq_insert", size), size, |b, &size| {
            let bytes = entry(insert_record(7, 16, size)).encode();
            b.iter(|| black_box(LogEntry::decode(black_box(&bytes)).unwrap()));
        });
    }

    group.bench_function("enq_insert_multiple", |b| {
        let bytes = entry(LogRecord::EnqInsertMultiple {
            src_filenum: FileNum::new(1),
            dest_filenums: (2..6).map(FileNum::new).collect(),
            xid: TxnIdPair::root(3),
            src_key: payload(24),
            src_val: payload(200),
        })
        .encode();
        b.iter(|| black_box(LogEntry::decode(black_box(&bytes)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
