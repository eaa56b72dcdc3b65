//! Cursor behaviour over real log directories.

use ftlog_core::wal::{LogFileName, LOG_VERSION};
use ftlog_core::{Direction, LogWriter, WriterOptions};
use ftlog_testkit::prelude::*;
use proptest::prelude::*;

fn lsn(read: Result<&LogEntry, CoreError>) -> u64 {
    read.expect("read failed").lsn.as_u64()
}

/// Writes `entries` over files as `layout` says and returns the fixture.
fn laid_out(entries: &[LogEntry], counts: &[usize], header_only: &[bool]) -> LogFixture {
    let log = LogFixture::new();
    let mut rest = entries;
    for (index, (&count, &with_header)) in counts.iter().zip(header_only).enumerate() {
        if count == 0 {
            log.empty_file(index as u64, with_header);
        } else {
            let (here, later) = rest.split_at(count);
            log.write_file(index as u64, here);
            rest = later;
        }
    }
    log
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn forward_and_backward_agree(
        (first, records, (counts, header_only)) in (1u64..1_000_000, records_strategy(40))
            .prop_flat_map(|(first, records)| {
                let len = records.len();
                (Just(first), Just(records), file_layout_strategy(len))
            })
    ) {
        let entries: Vec<LogEntry> = records
            .into_iter()
            .zip(first..)
            .map(|(record, lsn)| entry(lsn, record))
            .collect();
        let log = laid_out(&entries, &counts, &header_only);

        let forward = log.forward_entries();
        prop_assert_eq!(&forward, &entries);

        let mut backward = log.backward_entries();
        backward.reverse();
        prop_assert_eq!(&backward, &entries);
    }

    #[test]
    fn reversal_returns_the_previous_entry(
        (records, (counts, header_only), steps) in records_strategy(20)
            .prop_flat_map(|records| {
                let len = records.len();
                (Just(records), file_layout_strategy(len), 0..len)
            })
    ) {
        let entries: Vec<LogEntry> = records
            .into_iter()
            .zip(1u64..)
            .map(|(record, lsn)| entry(lsn, record))
            .collect();
        let log = laid_out(&entries, &counts, &header_only);

        let mut cursor = log.cursor();
        let mut at = lsn(cursor.first());
        for _ in 0..steps {
            at = lsn(cursor.next());
        }
        if at > 1 {
            prop_assert_eq!(lsn(cursor.prev()), at - 1);
            prop_assert_eq!(lsn(cursor.next()), at);
        } else {
            prop_assert!(cursor.prev().unwrap_err().is_end_of_log());
        }
    }
}

#[test]
fn empty_directory_has_no_log() {
    let log = LogFixture::new();
    let mut cursor = log.cursor();
    assert!(!cursor.log_exists());
    assert!(cursor.first().unwrap_err().is_end_of_log());
    assert!(cursor.last().unwrap_err().is_end_of_log());
    assert!(cursor.next().unwrap_err().is_end_of_log());
    assert!(cursor.prev().unwrap_err().is_end_of_log());
}

#[test]
fn only_empty_files_is_an_empty_log() {
    let log = LogFixture::new();
    log.empty_file(0, true);
    log.empty_file(1, false);

    let mut cursor = log.cursor();
    assert!(cursor.log_exists());
    assert!(cursor.next().unwrap_err().is_end_of_log());
    assert!(cursor.prev().unwrap_err().is_end_of_log());
}

#[test]
fn empty_files_around_records_are_skipped() {
    let log = LogFixture::new();
    log.empty_file(0, true);
    log.empty_file(1, false);
    log.write_file(2, &comments(1, &["hello0"]));
    log.write_file(3, &comments(2, &["hello1"]));
    log.empty_file(4, false);
    log.empty_file(5, true);

    let mut cursor = log.cursor();
    let first = cursor.next().unwrap();
    assert_eq!(comment_text(first).as_deref(), Some("hello0"));
    let second = cursor.next().unwrap();
    assert_eq!(comment_text(second).as_deref(), Some("hello1"));
    assert!(cursor.next().unwrap_err().is_end_of_log());

    let last = cursor.prev().unwrap();
    assert_eq!(comment_text(last).as_deref(), Some("hello1"));
    let before = cursor.prev().unwrap();
    assert_eq!(comment_text(before).as_deref(), Some("hello0"));
    assert!(cursor.prev().unwrap_err().is_end_of_log());
}

#[test]
fn reversal_across_an_empty_file() {
    let log = LogFixture::new();
    log.write_file(0, &comments(1, &["a", "b"]));
    log.empty_file(1, true);
    log.empty_file(2, false);
    log.write_file(3, &comments(3, &["c", "d"]));

    let mut cursor = log.cursor();
    assert_eq!(lsn(cursor.first()), 1);
    assert_eq!(lsn(cursor.next()), 2);
    assert_eq!(lsn(cursor.next()), 3);
    assert_eq!(lsn(cursor.prev()), 2);
    assert_eq!(lsn(cursor.prev()), 1);
    assert_eq!(lsn(cursor.next()), 2);
    assert_eq!(lsn(cursor.next()), 3);
    assert_eq!(lsn(cursor.next()), 4);
    assert!(cursor.next().unwrap_err().is_end_of_log());
}

#[test]
fn gap_between_files_is_a_sequence_error() {
    let log = LogFixture::new();
    log.write_file(0, &comments(1, &["a", "b"]));
    log.write_file(1, &comments(5, &["e"]));

    let mut cursor = log.cursor();
    assert_eq!(lsn(cursor.next()), 1);
    assert_eq!(lsn(cursor.next()), 2);
    match cursor.next() {
        Err(CoreError::SequenceError {
            direction: Direction::Forward,
            expected: 3,
            actual: 5,
        }) => {}
        other => panic!("unexpected {other:?}"),
    }
    // The failed read leaves the cursor unpositioned.
    assert!(cursor.current().is_none());

    assert_eq!(lsn(cursor.last()), 5);
    match cursor.prev() {
        Err(CoreError::SequenceError {
            direction: Direction::Backward,
            expected: 4,
            actual: 2,
        }) => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn first_and_last_do_not_check_adjacency() {
    let log = LogFixture::new();
    log.write_file(0, &comments(10, &["a"]));
    log.write_file(1, &comments(20, &["b"]));

    let mut cursor = log.cursor();
    assert_eq!(lsn(cursor.first()), 10);
    assert_eq!(lsn(cursor.last()), 20);
}

#[test]
fn unsupported_versions_are_rejected() {
    for version in [24, LOG_VERSION + 1] {
        let log = LogFixture::new();
        log.write_file_with_version(0, version, &comments(1, &["a"]));
        let mut cursor = log.cursor();
        assert!(cursor.first().unwrap_err().is_bad_format(), "version {version}");
        assert!(cursor.last().unwrap_err().is_bad_format(), "version {version}");
    }
}

#[test]
fn oldest_supported_version_is_read() {
    let log = LogFixture::new();
    log.write_file_with_version(0, 25, &comments(1, &["a"]));
    log.write_file(1, &comments(2, &["b"]));
    assert_eq!(log.forward_lsns(), vec![1, 2]);
}

#[test]
fn damaged_tail_is_repaired_once() {
    // Garbage after a complete record costs nothing; the other kinds of
    // damage lose the last record.
    for (damage, survivor) in [
        (TailDamage::Torn(3), 3),
        (TailDamage::Torn(12), 3),
        (TailDamage::Garbage(9), 4),
        (TailDamage::FlippedByte, 3),
    ] {
        let log = LogFixture::new();
        log.write_file(0, &comments(1, &["a"]));
        let path = log.write_file(1, &comments(2, &["b", "c", "d"]));
        damage_tail(&path, damage);

        let mut cursor = log.cursor();
        assert_eq!(lsn(cursor.last()), survivor, "{damage:?}");
        let repaired = file_len(&path);

        // A second repair finds nothing to cut.
        let mut cursor = log.cursor();
        assert_eq!(lsn(cursor.last()), survivor, "{damage:?}");
        assert_eq!(file_len(&path), repaired, "{damage:?}");
        let expected: Vec<u64> = (1..=survivor).collect();
        assert_eq!(log.forward_lsns(), expected, "{damage:?}");
    }
}

#[test]
fn damage_in_an_older_file_is_not_repaired() {
    let log = LogFixture::new();
    let older = log.write_file(0, &comments(1, &["a", "b"]));
    log.write_file(1, &comments(3, &["c"]));
    damage_tail(&older, TailDamage::FlippedByte);
    let len = file_len(&older);

    let mut cursor = log.cursor();
    assert_eq!(lsn(cursor.last()), 3);
    assert!(cursor.prev().unwrap_err().is_bad_format());
    assert_eq!(file_len(&older), len);
}

#[test]
fn forward_reads_do_not_repair() {
    let log = LogFixture::new();
    let path = log.write_file(0, &comments(1, &["a", "b"]));
    tear_tail(&path, 4);
    let len = file_len(&path);

    let mut cursor = log.cursor();
    assert_eq!(lsn(cursor.next()), 1);
    assert!(cursor.next().unwrap_err().is_bad_format());
    assert_eq!(file_len(&path), len);
}

#[test]
fn single_file_cursor() {
    let log = LogFixture::new();
    log.write_file(0, &comments(1, &["a", "b"]));
    log.write_file(1, &comments(3, &["c"]));

    let name = LogFileName::new(0, LOG_VERSION).format();
    let mut cursor =
        LogCursor::create_for_single_file(log.path(), &name, CursorOptions::new()).unwrap();
    assert_eq!(lsn(cursor.last()), 2);
    assert_eq!(lsn(cursor.prev()), 1);
    assert!(cursor.prev().unwrap_err().is_end_of_log());
    assert_eq!(lsn(cursor.first()), 1);
    assert_eq!(lsn(cursor.next()), 2);
    assert!(cursor.next().unwrap_err().is_end_of_log());

    let missing = LogFileName::new(7, LOG_VERSION).format();
    assert!(LogCursor::create_for_single_file(log.path(), &missing, CursorOptions::new()).is_err());
}

#[test]
fn writer_rotation_reads_as_one_stream() {
    let log = LogFixture::new();
    let mut writer = LogWriter::open(log.path(), WriterOptions::new().max_log_file_size(64)).unwrap();
    let mut lsns = Vec::new();
    for i in 0..20 {
        lsns.push(writer.append(&LogRecord::comment(format!("record {i}"))).unwrap().as_u64());
    }
    writer.fsync().unwrap();
    drop(writer);

    assert!(log.log_files().len() > 1);
    assert_eq!(log.forward_lsns(), lsns);
    let mut backward = log.backward_lsns();
    backward.reverse();
    assert_eq!(backward, lsns);
}

#[test]
fn prefetch_reads_the_same_entries() {
    let log = LogFixture::new();
    log.write_file(0, &comments(1, &["a"]));
    log.empty_file(1, true);
    log.write_file(2, &comments(2, &["b", "c"]));

    let mut plain = log.cursor();
    let mut warm = LogCursor::create(log.path(), CursorOptions::new().prefetch(true)).unwrap();
    loop {
        match (plain.prev(), warm.prev()) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => {
                assert!(a.is_end_of_log() && b.is_end_of_log());
                break;
            }
            other => panic!("cursors disagree: {other:?}"),
        }
    }
}
