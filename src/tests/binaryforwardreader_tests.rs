// src/tests/binaryforwardreader_tests.rs

#![allow(non_snake_case)]

use crate::common::{Bytes, ResultS3};
use crate::data::record::{RMatrixRecord, BACKTRACK_TAG};
use crate::debug::helpers::{create_temp_file_bytes, ntf_fpath, NamedTempFile};
use crate::readers::binaryforwardreader::BinaryForwardReader;
use crate::readers::recordreader::{OpenError, ReadError, RecordReader, BUFSZ_DEF};
use crate::tests::common::{
    assert_records_eq,
    encode_binary,
    encode_binary_record,
    read_all_records,
    read_one_record,
    records_random,
    RECORDS_EXAMPLE,
};

extern crate test_case;
use test_case::test_case;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// helper to create a temp file of `records` and an opened reader over it
fn open_reader(
    records: &[RMatrixRecord],
    bufsz: Option<usize>,
) -> (NamedTempFile, BinaryForwardReader) {
    let ntf: NamedTempFile = create_temp_file_bytes(&encode_binary(records));
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    if let Some(sz) = bufsz {
        reader
            .set_bufsz(sz)
            .unwrap();
    }
    reader
        .open()
        .unwrap();

    (ntf, reader)
}

// -------------------------------------------------------------------------------------------------

#[test]
fn test_new_reader_is_idle() {
    let reader: BinaryForwardReader = BinaryForwardReader::new(String::from("/nonexistent"));
    assert!(!reader.is_open());
    assert!(!reader.is_eof());
    assert_eq!(reader.bufsz(), BUFSZ_DEF);
}

#[test]
fn test_open_missing_file() {
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(String::from(
        "/nonexistent/rmslib/test/path",
    ));
    match reader.open() {
        Err(OpenError::CannotOpen(_)) => {}
        other => panic!("expected CannotOpen, got {:?}", other),
    }
    assert!(!reader.is_open());
}

#[test]
fn test_open_empty_file() {
    let ntf: NamedTempFile = create_temp_file_bytes(b"");
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    match reader.open() {
        Err(OpenError::EmptySource) => {}
        other => panic!("expected EmptySource, got {:?}", other),
    }
}

#[test]
fn test_open_twice() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    match reader.open() {
        Err(OpenError::AlreadyOpen) => {}
        other => panic!("expected AlreadyOpen, got {:?}", other),
    }
}

#[test]
fn test_set_bufsz_zero() {
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(String::from("x"));
    assert!(reader.set_bufsz(0).is_err());
}

#[test]
fn test_set_bufsz_after_open() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    assert!(reader.set_bufsz(0x1000).is_err());
}

// -------------------------------------------------------------------------------------------------

// buffer sizes from "just enough for the widest decode step" up to "whole
// file at once"; the decoded sequence must not depend on the choice
#[test_case(Some(16); "bufsz 16")]
#[test_case(Some(32); "bufsz 32")]
#[test_case(Some(64); "bufsz 64")]
#[test_case(None; "bufsz default")]
fn test_example_records(bufsz: Option<usize>) {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, bufsz);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_records_eq(&records, &RECORDS_EXAMPLE);
    // a fourth cycle keeps reporting Done, not an error
    assert!(reader.read_type().is_done());
    reader
        .close()
        .unwrap();
}

#[test_case(Some(16))]
#[test_case(Some(128))]
#[test_case(Some(4096))]
#[test_case(None)]
fn test_roundtrip_random(bufsz: Option<usize>) {
    let expect: Vec<RMatrixRecord> = records_random(50);
    let (_ntf, mut reader) = open_reader(&expect, bufsz);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_records_eq(&records, &expect);
}

#[test]
fn test_roundtrip_zero_records() {
    // a zero-length record list cannot be written (zero-length files are
    // an open error) so the boundary is one record with zero values
    let expect: Vec<RMatrixRecord> = vec![RMatrixRecord::new(true, 0.0, vec![])];
    let (_ntf, mut reader) = open_reader(&expect, None);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_records_eq(&records, &expect);
}

#[test]
fn test_close_idempotent() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    reader
        .close()
        .unwrap();
    reader
        .close()
        .unwrap();
    assert!(!reader.is_open());
}

// -------------------------------------------------------------------------------------------------
// call-sequence enforcement

#[test]
fn test_sequence_active_before_type() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    match reader.read_active_flag() {
        Err(err) => assert!(err.is_sequence_violation(), "wrong error: {}", err),
        Ok(_) => panic!("read_active_flag out of order succeeded"),
    }
    // the violation must not disturb the stream; a correct cycle still
    // decodes record one
    let record: RMatrixRecord = read_one_record(&mut reader).unwrap();
    assert_records_eq(&[record], &RECORDS_EXAMPLE[0..1]);
}

#[test]
fn test_sequence_data_before_time() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    assert!(reader.read_type().is_found());
    assert!(reader.read_active_flag().is_ok());
    match reader.read_r_data() {
        Err(err) => assert!(err.is_sequence_violation(), "wrong error: {}", err),
        Ok(_) => panic!("read_r_data out of order succeeded"),
    }
    // the cycle continues from where it legitimately was
    assert!(reader.read_time().is_ok());
    assert!(reader.read_r_data().is_ok());
}

#[test]
fn test_sequence_type_twice() {
    let (_ntf, mut reader) = open_reader(&RECORDS_EXAMPLE, None);
    assert!(reader.read_type().is_found());
    match reader.read_type() {
        ResultS3::Err(err) => assert!(err.is_sequence_violation(), "wrong error: {}", err),
        other => panic!("expected sequence violation, got {:?}", other),
    }
}

// -------------------------------------------------------------------------------------------------
// corruption

#[test]
fn test_corrupt_type_byte() {
    let mut bytes: Bytes = encode_binary(&RECORDS_EXAMPLE);
    bytes[0] = b'x';
    let ntf: NamedTempFile = create_temp_file_bytes(&bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_corrupt_active_byte() {
    let mut bytes: Bytes = encode_binary(&RECORDS_EXAMPLE);
    bytes[1] = 7;
    let ntf: NamedTempFile = create_temp_file_bytes(&bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    assert!(reader.read_type().is_found());
    match reader.read_active_flag() {
        Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_truncated_mid_record() {
    let mut bytes: Bytes = encode_binary_record(&RMatrixRecord::new(true, 1.0, vec![0.5, -0.5]));
    // cut inside the value array
    bytes.truncate(20);
    let ntf: NamedTempFile = create_temp_file_bytes(&bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    assert!(reader.read_type().is_found());
    assert!(reader.read_active_flag().is_ok());
    assert!(reader.read_time().is_ok());
    match reader.read_r_data() {
        Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_value_out_of_range() {
    // fabricate a record carrying 2.0, outside [-1, 1]
    let mut record_bytes: Bytes =
        encode_binary_record(&RMatrixRecord::new(true, 1.0, vec![0.5]));
    let value_at: usize = 1 + 1 + 8 + 4;
    record_bytes[value_at..value_at + 8].copy_from_slice(&2.0f64.to_ne_bytes());
    let ntf: NamedTempFile = create_temp_file_bytes(&record_bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    assert!(reader.read_type().is_found());
    assert!(reader.read_active_flag().is_ok());
    assert!(reader.read_time().is_ok());
    match reader.read_r_data() {
        Err(ReadError::ValueOutOfRange(_)) => {}
        other => panic!("expected ValueOutOfRange, got {:?}", other),
    }
}

// -------------------------------------------------------------------------------------------------
// deferred trailer errors

/// damage the trailer of the FIRST example record at `offset_back` bytes
/// before its end, then expect: record one decodes fine, the next
/// read_type reports the poison
fn check_deferred_trailer_poison(damage: fn(&mut Bytes, usize)) {
    let record_one: Bytes = encode_binary_record(&RECORDS_EXAMPLE[0]);
    let mut bytes: Bytes = encode_binary(&RECORDS_EXAMPLE);
    damage(&mut bytes, record_one.len());
    let ntf: NamedTempFile = create_temp_file_bytes(&bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    // the record's data was already valid; it must be delivered whole
    let record: RMatrixRecord = read_one_record(&mut reader).unwrap();
    assert_records_eq(&[record], &RECORDS_EXAMPLE[0..1]);
    // the poison surfaces here
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected deferred Corrupt, got {:?}", other),
    }
}

#[test]
fn test_trailer_bad_tag_poisons_next_read_type() {
    check_deferred_trailer_poison(|bytes, record_one_len| {
        let tag_at: usize = record_one_len - 5;
        assert_eq!(bytes[tag_at], BACKTRACK_TAG);
        bytes[tag_at] = b'X';
    });
}

#[test]
fn test_trailer_bad_length_poisons_next_read_type() {
    check_deferred_trailer_poison(|bytes, record_one_len| {
        let len_at: usize = record_one_len - 4;
        bytes[len_at..record_one_len].copy_from_slice(&9999i32.to_ne_bytes());
    });
}

#[test]
fn test_trailer_missing_at_eof_poisons_next_read_type() {
    // a single record whose trailer is cut off entirely
    let mut bytes: Bytes = encode_binary_record(&RECORDS_EXAMPLE[0]);
    let keep: usize = bytes.len() - 5;
    bytes.truncate(keep);
    let ntf: NamedTempFile = create_temp_file_bytes(&bytes);
    let mut reader: BinaryForwardReader = BinaryForwardReader::new(ntf_fpath(&ntf));
    reader
        .open()
        .unwrap();
    let record: RMatrixRecord = read_one_record(&mut reader).unwrap();
    assert_records_eq(&[record], &RECORDS_EXAMPLE[0..1]);
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected deferred Corrupt, got {:?}", other),
    }
}
