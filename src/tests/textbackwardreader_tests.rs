// src/tests/textbackwardreader_tests.rs

#![allow(non_snake_case)]

use crate::common::ResultS3;
use crate::data::record::RMatrixRecord;
use crate::debug::helpers::{create_temp_file, ntf_fpath, NamedTempFile};
use crate::readers::recordreader::{OpenError, ReadError, RecordReader};
use crate::readers::textbackwardreader::TextBackwardReader;
use crate::readers::textforwardreader::TextForwardReader;
use crate::tests::common::{
    assert_records_eq,
    encode_text,
    read_all_records,
    read_one_record,
    records_random,
    reversed,
    RECORDS_EXAMPLE,
};

extern crate test_case;
use test_case::test_case;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// helper to create a temp file of `text` and an opened backward reader
/// over it
fn open_reader_text(
    text: &str,
    bufsz: Option<usize>,
) -> (NamedTempFile, TextBackwardReader) {
    let ntf: NamedTempFile = create_temp_file(text);
    let mut reader: TextBackwardReader = TextBackwardReader::new(ntf_fpath(&ntf));
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
fn test_open_empty_file() {
    let ntf: NamedTempFile = create_temp_file("");
    let mut reader: TextBackwardReader = TextBackwardReader::new(ntf_fpath(&ntf));
    match reader.open() {
        Err(OpenError::EmptySource) => {}
        other => panic!("expected EmptySource, got {:?}", other),
    }
}

#[test]
fn test_whitespace_only_file_is_eof() {
    let (_ntf, mut reader) = open_reader_text("  \n \t \n ", None);
    assert!(reader.read_type().is_done());
    assert!(reader.is_eof());
}

// every size holds the longest example line; the small ones force a
// reload per backward step
#[test_case(Some(48); "bufsz 48")]
#[test_case(Some(80); "bufsz 80")]
#[test_case(None; "bufsz default")]
fn test_example_records_reversed(bufsz: Option<usize>) {
    let (_ntf, mut reader) = open_reader_text(&encode_text(&RECORDS_EXAMPLE), bufsz);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_records_eq(&records, &reversed(&RECORDS_EXAMPLE));
    // a fourth cycle keeps reporting Done, not an error
    assert!(reader.read_type().is_done());
    reader
        .close()
        .unwrap();
}

#[test_case(Some(128))]
#[test_case(Some(512))]
#[test_case(None)]
fn test_roundtrip_random_reversed(bufsz: Option<usize>) {
    let expect: Vec<RMatrixRecord> = records_random(50);
    let (_ntf, mut reader) = open_reader_text(&encode_text(&expect), bufsz);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_records_eq(&records, &reversed(&expect));
}

/// reading the same file forward then backward yields the same ordered
/// list once the backward yield is reversed
#[test]
fn test_direction_symmetry() {
    let expect: Vec<RMatrixRecord> = records_random(30);
    let ntf: NamedTempFile = create_temp_file(&encode_text(&expect));
    let mut fwd: TextForwardReader = TextForwardReader::new(ntf_fpath(&ntf));
    fwd.open()
        .unwrap();
    let forward: Vec<RMatrixRecord> = read_all_records(&mut fwd);
    let mut bwd: TextBackwardReader = TextBackwardReader::new(ntf_fpath(&ntf));
    bwd.open()
        .unwrap();
    let backward: Vec<RMatrixRecord> = read_all_records(&mut bwd);
    assert_records_eq(&forward, &reversed(&backward));
}

#[test]
fn test_single_record_with_leading_whitespace() {
    let (_ntf, mut reader) = open_reader_text("\n\n  <r s=\"r\"> 7.5 0.5 </r>", None);
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_eq!(records.len(), 1);
    assert!(!records[0].active());
    assert_eq!(records[0].time(), 7.5);
}

/// a run of inter-record whitespace longer than the whole buffer; the
/// whitespace-only windows must trigger further backward reads, not an
/// error
#[test]
fn test_whitespace_run_longer_than_buffer() {
    let mut text: String = String::from("<r s=\"a\"> 1.0 0.5 </r>");
    text.push_str(&" \n".repeat(200));
    text.push_str("<r s=\"r\"> 2.0 -0.5 </r>\n");
    let (_ntf, mut reader) = open_reader_text(&text, Some(48));
    let records: Vec<RMatrixRecord> = read_all_records(&mut reader);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].time(), 2.0);
    assert_eq!(records[1].time(), 1.0);
}

// -------------------------------------------------------------------------------------------------
// sizing

#[test]
fn test_buffer_smaller_than_one_record() {
    // the record spans 58 bytes; a 24-byte buffer gets the dedicated
    // error, not a generic parse failure
    let text: &str = "<r s=\"a\"> 1.0 0.5 -0.5 0.25 -0.25 0.125 -0.125 0.75 </r>\n";
    let (_ntf, mut reader) = open_reader_text(text, Some(24));
    match reader.read_type() {
        ResultS3::Err(ReadError::BufferTooSmall { .. }) => {}
        other => panic!("expected BufferTooSmall, got {:?}", other),
    }
}

// -------------------------------------------------------------------------------------------------
// corruption

#[test]
fn test_missing_closing_tag() {
    let (_ntf, mut reader) = open_reader_text("<r s=\"a\"> 1.0 0.5 ", None);
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_trailing_garbage_after_last_record() {
    let (_ntf, mut reader) = open_reader_text("<r> 1.0 </r> stray", None);
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_closing_tag_without_opening() {
    let (_ntf, mut reader) = open_reader_text("  1.0 </r>", None);
    match reader.read_type() {
        ResultS3::Err(ReadError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_bad_value_in_middle_record() {
    let text: &str = "<r> 1.0 0.5 </r>\n<r> 2.0 oops </r>\n<r> 3.0 </r>\n";
    let (_ntf, mut reader) = open_reader_text(text, None);
    // newest record is fine
    assert!(read_one_record(&mut reader).is_found());
    // the middle one carries the bad literal
    match read_one_record(&mut reader) {
        ResultS3::Err(err) => {
            assert!(
                err.contains("invalid numeric literal"),
                "unexpected error text: {}",
                err
            );
        }
        other => panic!("expected an error, got {:?}", other),
    }
}

// -------------------------------------------------------------------------------------------------
// call-sequence enforcement

#[test]
fn test_sequence_data_before_active() {
    let (_ntf, mut reader) = open_reader_text(&encode_text(&RECORDS_EXAMPLE), None);
    assert!(reader.read_type().is_found());
    match reader.read_r_data() {
        Err(err) => assert!(err.is_sequence_violation(), "wrong error: {}", err),
        Ok(_) => panic!("read_r_data out of order succeeded"),
    }
    assert!(reader.read_active_flag().is_ok());
    assert!(reader.read_time().is_ok());
    assert!(reader.read_r_data().is_ok());
}
