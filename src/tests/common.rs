// src/tests/common.rs

//! Shared fixtures for _rmslib_ tests: synthetic record sets and the
//! test-side encoders that fabricate binary files, text files, and socket
//! messages for the readers to decode.

#![allow(non_upper_case_globals)]

use crate::common::{Bytes, ResultS3};
use crate::data::record::{
    RMatrixRecord,
    BACKTRACK_TAG,
    BIN_RECORD_HEAD_SZ,
    RECORD_TYPE_ENDu8,
    RECORD_TYPE_R,
    RECORD_TYPE_Ru8,
};
use crate::readers::recordreader::RecordReader;

use std::io::{Read, Write};
use std::net::TcpStream;

extern crate lazy_static;
use lazy_static::lazy_static;

extern crate rand;
use rand::Rng;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// example record sets

lazy_static! {
    /// The canonical three-record example:
    /// forward readers must yield these in order, backward readers in
    /// reverse order, and both must report EOF (not an error) on the
    /// fourth cycle.
    pub static ref RECORDS_EXAMPLE: Vec<RMatrixRecord> = vec![
        RMatrixRecord::new(true, 1.0, vec![0.5]),
        RMatrixRecord::new(false, 2.0, vec![]),
        RMatrixRecord::new(true, 3.0, vec![0.1, -0.2, 0.3]),
    ];
}

/// Synthetic records with random active flags, times, and correlation
/// arrays of up to 8 values in `[-1.0, 1.0]`.
pub fn records_random(count: usize) -> Vec<RMatrixRecord> {
    let mut rng = rand::rng();
    let mut records: Vec<RMatrixRecord> = Vec::with_capacity(count);
    for _ in 0..count {
        let n: usize = rng.random_range(0..=8);
        let mut values: Vec<f64> = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(rng.random_range(-1.0..=1.0));
        }
        records.push(RMatrixRecord::new(
            rng.random_range(0..=1) == 1,
            rng.random_range(-1.0e6..=1.0e6),
            values,
        ));
    }

    records
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// binary encoding

/// Encode one record in the binary on-disk layout, backtracking trailer
/// included.
pub fn encode_binary_record(record: &RMatrixRecord) -> Bytes {
    let record_len: usize = BIN_RECORD_HEAD_SZ + 4 + record.values().len() * 8;
    let mut bytes: Bytes = Bytes::with_capacity(record_len + 5);
    bytes.push(RECORD_TYPE_Ru8);
    bytes.push(record.active() as u8);
    bytes.extend_from_slice(&record.time().to_ne_bytes());
    bytes.extend_from_slice(&(record.values().len() as i32).to_ne_bytes());
    for value in record.values().iter() {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    bytes.push(BACKTRACK_TAG);
    bytes.extend_from_slice(&(record_len as i32).to_ne_bytes());

    bytes
}

/// Encode a whole binary record file.
pub fn encode_binary(records: &[RMatrixRecord]) -> Bytes {
    let mut bytes: Bytes = Bytes::new();
    for record in records.iter() {
        bytes.extend_from_slice(&encode_binary_record(record));
    }

    bytes
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// text encoding

/// Encode one record in the text on-disk layout.
///
/// `f64` `Display` prints the shortest decimal that round-trips, so a
/// write-then-read cycle reproduces values exactly.
pub fn encode_text_record(record: &RMatrixRecord) -> String {
    let mut text: String = match record.active() {
        true => String::from("<r s=\"a\">"),
        false => String::from("<r s=\"r\">"),
    };
    text.push_str(&format!(" {}", record.time()));
    for value in record.values().iter() {
        text.push_str(&format!(" {}", value));
    }
    text.push_str(" </r>\n");

    text
}

/// Encode a whole text record file.
pub fn encode_text(records: &[RMatrixRecord]) -> String {
    let mut text: String = String::new();
    for record in records.iter() {
        text.push_str(&encode_text_record(record));
    }

    text
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// socket wire encoding

/// Frame one payload as a socket message: 4-byte big-endian length then
/// the payload.
pub fn frame_message(payload: &[u8]) -> Bytes {
    let mut bytes: Bytes = Bytes::with_capacity(4 + payload.len());
    bytes.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    bytes.extend_from_slice(payload);

    bytes
}

/// Encode one record as a framed socket message in the neutral big-endian
/// wire layout.
pub fn encode_socket_record(record: &RMatrixRecord) -> Bytes {
    let mut payload: Bytes = Bytes::new();
    payload.push(RECORD_TYPE_Ru8);
    payload.push(record.active() as u8);
    payload.extend_from_slice(&record.time().to_be_bytes());
    payload.extend_from_slice(&(record.values().len() as i32).to_be_bytes());
    for value in record.values().iter() {
        payload.extend_from_slice(&value.to_be_bytes());
    }

    frame_message(&payload)
}

/// Encode the framed end-of-transmission message.
pub fn encode_socket_end() -> Bytes {
    frame_message(&[RECORD_TYPE_ENDu8])
}

/// Peer-side helper: send one framed message then read back the one-byte
/// acknowledgement. Panics on any I/O failure; for test peer threads.
pub fn send_message_expect_ack(
    stream: &mut TcpStream,
    message: &[u8],
) -> u8 {
    stream
        .write_all(message)
        .expect("peer write failed");
    let mut ack: [u8; 1] = [0; 1];
    stream
        .read_exact(&mut ack)
        .expect("peer ack read failed");

    ack[0]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// read-side helpers

/// Drive the full four-call cycle once. Returns the assembled record,
/// `Done` at the stream end, or the first error hit.
pub fn read_one_record<R: RecordReader>(
    reader: &mut R,
) -> ResultS3<RMatrixRecord, String> {
    let _type: char = match reader.read_type() {
        ResultS3::Found(val) => val,
        ResultS3::Done => return ResultS3::Done,
        ResultS3::Err(err) => return ResultS3::Err(format!("read_type: {}", err)),
    };
    assert_eq!(_type, RECORD_TYPE_R, "read_type returned wrong marker");
    let active: bool = match reader.read_active_flag() {
        Ok(val) => val,
        Err(err) => return ResultS3::Err(format!("read_active_flag: {}", err)),
    };
    let time: f64 = match reader.read_time() {
        Ok(val) => val,
        Err(err) => return ResultS3::Err(format!("read_time: {}", err)),
    };
    let values: Vec<f64> = match reader.read_r_data() {
        Ok(val) => val,
        Err(err) => return ResultS3::Err(format!("read_r_data: {}", err)),
    };

    ResultS3::Found(RMatrixRecord::new(active, time, values))
}

/// Read every record until `Done`, panicking on any error, and assert
/// `is_eof` flips only at the end.
pub fn read_all_records<R: RecordReader>(reader: &mut R) -> Vec<RMatrixRecord> {
    let mut records: Vec<RMatrixRecord> = Vec::new();
    loop {
        match read_one_record(reader) {
            ResultS3::Found(record) => {
                assert!(!reader.is_eof(), "is_eof true while records remain");
                records.push(record);
            }
            ResultS3::Done => {
                assert!(reader.is_eof(), "is_eof false after Done");
                break;
            }
            ResultS3::Err(err) => panic!("unexpected read error: {}", err),
        }
    }

    records
}

/// Assert two record sequences match exactly, field for field.
pub fn assert_records_eq(
    found: &[RMatrixRecord],
    expect: &[RMatrixRecord],
) {
    assert_eq!(found.len(), expect.len(), "record count mismatch");
    for (index, (f, e)) in found
        .iter()
        .zip(expect.iter())
        .enumerate()
    {
        assert_eq!(f.active(), e.active(), "record {} active flag mismatch", index);
        assert_eq!(
            f.time().to_bits(),
            e.time().to_bits(),
            "record {} time mismatch: {} vs {}",
            index,
            f.time(),
            e.time()
        );
        assert_eq!(
            f.values().len(),
            e.values().len(),
            "record {} value count mismatch",
            index
        );
        for (vi, (fv, ev)) in f
            .values()
            .iter()
            .zip(e.values().iter())
            .enumerate()
        {
            assert_eq!(
                fv.to_bits(),
                ev.to_bits(),
                "record {} value {} mismatch: {} vs {}",
                index,
                vi,
                fv,
                ev
            );
        }
    }
}

/// `expect` reversed, for backward-reader comparisons.
pub fn reversed(records: &[RMatrixRecord]) -> Vec<RMatrixRecord> {
    let mut r: Vec<RMatrixRecord> = records.to_vec();
    r.reverse();

    r
}
