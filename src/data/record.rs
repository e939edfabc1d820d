// src/data/record.rs

//! Implements an [`RMatrixRecord`] struct and the record-stream byte
//! constants shared by every encoding.
//!
//! [`RMatrixRecord`]: crate::data::record::RMatrixRecord

use crate::common::Count;

use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// record stream constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The record type marker. Every record in this stream family carries it.
pub const RECORD_TYPE_R: char = 'r';

/// `RECORD_TYPE_R` as a byte, for scanners.
#[allow(non_upper_case_globals)]
pub const RECORD_TYPE_Ru8: u8 = b'r';

/// Type marker of the socket end-of-transmission message; replaces a final
/// record.
pub const RECORD_TYPE_END: char = 'e';

/// `RECORD_TYPE_END` as a byte.
#[allow(non_upper_case_globals)]
pub const RECORD_TYPE_ENDu8: u8 = b'e';

/// Tag byte of the binary backtracking trailer that follows every binary
/// record.
pub const BACKTRACK_TAG: u8 = b'b';

/// Byte length of the binary backtracking trailer:
/// tag byte + 4-byte record length.
pub const BACKTRACK_TRAILER_SZ: usize = 1 + 4;

/// Byte length of the fixed leading fields of one binary record:
/// type byte + active byte + 8-byte time.
pub const BIN_RECORD_HEAD_SZ: usize = 1 + 1 + 8;

/// Inclusive bound on every correlation value; a correlation outside
/// `[-1.0, 1.0]` is data corruption.
pub const CORRELATION_MAX: f64 = 1.0;

/// The floating-point time tag of a record.
pub type TimeTag = f64;

/// The ordered correlation values of a record.
pub type CorrelationValues = Vec<f64>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RMatrixRecord

/// One decoded r-record.
///
/// A transient decode result, not a stored object; built whole by
/// [`RMatrixRecord::new`] and then immutable.
///
/// The correlation count is implied: `n*(n+1)/2` or `n` or `0` values for
/// an n×n matrix, carried in-band by each record.
#[derive(Clone, PartialEq)]
pub struct RMatrixRecord {
    /// Record is "live" (`true`) or logically deleted (`false`).
    active: bool,
    /// Time tag.
    time: TimeTag,
    /// Ordered correlation values.
    values: CorrelationValues,
}

impl RMatrixRecord {
    pub fn new(
        active: bool,
        time: TimeTag,
        values: CorrelationValues,
    ) -> RMatrixRecord {
        RMatrixRecord {
            active,
            time,
            values,
        }
    }

    pub const fn active(&self) -> bool {
        self.active
    }

    pub const fn time(&self) -> TimeTag {
        self.time
    }

    pub fn values(&self) -> &[f64] {
        self.values.as_slice()
    }

    /// `Count` of correlation values.
    pub fn count_values(&self) -> Count {
        self.values.len() as Count
    }
}

impl fmt::Debug for RMatrixRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("RMatrixRecord")
            .field("active", &self.active)
            .field("time", &self.time)
            .field("values.len", &self.values.len())
            .finish()
    }
}
