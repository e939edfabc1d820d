// src/readers/recordreader.rs

//! The [`RecordReader`] contract shared by every concrete r-matrix reader,
//! the error taxonomy of the read path, and the per-record call-sequence
//! state machine.
//!
//! Every encoding decodes one record through the same fixed cycle:
//!
//! ```text
//! read_type → read_active_flag → read_time → read_r_data
//! ```
//!
//! Only `read_type` may observe the legitimate end of the stream; running
//! out of data inside a record cycle is corruption, not EOF. Calling a read
//! function out of cycle order is a caller bug and gets its own error
//! variant, never silently tolerated.
//!
//! [`RecordReader`]: self::RecordReader

use crate::common::{BufSz, Count, ResultS3};
use crate::data::record::{CorrelationValues, TimeTag, CORRELATION_MAX};

use std::fmt;
use std::io::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// buffer sizing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Absolute minimum internal buffer size in bytes (inclusive).
pub const BUFSZ_MIN: BufSz = 1;

/// Default internal buffer size cap in bytes, 5 MiB.
///
/// At `open` the buffer is allocated to `min(configured size, source size)`
/// so small files never pay for the full cap.
pub const BUFSZ_DEF: BufSz = 0x500000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// error taxonomy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors from [`RecordReader::open`].
#[derive(Debug)]
pub enum OpenError {
    /// The reader was already opened; a reader instance handles one source,
    /// once.
    AlreadyOpen,
    /// The source could not be opened at all (missing file, refused
    /// connection, permissions).
    CannotOpen(Error),
    /// The source exists but holds zero bytes. Distinct from both an I/O
    /// failure and from a first-read EOF.
    EmptySource,
    /// The internal byte buffer could not be allocated.
    OutOfMemory(String),
    /// The source opened but the first chunk load failed.
    Io(Error),
    /// Facade only: the external header parser recorded blocking errors for
    /// this channel.
    ChannelMetadata(Vec<String>),
}

impl fmt::Display for OpenError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            OpenError::AlreadyOpen => write!(f, "reader is already open"),
            OpenError::CannotOpen(err) => write!(f, "cannot open source: {}", err),
            OpenError::EmptySource => write!(f, "source holds zero bytes"),
            OpenError::OutOfMemory(what) => write!(f, "buffer allocation failed: {}", what),
            OpenError::Io(err) => write!(f, "I/O error during open: {}", err),
            OpenError::ChannelMetadata(errors) => {
                write!(f, "channel metadata errors block open: {}", errors.join("; "))
            }
        }
    }
}

/// Errors from the four read functions.
///
/// Three distinct classes plus I/O:
/// a [`Sequence`] error is always a caller bug; every other variant is
/// fatal to the current stream, no resynchronization is attempted.
///
/// [`Sequence`]: self::ReadError#variant.Sequence
#[derive(Debug)]
pub enum ReadError {
    /// A read function was called out of the mandated
    /// type → active → time → data order.
    Sequence {
        /// the function that was called
        operation: &'static str,
        /// the cycle state the reader was actually in
        state: RecordPhase,
    },
    /// The stream's content is invalid: bad delimiter, truncation
    /// mid-record, garbled backtracking trailer, trailing garbage.
    Corrupt(String),
    /// A text token that must parse as a number did not. Text encodings
    /// only.
    BadNumericLiteral(String),
    /// A correlation value outside `[-1.0, 1.0]`.
    ValueOutOfRange(f64),
    /// The configured buffer cannot hold even one complete record.
    BufferTooSmall {
        bufsz: BufSz,
        need: usize,
    },
    /// The underlying file or socket failed.
    Io(Error),
}

impl fmt::Display for ReadError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            ReadError::Sequence { operation, state } => {
                write!(f, "{} called while the record cycle is at {:?}", operation, state)
            }
            ReadError::Corrupt(what) => write!(f, "stream is corrupt: {}", what),
            ReadError::BadNumericLiteral(what) => write!(f, "invalid numeric literal: {}", what),
            ReadError::ValueOutOfRange(val) => {
                write!(f, "correlation {} outside [-1.0, 1.0]", val)
            }
            ReadError::BufferTooSmall { bufsz, need } => {
                write!(
                    f,
                    "buffer of {} bytes too small for one record (at least {} bytes needed)",
                    bufsz, need
                )
            }
            ReadError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl ReadError {
    /// `true` for the caller-bug class; retrying the correct call is legal
    /// only for this class.
    pub const fn is_sequence_violation(&self) -> bool {
        matches!(*self, ReadError::Sequence { .. })
    }
}

/// A typed [`ResultS3`] for [`RecordReader::read_type`].
///
/// `Done` is the one legitimate end-of-stream signal of the whole cycle.
///
/// [`ResultS3`]: crate::common::ResultS3
pub type ResultReadType = ResultS3<char, ReadError>;

/// Bounds check one correlation value.
///
/// Applied by every encoding, binary included.
pub(crate) fn check_correlation(value: f64) -> Result<(), ReadError> {
    // NaN falls through both comparisons and fails
    if value >= -CORRELATION_MAX && value <= CORRELATION_MAX {
        return Ok(());
    }

    Err(ReadError::ValueOutOfRange(value))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// call-sequence state machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where inside one record's decode cycle a reader currently is.
///
/// `Completed` holds both before the first record and after a record fully
/// drains; each read function advances one step and `read_r_data` wraps
/// back to `Completed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordPhase {
    /// No record is mid-decode. Only `read_type` is legal.
    Completed,
    /// `read_type` succeeded. Only `read_active_flag` is legal.
    TypeRead,
    /// `read_active_flag` succeeded. Only `read_time` is legal.
    ActiveRead,
    /// `read_time` succeeded. Only `read_r_data` is legal.
    TimeRead,
}

impl RecordPhase {
    /// The error for `operation` arriving while the cycle is at `self`.
    pub(crate) const fn violation(
        self,
        operation: &'static str,
    ) -> ReadError {
        ReadError::Sequence {
            operation,
            state: self,
        }
    }
}

/// Guard at the top of every read function: error unless the cycle is at
/// `want`. Returns without observable state change on violation.
macro_rules! require_phase {
    ($self:ident, $want:expr, $operation:literal) => {
        if $self.phase != $want {
            return Err($self.phase.violation($operation));
        }
    };
}
pub(crate) use require_phase;

/// `require_phase!` for `read_type`, whose return type is
/// [`ResultReadType`] rather than `Result`.
macro_rules! require_phase_completed_s3 {
    ($self:ident, $operation:literal) => {
        if $self.phase != RecordPhase::Completed {
            return ResultReadType::Err($self.phase.violation($operation));
        }
    };
}
pub(crate) use require_phase_completed_s3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// summary counters

/// Lightweight per-reader statistics, for `--summary` style reporting.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SummaryRecordStream {
    /// `Count` of records fully decoded.
    pub count_records: Count,
    /// `Count` of bytes loaded from the source into the internal buffer.
    pub count_bytes_loaded: Count,
    /// `Count` of chunk loads (initial load, refills, backward reloads,
    /// socket messages).
    pub count_chunk_loads: Count,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RecordReader

/// Contract shared by every concrete r-matrix reader:
/// [`BinaryForwardReader`], [`BinaryBackwardReader`], [`TextForwardReader`],
/// [`TextBackwardReader`], [`SocketReader`], and the [`RMatrixReader`]
/// facade over all five.
///
/// A reader is constructed idle, `open`ed once, cycled zero or more times,
/// then `close`d. Reopening is not supported; one instance per physical
/// source. `close` is idempotent and `Drop` releases the handle and buffer
/// without relying on the caller having called `close`.
///
/// _These are not rust "Readers"; these structs do not implement the trait
/// [`Read`]. These are "readers" in an informal sense._
///
/// [`BinaryForwardReader`]: crate::readers::binaryforwardreader::BinaryForwardReader
/// [`BinaryBackwardReader`]: crate::readers::binarybackwardreader::BinaryBackwardReader
/// [`TextForwardReader`]: crate::readers::textforwardreader::TextForwardReader
/// [`TextBackwardReader`]: crate::readers::textbackwardreader::TextBackwardReader
/// [`SocketReader`]: crate::readers::socketreader::SocketReader
/// [`RMatrixReader`]: crate::readers::rmatrixreader::RMatrixReader
/// [`Read`]: std::io::Read
pub trait RecordReader {
    /// Open the source, allocate the internal buffer
    /// (`min(configured, source size)` bytes), and load the first chunk.
    fn open(&mut self) -> Result<(), OpenError>;

    /// Is the source handle valid?
    fn is_open(&self) -> bool;

    /// Have the records run out? Set once `read_type` returns `Done`.
    fn is_eof(&self) -> bool;

    /// Configured internal buffer size in bytes.
    fn bufsz(&self) -> BufSz;

    /// Reconfigure the internal buffer size. Legal only before `open`;
    /// `bufsz` must be at least [`BUFSZ_MIN`].
    fn set_bufsz(
        &mut self,
        bufsz: BufSz,
    ) -> Result<(), Error>;

    /// Decode the type marker of the next record, `'r'`.
    ///
    /// Legal only when the previous record fully completed (or as the first
    /// call after `open`). The one function that may return `Done`.
    fn read_type(&mut self) -> ResultReadType;

    /// Decode the active flag. Legal only immediately after `read_type`.
    fn read_active_flag(&mut self) -> Result<bool, ReadError>;

    /// Decode the time tag. Legal only immediately after
    /// `read_active_flag`.
    fn read_time(&mut self) -> Result<TimeTag, ReadError>;

    /// Decode the correlation values (count carried in-band). Legal only
    /// immediately after `read_time`. On success the cycle wraps back to
    /// ready-for-`read_type`.
    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError>;

    /// Release the buffer and the source handle. Idempotent.
    fn close(&mut self) -> Result<(), Error>;

    /// Statistics accumulated so far.
    fn summary(&self) -> SummaryRecordStream;
}
