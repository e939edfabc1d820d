// src/readers/binaryforwardreader.rs

//! Implements a [`BinaryForwardReader`], sequential decode of fixed-layout
//! binary r-records with chunked buffer refill.
//!
//! On-disk layout of one record (native byte order, no delimiters):
//!
//! ```text
//! 'r'(1B) | active(1B: 0/1) | time(8B f64) | count(4B i32) | count×8B f64
//! | 'b'(1B) | record_len(4B i32, trailer excluded)
//! ```
//!
//! The trailing `'b'` + length pair is the _backtracking trailer_; it exists
//! for the benefit of [`BinaryBackwardReader`]. A forward reader does not
//! need it to decode, but checks and skips exactly one trailer between
//! records as a structural integrity check. A damaged trailer does not fail
//! the record whose data was already delivered; it poisons the reader so
//! the next `read_type` fails instead.
//!
//! [`BinaryForwardReader`]: self::BinaryForwardReader
//! [`BinaryBackwardReader`]: crate::readers::binarybackwardreader::BinaryBackwardReader

use crate::common::{BufIndex, BufSz, Bytes, Count, FPath, FileOffset, FileSz, ResultS3};
use crate::de_err;
use crate::data::record::{
    CorrelationValues,
    TimeTag,
    BACKTRACK_TAG,
    BACKTRACK_TRAILER_SZ,
    BIN_RECORD_HEAD_SZ,
    RECORD_TYPE_R,
    RECORD_TYPE_Ru8,
};
use crate::readers::helpers::fpath_to_path;
use crate::readers::recordreader::{
    check_correlation,
    require_phase,
    require_phase_completed_s3,
    OpenError,
    ReadError,
    RecordPhase,
    RecordReader,
    ResultReadType,
    SummaryRecordStream,
    BUFSZ_DEF,
    BUFSZ_MIN,
};

use std::fmt;
use std::fs::File;
use std::io::{Error, ErrorKind, Read};

use ::min_max::min;
use ::more_asserts::{debug_assert_ge, debug_assert_le};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BinaryForwardReader

/// Sequential reader of binary r-record files, front to back.
///
/// Maintains one contiguous byte buffer over the file with a cursor to the
/// first unconsumed byte. Every decode step checks the requested byte count
/// against the buffer's valid length first; on shortfall the unconsumed
/// tail is compacted to offset 0 and the buffer refilled from the file.
/// A refill yielding zero new bytes is legitimate EOF only at a record
/// boundary; mid-record it is corruption.
pub struct BinaryForwardReader {
    /// Path to the file.
    path: FPath,
    /// The file handle; `Some` between `open` and `close`.
    file: Option<File>,
    /// File size in bytes, set in `open`.
    pub(crate) filesz: FileSz,
    /// Configured buffer size cap; the allocation is
    /// `min(bufsz, filesz)`.
    bufsz: BufSz,
    /// The internal byte buffer. Length fixed at `open`.
    buffer: Bytes,
    /// Count of valid bytes currently loaded, `≤ buffer.len()`.
    loaded: usize,
    /// Index of the first unconsumed byte, `≤ loaded`.
    cursor: BufIndex,
    /// File offset of the next byte to load.
    file_pos: FileOffset,
    /// Where in the per-record call cycle this reader is.
    phase: RecordPhase,
    /// Set once `read_type` observes the end of the records.
    eof: bool,
    /// Deferred error from a damaged backtracking trailer, reported at the
    /// next `read_type`.
    pending_error: Option<ReadError>,
    /// `Count` of records fully decoded.
    count_records: Count,
    /// `Count` of bytes loaded from the file.
    count_bytes_loaded: Count,
    /// `Count` of chunk loads (initial load and refills).
    count_chunk_loads: Count,
}

impl fmt::Debug for BinaryForwardReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("BinaryForwardReader")
            .field("path", &self.path)
            .field("filesz", &self.filesz)
            .field("bufsz", &self.bufsz)
            .field("loaded", &self.loaded)
            .field("cursor", &self.cursor)
            .field("file_pos", &self.file_pos)
            .field("phase", &self.phase)
            .field("eof", &self.eof)
            .field("records", &self.count_records)
            .finish()
    }
}

impl BinaryForwardReader {
    /// Create a new idle `BinaryForwardReader`; nothing is touched until
    /// `open`.
    pub fn new(path: FPath) -> BinaryForwardReader {
        defñ!("({:?})", path);
        BinaryForwardReader {
            path,
            file: None,
            filesz: 0,
            bufsz: BUFSZ_DEF,
            buffer: Bytes::new(),
            loaded: 0,
            cursor: 0,
            file_pos: 0,
            phase: RecordPhase::Completed,
            eof: false,
            pending_error: None,
            count_records: 0,
            count_bytes_loaded: 0,
            count_chunk_loads: 0,
        }
    }

    pub fn path(&self) -> &FPath {
        &self.path
    }

    /// Count of unconsumed bytes currently resident.
    fn available(&self) -> usize {
        debug_assert_le!(self.cursor, self.loaded);

        self.loaded - self.cursor
    }

    /// Move the unconsumed tail to offset 0 then append bytes from the file
    /// until the buffer is full or the file is drained.
    ///
    /// Returns the count of bytes appended; `0` means the file has no more
    /// bytes.
    fn refill(&mut self) -> Result<usize, Error> {
        defn!("cursor {} loaded {}", self.cursor, self.loaded);
        let file: &mut File = match self.file.as_mut() {
            Some(val) => val,
            None => {
                return Err(Error::new(ErrorKind::NotConnected, "reader is not open"));
            }
        };
        // compact
        if self.cursor > 0 {
            self.buffer.copy_within(self.cursor..self.loaded, 0);
            self.loaded -= self.cursor;
            self.cursor = 0;
        }
        // refill
        let mut added: usize = 0;
        while self.loaded + added < self.buffer.len() {
            let n: usize = file.read(&mut self.buffer[self.loaded + added..])?;
            if n == 0 {
                break;
            }
            added += n;
        }
        self.loaded += added;
        self.file_pos += added as FileOffset;
        self.count_bytes_loaded += added as Count;
        if added > 0 {
            self.count_chunk_loads += 1;
        }
        defx!("return {}", added);

        Ok(added)
    }

    /// Guarantee `want` unconsumed bytes are resident, refilling once if
    /// needed. A shortfall after refill is mid-record truncation, reported
    /// as corruption (`read_type` handles the boundary-EOF case itself and
    /// does not come through here).
    fn ensure_in_record(
        &mut self,
        want: usize,
    ) -> Result<(), ReadError> {
        if self.available() >= want {
            return Ok(());
        }
        if want > self.buffer.len() {
            return Err(ReadError::BufferTooSmall {
                bufsz: self.buffer.len(),
                need: want,
            });
        }
        match self.refill() {
            Ok(_) => {}
            Err(err) => {
                return Err(ReadError::Io(err));
            }
        }
        if self.available() < want {
            return Err(ReadError::Corrupt(format!(
                "record truncated: {} more bytes needed, file {:?} is drained",
                want - self.available(),
                self.path,
            )));
        }

        Ok(())
    }

    /// Consume `COUNT` bytes at the cursor.
    fn take<const COUNT: usize>(&mut self) -> [u8; COUNT] {
        debug_assert_ge!(self.available(), COUNT);
        let mut bytes: [u8; COUNT] = [0; COUNT];
        bytes.copy_from_slice(&self.buffer[self.cursor..self.cursor + COUNT]);
        self.cursor += COUNT;

        bytes
    }

    /// Check and skip the backtracking trailer that must follow the record
    /// just decoded. Any damage is deferred: stored in
    /// `self.pending_error`, surfaced by the next `read_type`.
    fn skip_backtrack_trailer(
        &mut self,
        record_len: usize,
    ) {
        defn!("record_len {}", record_len);
        if self.available() < BACKTRACK_TRAILER_SZ {
            match self.refill() {
                Ok(_) => {}
                Err(err) => {
                    self.pending_error = Some(ReadError::Io(err));
                    defx!("refill failed");
                    return;
                }
            }
        }
        if self.available() < BACKTRACK_TRAILER_SZ {
            self.pending_error = Some(ReadError::Corrupt(format!(
                "backtracking trailer missing at end of record, file {:?}",
                self.path,
            )));
            defx!("trailer missing");
            return;
        }
        let tag: u8 = self.buffer[self.cursor];
        if tag != BACKTRACK_TAG {
            self.pending_error = Some(ReadError::Corrupt(format!(
                "expected backtracking tag {:?} found byte 0x{:02x}, file {:?}",
                BACKTRACK_TAG as char, tag, self.path,
            )));
            defx!("bad tag");
            return;
        }
        self.cursor += 1;
        let len_bytes: [u8; 4] = self.take::<4>();
        let len: i32 = i32::from_ne_bytes(len_bytes);
        if len != record_len as i32 {
            self.pending_error = Some(ReadError::Corrupt(format!(
                "backtracking trailer length {} does not match record length {}, file {:?}",
                len, record_len, self.path,
            )));
        }
        defx!();
    }
}

impl RecordReader for BinaryForwardReader {
    fn open(&mut self) -> Result<(), OpenError> {
        defn!("({:?})", self.path);
        if self.file.is_some() {
            defx!("already open");
            return Err(OpenError::AlreadyOpen);
        }
        let file: File = match File::open(fpath_to_path(&self.path)) {
            Ok(val) => val,
            Err(err) => {
                defx!("File::open failed");
                return Err(OpenError::CannotOpen(err));
            }
        };
        let filesz: FileSz = match file.metadata() {
            Ok(val) => val.len(),
            Err(err) => {
                defx!("metadata failed");
                return Err(OpenError::CannotOpen(err));
            }
        };
        if filesz == 0 {
            defx!("empty file");
            return Err(OpenError::EmptySource);
        }
        let sz: BufSz = min!(self.bufsz as FileSz, filesz) as BufSz;
        if let Err(err) = self.buffer.try_reserve_exact(sz) {
            defx!("allocation failed");
            return Err(OpenError::OutOfMemory(err.to_string()));
        }
        self.buffer.resize(sz, 0);
        self.file = Some(file);
        self.filesz = filesz;
        // first chunk load
        match self.refill() {
            Ok(_) => {}
            Err(err) => {
                de_err!("first load of {:?} {}", self.path, err);
                self.file = None;
                self.buffer = Bytes::new();
                defx!("first load failed");
                return Err(OpenError::Io(err));
            }
        }
        defx!("opened, filesz {}, buffer {}", filesz, sz);

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn bufsz(&self) -> BufSz {
        self.bufsz
    }

    fn set_bufsz(
        &mut self,
        bufsz: BufSz,
    ) -> Result<(), Error> {
        defñ!("({})", bufsz);
        if self.file.is_some() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer size is fixed once the reader is open",
            ));
        }
        if bufsz < BUFSZ_MIN {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("buffer size {} less than minimum {}", bufsz, BUFSZ_MIN),
            ));
        }
        self.bufsz = bufsz;

        Ok(())
    }

    fn read_type(&mut self) -> ResultReadType {
        defn!();
        require_phase_completed_s3!(self, "read_type");
        if let Some(err) = self.pending_error.take() {
            defx!("pending error");
            return ResultS3::Err(err);
        }
        if self.eof {
            defx!("eof");
            return ResultS3::Done;
        }
        if self.available() < 1 {
            match self.refill() {
                Ok(_) => {}
                Err(err) => {
                    defx!("refill failed");
                    return ResultS3::Err(ReadError::Io(err));
                }
            }
            if self.available() < 1 {
                // record boundary with nothing further; the one legitimate
                // end of the stream
                self.eof = true;
                defx!("return Done");
                return ResultS3::Done;
            }
        }
        let byte: u8 = self.buffer[self.cursor];
        if byte != RECORD_TYPE_Ru8 {
            defx!("bad type byte");
            return ResultS3::Err(ReadError::Corrupt(format!(
                "unexpected record type byte 0x{:02x} at file offset {}, file {:?}",
                byte,
                self.file_pos - self.available() as FileOffset,
                self.path,
            )));
        }
        self.cursor += 1;
        self.phase = RecordPhase::TypeRead;
        defx!("return Found({:?})", RECORD_TYPE_R);

        ResultS3::Found(RECORD_TYPE_R)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TypeRead, "read_active_flag");
        self.ensure_in_record(1)?;
        let byte: u8 = self.buffer[self.cursor];
        let active: bool = match byte {
            0 => false,
            1 => true,
            _ => {
                defx!("bad active byte");
                return Err(ReadError::Corrupt(format!(
                    "active flag byte must be 0 or 1, found 0x{:02x}, file {:?}",
                    byte, self.path,
                )));
            }
        };
        self.cursor += 1;
        self.phase = RecordPhase::ActiveRead;
        defx!("return {}", active);

        Ok(active)
    }

    fn read_time(&mut self) -> Result<TimeTag, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::ActiveRead, "read_time");
        self.ensure_in_record(8)?;
        let time: TimeTag = TimeTag::from_ne_bytes(self.take::<8>());
        self.phase = RecordPhase::TimeRead;
        defx!("return {}", time);

        Ok(time)
    }

    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TimeRead, "read_r_data");
        self.ensure_in_record(4)?;
        let count: i32 = i32::from_ne_bytes(self.take::<4>());
        if count < 0 {
            defx!("negative count");
            return Err(ReadError::Corrupt(format!(
                "negative correlation count {}, file {:?}",
                count, self.path,
            )));
        }
        // an absurd count is corruption, caught before any allocation
        let remaining: FileSz = self.filesz - (self.file_pos - self.available() as FileOffset);
        if (count as FileSz) * 8 > remaining {
            defx!("count exceeds file");
            return Err(ReadError::Corrupt(format!(
                "correlation count {} needs more bytes than the {} remaining in file {:?}",
                count, remaining, self.path,
            )));
        }
        let mut values: CorrelationValues = CorrelationValues::with_capacity(count as usize);
        for _ in 0..count {
            self.ensure_in_record(8)?;
            let value: f64 = f64::from_ne_bytes(self.take::<8>());
            check_correlation(value)?;
            values.push(value);
        }
        // the record's data is delivered regardless of what the trailer
        // check finds; trailer damage poisons the next read_type
        let record_len: usize = BIN_RECORD_HEAD_SZ + 4 + (count as usize) * 8;
        self.skip_backtrack_trailer(record_len);
        self.phase = RecordPhase::Completed;
        self.count_records += 1;
        defx!("return {} values", values.len());

        Ok(values)
    }

    fn close(&mut self) -> Result<(), Error> {
        defñ!("({:?})", self.path);
        self.file = None;
        self.buffer = Bytes::new();
        self.loaded = 0;
        self.cursor = 0;

        Ok(())
    }

    fn summary(&self) -> SummaryRecordStream {
        SummaryRecordStream {
            count_records: self.count_records,
            count_bytes_loaded: self.count_bytes_loaded,
            count_chunk_loads: self.count_chunk_loads,
        }
    }
}
