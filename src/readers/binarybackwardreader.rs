// src/readers/binarybackwardreader.rs

//! Implements a [`BinaryBackwardReader`], reverse sequential decode of
//! fixed-layout binary r-records using the backtracking trailers.
//!
//! Record layout is shared with [`BinaryForwardReader`]. The trailing
//! `'b'` + 4-byte length pair after every record exists for this reader:
//! walking trailer to trailer locates each prior record's boundaries
//! without ever loading the whole file.
//!
//! The central algorithm is a reverse chunked scan. A loaded window always
//! *ends* at a known record boundary (file end at `open`, the start of the
//! record just consumed afterwards), so the 5 bytes below the window end
//! are always a complete trailer. When the record a trailer describes
//! extends below the loaded window, the window is reloaded ending at that
//! same boundary; a record that cannot fit even a maximal window is the
//! dedicated buffer-too-small error. A trailer is never assumed to be
//! resident without an index check.
//!
//! Records come out newest-first; the fields of each record are decoded in
//! the usual forward order. Stepping to the previous record happens eagerly
//! at the end of `read_r_data`, but a failure there is reported lazily by
//! the next `read_type`, the same deferred-error pattern the forward reader
//! uses for trailer damage.
//!
//! [`BinaryBackwardReader`]: self::BinaryBackwardReader
//! [`BinaryForwardReader`]: crate::readers::binaryforwardreader::BinaryForwardReader

use crate::common::{BufIndex, BufSz, Bytes, Count, FPath, FileOffset, FileSz, ResultS3};
use crate::data::record::{
    CorrelationValues,
    TimeTag,
    BACKTRACK_TAG,
    BACKTRACK_TRAILER_SZ,
    BIN_RECORD_HEAD_SZ,
    RECORD_TYPE_R,
    RECORD_TYPE_Ru8,
};
use crate::de_err;
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
use std::io::{Error, ErrorKind, Read, Seek, SeekFrom};

use ::min_max::min;
use ::more_asserts::{debug_assert_ge, debug_assert_le};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Smallest well-formed binary record: head + count field, zero values.
const RECORD_LEN_MIN: usize = BIN_RECORD_HEAD_SZ + 4;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BinaryBackwardReader

/// Reverse sequential reader of binary r-record files, back to front.
pub struct BinaryBackwardReader {
    /// Path to the file.
    path: FPath,
    /// The file handle; `Some` between `open` and `close`.
    file: Option<File>,
    /// File size in bytes, set in `open`.
    pub(crate) filesz: FileSz,
    /// Configured buffer size cap; the allocation is `min(bufsz, filesz)`.
    bufsz: BufSz,
    /// The internal byte buffer. Length fixed at `open`.
    buffer: Bytes,
    /// Count of valid bytes currently loaded, `≤ buffer.len()`.
    loaded: usize,
    /// File offset of buffer index 0.
    chunk_file_offset: FileOffset,
    /// File offset of the record boundary the next backward step works
    /// from: file end at `open`, then the start of each record consumed.
    next_boundary: FileOffset,
    /// Buffer index of the current record's backtracking trailer tag.
    backtrack_index: BufIndex,
    /// Buffer index of the current record's first byte (its type marker).
    record_start: BufIndex,
    /// Length of the current record, trailer excluded.
    record_len: usize,
    /// Cursor within the current record.
    cursor: BufIndex,
    /// A current record is located and not yet drained.
    primed: bool,
    /// The record starting at file offset 0 has been consumed; nothing
    /// earlier exists.
    drained: bool,
    /// Where in the per-record call cycle this reader is.
    phase: RecordPhase,
    /// Set once `read_type` observes the end of the records.
    eof: bool,
    /// Deferred error from the eager backward step at the end of
    /// `read_r_data`, reported at the next `read_type`.
    pending_error: Option<ReadError>,
    /// `Count` of records fully decoded.
    count_records: Count,
    /// `Count` of bytes loaded from the file.
    count_bytes_loaded: Count,
    /// `Count` of chunk loads.
    count_chunk_loads: Count,
}

impl fmt::Debug for BinaryBackwardReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("BinaryBackwardReader")
            .field("path", &self.path)
            .field("filesz", &self.filesz)
            .field("bufsz", &self.bufsz)
            .field("loaded", &self.loaded)
            .field("chunk_file_offset", &self.chunk_file_offset)
            .field("next_boundary", &self.next_boundary)
            .field("record_start", &self.record_start)
            .field("record_len", &self.record_len)
            .field("primed", &self.primed)
            .field("phase", &self.phase)
            .field("eof", &self.eof)
            .field("records", &self.count_records)
            .finish()
    }
}

impl BinaryBackwardReader {
    /// Create a new idle `BinaryBackwardReader`; nothing is touched until
    /// `open`.
    pub fn new(path: FPath) -> BinaryBackwardReader {
        defñ!("({:?})", path);
        BinaryBackwardReader {
            path,
            file: None,
            filesz: 0,
            bufsz: BUFSZ_DEF,
            buffer: Bytes::new(),
            loaded: 0,
            chunk_file_offset: 0,
            next_boundary: 0,
            backtrack_index: 0,
            record_start: 0,
            record_len: 0,
            cursor: 0,
            primed: false,
            drained: false,
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

    /// Load the window of bytes ending at file offset `end_fo`, as much as
    /// the buffer holds.
    fn load_chunk_ending_at(
        &mut self,
        end_fo: FileOffset,
    ) -> Result<(), Error> {
        defn!("({})", end_fo);
        debug_assert_ge!(end_fo, 1);
        let file: &mut File = match self.file.as_mut() {
            Some(val) => val,
            None => {
                return Err(Error::new(ErrorKind::NotConnected, "reader is not open"));
            }
        };
        let want: usize = min!(self.buffer.len() as FileSz, end_fo) as usize;
        let seek: FileOffset = end_fo - want as FileOffset;
        file.seek(SeekFrom::Start(seek))?;
        file.read_exact(&mut self.buffer[0..want])?;
        self.chunk_file_offset = seek;
        self.loaded = want;
        self.count_bytes_loaded += want as Count;
        self.count_chunk_loads += 1;
        defx!("loaded {} at file offset {}", want, seek);

        Ok(())
    }

    /// Locate the record whose backtracking trailer ends exactly at file
    /// offset `bound_fo`, loading an earlier chunk when it is not resident,
    /// and prime it for reading.
    ///
    /// `bound_fo` must be a known record boundary greater than zero.
    fn locate_record_before(
        &mut self,
        bound_fo: FileOffset,
    ) -> Result<(), ReadError> {
        defn!("({})", bound_fo);
        debug_assert_ge!(bound_fo, 1);
        // fast path: boundary and the whole record below it are resident
        if bound_fo > self.chunk_file_offset
            && bound_fo <= self.chunk_file_offset + self.loaded as FileOffset
        {
            let bound_bi: BufIndex = (bound_fo - self.chunk_file_offset) as BufIndex;
            if bound_bi >= BACKTRACK_TRAILER_SZ {
                let (len, resident) = self.trailer_at(bound_bi, bound_fo)?;
                if resident {
                    self.prime(bound_bi, len);
                    defx!("primed in place");
                    return Ok(());
                }
            }
        }
        // the record (or its trailer) extends below the loaded window;
        // reload the maximal window ending at the boundary
        match self.load_chunk_ending_at(bound_fo) {
            Ok(_) => {}
            Err(err) => {
                de_err!("load_chunk_ending_at({}) {:?} {}", bound_fo, self.path, err);
                defx!("load failed");
                return Err(ReadError::Io(err));
            }
        }
        let bound_bi: BufIndex = self.loaded;
        if bound_bi < BACKTRACK_TRAILER_SZ {
            // a maximal window cannot even hold a trailer
            defx!("window smaller than a trailer");
            if bound_fo < BACKTRACK_TRAILER_SZ as FileOffset {
                return Err(ReadError::Corrupt(format!(
                    "{} bytes before record boundary cannot hold a backtracking trailer, file {:?}",
                    bound_fo, self.path,
                )));
            }
            return Err(ReadError::BufferTooSmall {
                bufsz: self.buffer.len(),
                need: BACKTRACK_TRAILER_SZ,
            });
        }
        let (len, resident) = self.trailer_at(bound_bi, bound_fo)?;
        if !resident {
            let need: usize = len + BACKTRACK_TRAILER_SZ;
            defx!("record not resident in maximal window");
            if bound_fo < need as FileOffset {
                return Err(ReadError::Corrupt(format!(
                    "backtracking trailer length {} points before the start of file {:?}",
                    len, self.path,
                )));
            }
            return Err(ReadError::BufferTooSmall {
                bufsz: self.buffer.len(),
                need,
            });
        }
        self.prime(bound_bi, len);
        defx!("primed after reload");

        Ok(())
    }

    /// Decode and validate the trailer occupying the 5 bytes below buffer
    /// index `bound_bi`. Returns the record length it carries and whether
    /// that whole record is resident at-or-above buffer index 0.
    fn trailer_at(
        &self,
        bound_bi: BufIndex,
        bound_fo: FileOffset,
    ) -> Result<(usize, bool), ReadError> {
        debug_assert_ge!(bound_bi, BACKTRACK_TRAILER_SZ);
        let tag_bi: BufIndex = bound_bi - BACKTRACK_TRAILER_SZ;
        let tag: u8 = self.buffer[tag_bi];
        if tag != BACKTRACK_TAG {
            return Err(ReadError::Corrupt(format!(
                "expected backtracking tag {:?} below file offset {}, found byte 0x{:02x}, file {:?}",
                BACKTRACK_TAG as char, bound_fo, tag, self.path,
            )));
        }
        let mut len_bytes: [u8; 4] = [0; 4];
        len_bytes.copy_from_slice(&self.buffer[tag_bi + 1..bound_bi]);
        let len_i32: i32 = i32::from_ne_bytes(len_bytes);
        if (len_i32 as isize) < RECORD_LEN_MIN as isize {
            return Err(ReadError::Corrupt(format!(
                "backtracking trailer length {} below file offset {} is shorter than any record, file {:?}",
                len_i32, bound_fo, self.path,
            )));
        }
        let len: usize = len_i32 as usize;
        let resident: bool = tag_bi >= len;

        Ok((len, resident))
    }

    /// Set the current-record indexes for the record of length `len` whose
    /// trailer ends at buffer index `bound_bi`.
    fn prime(
        &mut self,
        bound_bi: BufIndex,
        len: usize,
    ) {
        self.backtrack_index = bound_bi - BACKTRACK_TRAILER_SZ;
        self.record_start = self.backtrack_index - len;
        self.record_len = len;
        self.cursor = self.record_start;
        self.primed = true;
    }

    /// Consume `COUNT` bytes at the cursor; the whole record is resident so
    /// a shortfall against the record end (its trailer tag) is corruption,
    /// never a refill.
    fn take_in_record<const COUNT: usize>(&mut self) -> Result<[u8; COUNT], ReadError> {
        let record_end: BufIndex = self.backtrack_index;
        if self.cursor + COUNT > record_end {
            return Err(ReadError::Corrupt(format!(
                "record at file offset {} too short: {} bytes remain of {} needed, file {:?}",
                self.chunk_file_offset + self.record_start as FileOffset,
                record_end - self.cursor,
                COUNT,
                self.path,
            )));
        }
        let mut bytes: [u8; COUNT] = [0; COUNT];
        bytes.copy_from_slice(&self.buffer[self.cursor..self.cursor + COUNT]);
        self.cursor += COUNT;

        Ok(bytes)
    }

    /// The eager backward step at the end of `read_r_data`: make the record
    /// before the one just consumed current, or mark the stream drained at
    /// the beginning of file. Errors are stored for the next `read_type`.
    fn backtrack_to_previous_record(&mut self) {
        defn!();
        self.primed = false;
        self.next_boundary = self.chunk_file_offset + self.record_start as FileOffset;
        if self.next_boundary == 0 {
            // consumed the first record of the file; legitimate end
            self.drained = true;
            defx!("beginning of file");
            return;
        }
        match self.locate_record_before(self.next_boundary) {
            Ok(_) => {}
            Err(err) => {
                self.pending_error = Some(err);
            }
        }
        defx!();
    }
}

impl RecordReader for BinaryBackwardReader {
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
        self.next_boundary = filesz;
        // first chunk load, from the file end; the last record is located
        // lazily at the first read_type
        match self.load_chunk_ending_at(filesz) {
            Ok(_) => {}
            Err(err) => {
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
        if self.eof || self.drained {
            self.eof = true;
            defx!("return Done");
            return ResultS3::Done;
        }
        if !self.primed {
            // first call after open
            match self.locate_record_before(self.next_boundary) {
                Ok(_) => {}
                Err(err) => {
                    defx!("locate failed");
                    return ResultS3::Err(err);
                }
            }
        }
        debug_assert_le!(self.cursor, self.backtrack_index);
        let byte: u8 = match self.take_in_record::<1>() {
            Ok(val) => val[0],
            Err(err) => {
                defx!("take failed");
                return ResultS3::Err(err);
            }
        };
        if byte != RECORD_TYPE_Ru8 {
            defx!("bad type byte");
            return ResultS3::Err(ReadError::Corrupt(format!(
                "unexpected record type byte 0x{:02x} at file offset {}, file {:?}",
                byte,
                self.chunk_file_offset + self.record_start as FileOffset,
                self.path,
            )));
        }
        self.phase = RecordPhase::TypeRead;
        defx!("return Found({:?})", RECORD_TYPE_R);

        ResultS3::Found(RECORD_TYPE_R)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TypeRead, "read_active_flag");
        let byte: u8 = self.take_in_record::<1>()?[0];
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
        self.phase = RecordPhase::ActiveRead;
        defx!("return {}", active);

        Ok(active)
    }

    fn read_time(&mut self) -> Result<TimeTag, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::ActiveRead, "read_time");
        let time: TimeTag = TimeTag::from_ne_bytes(self.take_in_record::<8>()?);
        self.phase = RecordPhase::TimeRead;
        defx!("return {}", time);

        Ok(time)
    }

    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TimeRead, "read_r_data");
        let count: i32 = i32::from_ne_bytes(self.take_in_record::<4>()?);
        if count < 0 {
            defx!("negative count");
            return Err(ReadError::Corrupt(format!(
                "negative correlation count {}, file {:?}",
                count, self.path,
            )));
        }
        // the in-band count and the trailer length must describe the same
        // record extent
        let expect_len: usize = BIN_RECORD_HEAD_SZ + 4 + (count as usize) * 8;
        if expect_len != self.record_len {
            defx!("length mismatch");
            return Err(ReadError::Corrupt(format!(
                "correlation count {} implies record length {} but the trailer says {}, file {:?}",
                count, expect_len, self.record_len, self.path,
            )));
        }
        let mut values: CorrelationValues = CorrelationValues::with_capacity(count as usize);
        for _ in 0..count {
            let value: f64 = f64::from_ne_bytes(self.take_in_record::<8>()?);
            check_correlation(value)?;
            values.push(value);
        }
        self.phase = RecordPhase::Completed;
        self.count_records += 1;
        // step to the previous record now; any failure is reported by the
        // next read_type
        self.backtrack_to_previous_record();
        defx!("return {} values", values.len());

        Ok(values)
    }

    fn close(&mut self) -> Result<(), Error> {
        defñ!("({:?})", self.path);
        self.file = None;
        self.buffer = Bytes::new();
        self.loaded = 0;
        self.primed = false;

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
