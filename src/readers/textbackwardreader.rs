// src/readers/textbackwardreader.rs

//! Implements a [`TextBackwardReader`], reverse sequential decode of
//! tag-delimited textual r-records.
//!
//! Record layout is shared with [`TextForwardReader`]. There are no
//! backtracking markers in the text encoding; the previous complete record
//! is found by scanning raw bytes backward: the last non-whitespace byte
//! must be the `'>'` of a closing tag, backward from there to its matching
//! `'<'` which must read `</r>`, backward again to the nearest `'<'` which
//! must open a well-formed `<r ...>` tag.
//!
//! The loaded window always ends either at the file end (`open`), at the
//! start of the record just consumed, or at a record boundary the scan
//! re-aligned to. When a backward scan runs below the window start, the
//! window is reloaded ending at the byte the scan still needs; a window
//! that is already maximal there means the record cannot fit the
//! configured buffer, the dedicated buffer-too-small error. A window of
//! nothing but whitespace is not an error; it triggers a further backward
//! read.
//!
//! Records come out newest-first; the fields of each record are decoded in
//! the usual forward order inside the located window.
//!
//! [`TextBackwardReader`]: self::TextBackwardReader
//! [`TextForwardReader`]: crate::readers::textforwardreader::TextForwardReader

use crate::common::{BufIndex, BufSz, Bytes, Count, FPath, FileOffset, FileSz, ResultS3};
use crate::data::record::{CorrelationValues, TimeTag, RECORD_TYPE_R};
use crate::readers::bytescan::{is_closing_r_tag, rfind_non_space};
#[cfg(any(debug_assertions, test))]
use crate::debug::printers::byte_to_char_noraw;
use crate::readers::recordreader::{
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
use crate::readers::helpers::fpath_to_path;
use crate::readers::textforwardreader::{decode_opening_tag, decode_time, decode_values};

use std::fmt;
use std::fs::File;
use std::io::{Error, ErrorKind, Read, Seek, SeekFrom};

use ::memchr::{memchr, memrchr};
use ::min_max::min;
use ::more_asserts::debug_assert_ge;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TextBackwardReader

/// Reverse sequential reader of textual r-record files, back to front.
pub struct TextBackwardReader {
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
    /// File offset one past the last unconsumed byte: file end at `open`,
    /// then the start of each record consumed.
    tail_fo: FileOffset,
    /// Start of the current record's window: its `'<'`.
    record_beg: BufIndex,
    /// End of the current record's window: one past the `'>'` of `</r>`.
    record_end: BufIndex,
    /// Cursor within the current record.
    cursor: BufIndex,
    /// Active flag pre-decoded from the opening tag during location.
    active_pending: bool,
    /// Lazily-grown scratch for whitespace-stripped tag comparison.
    tag_scratch: Vec<u8>,
    /// A current record is located and not yet drained.
    primed: bool,
    /// Where in the per-record call cycle this reader is.
    phase: RecordPhase,
    /// Set once `read_type` observes the end of the records.
    eof: bool,
    /// `Count` of records fully decoded.
    count_records: Count,
    /// `Count` of bytes loaded from the file.
    count_bytes_loaded: Count,
    /// `Count` of chunk loads.
    count_chunk_loads: Count,
}

impl fmt::Debug for TextBackwardReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("TextBackwardReader")
            .field("path", &self.path)
            .field("filesz", &self.filesz)
            .field("bufsz", &self.bufsz)
            .field("loaded", &self.loaded)
            .field("chunk_file_offset", &self.chunk_file_offset)
            .field("tail_fo", &self.tail_fo)
            .field("record_beg", &self.record_beg)
            .field("record_end", &self.record_end)
            .field("primed", &self.primed)
            .field("phase", &self.phase)
            .field("eof", &self.eof)
            .field("records", &self.count_records)
            .finish()
    }
}

/// What a backward scan that ran below the window start should do next.
enum Underflow {
    /// An earlier window was loaded; re-run the scan.
    Reloaded,
    /// No earlier window can help.
    Fail(ReadError),
}

impl TextBackwardReader {
    /// Create a new idle `TextBackwardReader`; nothing is touched until
    /// `open`.
    pub fn new(path: FPath) -> TextBackwardReader {
        defñ!("({:?})", path);
        TextBackwardReader {
            path,
            file: None,
            filesz: 0,
            bufsz: BUFSZ_DEF,
            buffer: Bytes::new(),
            loaded: 0,
            chunk_file_offset: 0,
            tail_fo: 0,
            record_beg: 0,
            record_end: 0,
            cursor: 0,
            active_pending: true,
            tag_scratch: Vec::new(),
            primed: false,
            phase: RecordPhase::Completed,
            eof: false,
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

    /// A backward scan needed a byte below the window start. Load the
    /// maximal window ending at `need_end_bi` (current indexes) so the
    /// scan can retry, or decide that no window can hold this record.
    fn scan_underflow(
        &mut self,
        need_end_bi: BufIndex,
        what: &str,
    ) -> Underflow {
        defn!("({}, {})", need_end_bi, what);
        let need_end_fo: FileOffset = self.chunk_file_offset + need_end_bi as FileOffset;
        if self.chunk_file_offset == 0 {
            // the window reaches the file start; there simply is no more
            defx!("at file start");
            return Underflow::Fail(ReadError::Corrupt(format!(
                "{} runs past the start of file {:?}",
                what, self.path,
            )));
        }
        if self.loaded == self.buffer.len()
            && self.chunk_file_offset + self.loaded as FileOffset == need_end_fo
        {
            // the window ending here is already maximal
            defx!("window already maximal");
            return Underflow::Fail(ReadError::BufferTooSmall {
                bufsz: self.buffer.len(),
                need: self.buffer.len() + 1,
            });
        }
        match self.load_chunk_ending_at(need_end_fo) {
            Ok(_) => {}
            Err(err) => {
                defx!("load failed");
                return Underflow::Fail(ReadError::Io(err));
            }
        }
        defx!("reloaded");

        Underflow::Reloaded
    }

    /// Locate the complete record nearest below `self.tail_fo` and prime
    /// it for reading. `Done` means only whitespace lies between the tail
    /// and the start of the file: every record is consumed.
    fn locate_previous_record(&mut self) -> ResultS3<(), ReadError> {
        defn!("tail_fo {}", self.tail_fo);
        debug_assert_ge!(self.tail_fo, self.chunk_file_offset);
        // the tail can sit above the window end after an earlier scan slid
        // the window backward; everything between is known whitespace
        let mut scan_end: BufIndex =
            if self.tail_fo >= self.chunk_file_offset + self.loaded as FileOffset {
                self.loaded
            } else {
                (self.tail_fo - self.chunk_file_offset) as BufIndex
            };
        'restart: loop {
            // skip trailing whitespace backward; a window of nothing but
            // whitespace triggers a further backward read
            let p: BufIndex = loop {
                match rfind_non_space(&self.buffer, 0, scan_end) {
                    Some(val) => break val,
                    None => {}
                }
                if self.chunk_file_offset == 0 {
                    // whitespace all the way to the file start
                    defx!("return Done");
                    return ResultS3::Done;
                }
                let end_fo: FileOffset = self.chunk_file_offset;
                match self.load_chunk_ending_at(end_fo) {
                    Ok(_) => {}
                    Err(err) => {
                        defx!("load failed");
                        return ResultS3::Err(ReadError::Io(err));
                    }
                }
                scan_end = self.loaded;
            };
            defo!("last non-whitespace {:?} at {}", byte_to_char_noraw(self.buffer[p]), p);
            if self.buffer[p] != b'>' {
                defx!("no closing '>'");
                return ResultS3::Err(ReadError::Corrupt(format!(
                    "expected the '>' of a record closing tag, found {:?}, file {:?}",
                    self.buffer[p] as char, self.path,
                )));
            }
            // the '<' of the closing tag
            let close_lt: BufIndex = match memrchr(b'<', &self.buffer[0..p]) {
                Some(val) => val,
                None => {
                    match self.scan_underflow(p + 1, "a record closing tag") {
                        Underflow::Reloaded => {
                            scan_end = self.loaded;
                            continue 'restart;
                        }
                        Underflow::Fail(err) => {
                            defx!("underflow");
                            return ResultS3::Err(err);
                        }
                    }
                }
            };
            if !is_closing_r_tag(&self.buffer, close_lt, p + 1, &mut self.tag_scratch) {
                defx!("not a closing tag");
                return ResultS3::Err(ReadError::Corrupt(format!(
                    "expected closing tag </r> before file offset {}, file {:?}",
                    self.chunk_file_offset + (p + 1) as FileOffset,
                    self.path,
                )));
            }
            // the '<' of the opening tag; the record body holds no '<'
            let record_beg: BufIndex = match memrchr(b'<', &self.buffer[0..close_lt]) {
                Some(val) => val,
                None => {
                    match self.scan_underflow(p + 1, "a record") {
                        Underflow::Reloaded => {
                            scan_end = self.loaded;
                            continue 'restart;
                        }
                        Underflow::Fail(err) => {
                            defx!("underflow");
                            return ResultS3::Err(err);
                        }
                    }
                }
            };
            // the '>' of the opening tag
            let first_gt: BufIndex = match memchr(b'>', &self.buffer[record_beg..close_lt]) {
                Some(off) => record_beg + off,
                None => {
                    defx!("opening tag unterminated");
                    return ResultS3::Err(ReadError::Corrupt(format!(
                        "record opening tag at file offset {} is unterminated, file {:?}",
                        self.chunk_file_offset + record_beg as FileOffset,
                        self.path,
                    )));
                }
            };
            let active: bool =
                match decode_opening_tag(&self.buffer, record_beg, first_gt, &self.path) {
                    Ok(val) => val,
                    Err(err) => {
                        defx!("bad opening tag");
                        return ResultS3::Err(err);
                    }
                };
            self.record_beg = record_beg;
            self.record_end = p + 1;
            self.cursor = first_gt + 1;
            self.active_pending = active;
            self.primed = true;
            defx!("primed {}‥{}", record_beg, p + 1);
            return ResultS3::Found(());
        }
    }
}

impl RecordReader for TextBackwardReader {
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
        self.tail_fo = filesz;
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
        if self.eof {
            defx!("eof");
            return ResultS3::Done;
        }
        if !self.primed {
            match self.locate_previous_record() {
                ResultS3::Found(_) => {}
                ResultS3::Done => {
                    self.eof = true;
                    defx!("return Done");
                    return ResultS3::Done;
                }
                ResultS3::Err(err) => {
                    defx!("locate failed");
                    return ResultS3::Err(err);
                }
            }
        }
        self.phase = RecordPhase::TypeRead;
        defx!("return Found({:?})", RECORD_TYPE_R);

        ResultS3::Found(RECORD_TYPE_R)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TypeRead, "read_active_flag");
        // pre-decoded from the opening tag during record location
        self.phase = RecordPhase::ActiveRead;
        defx!("return {}", self.active_pending);

        Ok(self.active_pending)
    }

    fn read_time(&mut self) -> Result<TimeTag, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::ActiveRead, "read_time");
        let (time, cursor): (TimeTag, BufIndex) =
            decode_time(&self.buffer, self.cursor, self.record_end, &self.path)?;
        self.cursor = cursor;
        self.phase = RecordPhase::TimeRead;
        defx!("return {}", time);

        Ok(time)
    }

    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TimeRead, "read_r_data");
        let (values, _cursor): (CorrelationValues, BufIndex) = decode_values(
            &self.buffer,
            self.cursor,
            self.record_end,
            &mut self.tag_scratch,
            &self.path,
        )?;
        // the record is consumed; the next backward search ends at its '<'
        self.tail_fo = self.chunk_file_offset + self.record_beg as FileOffset;
        self.primed = false;
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
        self.primed = false;

        Ok(())
    }

    fn summary(&self) -> SummaryRecordStream {
        SummaryRecordStream {
            count_records: self.count_records,
            count_chunk_loads: self.count_chunk_loads,
            count_bytes_loaded: self.count_bytes_loaded,
        }
    }
}
