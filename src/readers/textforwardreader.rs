// src/readers/textforwardreader.rs

//! Implements a [`TextForwardReader`], sequential decode of tag-delimited
//! textual r-records with incremental buffer compaction and refill, and the
//! record-window decode functions shared with [`TextBackwardReader`].
//!
//! One record on disk:
//!
//! ```text
//! <r s="a">  1.5  0.25 -0.5 0.125  </r>
//! ```
//!
//! Whitespace-tolerant everywhere inside the tag and around tokens. The
//! opening tag holds generic `name="value"` attributes in any order; the
//! optional `s` attribute must be `"a"` (active) or `"r"` (removed) and
//! defaults to active. The correlation count is implied by the
//! whitespace-separated value list. Every correlation must lie in
//! `[-1.0, 1.0]`.
//!
//! `read_type` locates the whole record up front by scanning for two `'>'`
//! characters, compacting-and-refilling once when the record straddles the
//! loaded window; a record that still has no second `'>'` after that one
//! refill is a truncated or oversized record, reported as corruption. The
//! later cycle calls decode inside the located window and never touch the
//! file.
//!
//! [`TextForwardReader`]: self::TextForwardReader
//! [`TextBackwardReader`]: crate::readers::textbackwardreader::TextBackwardReader

use crate::common::{BufIndex, BufSz, Bytes, Count, FPath, FileOffset, FileSz, ResultS3};
use crate::data::record::{CorrelationValues, TimeTag, RECORD_TYPE_R};
use crate::readers::bytescan::{
    is_closing_r_tag,
    is_space,
    next_token,
    parse_f64,
    scan_attributes,
    skip_space_fwd,
    Attribute,
};
#[cfg(any(debug_assertions, test))]
use crate::debug::printers::byte_to_char_noraw;
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

use ::bstr::ByteSlice;
use ::memchr::memchr;
use ::min_max::min;
use ::more_asserts::debug_assert_le;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// record-window decoding, shared by the forward and backward text readers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode the opening tag spanning `tag_beg..=first_gt`: validate the tag
/// letter, scan the attributes, resolve the active flag.
pub(crate) fn decode_opening_tag(
    buf: &[u8],
    tag_beg: BufIndex,
    first_gt: BufIndex,
    path: &FPath,
) -> Result<bool, ReadError> {
    defñ!("({}‥{})", tag_beg, first_gt);
    // tag letter, whitespace-tolerant after '<'
    let letter_bi: BufIndex = skip_space_fwd(buf, tag_beg + 1, first_gt);
    if letter_bi == first_gt || buf[letter_bi].to_ascii_lowercase() != RECORD_TYPE_R as u8 {
        return Err(ReadError::Corrupt(format!(
            "opening tag {:?} is not an r-record tag, file {:?}",
            buf[tag_beg..=first_gt].as_bstr(),
            path,
        )));
    }
    // the letter must stand alone ahead of any attributes
    if letter_bi + 1 < first_gt && !is_space(buf[letter_bi + 1]) {
        return Err(ReadError::Corrupt(format!(
            "opening tag {:?} is not an r-record tag, file {:?}",
            buf[tag_beg..=first_gt].as_bstr(),
            path,
        )));
    }
    let attributes: Vec<Attribute> = match scan_attributes(buf, letter_bi + 1, first_gt) {
        Ok(val) => val,
        Err(msg) => {
            return Err(ReadError::Corrupt(format!(
                "opening tag attributes: {}, file {:?}",
                msg, path,
            )));
        }
    };
    let mut active: bool = true;
    for (name, value) in attributes.iter() {
        if name != "s" {
            // unknown attributes pass through unexamined
            continue;
        }
        active = match value.as_str() {
            "a" => true,
            "r" => false,
            _ => {
                return Err(ReadError::Corrupt(format!(
                    "s attribute must be \"a\" or \"r\", found {:?}, file {:?}",
                    value, path,
                )));
            }
        };
    }

    Ok(active)
}

/// Decode the time tag token at `at`, bounded by the record window `end`.
/// Returns the time and the cursor one past the token.
pub(crate) fn decode_time(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
    path: &FPath,
) -> Result<(TimeTag, BufIndex), ReadError> {
    let (tok_beg, tok_end): (BufIndex, BufIndex) = match next_token(buf, at, end) {
        Some(val) => val,
        None => {
            return Err(ReadError::Corrupt(format!(
                "record has no time tag, file {:?}",
                path,
            )));
        }
    };
    if buf[tok_beg] == b'<' {
        return Err(ReadError::Corrupt(format!(
            "record has no time tag, file {:?}",
            path,
        )));
    }
    let time: TimeTag = match parse_f64(&buf[tok_beg..tok_end]) {
        Ok(val) => val,
        Err(msg) => {
            return Err(ReadError::BadNumericLiteral(format!(
                "time tag: {}, file {:?}",
                msg, path,
            )));
        }
    };

    Ok((time, tok_end))
}

/// Decode the correlation values from `at` to the record's closing tag at
/// `end`. The token after the last value must be exactly the whole closing
/// tag; anything else is a malformed record. Returns the values and the
/// cursor at `end`.
pub(crate) fn decode_values(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
    scratch: &mut Vec<u8>,
    path: &FPath,
) -> Result<(CorrelationValues, BufIndex), ReadError> {
    let mut values: CorrelationValues = CorrelationValues::new();
    let mut cursor: BufIndex = at;
    loop {
        let (tok_beg, tok_end): (BufIndex, BufIndex) = match next_token(buf, cursor, end) {
            Some(val) => val,
            None => {
                return Err(ReadError::Corrupt(format!(
                    "record has no closing tag, file {:?}",
                    path,
                )));
            }
        };
        if buf[tok_beg] == b'<' {
            if tok_end == end && is_closing_r_tag(buf, tok_beg, tok_end, scratch) {
                cursor = end;
                break;
            }
            return Err(ReadError::Corrupt(format!(
                "expected closing tag </r>, found {:?}, file {:?}",
                buf[tok_beg..tok_end].as_bstr(),
                path,
            )));
        }
        let value: f64 = match parse_f64(&buf[tok_beg..tok_end]) {
            Ok(val) => val,
            Err(msg) => {
                return Err(ReadError::BadNumericLiteral(format!(
                    "correlation value: {}, file {:?}",
                    msg, path,
                )));
            }
        };
        check_correlation(value)?;
        values.push(value);
        cursor = tok_end;
    }

    Ok((values, cursor))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TextForwardReader

/// Sequential reader of textual r-record files, front to back.
pub struct TextForwardReader {
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
    /// Index of the first unconsumed byte, `≤ loaded`.
    cursor: BufIndex,
    /// File offset of the next byte to load.
    file_pos: FileOffset,
    /// End of the current record's window: one past the `'>'` of `</r>`.
    /// Valid while a record cycle is underway.
    record_end: BufIndex,
    /// Active flag pre-decoded from the opening tag by `read_type`.
    active_pending: bool,
    /// Lazily-grown scratch for whitespace-stripped tag comparison.
    tag_scratch: Vec<u8>,
    /// Where in the per-record call cycle this reader is.
    phase: RecordPhase,
    /// Set once `read_type` observes the end of the records.
    eof: bool,
    /// `Count` of records fully decoded.
    count_records: Count,
    /// `Count` of bytes loaded from the file.
    count_bytes_loaded: Count,
    /// `Count` of chunk loads (initial load and refills).
    count_chunk_loads: Count,
}

impl fmt::Debug for TextForwardReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("TextForwardReader")
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

impl TextForwardReader {
    /// Create a new idle `TextForwardReader`; nothing is touched until
    /// `open`.
    pub fn new(path: FPath) -> TextForwardReader {
        defñ!("({:?})", path);
        TextForwardReader {
            path,
            file: None,
            filesz: 0,
            bufsz: BUFSZ_DEF,
            buffer: Bytes::new(),
            loaded: 0,
            cursor: 0,
            file_pos: 0,
            record_end: 0,
            active_pending: true,
            tag_scratch: Vec::new(),
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

    /// Discard everything below `keep_from`, move the tail to offset 0,
    /// and append bytes from the file until the buffer is full or the file
    /// is drained. Returns the count of bytes appended.
    fn refill_from(
        &mut self,
        keep_from: BufIndex,
    ) -> Result<usize, Error> {
        defn!("keep_from {} cursor {} loaded {}", keep_from, self.cursor, self.loaded);
        debug_assert_le!(keep_from, self.loaded);
        let file: &mut File = match self.file.as_mut() {
            Some(val) => val,
            None => {
                return Err(Error::new(ErrorKind::NotConnected, "reader is not open"));
            }
        };
        if keep_from > 0 {
            self.buffer.copy_within(keep_from..self.loaded, 0);
            self.loaded -= keep_from;
            self.cursor -= keep_from.min(self.cursor);
        }
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

    /// Find the two `'>'` that close the opening tag and the closing tag
    /// of the record starting at `at`.
    fn find_two_gt(
        &self,
        at: BufIndex,
    ) -> Option<(BufIndex, BufIndex)> {
        let first: BufIndex = at + memchr(b'>', &self.buffer[at..self.loaded])?;
        let second: BufIndex = first + 1 + memchr(b'>', &self.buffer[first + 1..self.loaded])?;

        Some((first, second))
    }
}

impl RecordReader for TextForwardReader {
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
        match self.refill_from(0) {
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
        // skip inter-record whitespace, refilling as often as it runs
        loop {
            self.cursor = skip_space_fwd(&self.buffer, self.cursor, self.loaded);
            if self.cursor < self.loaded {
                break;
            }
            let added: usize = match self.refill_from(self.loaded) {
                Ok(val) => val,
                Err(err) => {
                    defx!("refill failed");
                    return ResultS3::Err(ReadError::Io(err));
                }
            };
            if added == 0 {
                // only whitespace remained; no opening '<' was seen, so
                // this is the legitimate end of the records
                self.eof = true;
                defx!("return Done");
                return ResultS3::Done;
            }
        }
        defo!("cursor byte {:?}", byte_to_char_noraw(self.buffer[self.cursor]));
        if self.buffer[self.cursor] != b'<' {
            defx!("not a tag start");
            return ResultS3::Err(ReadError::Corrupt(format!(
                "expected a record opening tag, found {:?}, file {:?}",
                self.buffer[self.cursor] as char, self.path,
            )));
        }
        // locate the record: two '>' close the opening tag then </r>;
        // one compact-and-refill when the record straddles the window
        let mut refilled: bool = false;
        let (first_gt, second_gt): (BufIndex, BufIndex) = loop {
            if let Some(val) = self.find_two_gt(self.cursor) {
                break val;
            }
            if refilled {
                defx!("no second '>' after refill");
                return ResultS3::Err(ReadError::Corrupt(format!(
                    "record is truncated or does not fit the {} byte buffer, file {:?}",
                    self.buffer.len(),
                    self.path,
                )));
            }
            match self.refill_from(self.cursor) {
                Ok(_) => {}
                Err(err) => {
                    defx!("refill failed");
                    return ResultS3::Err(ReadError::Io(err));
                }
            }
            refilled = true;
        };
        let active: bool = match decode_opening_tag(&self.buffer, self.cursor, first_gt, &self.path)
        {
            Ok(val) => val,
            Err(err) => {
                defx!("bad opening tag");
                return ResultS3::Err(err);
            }
        };
        self.active_pending = active;
        self.record_end = second_gt + 1;
        self.cursor = first_gt + 1;
        self.phase = RecordPhase::TypeRead;
        defx!("return Found({:?})", RECORD_TYPE_R);

        ResultS3::Found(RECORD_TYPE_R)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TypeRead, "read_active_flag");
        // pre-decoded from the opening tag's s attribute by read_type
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
        let (values, cursor): (CorrelationValues, BufIndex) = decode_values(
            &self.buffer,
            self.cursor,
            self.record_end,
            &mut self.tag_scratch,
            &self.path,
        )?;
        self.cursor = cursor;
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
