// src/readers/rmatrixreader.rs

//! Implements the [`RMatrixReader`] facade: one reader interface over every
//! physical r-record channel.
//!
//! An `RMatrixReader` owns exactly one concrete reader, chosen once at
//! construction from the [`ChannelMetadata`] resolved by the external
//! header parser, and delegates every call to it. It decodes nothing
//! itself. The header parser's accumulated warnings and errors ride along
//! as a side channel: a non-empty error list blocks `open`, a non-empty
//! warning list does not, and neither is ever mixed into read-path errors.
//!
//! [`RMatrixReader`]: self::RMatrixReader
//! [`ChannelMetadata`]: crate::data::channel::ChannelMetadata

use crate::common::{BufSz, ResultS3};
use crate::data::channel::{
    ChannelDirection,
    ChannelEncoding,
    ChannelMetadata,
    ChannelSource,
};
use crate::data::record::{CorrelationValues, RMatrixRecord, TimeTag};
use crate::readers::binarybackwardreader::BinaryBackwardReader;
use crate::readers::binaryforwardreader::BinaryForwardReader;
use crate::readers::recordreader::{
    OpenError,
    ReadError,
    RecordReader,
    ResultReadType,
    SummaryRecordStream,
};
use crate::readers::socketreader::SocketReader;
use crate::readers::textbackwardreader::TextBackwardReader;
use crate::readers::textforwardreader::TextForwardReader;

use std::fmt;
use std::io::Error;

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of concrete readers a channel can resolve to, selected
/// once at construction.
pub enum ChannelReader {
    FileBinFwd(BinaryForwardReader),
    FileBinBwd(BinaryBackwardReader),
    FileTxtFwd(TextForwardReader),
    FileTxtBwd(TextBackwardReader),
    Socket(SocketReader),
}

impl fmt::Debug for ChannelReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            ChannelReader::FileBinFwd(reader) => reader.fmt(f),
            ChannelReader::FileBinBwd(reader) => reader.fmt(f),
            ChannelReader::FileTxtFwd(reader) => reader.fmt(f),
            ChannelReader::FileTxtBwd(reader) => reader.fmt(f),
            ChannelReader::Socket(reader) => reader.fmt(f),
        }
    }
}

/// Call `$method` on whichever concrete reader this channel holds.
macro_rules! delegate {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            ChannelReader::FileBinFwd(reader) => reader.$method($($arg),*),
            ChannelReader::FileBinBwd(reader) => reader.$method($($arg),*),
            ChannelReader::FileTxtFwd(reader) => reader.$method($($arg),*),
            ChannelReader::FileTxtBwd(reader) => reader.$method($($arg),*),
            ChannelReader::Socket(reader) => reader.$method($($arg),*),
        }
    };
}

/// A typed [`ResultS3`] for [`RMatrixReader::read_record`].
///
/// [`ResultS3`]: crate::common::ResultS3
pub type ResultReadRecord = ResultS3<RMatrixRecord, ReadError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RMatrixReader

/// Facade over one r-record channel.
pub struct RMatrixReader {
    /// The owned concrete reader.
    reader: ChannelReader,
    /// The channel metadata this reader was resolved from, with the header
    /// parser's warnings and errors.
    metadata: ChannelMetadata,
}

impl fmt::Debug for RMatrixReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("RMatrixReader")
            .field("reader", &self.reader)
            .field("warnings", &self.metadata.warnings().len())
            .field("errors", &self.metadata.errors().len())
            .finish()
    }
}

impl RMatrixReader {
    /// Resolve `metadata` to a concrete reader.
    ///
    /// A socket source is single-direction; its channel direction is
    /// disregarded.
    pub fn new(metadata: ChannelMetadata) -> RMatrixReader {
        defñ!("({:?} {:?} {})", metadata.encoding(), metadata.direction(), metadata.source());
        let reader: ChannelReader = match metadata.source() {
            ChannelSource::Socket { address, role } => {
                ChannelReader::Socket(SocketReader::new(address.clone(), *role))
            }
            ChannelSource::File(path) => {
                match (metadata.encoding(), metadata.direction()) {
                    (ChannelEncoding::Binary, ChannelDirection::Forward) => {
                        ChannelReader::FileBinFwd(BinaryForwardReader::new(path.clone()))
                    }
                    (ChannelEncoding::Binary, ChannelDirection::Backward) => {
                        ChannelReader::FileBinBwd(BinaryBackwardReader::new(path.clone()))
                    }
                    (ChannelEncoding::Text, ChannelDirection::Forward) => {
                        ChannelReader::FileTxtFwd(TextForwardReader::new(path.clone()))
                    }
                    (ChannelEncoding::Text, ChannelDirection::Backward) => {
                        ChannelReader::FileTxtBwd(TextBackwardReader::new(path.clone()))
                    }
                }
            }
        };

        RMatrixReader {
            reader,
            metadata,
        }
    }

    /// The channel metadata this reader was resolved from.
    pub fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    /// Header-parser warnings; informational, never blocking.
    pub fn metadata_warnings(&self) -> &[String] {
        self.metadata.warnings()
    }

    /// Header-parser errors; a non-empty list blocks `open`.
    pub fn metadata_errors(&self) -> &[String] {
        self.metadata.errors()
    }

    /// The owned concrete reader, for summary inspection.
    pub fn channel_reader(&self) -> &ChannelReader {
        &self.reader
    }

    /// Drive one whole `read_type → read_active_flag → read_time →
    /// read_r_data` cycle and assemble the record. `Done` is the
    /// legitimate end of the stream.
    pub fn read_record(&mut self) -> ResultReadRecord {
        defn!();
        match self.read_type() {
            ResultS3::Found(_) => {}
            ResultS3::Done => {
                defx!("return Done");
                return ResultReadRecord::Done;
            }
            ResultS3::Err(err) => {
                defx!("read_type failed");
                return ResultReadRecord::Err(err);
            }
        }
        let active: bool = match self.read_active_flag() {
            Ok(val) => val,
            Err(err) => {
                defx!("read_active_flag failed");
                return ResultReadRecord::Err(err);
            }
        };
        let time: TimeTag = match self.read_time() {
            Ok(val) => val,
            Err(err) => {
                defx!("read_time failed");
                return ResultReadRecord::Err(err);
            }
        };
        let values: CorrelationValues = match self.read_r_data() {
            Ok(val) => val,
            Err(err) => {
                defx!("read_r_data failed");
                return ResultReadRecord::Err(err);
            }
        };
        defx!("return Found");

        ResultReadRecord::Found(RMatrixRecord::new(active, time, values))
    }
}

impl RecordReader for RMatrixReader {
    /// Open the underlying channel. Blocked when the header parser
    /// recorded errors for this channel; warnings alone do not block.
    fn open(&mut self) -> Result<(), OpenError> {
        defn!();
        if !self.metadata.is_usable() {
            defx!("metadata errors");
            return Err(OpenError::ChannelMetadata(
                self.metadata
                    .errors()
                    .to_vec(),
            ));
        }
        let result = delegate!(&mut self.reader, open);
        defx!();

        result
    }

    fn is_open(&self) -> bool {
        delegate!(&self.reader, is_open)
    }

    fn is_eof(&self) -> bool {
        delegate!(&self.reader, is_eof)
    }

    fn bufsz(&self) -> BufSz {
        delegate!(&self.reader, bufsz)
    }

    fn set_bufsz(
        &mut self,
        bufsz: BufSz,
    ) -> Result<(), Error> {
        delegate!(&mut self.reader, set_bufsz, bufsz)
    }

    fn read_type(&mut self) -> ResultReadType {
        delegate!(&mut self.reader, read_type)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        delegate!(&mut self.reader, read_active_flag)
    }

    fn read_time(&mut self) -> Result<TimeTag, ReadError> {
        delegate!(&mut self.reader, read_time)
    }

    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError> {
        delegate!(&mut self.reader, read_r_data)
    }

    fn close(&mut self) -> Result<(), Error> {
        delegate!(&mut self.reader, close)
    }

    fn summary(&self) -> SummaryRecordStream {
        delegate!(&self.reader, summary)
    }
}
