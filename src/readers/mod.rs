// src/readers/mod.rs

//! "Readers" for _rmslib_.
//!
//! ## Overview of readers
//!
//! * An [`RMatrixReader`] owns exactly one concrete reader, chosen from
//!   [`ChannelMetadata`], and delegates every call to it.
//! * The concrete readers each decode one physical encoding of the same
//!   record stream:
//!   [`BinaryForwardReader`], [`BinaryBackwardReader`],
//!   [`TextForwardReader`], [`TextBackwardReader`], [`SocketReader`].
//!
//! <br/>
//!
//! Every concrete reader implements the [`RecordReader`] trait: one `open`,
//! then repeated `read_type → read_active_flag → read_time → read_r_data`
//! cycles until `read_type` returns `Done`, then `close`.
//!
//! A reader handles `u8` bytes only; the text readers convert to `str`
//! just for numeric tokens and attribute values.
//!
//! <br/>
//!
//! _These are not rust "Readers"; these structs do not implement the trait
//! [`Read`]. These are "readers" in an informal sense._
//!
//! [`RMatrixReader`]: crate::readers::rmatrixreader::RMatrixReader
//! [`ChannelMetadata`]: crate::data::channel::ChannelMetadata
//! [`RecordReader`]: crate::readers::recordreader::RecordReader
//! [`BinaryForwardReader`]: crate::readers::binaryforwardreader::BinaryForwardReader
//! [`BinaryBackwardReader`]: crate::readers::binarybackwardreader::BinaryBackwardReader
//! [`TextForwardReader`]: crate::readers::textforwardreader::TextForwardReader
//! [`TextBackwardReader`]: crate::readers::textbackwardreader::TextBackwardReader
//! [`SocketReader`]: crate::readers::socketreader::SocketReader
//! [`Read`]: std::io::Read

pub mod binarybackwardreader;
pub mod binaryforwardreader;
pub mod bytescan;
pub mod helpers;
pub mod recordreader;
pub mod rmatrixreader;
pub mod socketreader;
pub mod textbackwardreader;
pub mod textforwardreader;
