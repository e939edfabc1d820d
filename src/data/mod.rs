// src/data/mod.rs

//! The `data` module is specialized data containers for r-matrix record
//! streams: the [`RMatrixRecord`] decode result and the [`ChannelMetadata`]
//! that selects which concrete reader handles a stream.
//!
//! ## Definitions of data
//!
//! ### r-record
//!
//! An "r-record" is one time-tagged correlation-matrix entry in a stream:
//!
//! * a type marker, always `'r'`.
//! * an active flag; an inactive record is logically deleted but still
//!   present in the stream.
//! * a floating-point time tag.
//! * zero or more correlation values for an implied n×n matrix; the count
//!   is carried in-band, not fixed by any schema.
//!
//! An "r-record" is represented by an [`RMatrixRecord`] and decoded by one
//! of the concrete readers in [`crate::readers`].
//!
//! ### channel
//!
//! A "channel" is one physical source of r-records: a file holding the
//! binary or the text encoding, read forward or backward, or a socket peer
//! streaming records one message at a time. A channel is described by a
//! [`ChannelMetadata`], produced by an external header parser and consumed
//! by the [`RMatrixReader`] facade.
//!
//! [`RMatrixRecord`]: crate::data::record::RMatrixRecord
//! [`ChannelMetadata`]: crate::data::channel::ChannelMetadata
//! [`RMatrixReader`]: crate::readers::rmatrixreader::RMatrixReader

pub mod channel;
pub mod record;
