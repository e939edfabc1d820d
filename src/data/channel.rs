// src/data/channel.rs

//! Implements [`ChannelMetadata`] and the enums that classify one r-matrix
//! channel: which encoding, which direction, which source.
//!
//! These values are produced by an external header-file parser; that parser
//! is a collaborator of this crate, not part of it. The
//! [`RMatrixReader`] facade consumes a `ChannelMetadata` to decide which
//! concrete reader to construct.
//!
//! [`ChannelMetadata`]: crate::data::channel::ChannelMetadata
//! [`RMatrixReader`]: crate::readers::rmatrixreader::RMatrixReader

use crate::common::FPath;

use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Physical encoding of the records in a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelEncoding {
    Binary,
    Text,
}

/// Direction a file channel is traversed in.
///
/// Meaningless for socket channels; a socket only streams forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelDirection {
    Forward,
    Backward,
}

/// Whether a socket channel initiates the connection (client) or accepts
/// it (server).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketRole {
    Connect,
    Accept,
}

/// Where a channel's bytes come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelSource {
    /// A local file at this path.
    File(FPath),
    /// A TCP peer. For [`SocketRole::Connect`] the address is the peer to
    /// dial; for [`SocketRole::Accept`] it is the local address to bind.
    Socket {
        address: String,
        role: SocketRole,
    },
}

impl fmt::Display for ChannelSource {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            ChannelSource::File(path) => write!(f, "file {:?}", path),
            ChannelSource::Socket { address, role } => {
                write!(f, "socket {} ({:?})", address, role)
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChannelMetadata

/// Everything the facade needs to open one r-matrix channel, as resolved by
/// the external header parser.
///
/// The parser also accumulates human-readable `warnings` and `errors`.
/// A non-empty `errors` list blocks opening the channel; a non-empty
/// `warnings` list does not. Both lists are exposed as a side channel,
/// never mixed with read-path errors.
#[derive(Clone, Debug)]
pub struct ChannelMetadata {
    encoding: ChannelEncoding,
    direction: ChannelDirection,
    source: ChannelSource,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ChannelMetadata {
    pub fn new(
        encoding: ChannelEncoding,
        direction: ChannelDirection,
        source: ChannelSource,
        warnings: Vec<String>,
        errors: Vec<String>,
    ) -> ChannelMetadata {
        ChannelMetadata {
            encoding,
            direction,
            source,
            warnings,
            errors,
        }
    }

    /// Shorthand constructor for a clean parse (no warnings, no errors).
    pub fn new_ok(
        encoding: ChannelEncoding,
        direction: ChannelDirection,
        source: ChannelSource,
    ) -> ChannelMetadata {
        ChannelMetadata::new(encoding, direction, source, Vec::new(), Vec::new())
    }

    pub const fn encoding(&self) -> ChannelEncoding {
        self.encoding
    }

    pub const fn direction(&self) -> ChannelDirection {
        self.direction
    }

    pub const fn source(&self) -> &ChannelSource {
        &self.source
    }

    pub fn warnings(&self) -> &[String] {
        self.warnings.as_slice()
    }

    pub fn errors(&self) -> &[String] {
        self.errors.as_slice()
    }

    /// `true` if the header parser recorded no blocking errors.
    pub fn is_usable(&self) -> bool {
        self.errors.is_empty()
    }
}
