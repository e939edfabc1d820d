// src/readers/socketreader.rs

//! Implements a [`SocketReader`], single-direction decode of r-records
//! received over a TCP connection.
//!
//! Each record travels as one self-contained message: a 4-byte big-endian
//! payload length, then the payload. The receiver replies with a one-byte
//! acknowledgement after each message. Payload numerics use a neutral
//! fixed-width big-endian encoding so sender and receiver need not share a
//! native integer or float representation:
//!
//! ```text
//! 'r'(1B) | active(1B: 0/1) | time(8B f64 BE) | count(4B i32 BE) | count×8B f64 BE
//! ```
//!
//! A message whose payload is the single end token `'e'` replaces a final
//! record; it is the sole legitimate end-of-stream signal.
//!
//! `read_type` receives the whole message and acknowledges it; the later
//! cycle calls decode sequentially from the already-received payload and
//! never touch the network.
//!
//! [`SocketReader`]: self::SocketReader

use crate::common::{BufIndex, BufSz, Bytes, Count, ResultS3};
use crate::data::channel::SocketRole;
use crate::data::record::{
    CorrelationValues,
    TimeTag,
    RECORD_TYPE_ENDu8,
    RECORD_TYPE_R,
    RECORD_TYPE_Ru8,
};
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
use std::io::{Error, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The one-byte acknowledgement sent after every received message.
pub const ACK_BYTE: u8 = 0x06;

/// Byte length of the message length prefix.
pub const MSG_LEN_PREFIX_SZ: usize = 4;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SocketReader

/// Reader of r-records streamed by a TCP peer, one message per record.
pub struct SocketReader {
    /// Peer address to dial ([`SocketRole::Connect`]) or local address to
    /// bind ([`SocketRole::Accept`]).
    address: String,
    /// Connection-initiator or connection-acceptor.
    role: SocketRole,
    /// The connection; `Some` between `open` and `close`.
    stream: Option<TcpStream>,
    /// Configured cap on one message's payload.
    bufsz: BufSz,
    /// Payload of the message most recently received.
    buffer: Bytes,
    /// Index of the first undecoded payload byte.
    cursor: BufIndex,
    /// Where in the per-record call cycle this reader is.
    phase: RecordPhase,
    /// Set once the end token arrives.
    eof: bool,
    /// `Count` of records fully decoded.
    count_records: Count,
    /// `Count` of payload bytes received.
    count_bytes_loaded: Count,
    /// `Count` of messages received.
    count_chunk_loads: Count,
}

impl fmt::Debug for SocketReader {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("SocketReader")
            .field("address", &self.address)
            .field("role", &self.role)
            .field("connected", &self.stream.is_some())
            .field("bufsz", &self.bufsz)
            .field("phase", &self.phase)
            .field("eof", &self.eof)
            .field("records", &self.count_records)
            .finish()
    }
}

impl SocketReader {
    /// Create a new idle `SocketReader`; no connection is made until
    /// `open`.
    pub fn new(
        address: String,
        role: SocketRole,
    ) -> SocketReader {
        defñ!("({:?}, {:?})", address, role);
        SocketReader {
            address,
            role,
            stream: None,
            bufsz: BUFSZ_DEF,
            buffer: Bytes::new(),
            cursor: 0,
            phase: RecordPhase::Completed,
            eof: false,
            count_records: 0,
            count_bytes_loaded: 0,
            count_chunk_loads: 0,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Receive one whole message into the internal buffer and acknowledge
    /// it. Leaves the cursor at payload byte 0.
    fn receive_message(&mut self) -> Result<(), ReadError> {
        defn!();
        let stream: &mut TcpStream = match self.stream.as_mut() {
            Some(val) => val,
            None => {
                return Err(ReadError::Io(Error::new(
                    ErrorKind::NotConnected,
                    "reader is not open",
                )));
            }
        };
        let mut len_bytes: [u8; MSG_LEN_PREFIX_SZ] = [0; MSG_LEN_PREFIX_SZ];
        if let Err(err) = stream.read_exact(&mut len_bytes) {
            defx!("length prefix read failed");
            return Err(ReadError::Io(err));
        }
        let len_i32: i32 = i32::from_be_bytes(len_bytes);
        if len_i32 <= 0 {
            defx!("bad length prefix");
            return Err(ReadError::Corrupt(format!(
                "message length prefix {} from peer {:?}",
                len_i32, self.address,
            )));
        }
        let len: usize = len_i32 as usize;
        if len > self.bufsz {
            defx!("message exceeds buffer");
            return Err(ReadError::BufferTooSmall {
                bufsz: self.bufsz,
                need: len,
            });
        }
        self.buffer.resize(len, 0);
        if let Err(err) = stream.read_exact(&mut self.buffer[..]) {
            defx!("payload read failed");
            return Err(ReadError::Io(err));
        }
        // the whole record arrived; acknowledge before decoding
        if let Err(err) = stream.write_all(&[ACK_BYTE]) {
            defx!("acknowledgement failed");
            return Err(ReadError::Io(err));
        }
        self.cursor = 0;
        self.count_bytes_loaded += len as Count;
        self.count_chunk_loads += 1;
        defx!("received {} bytes", len);

        Ok(())
    }

    /// Consume `COUNT` payload bytes at the cursor; a shortfall against the
    /// message end is corruption.
    fn take_in_message<const COUNT: usize>(&mut self) -> Result<[u8; COUNT], ReadError> {
        if self.cursor + COUNT > self.buffer.len() {
            return Err(ReadError::Corrupt(format!(
                "message too short: {} bytes remain of {} needed, peer {:?}",
                self.buffer.len() - self.cursor,
                COUNT,
                self.address,
            )));
        }
        let mut bytes: [u8; COUNT] = [0; COUNT];
        bytes.copy_from_slice(&self.buffer[self.cursor..self.cursor + COUNT]);
        self.cursor += COUNT;

        Ok(bytes)
    }
}

impl RecordReader for SocketReader {
    fn open(&mut self) -> Result<(), OpenError> {
        defn!("({:?}, {:?})", self.address, self.role);
        if self.stream.is_some() {
            defx!("already open");
            return Err(OpenError::AlreadyOpen);
        }
        let stream: TcpStream = match self.role {
            SocketRole::Connect => match TcpStream::connect(&self.address) {
                Ok(val) => val,
                Err(err) => {
                    defx!("connect failed");
                    return Err(OpenError::CannotOpen(err));
                }
            },
            SocketRole::Accept => {
                let listener: TcpListener = match TcpListener::bind(&self.address) {
                    Ok(val) => val,
                    Err(err) => {
                        defx!("bind failed");
                        return Err(OpenError::CannotOpen(err));
                    }
                };
                // the listener drops after one accept; one connection per
                // reader
                match listener.accept() {
                    Ok((val, _peer)) => val,
                    Err(err) => {
                        defx!("accept failed");
                        return Err(OpenError::CannotOpen(err));
                    }
                }
            }
        };
        self.stream = Some(stream);
        defx!("connected");

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
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
        if self.stream.is_some() {
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
        match self.receive_message() {
            Ok(_) => {}
            Err(err) => {
                defx!("receive failed");
                return ResultS3::Err(err);
            }
        }
        let byte: u8 = match self.take_in_message::<1>() {
            Ok(val) => val[0],
            Err(err) => {
                defx!("empty payload");
                return ResultS3::Err(err);
            }
        };
        match byte {
            RECORD_TYPE_Ru8 => {}
            RECORD_TYPE_ENDu8 => {
                // end-of-transmission message replaces a final record
                self.eof = true;
                defx!("end token, return Done");
                return ResultS3::Done;
            }
            _ => {
                defx!("bad type byte");
                return ResultS3::Err(ReadError::Corrupt(format!(
                    "unexpected record type byte 0x{:02x} from peer {:?}",
                    byte, self.address,
                )));
            }
        }
        self.phase = RecordPhase::TypeRead;
        defx!("return Found({:?})", RECORD_TYPE_R);

        ResultS3::Found(RECORD_TYPE_R)
    }

    fn read_active_flag(&mut self) -> Result<bool, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TypeRead, "read_active_flag");
        let byte: u8 = self.take_in_message::<1>()?[0];
        let active: bool = match byte {
            0 => false,
            1 => true,
            _ => {
                defx!("bad active byte");
                return Err(ReadError::Corrupt(format!(
                    "active flag byte must be 0 or 1, found 0x{:02x}, peer {:?}",
                    byte, self.address,
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
        let time: TimeTag = TimeTag::from_be_bytes(self.take_in_message::<8>()?);
        self.phase = RecordPhase::TimeRead;
        defx!("return {}", time);

        Ok(time)
    }

    fn read_r_data(&mut self) -> Result<CorrelationValues, ReadError> {
        defn!();
        require_phase!(self, RecordPhase::TimeRead, "read_r_data");
        let count: i32 = i32::from_be_bytes(self.take_in_message::<4>()?);
        if count < 0 {
            defx!("negative count");
            return Err(ReadError::Corrupt(format!(
                "negative correlation count {}, peer {:?}",
                count, self.address,
            )));
        }
        // the message must hold exactly the counted values and nothing else
        let have: usize = self.buffer.len() - self.cursor;
        if (count as usize) * 8 != have {
            defx!("count disagrees with message length");
            return Err(ReadError::Corrupt(format!(
                "correlation count {} needs {} bytes but the message holds {}, peer {:?}",
                count,
                (count as usize) * 8,
                have,
                self.address,
            )));
        }
        let mut values: CorrelationValues = CorrelationValues::with_capacity(count as usize);
        for _ in 0..count {
            let value: f64 = f64::from_be_bytes(self.take_in_message::<8>()?);
            check_correlation(value)?;
            values.push(value);
        }
        self.phase = RecordPhase::Completed;
        self.count_records += 1;
        defx!("return {} values", values.len());

        Ok(values)
    }

    fn close(&mut self) -> Result<(), Error> {
        defñ!("({:?})", self.address);
        if let Some(stream) = self.stream.take() {
            // a failed shutdown still drops the handle
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.buffer = Bytes::new();
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
