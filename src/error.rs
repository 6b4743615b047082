//! When speaking VICI goes wrong.

use core::result;
use std::{
    error,
    fmt::{self, Debug, Display},
    io,
};

use serde::{de, ser};

/// A structure representing all possible errors that can occur in this crate:
/// encoding and decoding message bytes, mapping Rust values, and exchanging
/// packets with the daemon.
pub struct Error {
    err: Box<ErrorImpl>,
}

struct ErrorImpl {
    code: ErrorCode,
    input: Option<u8>,
    pos: Option<usize>,
}

/// Alias for a `Result` with the error type `vici::Error`.
pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Zero-based byte index at which the error was detected, for errors that
    /// originate in the codec.
    pub fn position(&self) -> Option<usize> {
        self.err.pos
    }

    /// Categorizes the cause of this error.
    ///
    /// - `Category::Io` - failure on the underlying stream, a closed
    ///   connection, or an expired read deadline
    /// - `Category::Data` - invalid data
    /// - `Category::Eof` - unexpected end of the input data
    /// - `Category::Size` - a key, value, or packet exceeded its wire limit
    /// - `Category::Protocol` - the daemon rejected or failed the exchange
    pub fn classify(&self) -> Category {
        match self.err.code {
            ErrorCode::Io(_) | ErrorCode::ConnectionClosed | ErrorCode::DeadlineExceeded => Category::Io,
            ErrorCode::Message(_)
            | ErrorCode::InvalidUnicodeCodePoint
            | ErrorCode::EmptyKey
            | ErrorCode::DuplicateKey(_)
            | ErrorCode::InvalidPacketType(_) => Category::Data,
            ErrorCode::EofWhileParsingElementType | ErrorCode::EofWhileParsingKey | ErrorCode::EofWhileParsingValue => Category::Eof,
            ErrorCode::KeyTooLong(_) | ErrorCode::ValueTooLong(_) | ErrorCode::PacketTooLong(_) | ErrorCode::SegmentTooLarge(_) => {
                Category::Size
            },
            ErrorCode::CommandFailed(_)
            | ErrorCode::UnknownCommand(_)
            | ErrorCode::UnknownEvent(_)
            | ErrorCode::UnexpectedResponse(_) => Category::Protocol,
        }
    }

    /// Returns true if this error was caused by a failure on the underlying
    /// stream, a closed connection, or an expired read deadline.
    pub fn is_io(&self) -> bool {
        self.classify() == Category::Io
    }

    /// Returns true if this error was caused by invalid data.
    pub fn is_data(&self) -> bool {
        self.classify() == Category::Data
    }

    /// Returns true if this error was caused by prematurely reaching the end
    /// of the input data.
    pub fn is_eof(&self) -> bool {
        self.classify() == Category::Eof
    }

    /// Returns true if this error was caused by a key, value, or packet
    /// exceeding the width of its wire length field.
    pub fn is_size(&self) -> bool {
        self.classify() == Category::Size
    }

    /// Returns true if this error was reported by the daemon: an unknown
    /// command or event, an out-of-place response, or a failed command.
    pub fn is_protocol(&self) -> bool {
        self.classify() == Category::Protocol
    }

    /// Returns true if this error is a failed command response. The server's
    /// `errmsg` text is available through `Display`.
    pub fn is_command_failed(&self) -> bool {
        matches!(self.err.code, ErrorCode::CommandFailed(_))
    }

    /// Returns true if this error was caused by the connection shutting down,
    /// either explicitly or on a read failure.
    pub fn is_closed(&self) -> bool {
        matches!(self.err.code, ErrorCode::ConnectionClosed)
    }

    pub(crate) fn io(e: io::Error, pos: Option<usize>) -> Self {
        Self {
            err: Box::new(ErrorImpl {
                code: ErrorCode::Io(e),
                input: None,
                pos,
            }),
        }
    }

    pub(crate) fn data(code: ErrorCode, input: Option<u8>, pos: Option<usize>) -> Self {
        Self {
            err: Box::new(ErrorImpl { code, input, pos }),
        }
    }

    pub(crate) fn new(code: ErrorCode) -> Self {
        Self {
            err: Box::new(ErrorImpl {
                code,
                input: None,
                pos: None,
            }),
        }
    }
}

/// Categorizes the cause of a `vici::Error`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Category {
    /// The error was caused by a failure to read or write bytes on an IO
    /// stream, a closed connection, or an expired read deadline.
    Io,

    /// The error was caused by invalid data.
    Data,

    /// The error was caused by prematurely reaching the end of the input data.
    Eof,

    /// The error was caused by a key, value, or packet exceeding the width of
    /// its wire length field.
    Size,

    /// The error was reported by the daemon or violates the exchange rules of
    /// the protocol.
    Protocol,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::io(e, None)
    }
}

impl From<Error> for io::Error {
    /// Convert a `vici::Error` into an `io::Error`.
    ///
    /// Data, size, and protocol errors are turned into `InvalidData` IO
    /// errors. EOF errors are turned into `UnexpectedEof` IO errors.
    fn from(e: Error) -> Self {
        match e.classify() {
            Category::Io => match e.err.code {
                ErrorCode::Io(e) => e,
                ErrorCode::ConnectionClosed => io::Error::from(io::ErrorKind::BrokenPipe),
                ErrorCode::DeadlineExceeded => io::Error::from(io::ErrorKind::TimedOut),
                _ => unreachable!(),
            },
            Category::Data | Category::Size | Category::Protocol => io::Error::new(io::ErrorKind::InvalidData, e),
            Category::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

pub(crate) enum ErrorCode {
    /// Some IO error occurred while reading or writing.
    Io(io::Error),

    /// Catchall for invalid data error messages.
    Message(String),

    /// EOF while parsing an element type.
    EofWhileParsingElementType,

    /// EOF while parsing a key.
    EofWhileParsingKey,

    /// EOF while parsing a value.
    EofWhileParsingValue,

    /// Invalid unicode code point.
    InvalidUnicodeCodePoint,

    /// A key longer than 255 bytes cannot be written.
    KeyTooLong(usize),

    /// A value longer than 65535 bytes cannot be written.
    ValueTooLong(usize),

    /// A packet body longer than the u32 frame header allows.
    PacketTooLong(usize),

    /// Keys must be at least one byte.
    EmptyKey,

    /// A key occurred twice at the same level of a decoded message.
    DuplicateKey(String),

    /// The first byte of a packet was not a known packet type.
    InvalidPacketType(u8),

    /// A framed segment declared a length above the protocol ceiling.
    SegmentTooLarge(usize),

    /// The response carried `success = "no"`; holds the server's `errmsg`.
    CommandFailed(String),

    /// The daemon answered a command request with `CmdUnknown`.
    UnknownCommand(String),

    /// The daemon answered an event (de)registration with `EventUnknown`.
    UnknownEvent(String),

    /// A response packet of the wrong type for the pending exchange.
    UnexpectedResponse(u8),

    /// The connection shut down while an exchange was pending.
    ConnectionClosed,

    /// The read deadline expired while a frame body was outstanding.
    DeadlineExceeded,
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorCode::Io(ref err) => Display::fmt(err, f),
            ErrorCode::Message(ref msg) => f.write_str(msg),
            ErrorCode::EofWhileParsingElementType => f.write_str("EOF while parsing element type"),
            ErrorCode::EofWhileParsingKey => f.write_str("EOF while parsing key"),
            ErrorCode::EofWhileParsingValue => f.write_str("EOF while parsing value"),
            ErrorCode::InvalidUnicodeCodePoint => f.write_str("invalid unicode code point"),
            ErrorCode::KeyTooLong(len) => write!(f, "key length {} exceeds 255 bytes", len),
            ErrorCode::ValueTooLong(len) => write!(f, "value length {} exceeds 65535 bytes", len),
            ErrorCode::PacketTooLong(len) => write!(f, "packet length {} exceeds 4-byte header", len),
            ErrorCode::EmptyKey => f.write_str("key cannot be empty"),
            ErrorCode::DuplicateKey(ref key) => write!(f, "duplicate key {:?} in message", key),
            ErrorCode::InvalidPacketType(t) => write!(f, "invalid packet type {}", t),
            ErrorCode::SegmentTooLarge(len) => write!(f, "segment length {} exceeds 512 KiB ceiling", len),
            ErrorCode::CommandFailed(ref errmsg) => write!(f, "command failed: {}", errmsg),
            ErrorCode::UnknownCommand(ref cmd) => write!(f, "unknown command: {}", cmd),
            ErrorCode::UnknownEvent(ref event) => write!(f, "unknown event: {}", event),
            ErrorCode::UnexpectedResponse(t) => write!(f, "unexpected response packet type {}", t),
            ErrorCode::ConnectionClosed => f.write_str("connection closed"),
            ErrorCode::DeadlineExceeded => f.write_str("read deadline exceeded"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.err.code {
            ErrorCode::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.err, f)
    }
}

impl Display for ErrorImpl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.code, f)?;

        if let Some(input) = self.input {
            f.write_fmt(format_args!(" 0x{:x}", input))?;
        }

        if let Some(pos) = self.pos {
            f.write_fmt(format_args!(" at position {}", pos))?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error({:?})", self.err.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        make_error(msg.to_string(), None)
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        make_error(msg.to_string(), None)
    }
}

fn make_error(msg: String, pos: Option<usize>) -> Error {
    let input = None;
    let code = ErrorCode::Message(msg);
    Error {
        err: Box::new(ErrorImpl { code, input, pos }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_codes() {
        assert_eq!(Error::new(ErrorCode::KeyTooLong(300)).classify(), Category::Size);
        assert_eq!(Error::new(ErrorCode::DuplicateKey("key1".into())).classify(), Category::Data);
        assert_eq!(Error::new(ErrorCode::ConnectionClosed).classify(), Category::Io);
        assert_eq!(Error::new(ErrorCode::EofWhileParsingKey).classify(), Category::Eof);

        let err = Error::new(ErrorCode::CommandFailed("failed to install CHILD_SA".into()));
        assert_eq!(err.classify(), Category::Protocol);
        assert!(err.is_command_failed());
        assert_eq!(err.to_string(), "command failed: failed to install CHILD_SA");
    }

    #[test]
    fn position_reported() {
        let err = Error::data(ErrorCode::EofWhileParsingValue, None, Some(12));
        assert_eq!(err.position(), Some(12));
        assert!(err.is_eof());
        assert_eq!(err.to_string(), "EOF while parsing value at position 12");
    }
}
