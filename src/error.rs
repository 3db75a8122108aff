use crate::stream::Whence;
use log::*;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    NegativeSeek(i64),
    UnsupportedWhence(Whence),
    TooLarge(u64),
    OutOfBound,
    Eof,
    InvalidMarker,
}

impl Error {
    /// Whether the error was caused by a bad argument rather than by the stream.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            Error::NegativeSeek(_) | Error::UnsupportedWhence(_) | Error::TooLarge(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(e) => write!(f, "host IO error: {}", e),
            Error::NegativeSeek(offset) => {
                write!(f, "negative seeks are not supported (offset {})", offset)
            }
            Error::UnsupportedWhence(whence) => {
                write!(f, "only Whence::Set is supported, got {:?}", whence)
            }
            Error::TooLarge(len) => {
                write!(f, "{} bytes past the segment start is beyond the largest position", len)
            }
            Error::OutOfBound => write!(f, "stream is positioned before the data segment"),
            Error::Eof => write!(f, "end of data segment reached"),
            Error::InvalidMarker => write!(f, "marker must be non-empty and contain no newline"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        debug!("Host IO error: {:?}", e);
        Error::IO(e)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> std::io::Error {
        use std::io::ErrorKind;
        match e {
            Error::IO(e) => e,
            Error::Eof => std::io::Error::new(ErrorKind::UnexpectedEof, e),
            e if e.is_invalid_argument() => std::io::Error::new(ErrorKind::InvalidInput, e),
            e => std::io::Error::new(ErrorKind::Other, e),
        }
    }
}

pub(crate) fn make_error<T>(e: Error) -> Result<T, Error> {
    Err(e)
}
