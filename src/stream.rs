use crate::error::*;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

/// Interface to a byte stream that an `OffsetFile` can sit on.
///
/// A `Stream` acts like an open host file: it has a cursor, can be read and written at
/// that cursor, and can be resized. On top of `Read + Write + Seek` it provides the
/// few primitives the standard traits don't cover.
///
/// Anything implementing `Stream` is expected to be exclusively owned by its user.
/// Nothing here is shared across threads.
pub trait Stream: Read + Write + Seek {
    /// Resizes the stream to `len` bytes, cutting or zero-extending it.
    /// The cursor is not moved.
    fn set_len(&mut self, len: u64) -> Result<(), Error>;

    /// Time of last access.
    fn accessed(&self) -> Result<SystemTime, Error>;

    /// Time of last content modification.
    fn modified(&self) -> Result<SystemTime, Error>;

    /// Time of last status change.
    fn changed(&self) -> Result<SystemTime, Error>;

    /// Flushes all changes made to the stream,
    /// so that when the same storage is opened again, all data can be recovered.
    fn commit(&mut self) -> Result<(), Error>;
}

/// Origin of a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

const LINE_CHUNK: usize = 256;

/// Reads one line, including its `\n`, and appends it to `line`.
///
/// Returns the number of bytes consumed, 0 at end of stream. The last line of a stream
/// may come without `\n`. Reads are done in chunks; whatever was read past the newline
/// is given back by seeking, so the cursor always ends right after the line.
pub fn read_line<F: Read + Seek + ?Sized>(file: &mut F, line: &mut Vec<u8>) -> Result<usize, Error> {
    let mut chunk = [0; LINE_CHUNK];
    let mut total = 0;
    loop {
        let n = match file.read(&mut chunk) {
            Ok(n) => n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Ok(total);
        }
        if let Some(i) = chunk[0..n].iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&chunk[0..=i]);
            total += i + 1;
            let excess = n - (i + 1);
            if excess != 0 {
                file.seek(SeekFrom::Current(-(excess as i64)))?;
            }
            return Ok(total);
        }
        line.extend_from_slice(&chunk[0..n]);
        total += n;
    }
}

/// Reads a single byte, `None` at end of stream.
pub fn read_byte<F: Read + ?Sized>(file: &mut F) -> Result<Option<u8>, Error> {
    let mut buf = [0; 1];
    loop {
        match file.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
