//! Read and write the data that follows an `__END__` line in a file, as if it were a file
//! of its own.
//!
//! ```no_run
//! use scriptfile::{Mode, Whence};
//!
//! scriptfile::open_with("script.rb", Mode::Read, |file| {
//!     let data = file.read_all()?;
//!     file.seek(0, Whence::Set)?;
//!     file.puts(b"new data")?;
//!     Ok(data)
//! })?;
//! # Ok::<(), scriptfile::error::Error>(())
//! ```

mod disk_file;
pub mod error;
mod marker;
mod memory_file;
mod mode;
mod offset_file;
mod options;
mod stream;

pub use disk_file::DiskFile;
pub use marker::DEFAULT_MARKER;
pub use memory_file::MemoryFile;
pub use mode::Mode;
pub use offset_file::{Bytes, Lines, OffsetFile};
pub use options::OffsetFileOptions;
pub use stream::{Stream, Whence};

use error::*;
use std::path::Path;

/// Opens an existing file in `Mode::Read`. The file is closed when the returned value is
/// closed or dropped.
pub fn open<P: AsRef<Path>>(path: P) -> Result<OffsetFile<DiskFile>, Error> {
    OffsetFile::open(path)
}

/// Opens an existing file, runs `work` on it, and closes it.
///
/// The file is closed on every path out of `work`, including panics. An error from
/// `work` takes precedence over an error from closing.
pub fn open_with<P, T, W>(path: P, mode: Mode, work: W) -> Result<T, Error>
where
    P: AsRef<Path>,
    W: FnOnce(&mut OffsetFile<DiskFile>) -> Result<T, Error>,
{
    let mut file = OffsetFile::open_mode(path, mode)?;
    let result = work(&mut file);
    let closed = file.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Returns the whole data segment of a file.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, Error> {
    open_with(path, Mode::Read, |file| file.read_all())
}
