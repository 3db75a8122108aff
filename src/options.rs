use crate::disk_file::DiskFile;
use crate::error::*;
use crate::marker::*;
use crate::mode::Mode;
use crate::offset_file::OffsetFile;
use crate::stream::Stream;
use std::path::Path;

/// Options for opening an `OffsetFile`.
///
/// ```no_run
/// use scriptfile::{Mode, OffsetFileOptions};
///
/// let file = OffsetFileOptions::new()
///     .mode(Mode::Append)
///     .marker(b"__DATA__")
///     .open("script.rb")?;
/// # Ok::<(), scriptfile::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OffsetFileOptions {
    mode: Mode,
    marker: Vec<u8>,
}

impl Default for OffsetFileOptions {
    fn default() -> OffsetFileOptions {
        OffsetFileOptions::new()
    }
}

impl OffsetFileOptions {
    pub fn new() -> OffsetFileOptions {
        OffsetFileOptions {
            mode: Mode::Read,
            marker: DEFAULT_MARKER.to_vec(),
        }
    }

    pub fn mode(&mut self, mode: Mode) -> &mut OffsetFileOptions {
        self.mode = mode;
        self
    }

    /// Sets the marker line content, without the trailing `\n`.
    pub fn marker(&mut self, marker: &[u8]) -> &mut OffsetFileOptions {
        self.marker = marker.to_vec();
        self
    }

    /// Opens an existing host file.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<OffsetFile<DiskFile>, Error> {
        check_marker(&self.marker)?;
        self.wrap(DiskFile::open(path)?)
    }

    /// Takes over an already open stream.
    pub fn wrap<F: Stream>(&self, stream: F) -> Result<OffsetFile<F>, Error> {
        check_marker(&self.marker)?;
        OffsetFile::with_marker(stream, self.mode, &self.marker)
    }
}
