use crate::error::*;
use crate::stream::*;
use std::fs::File;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::Path;
use std::time::SystemTime;

/// Implements `Stream` over a host file.
pub struct DiskFile {
    file: File,
}

impl DiskFile {
    pub fn new(file: File) -> DiskFile {
        DiskFile { file }
    }

    /// Opens an existing file for reading and writing. The file is never created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DiskFile, Error> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        Ok(DiskFile::new(file))
    }
}

impl Read for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DiskFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for DiskFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Stream for DiskFile {
    fn set_len(&mut self, len: u64) -> Result<(), Error> {
        self.file.set_len(len)?;
        Ok(())
    }
    fn accessed(&self) -> Result<SystemTime, Error> {
        Ok(self.file.metadata()?.accessed()?)
    }
    fn modified(&self) -> Result<SystemTime, Error> {
        Ok(self.file.metadata()?.modified()?)
    }
    #[cfg(unix)]
    fn changed(&self) -> Result<SystemTime, Error> {
        use std::os::unix::fs::MetadataExt;
        use std::time::{Duration, UNIX_EPOCH};
        let metadata = self.file.metadata()?;
        let nanos = Duration::from_nanos(metadata.ctime_nsec() as u64);
        Ok(if metadata.ctime() >= 0 {
            UNIX_EPOCH + Duration::from_secs(metadata.ctime() as u64) + nanos
        } else {
            UNIX_EPOCH - Duration::from_secs(metadata.ctime().wrapping_neg() as u64) + nanos
        })
    }
    #[cfg(not(unix))]
    fn changed(&self) -> Result<SystemTime, Error> {
        Ok(self.file.metadata()?.created()?)
    }
    fn commit(&mut self) -> Result<(), Error> {
        self.file.flush()?;
        Ok(())
    }
}
