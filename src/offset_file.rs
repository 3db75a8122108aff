use crate::disk_file::DiskFile;
use crate::error::*;
use crate::marker::*;
use crate::mode::Mode;
use crate::stream::*;
use log::*;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::SystemTime;

/// A view over the part of a stream that follows its marker line.
///
/// Everything before and including the marker line is hidden: positions are reported
/// and accepted relative to the start of the data segment, as if the segment were a
/// file of its own. The segment offset is computed once, on construction.
///
/// The underlying stream is owned and never handed out. Only start-relative,
/// non-negative seeks exist, so the header can't be reached:
///
/// ```compile_fail
/// use std::io::{Seek, SeekFrom};
/// let storage = scriptfile::MemoryFile::new(b"header\n__END__\n".to_vec());
/// let mut file = scriptfile::OffsetFile::new(storage, scriptfile::Mode::Read).unwrap();
/// file.file.seek(SeekFrom::Start(0)).unwrap();
/// ```
///
/// ```compile_fail
/// let storage = scriptfile::MemoryFile::new(b"header\n__END__\n".to_vec());
/// let mut file = scriptfile::OffsetFile::new(storage, scriptfile::Mode::Read).unwrap();
/// file.set_len(0).unwrap();
/// ```
pub struct OffsetFile<F: Stream> {
    file: F,
    offset: u64,
}

impl OffsetFile<DiskFile> {
    /// Opens an existing host file in `Mode::Read`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<OffsetFile<DiskFile>, Error> {
        OffsetFile::open_mode(path, Mode::Read)
    }

    pub fn open_mode<P: AsRef<Path>>(path: P, mode: Mode) -> Result<OffsetFile<DiskFile>, Error> {
        OffsetFile::new(DiskFile::open(path)?, mode)
    }
}

impl<F: Stream> OffsetFile<F> {
    /// Locates (or appends) the `__END__` line in `file` and applies `mode`.
    pub fn new(file: F, mode: Mode) -> Result<OffsetFile<F>, Error> {
        OffsetFile::with_marker(file, mode, DEFAULT_MARKER)
    }

    pub(crate) fn with_marker(mut file: F, mode: Mode, marker: &[u8]) -> Result<OffsetFile<F>, Error> {
        let offset = locate_segment(&mut file, marker)?;
        let mut result = OffsetFile { file, offset };
        match mode {
            Mode::Read => {
                result.seek(0, Whence::Set)?;
            }
            Mode::Write => result.truncate(0)?,
            Mode::Append => {
                result.file.seek(SeekFrom::End(0))?;
            }
        }
        Ok(result)
    }

    /// Absolute position of the first byte of the data segment.
    pub fn segment_offset(&self) -> u64 {
        self.offset
    }

    /// Moves to `offset` bytes from the start of the data segment and returns the new
    /// position.
    ///
    /// Only `Whence::Set` with a non-negative offset is accepted. Anything else fails
    /// before the stream is touched.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, Error> {
        if offset < 0 {
            return make_error(Error::NegativeSeek(offset));
        }
        if whence != Whence::Set {
            return make_error(Error::UnsupportedWhence(whence));
        }
        let pos = self.absolute(offset as u64)?;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(offset as u64)
    }

    /// Cuts (or zero-extends) the data segment to `len` bytes and moves to its new end.
    ///
    /// If the resize succeeds but the seek fails, the position is left wherever the
    /// stream put it.
    pub fn truncate(&mut self, len: u64) -> Result<(), Error> {
        let end = self.absolute(len)?;
        trace!("Truncating data segment to {}", len);
        self.file.set_len(end)?;
        self.file.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn absolute(&self, pos: u64) -> Result<u64, Error> {
        match self.offset.checked_add(pos) {
            Some(pos) => Ok(pos),
            None => make_error(Error::TooLarge(pos)),
        }
    }

    /// Current position relative to the start of the data segment.
    pub fn tell(&mut self) -> Result<u64, Error> {
        let pos = self.file.stream_position()?;
        match pos.checked_sub(self.offset) {
            Some(pos) => Ok(pos),
            None => make_error(Error::OutOfBound),
        }
    }

    /// Same as `tell`.
    pub fn pos(&mut self) -> Result<u64, Error> {
        self.tell()
    }

    /// Reads the next line, including its `\n`. `None` at the end of the segment.
    pub fn gets(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let mut line = Vec::new();
        if read_line(&mut self.file, &mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Like `gets`, but the end of the segment is an error.
    pub fn readline(&mut self) -> Result<Vec<u8>, Error> {
        match self.gets()? {
            Some(line) => Ok(line),
            None => make_error(Error::Eof),
        }
    }

    /// Reads all remaining lines.
    pub fn readlines(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        self.each_line().collect()
    }

    /// Reads the next byte. `None` at the end of the segment.
    pub fn getc(&mut self) -> Result<Option<u8>, Error> {
        read_byte(&mut self.file)
    }

    /// Like `getc`, but the end of the segment is an error.
    pub fn readchar(&mut self) -> Result<u8, Error> {
        match self.getc()? {
            Some(byte) => Ok(byte),
            None => make_error(Error::Eof),
        }
    }

    /// Reads everything from the current position to the end of the segment.
    pub fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        self.file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Reads up to `len` bytes. `None` if `len` isn't 0 and nothing is left.
    pub fn read_bytes(&mut self, len: usize) -> Result<Option<Vec<u8>>, Error> {
        let mut data = Vec::with_capacity(len);
        (&mut self.file).take(len as u64).read_to_end(&mut data)?;
        if data.is_empty() && len != 0 {
            return Ok(None);
        }
        Ok(Some(data))
    }

    pub fn each_line(&mut self) -> Lines<F> {
        Lines { file: self }
    }

    /// Same as `each_line`.
    pub fn each(&mut self) -> Lines<F> {
        self.each_line()
    }

    pub fn each_byte(&mut self) -> Bytes<F> {
        Bytes { file: self }
    }

    /// Writes `line`, then a `\n` unless `line` already ends with one.
    pub fn puts<B: AsRef<[u8]>>(&mut self, line: B) -> Result<(), Error> {
        let line = line.as_ref();
        self.file.write_all(line)?;
        if line.last() != Some(&b'\n') {
            self.file.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn print<B: AsRef<[u8]>>(&mut self, data: B) -> Result<(), Error> {
        self.file.write_all(data.as_ref())?;
        Ok(())
    }

    pub fn putc(&mut self, byte: u8) -> Result<u8, Error> {
        self.file.write_all(&[byte])?;
        Ok(byte)
    }

    /// Writes formatted text, as in `file.printf(format_args!("{}: {}\n", key, value))`.
    pub fn printf(&mut self, args: std::fmt::Arguments) -> Result<(), Error> {
        self.file.write_fmt(args)?;
        Ok(())
    }

    /// Time of the last status change of the underlying file.
    pub fn ctime(&self) -> Result<SystemTime, Error> {
        self.file.changed()
    }

    pub fn atime(&self) -> Result<SystemTime, Error> {
        self.file.accessed()
    }

    pub fn mtime(&self) -> Result<SystemTime, Error> {
        self.file.modified()
    }

    /// Commits pending writes and closes the underlying stream.
    ///
    /// Dropping an `OffsetFile` closes it as well, but swallows commit errors.
    pub fn close(mut self) -> Result<(), Error> {
        self.file.commit()
    }
}

impl<F: Stream> Read for OffsetFile<F> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl<F: Stream> Write for OffsetFile<F> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// Only `SeekFrom::Start` is supported; the other origins fail with `InvalidInput`.
impl<F: Stream> Seek for OffsetFile<F> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let result = match pos {
            SeekFrom::Start(offset) if offset > i64::max_value() as u64 => {
                make_error(Error::IO(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "seek offset out of range",
                )))
            }
            SeekFrom::Start(offset) => OffsetFile::seek(self, offset as i64, Whence::Set),
            SeekFrom::Current(_) => make_error(Error::UnsupportedWhence(Whence::Current)),
            SeekFrom::End(_) => make_error(Error::UnsupportedWhence(Whence::End)),
        };
        Ok(result?)
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.tell()?)
    }
}

/// Iterator over the remaining lines of an `OffsetFile`.
pub struct Lines<'a, F: Stream> {
    file: &'a mut OffsetFile<F>,
}

impl<'a, F: Stream> Iterator for Lines<'a, F> {
    type Item = Result<Vec<u8>, Error>;
    fn next(&mut self) -> Option<Result<Vec<u8>, Error>> {
        self.file.gets().transpose()
    }
}

/// Iterator over the remaining bytes of an `OffsetFile`.
pub struct Bytes<'a, F: Stream> {
    file: &'a mut OffsetFile<F>,
}

impl<'a, F: Stream> Iterator for Bytes<'a, F> {
    type Item = Result<u8, Error>;
    fn next(&mut self) -> Option<Result<u8, Error>> {
        self.file.getc().transpose()
    }
}

#[cfg(test)]
mod test {
    use crate::memory_file::MemoryFile;
    use crate::offset_file::*;
    use rand::prelude::*;

    fn init_logging() {
        let _ = stderrlog::new().verbosity(4).init();
    }

    fn scenario_file() -> (MemoryFile, OffsetFile<MemoryFile>) {
        let storage = MemoryFile::new(b"#!/bin/sh\necho hi\n__END__\nhello\n".to_vec());
        let file = OffsetFile::new(storage.share(), Mode::Read).unwrap();
        (storage, file)
    }

    #[test]
    fn scenario() {
        init_logging();
        let (storage, mut file) = scenario_file();
        assert_eq!(file.segment_offset(), 26);
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(file.read_all().unwrap(), b"hello\n");
        assert_eq!(file.tell().unwrap(), 6);
        assert_eq!(file.pos().unwrap(), 6);
        file.truncate(0).unwrap();
        assert_eq!(file.read_all().unwrap(), b"");
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(storage.snapshot(), b"#!/bin/sh\necho hi\n__END__\n");
    }

    #[test]
    fn no_marker() {
        let storage = MemoryFile::new(b"abc".to_vec());
        let mut file = OffsetFile::new(storage.share(), Mode::Read).unwrap();
        assert_eq!(storage.snapshot(), b"abc\n__END__\n");
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(file.read_all().unwrap(), b"");
    }

    #[test]
    fn seek_tell() {
        let (_, mut file) = scenario_file();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let n = rng.gen_range(0, 1_000_000);
            assert_eq!(file.seek(n, Whence::Set).unwrap(), n as u64);
            assert_eq!(file.tell().unwrap(), n as u64);
        }
    }

    #[test]
    fn bad_seek() {
        let (_, mut file) = scenario_file();
        file.seek(3, Whence::Set).unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let n = rng.gen_range(i64::min_value(), 0);
            let e = file.seek(n, Whence::Set).unwrap_err();
            assert!(e.is_invalid_argument());
            assert_eq!(file.tell().unwrap(), 3);
        }
        for &whence in &[Whence::Current, Whence::End] {
            match file.seek(0, whence) {
                Err(Error::UnsupportedWhence(w)) => assert_eq!(w, whence),
                _ => panic!("{:?} accepted", whence),
            }
            assert_eq!(file.tell().unwrap(), 3);
        }
        match file.seek(-1, Whence::End) {
            Err(Error::NegativeSeek(-1)) => (),
            _ => panic!("negative offset must be reported first"),
        }
    }

    #[test]
    fn io_seek() {
        let (_, mut file) = scenario_file();
        assert_eq!(Seek::seek(&mut file, SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(file.stream_position().unwrap(), 4);
        for &pos in &[SeekFrom::Current(0), SeekFrom::End(-1), SeekFrom::Current(-30)] {
            let e = Seek::seek(&mut file, pos).unwrap_err();
            assert_eq!(e.kind(), std::io::ErrorKind::InvalidInput);
            assert_eq!(file.tell().unwrap(), 4);
        }
        let e = Seek::seek(&mut file, SeekFrom::Start(u64::max_value())).unwrap_err();
        assert_eq!(e.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn truncate() {
        let (storage, mut file) = scenario_file();
        file.puts(b"a longer piece of data").unwrap();
        for &k in &[30, 5, 3] {
            file.truncate(k).unwrap();
            assert_eq!(file.tell().unwrap(), k);
            file.seek(0, Whence::Set).unwrap();
            assert_eq!(file.read_all().unwrap().len() as u64, k);
        }
        assert_eq!(storage.snapshot(), b"#!/bin/sh\necho hi\n__END__\na l");
        file.truncate(0).unwrap();
        file.seek(0, Whence::Set).unwrap();
        assert_eq!(file.read_all().unwrap(), b"");
        file.truncate(2).unwrap();
        file.seek(0, Whence::Set).unwrap();
        assert_eq!(file.read_all().unwrap(), vec![0, 0]);
    }

    #[test]
    fn overflowing_lengths() {
        let storage = MemoryFile::new(b"h\n__END__\ndata\n".to_vec());
        let mut file = OffsetFile::new(storage.share(), Mode::Read).unwrap();
        file.seek(2, Whence::Set).unwrap();
        for &len in &[u64::max_value(), u64::max_value() - 5] {
            match file.truncate(len) {
                Err(Error::TooLarge(l)) => assert_eq!(l, len),
                _ => panic!("truncate({}) must be rejected", len),
            }
            assert_eq!(storage.snapshot(), b"h\n__END__\ndata\n");
            assert_eq!(file.tell().unwrap(), 2);
        }
        assert_eq!(
            file.seek(i64::max_value(), Whence::Set).unwrap(),
            i64::max_value() as u64
        );

        // Large but representable lengths reach the stream, which refuses them.
        assert!(file.truncate(1 << 62).is_err());
        assert_eq!(storage.snapshot(), b"h\n__END__\ndata\n");
    }

    #[test]
    fn overflowing_lengths_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script");
        std::fs::write(&path, b"h\n__END__\ndata\n").unwrap();
        let mut file = OffsetFile::open(&path).unwrap();
        assert!(file.truncate(u64::max_value() - 5).unwrap_err().is_invalid_argument());
        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"h\n__END__\ndata\n");
    }

    #[test]
    fn write_read_back() {
        let (_, mut file) = scenario_file();
        file.truncate(0).unwrap();
        file.seek(0, Whence::Set).unwrap();
        file.puts("first").unwrap();
        file.puts(b"second\n").unwrap();
        file.puts(b"").unwrap();
        file.print(b"no newline").unwrap();
        assert_eq!(file.putc(b'!').unwrap(), b'!');
        file.printf(format_args!(" {}-{}\n", 1, "two")).unwrap();
        file.write_all(b"raw").unwrap();
        file.flush().unwrap();
        file.seek(0, Whence::Set).unwrap();
        assert_eq!(
            file.read_all().unwrap(),
            b"first\nsecond\n\nno newline! 1-two\nraw".to_vec()
        );
    }

    #[test]
    fn lines_and_bytes() {
        let storage = MemoryFile::new(b"x\n__END__\none\ntwo\nthree".to_vec());
        let mut file = OffsetFile::new(storage, Mode::Read).unwrap();
        assert_eq!(file.gets().unwrap(), Some(b"one\n".to_vec()));
        assert_eq!(file.readline().unwrap(), b"two\n");
        assert_eq!(file.readline().unwrap(), b"three");
        assert_eq!(file.gets().unwrap(), None);
        match file.readline() {
            Err(Error::Eof) => (),
            _ => panic!("expected Eof"),
        }

        file.seek(0, Whence::Set).unwrap();
        let lines: Vec<Vec<u8>> = file.each().map(|line| line.unwrap()).collect();
        assert_eq!(lines.len(), 3);
        file.seek(4, Whence::Set).unwrap();
        assert_eq!(
            file.readlines().unwrap(),
            vec![b"two\n".to_vec(), b"three".to_vec()]
        );

        file.seek(10, Whence::Set).unwrap();
        let bytes: Vec<u8> = file.each_byte().map(|b| b.unwrap()).collect();
        assert_eq!(bytes, b"ree");
        assert_eq!(file.getc().unwrap(), None);
        match file.readchar() {
            Err(Error::Eof) => (),
            _ => panic!("expected Eof"),
        }
        file.seek(2, Whence::Set).unwrap();
        assert_eq!(file.readchar().unwrap(), b'e');
        assert_eq!(file.read_bytes(3).unwrap(), Some(b"\ntw".to_vec()));
        assert_eq!(file.read_bytes(100).unwrap(), Some(b"o\nthree".to_vec()));
        assert_eq!(file.read_bytes(1).unwrap(), None);
        assert_eq!(file.read_bytes(0).unwrap(), Some(vec![]));
    }

    #[test]
    fn modes() {
        let storage = MemoryFile::new(b"h\n__END__\ndata\n".to_vec());
        let mut file = OffsetFile::new(storage.share(), Mode::Append).unwrap();
        assert_eq!(file.tell().unwrap(), 5);
        file.print(b"more\n").unwrap();
        file.close().unwrap();
        assert_eq!(storage.snapshot(), b"h\n__END__\ndata\nmore\n");

        let file = OffsetFile::new(storage.share(), Mode::Read).unwrap();
        file.close().unwrap();
        assert_eq!(storage.snapshot(), b"h\n__END__\ndata\nmore\n");

        let mut file = OffsetFile::new(storage.share(), Mode::Write).unwrap();
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(file.read_all().unwrap(), b"");
        file.close().unwrap();
        assert_eq!(storage.snapshot(), b"h\n__END__\n");
    }

    #[test]
    fn times() {
        let before = SystemTime::now();
        let (_, mut file) = scenario_file();
        file.puts(b"x").unwrap();
        assert!(file.mtime().unwrap() >= before);
        assert!(file.ctime().unwrap() >= before);
        file.seek(0, Whence::Set).unwrap();
        file.read_all().unwrap();
        assert!(file.atime().unwrap() >= before);
    }

    /// Runs random operations on `subject` and on `control`, a plain file holding only
    /// the data segment, and checks that they behave the same. `header` must stay intact.
    fn fuzzer<F: Stream>(mut subject: OffsetFile<F>, raw: impl Fn() -> Vec<u8>, control: MemoryFile) {
        let mut control = control;
        let header = raw()[0..subject.segment_offset() as usize].to_vec();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let len = control.len() as u64;
            let operation = rng.gen_range(0, 10);
            if operation < 2 {
                let pos = rng.gen_range(0, len + 10);
                assert_eq!(
                    subject.seek(pos as i64, Whence::Set).unwrap(),
                    control.seek(SeekFrom::Start(pos)).unwrap()
                );
            } else if operation < 5 {
                let n = rng.gen_range(0, 100);
                let mut b = vec![];
                (&mut control).take(n as u64).read_to_end(&mut b).unwrap();
                let a = subject.read_bytes(n).unwrap().unwrap_or_default();
                assert_eq!(a, b);
            } else if operation < 8 {
                let n = rng.gen_range(1, 100);
                let data: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
                subject.write_all(&data).unwrap();
                control.write_all(&data).unwrap();
            } else if operation < 9 {
                let k = rng.gen_range(0, len + 10);
                subject.truncate(k).unwrap();
                control.set_len(k).unwrap();
                control.seek(SeekFrom::Start(k)).unwrap();
            } else {
                assert_eq!(subject.tell().unwrap(), control.stream_position().unwrap());
            }
        }
        subject.close().unwrap();
        let raw = raw();
        assert_eq!(raw[0..header.len()], header[..]);
        assert_eq!(raw[header.len()..], control.snapshot()[..]);
    }

    #[test]
    fn fuzz_memory() {
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let header_len = rng.gen_range(0, 100);
            let mut data: Vec<u8> = (0..header_len).map(|_| rng.gen_range(b' ', b'~')).collect();
            let segment_len = rng.gen_range(0, 1000);
            let segment: Vec<u8> = (0..segment_len).map(|_| rng.gen()).collect();
            data.extend_from_slice(b"\n__END__\n");
            data.extend_from_slice(&segment);
            let storage = MemoryFile::new(data);
            let subject = OffsetFile::new(storage.share(), Mode::Read).unwrap();
            assert_eq!(subject.segment_offset(), header_len + 9);
            fuzzer(subject, || storage.snapshot(), MemoryFile::new(segment));
        }
    }

    #[test]
    fn fuzz_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script");
        std::fs::write(&path, b"line one\nline two").unwrap();
        let subject = OffsetFile::open(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"line one\nline two\n__END__\n");
        fuzzer(subject, || std::fs::read(&path).unwrap(), MemoryFile::new(vec![]));
    }
}
