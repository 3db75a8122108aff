use crate::error::*;
use crate::stream::*;
use std::cell::RefCell;
use std::convert::TryFrom;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use std::time::SystemTime;

struct Storage {
    data: Vec<u8>,
    accessed: SystemTime,
    modified: SystemTime,
    changed: SystemTime,
}

impl Storage {
    /// Resizes `data` to `len`, failing instead of aborting when the memory isn't there.
    fn resize(&mut self, len: u64) -> std::io::Result<()> {
        let len = usize::try_from(len).map_err(|_| {
            std::io::Error::new(ErrorKind::InvalidInput, "length exceeds the address space")
        })?;
        if len > self.data.len() {
            let additional = len - self.data.len();
            self.data.try_reserve(additional).map_err(|_| {
                std::io::Error::new(ErrorKind::OutOfMemory, "cannot grow memory file")
            })?;
        }
        self.data.resize(len, 0);
        let now = SystemTime::now();
        self.modified = now;
        self.changed = now;
        Ok(())
    }
}

/// Implements `Stream` over a `Vec<u8>`.
///
/// The buffer is shared: `share` hands out another cursor over the same bytes, which
/// lets a caller keep looking at the storage after giving a `MemoryFile` away.
pub struct MemoryFile {
    storage: Rc<RefCell<Storage>>,
    pos: u64,
}

impl MemoryFile {
    pub fn new(data: Vec<u8>) -> MemoryFile {
        let now = SystemTime::now();
        MemoryFile {
            storage: Rc::new(RefCell::new(Storage {
                data,
                accessed: now,
                modified: now,
                changed: now,
            })),
            pos: 0,
        }
    }

    /// Creates another cursor, at position 0, over the same buffer.
    pub fn share(&self) -> MemoryFile {
        MemoryFile {
            storage: self.storage.clone(),
            pos: 0,
        }
    }

    /// Copies out the current content.
    pub fn snapshot(&self) -> Vec<u8> {
        self.storage.borrow().data.clone()
    }

    pub fn len(&self) -> usize {
        self.storage.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut storage = self.storage.borrow_mut();
        storage.accessed = SystemTime::now();
        let len = storage.data.len() as u64;
        if self.pos >= len {
            return Ok(0);
        }
        let begin = self.pos as usize;
        let n = std::cmp::min(buf.len(), storage.data.len() - begin);
        buf[0..n].copy_from_slice(&storage.data[begin..begin + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut storage = self.storage.borrow_mut();
        let end = match self.pos.checked_add(buf.len() as u64) {
            Some(end) => end,
            None => {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    "write past the largest possible position",
                ))
            }
        };
        if (storage.data.len() as u64) < end {
            storage.resize(end)?;
        }
        // `end` fits in memory now, and so does `pos`.
        let begin = self.pos as usize;
        storage.data[begin..begin + buf.len()].copy_from_slice(buf);
        let now = SystemTime::now();
        storage.modified = now;
        storage.changed = now;
        self.pos = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(pos) => {
                self.pos = pos;
                return Ok(pos);
            }
            SeekFrom::Current(offset) => (self.pos, offset),
            SeekFrom::End(offset) => (self.len() as u64, offset),
        };
        let target = if offset >= 0 {
            base.checked_add(offset as u64)
        } else {
            base.checked_sub(offset.wrapping_neg() as u64)
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

impl Stream for MemoryFile {
    fn set_len(&mut self, len: u64) -> Result<(), Error> {
        self.storage.borrow_mut().resize(len)?;
        Ok(())
    }
    fn accessed(&self) -> Result<SystemTime, Error> {
        Ok(self.storage.borrow().accessed)
    }
    fn modified(&self) -> Result<SystemTime, Error> {
        Ok(self.storage.borrow().modified)
    }
    fn changed(&self) -> Result<SystemTime, Error> {
        Ok(self.storage.borrow().changed)
    }
    fn commit(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[test]
fn test() {
    let mut file = MemoryFile::new(vec![9, 9, 9, 9, 9, 9, 9, 9, 9]);
    let buf = [1, 3, 5, 7];
    file.seek(SeekFrom::Start(2)).unwrap();
    file.write_all(&buf).unwrap();
    file.seek(SeekFrom::Start(4)).unwrap();
    file.write_all(&buf).unwrap();
    let mut buf2 = [0; 7];
    file.seek(SeekFrom::Start(2)).unwrap();
    file.read_exact(&mut buf2).unwrap();
    assert_eq!(buf2, [1, 3, 1, 3, 5, 7, 9]);

    file.seek(SeekFrom::End(2)).unwrap();
    file.write_all(&[4]).unwrap();
    assert_eq!(file.snapshot(), vec![9, 9, 1, 3, 1, 3, 5, 7, 9, 0, 0, 4]);
    assert!(file.seek(SeekFrom::Current(-13)).is_err());

    let mut other = file.share();
    other.set_len(3).unwrap();
    assert_eq!(file.snapshot(), vec![9, 9, 1]);
    let mut rest = vec![];
    file.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn huge_sizes() {
    let mut file = MemoryFile::new(b"keep".to_vec());
    match file.set_len(1 << 62) {
        Err(Error::IO(_)) => (),
        _ => panic!("huge set_len must fail"),
    }
    file.seek(SeekFrom::Start(1 << 62)).unwrap();
    assert!(file.write_all(&[1]).is_err());
    file.seek(SeekFrom::Start(u64::max_value())).unwrap();
    assert_eq!(
        file.write(&[1]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(file.snapshot(), b"keep");
    assert!(!file.is_empty());
    file.set_len(0).unwrap();
    assert!(file.is_empty());
}
