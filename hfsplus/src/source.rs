//! The positioned-read byte source the rest of the crate is built on.
//!
//! Every on-disk structure is read through `read_at`/`size` rather than a
//! `Read + Seek` cursor so that multiple file entries backed by the same
//! volume can issue reads concurrently without fighting over a shared
//! cursor position.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::error::{HfsError, Result};

/// A random-access byte range: a disk image, a partition, or a sub-range of either.
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number of
    /// bytes actually read; a short read is only valid when `offset` is at or
    /// past the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total addressable length of this source, in bytes.
    fn size(&self) -> u64;

    /// Read exactly `buf.len()` bytes, failing with `OutOfRange` on a short read.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(HfsError::OutOfRange(format!(
                "short read at offset {offset}: got {n} of {} requested bytes",
                buf.len()
            )));
        }
        Ok(())
    }
}

/// A `ByteSource` backed by an open file, guarded by a mutex so `&self` reads
/// from multiple file-entry handles never interleave mid-seek.
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(FileSource {
            file: Mutex::new(file),
            size,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock().expect("FileSource mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A view into another `ByteSource` starting at `base`, used for `-o OFFSET`
/// and for volumes embedded inside a partitioned image.
pub struct OffsetSource<S: ByteSource> {
    inner: S,
    base: u64,
    len: u64,
}

impl<S: ByteSource> OffsetSource<S> {
    pub fn new(inner: S, base: u64) -> Result<Self> {
        let total = inner.size();
        if base > total {
            return Err(HfsError::Argument(format!(
                "offset {base} is beyond source size {total}"
            )));
        }
        let len = total - base;
        Ok(OffsetSource { inner, base, len })
    }
}

impl<S: ByteSource> ByteSource for OffsetSource<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let available = self.len - offset;
        let to_read = (buf.len() as u64).min(available) as usize;
        self.inner.read_at(self.base + offset, &mut buf[..to_read])
    }

    fn size(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn offset_source_clamps_reads() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 16]).unwrap();
        tmp.write_all(b"hello world!!!!!").unwrap();
        let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
        let offset = OffsetSource::new(source, 16).unwrap();
        let mut buf = [0u8; 5];
        offset.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(offset.size(), 16);
    }

    #[test]
    fn offset_source_rejects_offset_past_end() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let source = FileSource::from_file(tmp.reopen().unwrap()).unwrap();
        assert!(OffsetSource::new(source, 1).is_err());
    }
}
