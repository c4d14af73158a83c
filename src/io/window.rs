//! # Windowed file access
//!
//! Model files are never mapped whole.  Loaders ask for an
//! `(offset, length)` window and get it copied into a caller-owned
//! [`ScratchBuffer`], which the next window overwrites.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::PathBuf,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("{path}: short read at {offset}, wanted {wanted} bytes, got {got}")]
    ShortRead {
        path: String,
        offset: u64,
        wanted: usize,
        got: usize,
    },

    #[error("window of {length} bytes exceeds scratch capacity {capacity}")]
    WindowTooLarge { length: usize, capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reusable destination for window reads.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl ScratchBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize to exactly `length` bytes.  Previous contents are not kept.
    fn prepare(&mut self, length: usize) -> Result<&mut [u8], ReadError> {
        if length > self.capacity {
            return Err(ReadError::WindowTooLarge {
                length,
                capacity: self.capacity,
            });
        }
        self.buf.clear();
        self.buf.resize(length, 0);
        Ok(&mut self.buf)
    }
}

/// Where model bytes come from.
pub trait FileSource {
    fn file_len(&self, path: &str) -> Result<u64, ReadError>;

    /// Copy exactly `length` bytes starting at `offset` into `scratch`.
    fn load_window<'a>(
        &self,
        path: &str,
        offset: u64,
        length: usize,
        scratch: &'a mut ScratchBuffer,
    ) -> Result<&'a [u8], ReadError>;
}

// ------------------------------------------------------------------ //
// Directory on disk
// ------------------------------------------------------------------ //

/// Resolves names relative to a base directory.
#[derive(Clone, Debug)]
pub struct DirSource {
    base: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    fn open(&self, path: &str) -> Result<File, ReadError> {
        File::open(self.base.join(path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReadError::FileNotFound(path.to_owned()),
            _ => ReadError::Io(e),
        })
    }
}

impl FileSource for DirSource {
    fn file_len(&self, path: &str) -> Result<u64, ReadError> {
        Ok(self.open(path)?.metadata()?.len())
    }

    fn load_window<'a>(
        &self,
        path: &str,
        offset: u64,
        length: usize,
        scratch: &'a mut ScratchBuffer,
    ) -> Result<&'a [u8], ReadError> {
        let mut file = self.open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let buf = scratch.prepare(length)?;
        let mut got = 0;
        while got < length {
            match file.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if got < length {
            return Err(ReadError::ShortRead {
                path: path.to_owned(),
                offset,
                wanted: length,
                got,
            });
        }
        Ok(&scratch.buf[..length])
    }
}

// ------------------------------------------------------------------ //
// In-memory files
// ------------------------------------------------------------------ //

/// Name → bytes map; used by tools that already hold a file and by tests.
#[derive(Clone, Debug, Default)]
pub struct MemSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    fn get(&self, path: &str) -> Result<&[u8], ReadError> {
        self.files
            .get(path)
            .map(Vec::as_slice)
            .ok_or_else(|| ReadError::FileNotFound(path.to_owned()))
    }
}

impl FileSource for MemSource {
    fn file_len(&self, path: &str) -> Result<u64, ReadError> {
        Ok(self.get(path)?.len() as u64)
    }

    fn load_window<'a>(
        &self,
        path: &str,
        offset: u64,
        length: usize,
        scratch: &'a mut ScratchBuffer,
    ) -> Result<&'a [u8], ReadError> {
        let bytes = self.get(path)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let avail = &bytes[start..];
        let buf = scratch.prepare(length)?;
        if avail.len() < length {
            return Err(ReadError::ShortRead {
                path: path.to_owned(),
                offset,
                wanted: length,
                got: avail.len(),
            });
        }
        buf.copy_from_slice(&avail[..length]);
        Ok(&scratch.buf[..length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mem_file() -> MemSource {
        let mut src = MemSource::new();
        src.insert("maps/test.bsp", (0u8..100).collect());
        src
    }

    #[test]
    fn window_from_memory() {
        let src = mem_file();
        let mut scratch = ScratchBuffer::with_capacity(64);
        let bytes = src.load_window("maps/test.bsp", 10, 5, &mut scratch).unwrap();
        assert_eq!(bytes, &[10, 11, 12, 13, 14]);
        assert_eq!(src.file_len("maps/test.bsp").unwrap(), 100);
    }

    #[test]
    fn scratch_is_reused_between_windows() {
        let src = mem_file();
        let mut scratch = ScratchBuffer::with_capacity(64);
        src.load_window("maps/test.bsp", 0, 40, &mut scratch).unwrap();
        let second = src.load_window("maps/test.bsp", 90, 2, &mut scratch).unwrap();
        assert_eq!(second, &[90, 91]);
    }

    #[test]
    fn missing_file() {
        let src = mem_file();
        let mut scratch = ScratchBuffer::with_capacity(64);
        let err = src.load_window("maps/none.bsp", 0, 4, &mut scratch).unwrap_err();
        assert!(matches!(err, ReadError::FileNotFound(p) if p == "maps/none.bsp"));
    }

    #[test]
    fn short_read_reports_counts() {
        let src = mem_file();
        let mut scratch = ScratchBuffer::with_capacity(64);
        let err = src.load_window("maps/test.bsp", 95, 10, &mut scratch).unwrap_err();
        assert!(matches!(
            err,
            ReadError::ShortRead {
                wanted: 10,
                got: 5,
                ..
            }
        ));
    }

    #[test]
    fn window_larger_than_scratch() {
        let src = mem_file();
        let mut scratch = ScratchBuffer::with_capacity(8);
        let err = src.load_window("maps/test.bsp", 0, 9, &mut scratch).unwrap_err();
        assert!(matches!(
            err,
            ReadError::WindowTooLarge {
                length: 9,
                capacity: 8
            }
        ));
    }

    /*------------------------------------------------------------------*/
    /* Disk-backed source                                               */
    /*------------------------------------------------------------------*/
    #[test]
    fn dir_source_reads_window() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut f = File::create(dir.path().join("pak.bin")).unwrap();
        f.write_all(b"0123456789").unwrap();
        drop(f);

        let src = DirSource::new(dir.path());
        let mut scratch = ScratchBuffer::with_capacity(16);
        assert_eq!(src.file_len("pak.bin").unwrap(), 10);
        assert_eq!(src.load_window("pak.bin", 3, 4, &mut scratch).unwrap(), b"3456");

        let err = src.load_window("pak.bin", 8, 4, &mut scratch).unwrap_err();
        assert!(matches!(err, ReadError::ShortRead { got: 2, .. }));

        let err = src.load_window("gone.bin", 0, 1, &mut scratch).unwrap_err();
        assert!(matches!(err, ReadError::FileNotFound(_)));
    }

    #[test]
    fn dir_source_seek_past_end_is_short() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        tmp.write_all(&[1, 2, 3]).unwrap();
        let dir = tmp.path().parent().unwrap().to_path_buf();
        let name = tmp.path().file_name().unwrap().to_str().unwrap().to_owned();

        let src = DirSource::new(dir);
        let mut scratch = ScratchBuffer::with_capacity(16);
        let err = src.load_window(&name, 100, 2, &mut scratch).unwrap_err();
        assert!(matches!(err, ReadError::ShortRead { got: 0, .. }));
    }
}
