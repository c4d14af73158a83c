//! Per-load state threaded through every sub-loader: where the bytes come
//! from, the scratch window they land in, and the hunk the result is
//! charged to.

use crate::{
    format::{FormatError, Record, decode_record},
    io::{FileSource, ScratchBuffer},
    memory::Hunk,
    model::{LoadError, load_name},
};

pub struct LoaderContext<'a> {
    pub source: &'a dyn FileSource,
    pub path: &'a str,
    pub file_len: u64,
    pub scratch: &'a mut ScratchBuffer,
    pub hunk: &'a mut Hunk,
    /// Hunk / cache tag, the file's base name.
    pub tag: String,
    pub texture_limit: Option<usize>,
}

impl<'a> LoaderContext<'a> {
    pub fn new(
        source: &'a dyn FileSource,
        path: &'a str,
        scratch: &'a mut ScratchBuffer,
        hunk: &'a mut Hunk,
        texture_limit: Option<usize>,
    ) -> Result<Self, LoadError> {
        let file_len = source.file_len(path)?;
        Ok(Self {
            source,
            path,
            file_len,
            scratch,
            hunk,
            tag: load_name(path),
            texture_limit,
        })
    }

    /// `length` bytes at `offset`.  Overwrites the previous window.
    pub fn window(&mut self, offset: u64, length: usize) -> Result<&[u8], LoadError> {
        Ok(self
            .source
            .load_window(self.path, offset, length, self.scratch)?)
    }

    /// Charge `count` runtime values of `T` to the hunk.
    pub fn charge<T>(&mut self, count: usize) -> Result<(), LoadError> {
        self.hunk.alloc_array::<T>(count, &self.tag)?;
        Ok(())
    }

    pub fn charge_bytes(&mut self, bytes: usize) -> Result<(), LoadError> {
        self.hunk.alloc(bytes, &self.tag)?;
        Ok(())
    }

    pub fn invalid(&self, reason: impl Into<String>) -> LoadError {
        LoadError::Invalid {
            model: self.path.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn bad_reference(&self, what: &'static str, index: usize, target: i64, limit: usize) -> LoadError {
        LoadError::BadReference {
            model: self.path.to_owned(),
            what,
            index,
            target,
            limit,
        }
    }
}

/// Sequential reader over a file, one window per request.
pub struct StreamCursor<'c, 'a> {
    ctx: &'c mut LoaderContext<'a>,
    offset: u64,
}

impl<'c, 'a> StreamCursor<'c, 'a> {
    pub fn new(ctx: &'c mut LoaderContext<'a>, offset: u64) -> Self {
        Self { ctx, offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn ctx(&mut self) -> &mut LoaderContext<'a> {
        &mut *self.ctx
    }

    pub fn record<T: Record>(&mut self, what: &'static str) -> Result<T, LoadError> {
        let offset = self.offset;
        let bytes = self.ctx.window(offset, T::SIZE)?;
        let rec = decode_record::<T>(bytes, what)?;
        self.offset += T::SIZE as u64;
        Ok(rec)
    }

    pub fn records<T: Record>(&mut self, count: usize, what: &'static str) -> Result<Vec<T>, LoadError> {
        let offset = self.offset;
        let bytes = self.ctx.window(offset, count * T::SIZE)?;
        let out = bytes
            .chunks_exact(T::SIZE)
            .map(|chunk| decode_record::<T>(chunk, what))
            .collect::<Result<Vec<T>, FormatError>>()?;
        self.offset += (count * T::SIZE) as u64;
        Ok(out)
    }

    pub fn bytes(&mut self, count: usize) -> Result<Vec<u8>, LoadError> {
        let offset = self.offset;
        let out = self.ctx.window(offset, count)?.to_vec();
        self.offset += count as u64;
        Ok(out)
    }
}
