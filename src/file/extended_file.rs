use std::ops::Deref;
use std::path::Path;

use super::buffered_file::{BufferedFile, FileOptions};
use super::error::{FileError, FileResult};
use super::ref_codec::{decode_ref, encode_ref};
use super::{REF_LENGTH, Ref};

/// A [`BufferedFile`] with delimited reads and fixed-width reference I/O
pub struct ExtendedFile {
    inner: BufferedFile,
}

impl ExtendedFile {
    /// Open a file
    pub fn open<P: AsRef<Path>>(path: P, options: &FileOptions) -> FileResult<Self> {
        Ok(Self::new(BufferedFile::open(path, options)?))
    }

    pub fn new(inner: BufferedFile) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> BufferedFile {
        self.inner
    }

    /// Read bytes up to (not including) `terminator`, consuming the terminator.
    /// Running out of input first is an error, not a short read.
    pub fn get_string_until(&self, terminator: u8) -> FileResult<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            match self.getc()? {
                None => return Err(FileError::UnexpectedEof("get_string_until")),
                Some(byte) if byte == terminator => return Ok(data),
                Some(byte) => data.push(byte),
            }
        }
    }

    /// Offset of the end of the file
    pub fn get_eof_position(&self) -> FileResult<u64> {
        self.size()
    }

    /// Read a [`REF_LENGTH`]-wide reference at the cursor
    pub fn read_ref(&self) -> FileResult<Ref> {
        self.read_ref_with_length(REF_LENGTH)
    }

    pub fn read_ref_with_length(&self, length: usize) -> FileResult<Ref> {
        let bytes = self.read(length)?;
        if bytes.len() < length {
            return Err(FileError::UnexpectedEof("read_ref"));
        }
        decode_ref(&bytes)
    }

    /// Write a [`REF_LENGTH`]-wide reference at the cursor
    pub fn write_ref(&self, value: Ref) -> FileResult<usize> {
        self.write_ref_with_length(value, REF_LENGTH)
    }

    pub fn write_ref_with_length(&self, value: Ref, length: usize) -> FileResult<usize> {
        self.write(&encode_ref(value, length)?)
    }
}

impl Deref for ExtendedFile {
    type Target = BufferedFile;

    fn deref(&self) -> &BufferedFile {
        &self.inner
    }
}
