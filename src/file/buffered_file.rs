use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::DEFAULT_BUFFER_SIZE;
use super::error::{FileError, FileResult};

/// Origin of a seek offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file
    Set,
    /// From the current position
    Cur,
    /// From the end of the file
    End,
}

/// Options for opening a buffered file
#[derive(Debug, Clone)]
pub struct FileOptions {
    read: bool,
    write: bool,
    create: bool,
    buffer_size: Option<usize>,
}

impl FileOptions {
    /// Read-write access to an existing file, buffer sized by the filesystem
    pub fn new() -> Self {
        Self {
            read: true,
            write: true,
            create: false,
            buffer_size: None,
        }
    }

    /// Allow reading
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Allow writing
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Create the file if it does not exist (implies write access)
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Capacity of the read-ahead buffer in bytes
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }
}

impl Default for FileOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Held while one operation runs on a [`BufferedFile`]; dropping it releases the handle
pub struct OperationGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Cursor and read-ahead buffer of an open file.
///
/// The buffer holds the bytes `[file_position, file_position + buffer_length)`.
/// The logical cursor is `file_position + buffer_position`; `buffer_position`
/// may run past `buffer_length` (and past the buffer) after a write.
struct Window {
    file: Option<File>,
    buffer: Vec<u8>,
    file_position: u64,
    buffer_position: usize,
    buffer_length: usize,
}

impl Window {
    fn file(&mut self) -> FileResult<&mut File> {
        self.file.as_mut().ok_or(FileError::Closed)
    }

    fn tell(&self) -> u64 {
        self.file_position + self.buffer_position as u64
    }

    fn size(&self) -> FileResult<u64> {
        let file = self.file.as_ref().ok_or(FileError::Closed)?;
        Ok(file.metadata()?.len())
    }

    fn eof(&self) -> FileResult<bool> {
        Ok(self.tell() >= self.size()?)
    }

    /// Make sure there are cached bytes under the cursor.
    /// Returns false at end of file.
    fn hydrate(&mut self) -> FileResult<bool> {
        if self.buffer_position < self.buffer_length {
            return Ok(true);
        }
        if self.eof()? {
            return Ok(false);
        }

        // Refill starting at the cursor
        self.file_position = self.tell();
        self.buffer_position = 0;
        self.buffer_length = 0;

        let position = self.file_position;
        let Window { file, buffer, .. } = self;
        let file = file.as_mut().ok_or(FileError::Closed)?;
        file.seek(SeekFrom::Start(position))?;
        let bytes_read = read_full(file, buffer)?;

        self.buffer_length = bytes_read;
        Ok(bytes_read > 0)
    }

    /// Copy freshly written bytes into the buffer at the cursor and advance it
    fn mirror(&mut self, data: &[u8]) {
        let capacity = self.buffer.len();
        let start = self.buffer_position;

        if start < capacity {
            let end = (start + data.len()).min(capacity);
            self.buffer[start..end].copy_from_slice(&data[..end - start]);
            // Only extend the valid window when the new bytes are contiguous with it
            if start <= self.buffer_length {
                self.buffer_length = self.buffer_length.max(end);
            }
        }

        self.buffer_position += data.len();
    }
}

/// Random-access byte stream with a single read-ahead buffer window.
///
/// Reads stop at end of file instead of failing, writes past the end extend
/// the file, and the position is explicit. Only one of `seek`, `read`,
/// `write` or `close` may run at a time; a second call made while one is in
/// flight fails with [`FileError::OperationInProgress`] instead of waiting.
pub struct BufferedFile {
    window: Mutex<Window>,
    busy: AtomicBool,
    path: PathBuf,
}

impl BufferedFile {
    /// Open a file
    pub fn open<P: AsRef<Path>>(path: P, options: &FileOptions) -> FileResult<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(options.read)
            .write(options.write || options.create)
            .create(options.create)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => FileError::FileNotFound(path.display().to_string()),
                _ => FileError::Io(err),
            })?;

        let buffer_size = match options.buffer_size {
            Some(size) => size,
            None => preferred_block_size(&file.metadata()?),
        };

        Ok(Self {
            window: Mutex::new(Window {
                file: Some(file),
                buffer: vec![0u8; buffer_size.max(1)],
                file_position: 0,
                buffer_position: 0,
                buffer_length: 0,
            }),
            busy: AtomicBool::new(false),
            path: path.to_path_buf(),
        })
    }

    /// Path this handle was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capacity of the read-ahead buffer
    pub fn buffer_capacity(&self) -> usize {
        self.window().buffer.len()
    }

    /// Claim the handle for one operation, failing if another one is in flight
    pub fn try_begin(&self, operation: &'static str) -> FileResult<OperationGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| FileError::OperationInProgress(operation))?;
        Ok(OperationGuard { busy: &self.busy })
    }

    fn window(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the cursor. Seeking inside the cached window keeps the buffer.
    pub fn seek(&self, offset: i64, whence: Whence) -> FileResult<()> {
        let _guard = self.try_begin("seek")?;
        let mut window = self.window();

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => window.tell() as i64,
            Whence::End => window.size()? as i64,
        };
        let target = base
            .checked_add(offset)
            .filter(|position| *position >= 0)
            .ok_or_else(|| {
                io::Error::new(ErrorKind::InvalidInput, "seek to a negative position")
            })? as u64;

        let window_end = window.file_position + window.buffer_length as u64;
        if target >= window.file_position && target < window_end {
            window.buffer_position = (target - window.file_position) as usize;
        } else {
            window.file_position = target;
            window.buffer_position = 0;
            window.buffer_length = 0;
        }

        Ok(())
    }

    /// Current position of the cursor
    pub fn tell(&self) -> u64 {
        self.window().tell()
    }

    /// Current size of the file on disk
    pub fn size(&self) -> FileResult<u64> {
        self.window().size()
    }

    /// Whether the cursor is at or past the end of the file
    pub fn eof(&self) -> FileResult<bool> {
        self.window().eof()
    }

    /// Read the next byte, or `None` at end of file
    pub fn getc(&self) -> FileResult<Option<u8>> {
        Ok(self.read(1)?.first().copied())
    }

    /// Read up to `length` bytes. Returns fewer if the end of file is reached.
    pub fn read(&self, length: usize) -> FileResult<Vec<u8>> {
        let _guard = self.try_begin("read")?;
        let mut window = self.window();

        let mut data = Vec::with_capacity(length.min(window.buffer.len()));
        let mut remaining = length;
        while remaining > 0 {
            if !window.hydrate()? {
                break;
            }

            let start = window.buffer_position;
            let count = remaining.min(window.buffer_length - start);
            data.extend_from_slice(&window.buffer[start..start + count]);
            window.buffer_position += count;
            remaining -= count;
        }

        Ok(data)
    }

    /// Write `data` at the cursor and return the number of bytes written
    pub fn write(&self, data: &[u8]) -> FileResult<usize> {
        let _guard = self.try_begin("write")?;
        let mut window = self.window();

        let position = window.tell();
        let file = window.file()?;
        file.seek(SeekFrom::Start(position))?;
        file.write_all(data)?;

        // Keep the buffer in step so re-reading without a seek sees the new bytes
        window.mirror(data);
        Ok(data.len())
    }

    /// Release the underlying file
    pub fn close(&self) -> FileResult<()> {
        let _guard = self.try_begin("close")?;
        let mut window = self.window();

        let file = window.file.take().ok_or(FileError::Closed)?;
        drop(file);
        window.buffer_length = 0;
        Ok(())
    }
}

fn read_full(file: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn preferred_block_size(metadata: &Metadata) -> usize {
    use std::os::unix::fs::MetadataExt;

    match metadata.blksize() as usize {
        0 => DEFAULT_BUFFER_SIZE,
        size => size,
    }
}

#[cfg(not(unix))]
fn preferred_block_size(_metadata: &Metadata) -> usize {
    DEFAULT_BUFFER_SIZE
}
