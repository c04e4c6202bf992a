use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use super::MEMO_END_OF_CONTENT;
use super::error::{MemoError, MemoResult};
use super::serial_queue::{Pending, SerialQueue};
use crate::file::{
    ExtendedFile, FileOptions, NULL_REF, REF_LENGTH, Ref, Whence, encode_ref, position_from_ref,
    ref_from_position,
};

/// Create a memo file holding only the header chunk (an empty free list)
pub fn create_memo_file<P: AsRef<Path>>(path: P, chunk_size: usize) -> MemoResult<()> {
    validate_chunk_size(chunk_size)?;
    let path = path.as_ref();

    if path.exists() {
        return Err(MemoError::FileAlreadyExists(path.display().to_string()));
    }

    // Create parent directories if they don't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, encode_ref(NULL_REF, chunk_size)?)?;
    Ok(())
}

/// Open an existing memo file whose chunks are `chunk_size` bytes long
pub fn open_memo<P: AsRef<Path>>(path: P, chunk_size: usize) -> MemoResult<MemoStore> {
    validate_chunk_size(chunk_size)?;
    let path = path.as_ref();

    let file = ExtendedFile::open(path, &FileOptions::new().buffer_size(chunk_size))?;
    let free_head = file.read_ref()?;

    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(store = %label, chunk_size, free_head, "opened memo store");

    let core = StoreCore {
        file,
        chunk_size,
        free_head,
        label: label.clone(),
    };
    let queue = SerialQueue::spawn(format!("memo-{label}"), core)?;

    Ok(MemoStore { queue, chunk_size })
}

/// Parse a textual chunk address supplied by a caller
pub fn parse_address(text: &str) -> MemoResult<Ref> {
    let addr = text.trim().parse::<Ref>().map_err(|_| {
        MemoError::InvalidArgument(format!("address {text:?} is not an integer"))
    })?;
    validate_address("parse_address", addr)?;
    Ok(addr)
}

fn validate_chunk_size(chunk_size: usize) -> MemoResult<()> {
    if chunk_size < REF_LENGTH + 1 {
        return Err(MemoError::InvalidArgument(format!(
            "chunk size must be at least {}, got {chunk_size}",
            REF_LENGTH + 1
        )));
    }
    Ok(())
}

fn validate_address(operation: &str, addr: Ref) -> MemoResult<()> {
    if addr < 1 {
        return Err(MemoError::InvalidArgument(format!(
            "{operation} failed: addr needs to be a positive integer, got {addr}"
        )));
    }
    Ok(())
}

/// Variable-length values stored as linked lists of fixed-size chunks.
///
/// Chunk 0 is the header; its reference field is the head of the free list.
/// Every other chunk starts with a reference to the next chunk of its chain
/// (or of the free list), followed by the payload, an end-of-content marker
/// and space padding.
///
/// Operations are executed one at a time by a worker that owns the file, in
/// the order they were issued. The `queue_*` methods return as soon as the
/// operation is queued; the plain methods wait for the result.
pub struct MemoStore {
    queue: SerialQueue<StoreCore>,
    chunk_size: usize,
}

impl MemoStore {
    /// Size of every chunk in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Payload bytes that fit in one chunk
    pub fn payload_capacity(&self) -> usize {
        self.chunk_size - REF_LENGTH - 1
    }

    /// Store `data` and return the address of its first chunk
    pub fn write(&self, data: &[u8]) -> MemoResult<Ref> {
        self.queue_write(data)?.wait()?
    }

    /// Read the value whose first chunk is `addr`.
    /// An address past the end of the file reads as empty.
    pub fn read(&self, addr: Ref) -> MemoResult<Vec<u8>> {
        self.queue_read(addr)?.wait()?
    }

    /// Return the chain starting at `addr` to the free list.
    /// An address past the end of the file is ignored.
    pub fn delete(&self, addr: Ref) -> MemoResult<()> {
        self.queue_delete(addr)?.wait()?
    }

    /// Address of the first reusable chunk, or `NULL_REF`
    pub fn free_head(&self) -> MemoResult<Ref> {
        Ok(self.queue.run(|core: &mut StoreCore| core.free_head)?)
    }

    pub fn queue_write(&self, data: &[u8]) -> MemoResult<Pending<MemoResult<Ref>>> {
        if !data.is_empty() && self.payload_capacity() == 0 {
            return Err(MemoError::InvalidArgument(format!(
                "write failed: chunks of {} bytes have no room for data",
                self.chunk_size
            )));
        }
        if data.contains(&MEMO_END_OF_CONTENT) {
            return Err(MemoError::InvalidArgument(
                "write failed: data contains the end-of-content marker".to_string(),
            ));
        }

        let data = data.to_vec();
        Ok(self.queue.submit(move |core: &mut StoreCore| core.write(&data)))
    }

    pub fn queue_read(&self, addr: Ref) -> MemoResult<Pending<MemoResult<Vec<u8>>>> {
        validate_address("read", addr)?;
        Ok(self.queue.submit(move |core: &mut StoreCore| core.read(addr)))
    }

    pub fn queue_delete(&self, addr: Ref) -> MemoResult<Pending<MemoResult<()>>> {
        validate_address("delete", addr)?;
        Ok(self.queue.submit(move |core: &mut StoreCore| core.delete(addr)))
    }

    /// Close the file after every queued operation has finished
    pub fn close(self) -> MemoResult<()> {
        self.queue.run(|core: &mut StoreCore| core.close())?
    }
}

/// State owned by the store's worker
struct StoreCore {
    file: ExtendedFile,
    chunk_size: usize,
    /// Mirrors the reference persisted in chunk 0
    free_head: Ref,
    label: String,
}

impl StoreCore {
    fn payload_capacity(&self) -> usize {
        self.chunk_size - REF_LENGTH - 1
    }

    fn seek_chunk(&self, addr: Ref) -> MemoResult<()> {
        let position = position_from_ref(addr, self.chunk_size)
            .and_then(|position| i64::try_from(position).ok())
            .ok_or(MemoError::CorruptChain(addr))?;
        self.file.seek(position, Whence::Set)?;
        Ok(())
    }

    /// Whether chunk `addr` starts inside the file
    fn in_file(&self, addr: Ref, file_size: u64) -> bool {
        position_from_ref(addr, self.chunk_size).is_some_and(|position| position < file_size)
    }

    /// Upper bound on the length of any chain in the current file
    fn chunk_count(&self, file_size: u64) -> u64 {
        file_size / self.chunk_size as u64
    }

    /// Claim a chunk for writing and leave the cursor at its start.
    ///
    /// Pops the free list when it is not empty (persisting the new head),
    /// otherwise appends at the end of the file.
    fn alloc_and_seek(&mut self) -> MemoResult<Ref> {
        if self.free_head == NULL_REF {
            self.file.seek(0, Whence::End)?;
            let addr = ref_from_position(self.file.tell(), self.chunk_size);
            trace!(store = %self.label, addr, "append chunk");
            return Ok(addr);
        }

        let addr = self.free_head;
        if addr < 1 {
            return Err(MemoError::CorruptChain(addr));
        }

        self.seek_chunk(addr)?;
        self.free_head = self.file.read_ref()?;
        self.file.seek(0, Whence::Set)?;
        self.file.write_ref(self.free_head)?;
        self.seek_chunk(addr)?;

        trace!(store = %self.label, addr, free_head = self.free_head, "reuse chunk");
        Ok(addr)
    }

    fn write(&mut self, data: &[u8]) -> MemoResult<Ref> {
        let capacity = self.payload_capacity();
        let mut first = NULL_REF;
        let mut remaining = data;

        // An empty value still gets one chunk so the address stays readable
        loop {
            let addr = self.alloc_and_seek()?;
            if first == NULL_REF {
                first = addr;
            }

            let (piece, rest) = remaining.split_at(remaining.len().min(capacity));
            let mut chunk_length = self.chunk_size;
            let mut chunk = Vec::with_capacity(chunk_length);

            if rest.is_empty() {
                chunk.extend_from_slice(&encode_ref(NULL_REF, REF_LENGTH)?);
            } else if self.file.eof()? {
                // Freshly appended; the next chunk is appended right after it
                chunk.extend_from_slice(&encode_ref(addr + 1, REF_LENGTH)?);
            } else if self.free_head == NULL_REF {
                // Reused the last free chunk; the next one will be appended
                let next = ref_from_position(self.file.get_eof_position()?, self.chunk_size);
                chunk.extend_from_slice(&encode_ref(next, REF_LENGTH)?);
            } else {
                // The reused chunk still points at the next free chunk,
                // which is exactly the one allocated next
                chunk_length -= REF_LENGTH;
                self.file.seek(REF_LENGTH as i64, Whence::Cur)?;
            }

            chunk.extend_from_slice(piece);
            chunk.push(MEMO_END_OF_CONTENT);
            chunk.resize(chunk_length, b' ');

            debug!(store = %self.label, addr, bytes = piece.len(), "write chunk");
            self.file.write(&chunk)?;

            remaining = rest;
            if remaining.is_empty() {
                break;
            }
        }

        Ok(first)
    }

    fn read(&mut self, addr: Ref) -> MemoResult<Vec<u8>> {
        let file_size = self.file.size()?;
        if !self.in_file(addr, file_size) {
            return Ok(Vec::new());
        }

        let limit = self.chunk_count(file_size);
        let mut data = Vec::new();
        let mut next = addr;
        let mut visited = 0;

        while next > 0 {
            visited += 1;
            if visited > limit {
                return Err(MemoError::CorruptChain(addr));
            }

            let current = next;
            self.seek_chunk(current)?;
            next = self.file.read_ref()?;
            let body = self.file.read(self.chunk_size - REF_LENGTH)?;
            let end = body
                .iter()
                .position(|&b| b == MEMO_END_OF_CONTENT)
                .unwrap_or(body.len());

            trace!(store = %self.label, addr = current, next, bytes = end, "read chunk");
            data.extend_from_slice(&body[..end]);
        }

        if next != NULL_REF {
            return Err(MemoError::CorruptChain(addr));
        }
        Ok(data)
    }

    fn delete(&mut self, addr: Ref) -> MemoResult<()> {
        let file_size = self.file.size()?;
        if !self.in_file(addr, file_size) {
            debug!(store = %self.label, addr, "delete past end of file ignored");
            return Ok(());
        }

        let limit = self.chunk_count(file_size);
        let mut next = addr;
        let mut visited = 0;

        // Walk to the last chunk, leaving the cursor just past its reference
        while next != NULL_REF {
            visited += 1;
            if next < 1 || visited > limit {
                return Err(MemoError::CorruptChain(addr));
            }
            // Linking a chunk that is already free would close the free list into a loop
            if next == self.free_head {
                return Err(MemoError::InvalidArgument(format!(
                    "delete failed: chunk {next} is already free"
                )));
            }

            trace!(store = %self.label, addr = next, "reclaim chunk");
            self.seek_chunk(next)?;
            next = self.file.read_ref()?;
        }

        // Hang the existing free list off the tail and make this chain the new head
        self.file.seek(-(REF_LENGTH as i64), Whence::Cur)?;
        self.file.write_ref(self.free_head)?;
        self.free_head = addr;
        self.file.seek(0, Whence::Set)?;
        self.file.write_ref(self.free_head)?;

        debug!(store = %self.label, addr, "deleted chain");
        Ok(())
    }

    fn close(&mut self) -> MemoResult<()> {
        self.file.close()?;
        debug!(store = %self.label, "closed memo store");
        Ok(())
    }
}
