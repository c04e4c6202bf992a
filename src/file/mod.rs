mod buffered_file;
mod error;
mod extended_file;
mod ref_codec;

pub use buffered_file::{BufferedFile, FileOptions, OperationGuard, Whence};
pub use error::{FileError, FileResult};
pub use extended_file::ExtendedFile;
pub use ref_codec::{decode_ref, encode_ref, position_from_ref, ref_from_position};

/// Buffer size used when the filesystem does not report a preferred block size
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Width in bytes of an encoded reference on disk
pub const REF_LENGTH: usize = 7;

/// Reference meaning "no next chunk" / "empty free list"
pub const NULL_REF: Ref = -1;

/// Chunk address type
pub type Ref = i64;
