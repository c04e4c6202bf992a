mod error;
mod serial_queue;
mod store;

pub use error::{MemoError, MemoResult};
pub use serial_queue::{Pending, QueueError, QueueResult, SerialQueue};
pub use store::{MemoStore, create_memo_file, open_memo, parse_address};

/// Byte that terminates the payload inside a chunk
pub const MEMO_END_OF_CONTENT: u8 = 0x03;

/// Default number of payload bytes per chunk for new tables
pub const DEFAULT_MEMO_CHUNK_LENGTH: usize = 100;
