use crate::file::{FileError, Ref};
use std::io;
use thiserror::Error;

use super::serial_queue::QueueError;

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Corrupt chunk chain starting at address {0}")]
    CorruptChain(Ref),
}

pub type MemoResult<T> = Result<T, MemoError>;
