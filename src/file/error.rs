use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0} failed: another operation is already in progress")]
    OperationInProgress(&'static str),

    #[error("{0} failed: encountered end of file unexpectedly")]
    UnexpectedEof(&'static str),

    #[error("File handle is closed")]
    Closed,

    #[error("Invalid reference: {0:?}")]
    InvalidRef(String),

    #[error("Reference {value} does not fit in {width} bytes")]
    RefOverflow { value: i64, width: usize },
}

pub type FileResult<T> = Result<T, FileError>;
