use crate::file::FileError;
use crate::memo::MemoError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Memo error: {0}")]
    Memo(#[from] MemoError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Invalid table header: {0}")]
    InvalidHeader(String),
}

pub type TableResult<T> = Result<T, TableError>;
