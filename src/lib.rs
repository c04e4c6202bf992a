pub mod database;
pub mod file;
pub mod memo;
pub mod table;

pub use database::{DatabaseError, DatabaseResult, TextDb};
pub use file::{
    BufferedFile, ExtendedFile, FileError, FileOptions, FileResult, NULL_REF, REF_LENGTH, Ref,
    Whence,
};
pub use memo::{MemoError, MemoResult, MemoStore, SerialQueue, create_memo_file, open_memo};
pub use table::{FieldDef, FieldType, TableError, TableHeader, TableOptions, TableResult};
