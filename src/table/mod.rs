mod error;
mod header;
mod schema;

pub use error::{TableError, TableResult};
pub use header::TableHeader;
pub use schema::{FieldDef, FieldSpec, FieldType, TableOptions};

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::memo::{MemoStore, create_memo_file, open_memo};

/// Separates header attributes
pub const HEAD_ATTR_SEP: u8 = b'\n';
/// Separates field entries in the header's field list
pub const FIELD_SEP: u8 = b'|';
/// Separates the properties of one field entry
pub const FIELD_PROP_SEP: u8 = b':';

pub const TABLE_FILE_EXT: &str = "tbl";
pub const MEMO_FILE_EXT: &str = "mem";
pub const REF_FILE_EXT: &str = "ref";

/// The three files backing a table, derived from a common path prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    pub table: PathBuf,
    pub memo: PathBuf,
    pub refs: PathBuf,
}

impl TablePaths {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        let prefix = prefix.as_ref();
        Self {
            table: with_extension(prefix, TABLE_FILE_EXT),
            memo: with_extension(prefix, MEMO_FILE_EXT),
            refs: with_extension(prefix, REF_FILE_EXT),
        }
    }
}

// Appends rather than replaces, so a prefix like `db_a.b` keeps its dot
fn with_extension(prefix: &Path, ext: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

/// Create an empty table at `prefix`: the header file, a memo file with only
/// its header chunk, and an empty record reference file.
pub fn create_table<P: AsRef<Path>>(
    prefix: P,
    fields: &[FieldDef],
    options: &TableOptions,
) -> TableResult<TablePaths> {
    let paths = TablePaths::new(prefix);
    if paths.table.exists() {
        return Err(TableError::TableExists(paths.table.display().to_string()));
    }

    let header = TableHeader::new(fields, options)?;

    if let Some(parent) = paths.table.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&paths.table, header.encode()?)?;
    create_memo_file(&paths.memo, header.memo_chunk_size)?;
    fs::write(&paths.refs, b"")?;

    debug!(
        table = %paths.table.display(),
        fields = header.fields.len(),
        record_length = header.record_length,
        memo_chunk_size = header.memo_chunk_size,
        "created table"
    );
    Ok(paths)
}

/// Open the memo store of the table at `prefix` with the chunk size recorded
/// in its header
pub fn open_table_memo<P: AsRef<Path>>(prefix: P) -> TableResult<MemoStore> {
    let paths = TablePaths::new(prefix);
    let header = TableHeader::read(&paths.table)?;
    Ok(open_memo(&paths.memo, header.memo_chunk_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileError, NULL_REF, REF_LENGTH};
    use crate::memo::MemoError;
    use tempfile::TempDir;

    fn setup_prefix() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("shop_items");
        (temp_dir, prefix)
    }

    fn item_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::Id, None),
            FieldDef::new("title", FieldType::String, Some(30)),
            FieldDef::new("price", FieldType::Number, Some(8)),
            FieldDef::new("description", FieldType::Memo, None),
        ]
    }

    #[test]
    fn test_table_paths() {
        let paths = TablePaths::new("/data/shop_v1.2");
        assert_eq!(paths.table, PathBuf::from("/data/shop_v1.2.tbl"));
        assert_eq!(paths.memo, PathBuf::from("/data/shop_v1.2.mem"));
        assert_eq!(paths.refs, PathBuf::from("/data/shop_v1.2.ref"));
    }

    #[test]
    fn test_create_table_files() {
        let (_temp_dir, prefix) = setup_prefix();
        let options = TableOptions {
            memo_chunk_length: Some(10),
        };

        let paths = create_table(&prefix, &item_fields(), &options).unwrap();

        let header = TableHeader::read(&paths.table).unwrap();
        assert_eq!(header.fields.len(), 4);
        assert_eq!(header.record_length, REF_LENGTH + 30 + 8 + REF_LENGTH);
        assert_eq!(header.memo_chunk_size, 18);

        assert_eq!(fs::read(&paths.memo).unwrap(), b"-1                ");
        assert!(fs::read(&paths.refs).unwrap().is_empty());
    }

    #[test]
    fn test_create_table_header_bytes() {
        let (_temp_dir, prefix) = setup_prefix();
        let fields = vec![FieldDef::new("name", FieldType::String, Some(4))];

        let paths = create_table(&prefix, &fields, &TableOptions::default()).unwrap();

        let expected = "15\n1:string:4:name4\n0      \n-1     \n108\n";
        assert_eq!(fs::read(&paths.table).unwrap(), expected.as_bytes());
        assert_eq!(fs::read(&paths.memo).unwrap().len(), 108);
    }

    #[test]
    fn test_create_existing_table() {
        let (_temp_dir, prefix) = setup_prefix();
        create_table(&prefix, &item_fields(), &TableOptions::default()).unwrap();

        let result = create_table(&prefix, &item_fields(), &TableOptions::default());
        assert!(matches!(result, Err(TableError::TableExists(_))));
    }

    #[test]
    fn test_create_table_invalid_field_leaves_no_files() {
        let (_temp_dir, prefix) = setup_prefix();
        let fields = vec![FieldDef::new("title", FieldType::String, None)];

        let result = create_table(&prefix, &fields, &TableOptions::default());
        assert!(matches!(result, Err(TableError::InvalidArgument(_))));

        let paths = TablePaths::new(&prefix);
        assert!(!paths.table.exists());
        assert!(!paths.memo.exists());
        assert!(!paths.refs.exists());
    }

    #[test]
    fn test_open_table_memo() {
        let (_temp_dir, prefix) = setup_prefix();
        let options = TableOptions {
            memo_chunk_length: Some(10),
        };
        create_table(&prefix, &item_fields(), &options).unwrap();

        let store = open_table_memo(&prefix).unwrap();
        assert_eq!(store.chunk_size(), 18);
        assert_eq!(store.free_head().unwrap(), NULL_REF);

        let addr = store.write(b"a rather long item description").unwrap();
        assert_eq!(addr, 1);
        assert_eq!(
            store.read(addr).unwrap(),
            b"a rather long item description"
        );
        store.close().unwrap();
    }

    #[test]
    fn test_open_missing_table_memo() {
        let (_temp_dir, prefix) = setup_prefix();

        let result = open_table_memo(&prefix);
        assert!(matches!(
            result,
            Err(TableError::File(FileError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_memo_file_collision() {
        let (_temp_dir, prefix) = setup_prefix();
        fs::write(TablePaths::new(&prefix).memo, b"stale").unwrap();

        let result = create_table(&prefix, &item_fields(), &TableOptions::default());
        assert!(matches!(
            result,
            Err(TableError::Memo(MemoError::FileAlreadyExists(_)))
        ));
    }
}
