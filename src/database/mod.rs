use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::memo::{MemoError, MemoStore};
use crate::table::{self, FieldDef, TableError, TableHeader, TableOptions, TablePaths};

pub const DATABASE_FILE_EXT: &str = "tdb";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database {0} already exists")]
    DatabaseExists(String),

    #[error("Database {0} not found")]
    DatabaseNotFound(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot read/write file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    #[error("Memo error: {0}")]
    MemoError(#[from] MemoError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Contents of the database file: the tables it holds and the options they
/// were created with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCatalog {
    pub tables: BTreeMap<String, TableOptions>,
}

impl DatabaseCatalog {
    pub fn load(path: &Path) -> DatabaseResult<Self> {
        let content = fs::read_to_string(path)?;
        let catalog = serde_json::from_str(&content)?;
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> DatabaseResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// A database file and the tables stored next to it.
///
/// Tables live in the database file's directory under the prefix
/// `<database>_<table>`.
pub struct TextDb {
    database_path: PathBuf,
    working_dir: PathBuf,
    name: String,
    catalog: DatabaseCatalog,
}

impl TextDb {
    /// Create an empty database `name` under `root`. The `.tdb` extension is
    /// added when missing.
    pub fn create_database<P: AsRef<Path>>(root: P, name: &str) -> DatabaseResult<()> {
        let (database_path, db_name) = resolve_database_path(root.as_ref(), name)?;
        if database_path.exists() {
            return Err(DatabaseError::DatabaseExists(db_name));
        }

        let dir = database_path.parent().unwrap_or(Path::new("."));
        if !dir.is_dir() {
            return Err(DatabaseError::InvalidArgument(format!(
                "directory {} does not exist",
                dir.display()
            )));
        }

        DatabaseCatalog::default().save(&database_path)?;
        debug!(database = %database_path.display(), "created database");
        Ok(())
    }

    pub fn open<P: AsRef<Path>>(root: P, name: &str) -> DatabaseResult<Self> {
        let (database_path, db_name) = resolve_database_path(root.as_ref(), name)?;
        if !database_path.is_file() {
            return Err(DatabaseError::DatabaseNotFound(db_name));
        }

        let catalog = DatabaseCatalog::load(&database_path)?;
        let working_dir = database_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        debug!(
            database = %database_path.display(),
            tables = catalog.tables.len(),
            "opened database"
        );
        Ok(Self {
            database_path,
            working_dir,
            name: db_name,
            catalog,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    pub fn create_table(
        &mut self,
        name: &str,
        fields: &[FieldDef],
        options: &TableOptions,
    ) -> DatabaseResult<()> {
        validate_table_name(name)?;
        if self.catalog.tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        table::create_table(self.table_prefix(name), fields, options)?;

        self.catalog
            .tables
            .insert(name.to_string(), options.clone());
        self.save()?;
        Ok(())
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.catalog.tables.keys().cloned().collect()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.catalog.tables.contains_key(name)
    }

    pub fn table_options(&self, name: &str) -> DatabaseResult<&TableOptions> {
        self.catalog
            .tables
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    /// Files backing table `name`
    pub fn table_paths(&self, name: &str) -> DatabaseResult<TablePaths> {
        self.table_options(name)?;
        Ok(TablePaths::new(self.table_prefix(name)))
    }

    pub fn table_header(&self, name: &str) -> DatabaseResult<TableHeader> {
        let paths = self.table_paths(name)?;
        Ok(TableHeader::read(&paths.table)?)
    }

    pub fn open_table_memo(&self, name: &str) -> DatabaseResult<MemoStore> {
        self.table_options(name)?;
        Ok(table::open_table_memo(self.table_prefix(name))?)
    }

    /// Write the catalog back to the database file
    pub fn save(&self) -> DatabaseResult<()> {
        self.catalog.save(&self.database_path)
    }

    fn table_prefix(&self, name: &str) -> PathBuf {
        self.working_dir.join(format!("{}_{}", self.name, name))
    }
}

/// Database file path and database name for `name` under `root`
fn resolve_database_path(root: &Path, name: &str) -> DatabaseResult<(PathBuf, String)> {
    let relative = Path::new(name);
    if name.is_empty()
        || relative.is_absolute()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(DatabaseError::InvalidArgument(format!(
            "invalid database path: {name:?}"
        )));
    }

    let suffix = format!(".{DATABASE_FILE_EXT}");
    let file_name = if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    };
    let database_path = root.join(file_name);

    let db_name = database_path
        .file_name()
        .and_then(|f| f.to_str())
        .and_then(|f| f.strip_suffix(&suffix))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| DatabaseError::InvalidArgument(format!("invalid database name: {name:?}")))?
        .to_string();

    Ok((database_path, db_name))
}

fn validate_table_name(name: &str) -> DatabaseResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DatabaseError::InvalidArgument(format!(
            "invalid table name: {name:?}"
        )));
    }
    Ok(())
}
