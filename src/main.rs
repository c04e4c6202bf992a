use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use textdb::memo::{DEFAULT_MEMO_CHUNK_LENGTH, create_memo_file, open_memo, parse_address};
use textdb::table::{FieldDef, FieldType, TableOptions};
use textdb::{REF_LENGTH, TextDb};

#[derive(Parser)]
#[command(author, version, about = "Flat-file text database tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Work with a memo file directly
    #[command(subcommand)]
    Memo(MemoCommand),
    /// Manage a database and its tables
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Args)]
struct MemoFile {
    /// Path to the memo file
    file: PathBuf,
    /// Chunk size in bytes, including the reference and end marker
    #[arg(long, default_value_t = DEFAULT_MEMO_CHUNK_LENGTH + REF_LENGTH + 1)]
    chunk_size: usize,
}

#[derive(Subcommand)]
enum MemoCommand {
    /// Create an empty memo file
    Create(MemoFile),
    /// Store a value and print its address. Reads stdin when no value is given.
    Write {
        #[command(flatten)]
        memo: MemoFile,
        value: Option<String>,
    },
    /// Print the value stored at an address
    Read {
        #[command(flatten)]
        memo: MemoFile,
        address: String,
    },
    /// Free the chunks of the value stored at an address
    Delete {
        #[command(flatten)]
        memo: MemoFile,
        address: String,
    },
    /// Print the head of the free list
    FreeHead(MemoFile),
}

#[derive(Args)]
struct DbLocation {
    /// Directory holding the database
    root: PathBuf,
    /// Database name, relative to the root
    name: String,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Create an empty database
    Create(DbLocation),
    /// Add a table to a database
    CreateTable {
        #[command(flatten)]
        db: DbLocation,
        table: String,
        /// Field definitions as `name:type[:length]`
        #[arg(required = true)]
        fields: Vec<String>,
        /// Payload bytes per memo chunk
        #[arg(long)]
        memo_chunk_length: Option<usize>,
    },
    /// List the tables of a database
    Tables(DbLocation),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Memo(command) => run_memo(command),
        Command::Db(command) => run_db(command),
    }
}

fn run_memo(command: MemoCommand) -> Result<()> {
    match command {
        MemoCommand::Create(memo) => {
            create_memo_file(&memo.file, memo.chunk_size)
                .with_context(|| format!("failed to create {}", memo.file.display()))?;
        }
        MemoCommand::Write { memo, value } => {
            let data = match value {
                Some(value) => value.into_bytes(),
                None => {
                    let mut data = Vec::new();
                    io::stdin()
                        .read_to_end(&mut data)
                        .context("failed to read stdin")?;
                    data
                }
            };
            let store = open_memo(&memo.file, memo.chunk_size)
                .with_context(|| format!("failed to open {}", memo.file.display()))?;
            let addr = store.write(&data)?;
            store.close()?;
            println!("{addr}");
        }
        MemoCommand::Read { memo, address } => {
            let addr = parse_address(&address)?;
            let store = open_memo(&memo.file, memo.chunk_size)
                .with_context(|| format!("failed to open {}", memo.file.display()))?;
            let data = store.read(addr)?;
            store.close()?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.write_all(b"\n")?;
        }
        MemoCommand::Delete { memo, address } => {
            let addr = parse_address(&address)?;
            let store = open_memo(&memo.file, memo.chunk_size)
                .with_context(|| format!("failed to open {}", memo.file.display()))?;
            store.delete(addr)?;
            store.close()?;
        }
        MemoCommand::FreeHead(memo) => {
            let store = open_memo(&memo.file, memo.chunk_size)
                .with_context(|| format!("failed to open {}", memo.file.display()))?;
            let head = store.free_head()?;
            store.close()?;
            println!("{head}");
        }
    }
    Ok(())
}

fn run_db(command: DbCommand) -> Result<()> {
    match command {
        DbCommand::Create(db) => {
            TextDb::create_database(&db.root, &db.name)?;
        }
        DbCommand::CreateTable {
            db,
            table,
            fields,
            memo_chunk_length,
        } => {
            let fields = fields
                .iter()
                .map(|field| parse_field(field))
                .collect::<Result<Vec<_>>>()?;
            let options = TableOptions { memo_chunk_length };

            let mut textdb = TextDb::open(&db.root, &db.name)?;
            textdb.create_table(&table, &fields, &options)?;
        }
        DbCommand::Tables(db) => {
            let textdb = TextDb::open(&db.root, &db.name)?;
            for name in textdb.table_names() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

/// `name:type[:length]`
fn parse_field(text: &str) -> Result<FieldDef> {
    let mut parts = text.splitn(3, ':');
    let (Some(name), Some(field_type)) = (parts.next(), parts.next()) else {
        bail!("field {text:?} must look like name:type[:length]");
    };
    let field_type: FieldType = field_type.parse()?;
    let length = parts
        .next()
        .map(|length| {
            length
                .parse::<usize>()
                .with_context(|| format!("invalid length in field {text:?}"))
        })
        .transpose()?;

    Ok(FieldDef::new(name, field_type, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        let field = parse_field("title:string:30").unwrap();
        assert_eq!(field, FieldDef::new("title", FieldType::String, Some(30)));

        let field = parse_field("notes:memo").unwrap();
        assert_eq!(field, FieldDef::new("notes", FieldType::Memo, None));

        assert!(parse_field("title").is_err());
        assert!(parse_field("title:date").is_err());
        assert!(parse_field("title:string:wide").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from([
            "textdb",
            "memo",
            "read",
            "notes.mem",
            "3",
            "--chunk-size",
            "18",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Memo(MemoCommand::Read { memo, address }) if memo.chunk_size == 18 && address == "3"
        ));
    }
}
