use std::path::Path;

use super::error::{TableError, TableResult};
use super::schema::{FieldDef, FieldSpec, TableOptions};
use super::{FIELD_SEP, HEAD_ATTR_SEP};
use crate::file::{
    ExtendedFile, FileError, FileOptions, NULL_REF, REF_LENGTH, Ref, decode_ref, encode_ref,
};

/// Metadata at the start of a table file.
///
/// Layout, with `\n` as the attribute separator:
/// `<len(fields)>\n<fields><record_length>\n<current_id>\n<unused_memo_id>\n<memo_chunk_size>\n`.
/// The field list is not terminated; its byte length is given up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub fields: Vec<FieldSpec>,
    pub record_length: usize,
    pub current_id: Ref,
    pub unused_memo_id: Ref,
    pub memo_chunk_size: usize,
}

impl TableHeader {
    /// Header for a new, empty table
    pub fn new(fields: &[FieldDef], options: &TableOptions) -> TableResult<Self> {
        let fields = fields
            .iter()
            .enumerate()
            .map(|(i, def)| FieldSpec::resolve(i + 1, def))
            .collect::<TableResult<Vec<_>>>()?;
        let record_length = fields.iter().map(|f| f.length).sum();

        Ok(Self {
            fields,
            record_length,
            current_id: 0,
            unused_memo_id: NULL_REF,
            memo_chunk_size: options.memo_chunk_size(),
        })
    }

    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn encode(&self) -> TableResult<Vec<u8>> {
        let separator = (FIELD_SEP as char).to_string();
        let field_list = self
            .fields
            .iter()
            .map(FieldSpec::encode)
            .collect::<Vec<_>>()
            .join(separator.as_str());

        let mut header = Vec::new();
        push_attr(&mut header, field_list.len().to_string().as_bytes());
        header.extend_from_slice(field_list.as_bytes());
        push_attr(&mut header, self.record_length.to_string().as_bytes());
        push_attr(&mut header, &encode_ref(self.current_id, REF_LENGTH)?);
        push_attr(&mut header, &encode_ref(self.unused_memo_id, REF_LENGTH)?);
        push_attr(&mut header, self.memo_chunk_size.to_string().as_bytes());
        Ok(header)
    }

    /// Parse the header at the start of a table file
    pub fn read<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let file = ExtendedFile::open(path, &FileOptions::new().write(false))?;

        let field_list_length = parse_number(&file.get_string_until(HEAD_ATTR_SEP)?)?;
        let field_list = file.read(field_list_length)?;
        if field_list.len() < field_list_length {
            return Err(FileError::UnexpectedEof("read table header").into());
        }
        let fields = parse_fields(&field_list)?;

        let record_length = parse_number(&file.get_string_until(HEAD_ATTR_SEP)?)?;
        let current_id = decode_ref(&file.get_string_until(HEAD_ATTR_SEP)?)?;
        let unused_memo_id = decode_ref(&file.get_string_until(HEAD_ATTR_SEP)?)?;
        let memo_chunk_size = parse_number(&file.get_string_until(HEAD_ATTR_SEP)?)?;
        file.close()?;

        Ok(Self {
            fields,
            record_length,
            current_id,
            unused_memo_id,
            memo_chunk_size,
        })
    }
}

fn push_attr(header: &mut Vec<u8>, value: &[u8]) {
    header.extend_from_slice(value);
    header.push(HEAD_ATTR_SEP);
}

fn parse_number(bytes: &[u8]) -> TableResult<usize> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            TableError::InvalidHeader(format!(
                "expected a number, found {:?}",
                String::from_utf8_lossy(bytes)
            ))
        })
}

fn parse_fields(bytes: &[u8]) -> TableResult<Vec<FieldSpec>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| TableError::InvalidHeader("field list is not valid UTF-8".to_string()))?;
    text.split(FIELD_SEP as char).map(FieldSpec::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FieldType;

    fn sample_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::Id, None),
            FieldDef::new("name", FieldType::String, Some(20)),
            FieldDef::new("notes", FieldType::Memo, None),
        ]
    }

    #[test]
    fn test_new_header() {
        let header = TableHeader::new(&sample_fields(), &TableOptions::default()).unwrap();

        assert_eq!(header.fields.len(), 3);
        assert_eq!(header.record_length, REF_LENGTH + 20 + REF_LENGTH);
        assert_eq!(header.current_id, 0);
        assert_eq!(header.unused_memo_id, NULL_REF);
        assert_eq!(header.memo_chunk_size, 108);
        assert_eq!(header.field("name").unwrap().index, 2);
        assert!(header.field("missing").is_none());
    }

    #[test]
    fn test_encode_header() {
        let fields = vec![
            FieldDef::new("a", FieldType::String, Some(5)),
            FieldDef::new("b", FieldType::Memo, None),
        ];
        let options = TableOptions {
            memo_chunk_length: Some(10),
        };
        let header = TableHeader::new(&fields, &options).unwrap();

        let expected = "23\n1:string:5:a|2:memo:7:b12\n0      \n-1     \n18\n";
        assert_eq!(header.encode().unwrap(), expected.as_bytes());
    }

    #[test]
    fn test_read_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.tbl");

        let header = TableHeader::new(&sample_fields(), &TableOptions::default()).unwrap();
        std::fs::write(&path, header.encode().unwrap()).unwrap();

        assert_eq!(TableHeader::read(&path).unwrap(), header);
    }

    #[test]
    fn test_read_header_without_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.tbl");

        let header = TableHeader::new(&[], &TableOptions::default()).unwrap();
        std::fs::write(&path, header.encode().unwrap()).unwrap();

        let parsed = TableHeader::read(&path).unwrap();
        assert!(parsed.fields.is_empty());
        assert_eq!(parsed.record_length, 0);
    }

    #[test]
    fn test_read_truncated_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("truncated.tbl");

        std::fs::write(&path, b"23\n1:string:5:a|2:memo:7:b12\n0      \n").unwrap();
        assert!(matches!(
            TableHeader::read(&path),
            Err(TableError::File(FileError::UnexpectedEof(_)))
        ));

        std::fs::write(&path, b"99\n1:string:5:a").unwrap();
        assert!(matches!(
            TableHeader::read(&path),
            Err(TableError::File(FileError::UnexpectedEof(_)))
        ));
    }

    #[test]
    fn test_read_malformed_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.tbl");

        std::fs::write(&path, b"abc\n").unwrap();
        assert!(matches!(
            TableHeader::read(&path),
            Err(TableError::InvalidHeader(_))
        ));
    }
}
