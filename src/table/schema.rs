use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{TableError, TableResult};
use super::{FIELD_PROP_SEP, FIELD_SEP, HEAD_ATTR_SEP};
use crate::file::REF_LENGTH;
use crate::memo::DEFAULT_MEMO_CHUNK_LENGTH;

/// Kind of value stored in a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    /// Record id, always `REF_LENGTH` wide
    Id,
    /// Address of a value in the table's memo store, always `REF_LENGTH` wide
    Memo,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Id => "id",
            FieldType::Memo => "memo",
        }
    }

    /// Width forced by the type, if any
    pub fn fixed_length(&self) -> Option<usize> {
        match self {
            FieldType::Id | FieldType::Memo => Some(REF_LENGTH),
            FieldType::String | FieldType::Number => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = TableError;

    fn from_str(s: &str) -> TableResult<Self> {
        match s {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "id" => Ok(FieldType::Id),
            "memo" => Ok(FieldType::Memo),
            other => Err(TableError::InvalidArgument(format!(
                "invalid field type: {other}"
            ))),
        }
    }
}

/// A field as requested when creating a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub length: Option<usize>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType, length: Option<usize>) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
        }
    }
}

/// A field as recorded in a table header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// 1-based position in the record
    pub index: usize,
    pub field_type: FieldType,
    pub length: usize,
    pub name: String,
}

impl FieldSpec {
    /// Validate a requested field and fix its width
    pub fn resolve(index: usize, def: &FieldDef) -> TableResult<Self> {
        if def.name.is_empty()
            || def
                .name
                .bytes()
                .any(|b| b == FIELD_SEP || b == HEAD_ATTR_SEP || b == b'\r')
        {
            return Err(TableError::InvalidArgument(format!(
                "invalid field name: {:?}",
                def.name
            )));
        }

        let length = match def.field_type.fixed_length() {
            Some(length) => length,
            None => match def.length {
                Some(length) if length > 0 => length,
                _ => {
                    return Err(TableError::InvalidArgument(format!(
                        "field {} needs a positive length",
                        def.name
                    )));
                }
            },
        };

        Ok(Self {
            index,
            field_type: def.field_type,
            length,
            name: def.name.clone(),
        })
    }

    /// `index:type:length:name`
    pub fn encode(&self) -> String {
        let sep = FIELD_PROP_SEP as char;
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.index, self.field_type, self.length, self.name
        )
    }

    pub fn decode(text: &str) -> TableResult<Self> {
        let invalid = || TableError::InvalidHeader(format!("malformed field entry {text:?}"));

        let mut parts = text.splitn(4, FIELD_PROP_SEP as char);
        let index = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;
        let field_type = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;
        let length = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;
        let name = parts.next().ok_or_else(invalid)?.to_string();

        Ok(Self {
            index,
            field_type,
            length,
            name,
        })
    }
}

/// Options for creating a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Payload bytes per memo chunk
    pub memo_chunk_length: Option<usize>,
}

impl TableOptions {
    /// Full memo chunk size, including the reference and end marker
    pub fn memo_chunk_size(&self) -> usize {
        let payload = self
            .memo_chunk_length
            .filter(|&length| length > 0)
            .unwrap_or(DEFAULT_MEMO_CHUNK_LENGTH);
        payload + REF_LENGTH + 1
    }
}
