//! Core data models moved by the migrator.
//!
//! Source rows arrive as [`RawRow`]s of loosely typed SQLite values and are
//! validated into the typed records below (see [`crate::transform`]) before
//! they reach the target store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The tables the migrator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Documents,
    ExtractionResults,
    DocumentChunks,
}

impl TableName {
    /// All known tables, parents before the children referencing them.
    pub const ALL: [TableName; 3] = [
        TableName::Documents,
        TableName::ExtractionResults,
        TableName::DocumentChunks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Documents => "documents",
            TableName::ExtractionResults => "extraction_results",
            TableName::DocumentChunks => "document_chunks",
        }
    }

    /// The table this one holds a foreign key into, if any.
    pub fn parent(&self) -> Option<TableName> {
        match self {
            TableName::Documents => None,
            TableName::ExtractionResults | TableName::DocumentChunks => {
                Some(TableName::Documents)
            }
        }
    }

    /// Columns the target table must expose, in insert order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableName::Documents => &[
                "id",
                "filename",
                "file_size",
                "uploaded_at",
                "status",
                "extracted_text",
                "document_metadata",
            ],
            TableName::ExtractionResults => &[
                "id",
                "document_id",
                "parties",
                "effective_date",
                "term",
                "governing_law",
                "payment_terms",
                "termination",
                "auto_renewal",
                "confidentiality",
                "indemnity",
                "liability_cap",
                "signatories",
                "confidence_score",
                "created_at",
            ],
            TableName::DocumentChunks => &[
                "id",
                "document_id",
                "chunk_text",
                "chunk_index",
                "page_number",
                "char_start",
                "char_end",
                "embedding",
                "created_at",
            ],
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single SQLite value, tagged with its storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SourceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }
}

impl From<&str> for SourceValue {
    fn from(s: &str) -> Self {
        SourceValue::Text(s.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(s: String) -> Self {
        SourceValue::Text(s)
    }
}

impl From<i64> for SourceValue {
    fn from(v: i64) -> Self {
        SourceValue::Integer(v)
    }
}

impl From<f64> for SourceValue {
    fn from(v: f64) -> Self {
        SourceValue::Real(v)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// An untyped row read from the source store.
///
/// `rowid` is the SQLite row identifier used for keyset pagination and as
/// a fallback row label when the primary key itself is unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub rowid: i64,
    pub columns: BTreeMap<String, SourceValue>,
}

impl RawRow {
    pub fn new(rowid: i64) -> Self {
        Self {
            rowid,
            columns: BTreeMap::new(),
        }
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: &str, value: impl Into<SourceValue>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    /// A missing column reads as NULL.
    pub fn get(&self, column: &str) -> &SourceValue {
        self.columns.get(column).unwrap_or(&SourceValue::Null)
    }

    /// Human-readable row identifier for logs and the summary.
    pub fn label(&self) -> String {
        match self.get("id") {
            SourceValue::Text(id) if !id.is_empty() => id.clone(),
            SourceValue::Integer(id) => id.to_string(),
            _ => format!("rowid {}", self.rowid),
        }
    }
}

/// A contract file record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_size: Option<i32>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub extracted_text: Option<String>,
    pub document_metadata: Option<serde_json::Value>,
}

/// Clause extraction output for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub id: String,
    pub document_id: String,
    pub parties: Option<serde_json::Value>,
    pub effective_date: Option<String>,
    pub term: Option<String>,
    pub governing_law: Option<String>,
    pub payment_terms: Option<String>,
    pub termination: Option<String>,
    pub auto_renewal: Option<bool>,
    pub confidentiality: Option<String>,
    pub indemnity: Option<String>,
    pub liability_cap: Option<serde_json::Value>,
    pub signatories: Option<serde_json::Value>,
    pub confidence_score: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A retrieval chunk of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub page_number: Option<i32>,
    pub char_start: Option<i32>,
    pub char_end: Option<i32>,
    pub embedding: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A validated row bound for one of the target tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Document(Document),
    ExtractionResult(ExtractionResult),
    DocumentChunk(DocumentChunk),
}

impl Record {
    pub fn table(&self) -> TableName {
        match self {
            Record::Document(_) => TableName::Documents,
            Record::ExtractionResult(_) => TableName::ExtractionResults,
            Record::DocumentChunk(_) => TableName::DocumentChunks,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Document(d) => &d.id,
            Record::ExtractionResult(r) => &r.id,
            Record::DocumentChunk(c) => &c.id,
        }
    }

    /// Foreign key into the parent table, for child records.
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Record::Document(_) => None,
            Record::ExtractionResult(r) => Some(&r.document_id),
            Record::DocumentChunk(c) => Some(&c.document_id),
        }
    }
}
