//! Row transformation from loose SQLite values to typed records.
//!
//! SQLite stores whatever it is given, so every column is validated here,
//! at the read boundary. A value that cannot be converted to the target
//! column type yields [`MigrateError::RowTransform`] for that row only.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{MigrateError, MigrateResult};
use crate::models::{
    Document, DocumentChunk, ExtractionResult, RawRow, Record, SourceValue, TableName,
};

/// Column-level conversion failure, before the row context is attached.
#[derive(Debug, Clone, PartialEq)]
struct ColumnError {
    column: &'static str,
    reason: String,
}

type ColumnResult<T> = std::result::Result<T, ColumnError>;

/// Convert a raw source row into the typed record for `table`.
pub fn transform_row(table: TableName, row: &RawRow) -> MigrateResult<Record> {
    let cols = Columns { row };
    let record = match table {
        TableName::Documents => document(&cols).map(Record::Document),
        TableName::ExtractionResults => extraction_result(&cols).map(Record::ExtractionResult),
        TableName::DocumentChunks => document_chunk(&cols).map(Record::DocumentChunk),
    };
    record.map_err(|e| MigrateError::RowTransform {
        table,
        row: row.label(),
        column: e.column.to_string(),
        reason: e.reason,
    })
}

fn document(c: &Columns) -> ColumnResult<Document> {
    Ok(Document {
        id: c.id()?,
        filename: c.required(c.text("filename")?, "filename")?,
        file_size: c.int("file_size")?,
        uploaded_at: c.timestamp("uploaded_at")?,
        status: c.text("status")?,
        extracted_text: c.text("extracted_text")?,
        document_metadata: c.json("document_metadata")?,
    })
}

fn extraction_result(c: &Columns) -> ColumnResult<ExtractionResult> {
    Ok(ExtractionResult {
        id: c.id()?,
        document_id: c.required(c.text("document_id")?, "document_id")?,
        parties: c.json("parties")?,
        effective_date: c.text("effective_date")?,
        term: c.text("term")?,
        governing_law: c.text("governing_law")?,
        payment_terms: c.text("payment_terms")?,
        termination: c.text("termination")?,
        auto_renewal: c.boolean("auto_renewal")?,
        confidentiality: c.text("confidentiality")?,
        indemnity: c.text("indemnity")?,
        liability_cap: c.json("liability_cap")?,
        signatories: c.json("signatories")?,
        confidence_score: c.float("confidence_score")?,
        created_at: c.timestamp("created_at")?,
    })
}

fn document_chunk(c: &Columns) -> ColumnResult<DocumentChunk> {
    Ok(DocumentChunk {
        id: c.id()?,
        document_id: c.required(c.text("document_id")?, "document_id")?,
        chunk_text: c.required(c.text("chunk_text")?, "chunk_text")?,
        chunk_index: c.required(c.int("chunk_index")?, "chunk_index")?,
        page_number: c.int("page_number")?,
        char_start: c.int("char_start")?,
        char_end: c.int("char_end")?,
        embedding: c.json("embedding")?,
        created_at: c.timestamp("created_at")?,
    })
}

struct Columns<'a> {
    row: &'a RawRow,
}

impl Columns<'_> {
    fn wrap<T>(column: &'static str, r: std::result::Result<T, String>) -> ColumnResult<T> {
        r.map_err(|reason| ColumnError { column, reason })
    }

    fn required<T>(&self, v: Option<T>, column: &'static str) -> ColumnResult<T> {
        v.ok_or_else(|| ColumnError {
            column,
            reason: "required value is NULL".to_string(),
        })
    }

    fn id(&self) -> ColumnResult<String> {
        let id = self.required(self.text("id")?, "id")?;
        if id.trim().is_empty() {
            return Err(ColumnError {
                column: "id",
                reason: "primary key is empty".to_string(),
            });
        }
        Ok(id)
    }

    fn text(&self, column: &'static str) -> ColumnResult<Option<String>> {
        Self::wrap(column, to_text(self.row.get(column)))
    }

    fn int(&self, column: &'static str) -> ColumnResult<Option<i32>> {
        Self::wrap(column, to_int(self.row.get(column)))
    }

    fn float(&self, column: &'static str) -> ColumnResult<Option<f64>> {
        Self::wrap(column, to_float(self.row.get(column)))
    }

    fn boolean(&self, column: &'static str) -> ColumnResult<Option<bool>> {
        Self::wrap(column, to_bool(self.row.get(column)))
    }

    fn timestamp(&self, column: &'static str) -> ColumnResult<Option<DateTime<Utc>>> {
        Self::wrap(column, to_timestamp(self.row.get(column)))
    }

    fn json(&self, column: &'static str) -> ColumnResult<Option<serde_json::Value>> {
        Self::wrap(column, to_json(self.row.get(column)))
    }
}

fn blob_text(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| "BLOB is not valid UTF-8".to_string())
}

/// PostgreSQL text and varchar values cannot hold NUL.
pub fn to_text(v: &SourceValue) -> Result<Option<String>, String> {
    let text = match v {
        SourceValue::Null => return Ok(None),
        SourceValue::Text(s) => s.clone(),
        SourceValue::Integer(i) => i.to_string(),
        SourceValue::Real(f) => f.to_string(),
        SourceValue::Blob(b) => blob_text(b)?,
    };
    if let Some(pos) = text.find('\0') {
        return Err(format!("contains a NUL byte at offset {}", pos));
    }
    Ok(Some(text))
}

pub fn to_int(v: &SourceValue) -> Result<Option<i32>, String> {
    let wide: i64 = match v {
        SourceValue::Null => return Ok(None),
        SourceValue::Integer(i) => *i,
        SourceValue::Real(f) => {
            if f.fract() != 0.0 || !f.is_finite() {
                return Err(format!("{} is not an integer", f));
            }
            *f as i64
        }
        SourceValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map_err(|_| format!("'{}' is not an integer", s))?
        }
        SourceValue::Blob(_) => return Err("BLOB cannot be read as an integer".to_string()),
    };
    i32::try_from(wide)
        .map(Some)
        .map_err(|_| format!("{} does not fit in a 32-bit integer", wide))
}

pub fn to_float(v: &SourceValue) -> Result<Option<f64>, String> {
    let f = match v {
        SourceValue::Null => return Ok(None),
        SourceValue::Integer(i) => *i as f64,
        SourceValue::Real(f) => *f,
        SourceValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", s))?
        }
        SourceValue::Blob(_) => return Err("BLOB cannot be read as a number".to_string()),
    };
    if !f.is_finite() {
        return Err(format!("{} is not a finite number", f));
    }
    Ok(Some(f))
}

/// Boolean literals accepted by a PostgreSQL `::boolean` cast.
pub fn to_bool(v: &SourceValue) -> Result<Option<bool>, String> {
    match v {
        SourceValue::Null => Ok(None),
        SourceValue::Integer(0) => Ok(Some(false)),
        SourceValue::Integer(1) => Ok(Some(true)),
        SourceValue::Integer(i) => Err(format!("{} is not a boolean", i)),
        SourceValue::Real(f) => Err(format!("{} is not a boolean", f)),
        SourceValue::Text(s) => parse_bool(s),
        SourceValue::Blob(b) => parse_bool(&blob_text(b)?),
    }
}

fn parse_bool(s: &str) -> Result<Option<bool>, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Some(true)),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(Some(false)),
        _ => Err(format!("'{}' is not a boolean", s)),
    }
}

pub fn to_timestamp(v: &SourceValue) -> Result<Option<DateTime<Utc>>, String> {
    match v {
        SourceValue::Null => Ok(None),
        SourceValue::Integer(secs) => DateTime::from_timestamp(*secs, 0)
            .map(Some)
            .ok_or_else(|| format!("{} is out of the timestamp range", secs)),
        SourceValue::Real(secs) => {
            if !secs.is_finite() {
                return Err(format!("{} is not a timestamp", secs));
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
                .map(Some)
                .ok_or_else(|| format!("{} is out of the timestamp range", secs))
        }
        SourceValue::Text(s) => {
            if s.trim().is_empty() {
                return Ok(None);
            }
            parse_timestamp(s).map(Some)
        }
        SourceValue::Blob(_) => Err("BLOB cannot be read as a timestamp".to_string()),
    }
}

/// Parse the timestamp spellings found in SQLite databases.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const WITH_OFFSET: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
    ];
    for fmt in WITH_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    const NAIVE: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in NAIVE {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(format!("'{}' is not a recognized timestamp", s))
}

pub fn to_json(v: &SourceValue) -> Result<Option<serde_json::Value>, String> {
    let text = match v {
        SourceValue::Null => return Ok(None),
        SourceValue::Text(s) => s.clone(),
        SourceValue::Blob(b) => blob_text(b)?,
        SourceValue::Integer(i) => return Ok(Some(serde_json::Value::from(*i))),
        SourceValue::Real(f) => {
            return serde_json::Number::from_f64(*f)
                .map(|n| Some(serde_json::Value::Number(n)))
                .ok_or_else(|| format!("{} is not valid JSON", f))
        }
    };
    serde_json::from_str(&text).map(Some).map_err(|e| {
        let preview: String = text.chars().take(40).collect();
        format!("invalid JSON ({}): {}", e, preview)
    })
}
