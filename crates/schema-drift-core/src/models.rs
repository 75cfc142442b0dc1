//! Core data models used throughout Schema Drift.
//!
//! These types represent the fragments, records, field descriptors, and
//! versioned schemas that flow through the detection → normalization →
//! inference → evolution pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Fragments
// ═══════════════════════════════════════════════════════════════════════

/// Byte offsets `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The structured format a fragment was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Json,
    HtmlTable,
    Csv,
    KeyValue,
    RawText,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Json => "json",
            FragmentKind::HtmlTable => "html_table",
            FragmentKind::Csv => "csv",
            FragmentKind::KeyValue => "key_value",
            FragmentKind::RawText => "raw_text",
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A header row plus body rows, as parsed from an HTML table or CSV block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parsed content of a fragment, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum FragmentPayload {
    Json(serde_json::Value),
    HtmlTable(Table),
    /// Raw lines of the block, split into cells. The first line may or may
    /// not be a header; the normalizer decides.
    Csv {
        delimiter: char,
        lines: Vec<Vec<String>>,
    },
    KeyValue(Vec<(String, String)>),
    RawText,
}

/// A contiguous span of source text classified as one format.
///
/// Fragments are immutable once produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub span: Span,
    #[serde(flatten)]
    pub payload: FragmentPayload,
}

impl Fragment {
    pub fn kind(&self) -> FragmentKind {
        match self.payload {
            FragmentPayload::Json(_) => FragmentKind::Json,
            FragmentPayload::HtmlTable(_) => FragmentKind::HtmlTable,
            FragmentPayload::Csv { .. } => FragmentKind::Csv,
            FragmentPayload::KeyValue(_) => FragmentKind::KeyValue,
            FragmentPayload::RawText => FragmentKind::RawText,
        }
    }

    /// The slice of `source` this fragment covers.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Per-kind fragment tallies reported with every ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentCounts {
    pub json: usize,
    pub html_table: usize,
    pub csv: usize,
    pub key_value: usize,
    pub raw_text: usize,
}

impl FragmentCounts {
    pub fn from_fragments(fragments: &[Fragment]) -> Self {
        let mut counts = Self::default();
        for fragment in fragments {
            match fragment.kind() {
                FragmentKind::Json => counts.json += 1,
                FragmentKind::HtmlTable => counts.html_table += 1,
                FragmentKind::Csv => counts.csv += 1,
                FragmentKind::KeyValue => counts.key_value += 1,
                FragmentKind::RawText => counts.raw_text += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.json + self.html_table + self.csv + self.key_value + self.raw_text
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════

/// A closed set of values a normalized field can hold.
///
/// Text values coming from CSV cells, table cells, and key-value lines stay
/// as [`FieldValue::Text`]; the inferencer decides what they look like.
/// JSON string literals are [`FieldValue::String`]: the document already
/// said they are strings, so only datetime detection applies to them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Text(String),
    Array(Vec<FieldValue>),
    /// Marks a nested object. Its members appear as separate dotted paths
    /// in the same record.
    Object,
}

impl FieldValue {
    /// Null or blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) | FieldValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Array(_) | FieldValue::Object)
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::Array(items.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(_) => FieldValue::Object,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Decimal(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::String(s) | FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Object => serde_json::json!({}),
        }
    }
}

/// One logical row extracted from a fragment: an ordered mapping from
/// dotted field path to value.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Index of the originating fragment in the detector output.
    pub fragment: usize,
    pub fields: Vec<(String, FieldValue)>,
}

impl NormalizedRecord {
    pub fn new(fragment: usize) -> Self {
        Self {
            fragment,
            fields: Vec::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(p, _)| p == path).map(|(_, v)| v)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fields.iter().any(|(p, _)| p == path)
    }

    /// Append a field. Returns `false` (and leaves the record unchanged)
    /// if the path is already present.
    pub fn insert(&mut self, path: impl Into<String>, value: FieldValue) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.fields.push((path, value));
        true
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Schemas
// ═══════════════════════════════════════════════════════════════════════

/// Inferred type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
    Array,
    Object,
    Null,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Null => "null",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type, nullability, and provenance of one field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub nullable: bool,
    pub example_value: Option<serde_json::Value>,
    /// 1.0 when every observed value agreed on the type.
    pub confidence: f64,
    #[serde(default)]
    pub suggested_index: bool,
}

impl FieldDescriptor {
    pub fn shape(&self) -> FieldShape {
        FieldShape {
            field_type: self.field_type,
            nullable: self.nullable,
        }
    }
}

/// Output of the inferencer: a field set with no source or version yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredSchema {
    pub fields: Vec<FieldDescriptor>,
    pub primary_key_candidates: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub field_count: usize,
}

/// An immutable, numbered snapshot of a source's inferred field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub schema_id: String,
    pub source_id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<FieldDescriptor>,
    pub primary_key_candidates: Vec<String>,
    pub summary: SchemaSummary,
    /// SHA-256 over the ordered `(path, type, nullable)` triples.
    pub fingerprint: String,
}

impl Schema {
    pub fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.path == path)
    }
}

/// The `(type, nullable)` pair compared when diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldShape {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub nullable: bool,
}

/// A path whose type or nullability changed between two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub path: String,
    pub before: FieldShape,
    pub after: FieldShape,
}

/// A removed/added pair that looks like the same field under a new name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameHint {
    pub from: String,
    pub to: String,
    pub similarity: f64,
}

/// Field-level changes between two schema versions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub added: Vec<FieldDescriptor>,
    pub removed: Vec<FieldDescriptor>,
    pub modified: Vec<FieldChange>,
    /// Advisory only; never removes entries from `added`/`removed`.
    #[serde(default)]
    pub rename_hints: Vec<RenameHint>,
    pub migration_notes: String,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// One entry of a source's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSchema {
    pub schema: Schema,
    pub diff: SchemaDiff,
}

// ═══════════════════════════════════════════════════════════════════════
// Warnings
// ═══════════════════════════════════════════════════════════════════════

/// Stage that produced a non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A span looked structured but could not be classified; kept as raw text.
    Detection,
    /// A record could not be flattened and was dropped.
    Normalization,
    /// Observed values disagreed on a path's type; resolved to `string`.
    InferenceConflict,
}

/// A non-fatal issue surfaced in the ingest result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_insert_rejects_duplicate_path() {
        let mut record = NormalizedRecord::new(0);
        assert!(record.insert("a", FieldValue::Integer(1)));
        assert!(!record.insert("a", FieldValue::Integer(2)));
        assert_eq!(record.get("a"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn fragment_serializes_with_kind_tag() {
        let fragment = Fragment {
            span: Span::new(0, 4),
            payload: FragmentPayload::RawText,
        };
        let json = serde_json::to_value(&fragment).unwrap();
        assert_eq!(json["kind"], "raw_text");
        assert_eq!(json["span"]["end"], 4);
    }

    #[test]
    fn json_numbers_map_to_integer_or_decimal() {
        let v = serde_json::json!([1, 2.5, "x", null, {"a": 1}]);
        let FieldValue::Array(items) = FieldValue::from_json(&v) else {
            panic!("expected array");
        };
        assert_eq!(items[0], FieldValue::Integer(1));
        assert_eq!(items[1], FieldValue::Decimal(2.5));
        assert_eq!(items[2], FieldValue::String("x".to_string()));
        assert_eq!(items[3], FieldValue::Null);
        assert_eq!(items[4], FieldValue::Object);
    }

    #[test]
    fn field_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FieldType::Datetime).unwrap(),
            "\"datetime\""
        );
    }
}
