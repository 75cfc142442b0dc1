//! Schema inference over normalized records.
//!
//! Every value is classified on its own, then the classifications seen at
//! a path are merged into one [`FieldType`]:
//!
//! - untyped text (CSV/table cells, key-value values) is tried in order as
//!   integer, decimal, boolean, datetime, and finally string;
//! - JSON string literals are only checked for datetime shapes, since the
//!   document already typed them;
//! - JSON numbers, booleans, arrays and objects keep their own type.
//!
//! Merging takes the one type every value agreed on. Integers widen to
//! decimal when both appear. Any other disagreement falls back to
//! `string`, lowers `confidence` to the share of values that were already
//! strings, and records an [`WarningKind::InferenceConflict`] warning.
//!
//! Output order is first-seen order across records, so the same record
//! list always yields the same schema.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{
    FieldDescriptor, FieldType, FieldValue, InferredSchema, NormalizedRecord, Warning,
    WarningKind,
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Example values longer than this are truncated.
const EXAMPLE_MAX_CHARS: usize = 100;

/// Confidence reported for a path that only ever held null or blank values.
const ALL_NULL_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct InferOptions {
    /// Extra chrono formats tried after the built-in ones.
    pub datetime_formats: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Inference {
    pub schema: InferredSchema,
    pub warnings: Vec<Warning>,
}

/// Infer a schema with the built-in datetime formats.
pub fn infer(records: &[NormalizedRecord]) -> Inference {
    infer_with(records, &InferOptions::default())
}

pub fn infer_with(records: &[NormalizedRecord], opts: &InferOptions) -> Inference {
    let mut stats: Vec<PathStats> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        for (path, value) in &record.fields {
            let slot = match index.get(path) {
                Some(&i) => i,
                None => {
                    index.insert(path.clone(), stats.len());
                    stats.push(PathStats::new(path));
                    stats.len() - 1
                }
            };
            stats[slot].observe(value, opts);
        }
    }

    let mut warnings = Vec::new();
    let fields: Vec<FieldDescriptor> = stats
        .into_iter()
        .map(|s| s.into_descriptor(records.len(), &mut warnings))
        .collect();
    let primary_key_candidates = primary_key_candidates(&fields);

    tracing::debug!(
        records = records.len(),
        fields = fields.len(),
        conflicts = warnings.len(),
        "inferred schema"
    );

    Inference {
        schema: InferredSchema {
            fields,
            primary_key_candidates,
        },
        warnings,
    }
}

/// Type of a single value, or `None` for null and blank values.
pub fn classify(value: &FieldValue, opts: &InferOptions) -> Option<FieldType> {
    if value.is_empty() {
        return None;
    }
    let ty = match value {
        FieldValue::Null => return None,
        FieldValue::Bool(_) => FieldType::Boolean,
        FieldValue::Integer(_) => FieldType::Integer,
        FieldValue::Decimal(_) => FieldType::Decimal,
        FieldValue::Array(_) => FieldType::Array,
        FieldValue::Object => FieldType::Object,
        FieldValue::String(s) => {
            if is_datetime(s.trim(), opts) {
                FieldType::Datetime
            } else {
                FieldType::String
            }
        }
        FieldValue::Text(s) => classify_text(s.trim(), opts),
    };
    Some(ty)
}

fn classify_text(s: &str, opts: &InferOptions) -> FieldType {
    if is_integer(s) {
        FieldType::Integer
    } else if is_decimal(s) {
        FieldType::Decimal
    } else if is_boolean(s) {
        FieldType::Boolean
    } else if is_datetime(s, opts) {
        FieldType::Datetime
    } else {
        FieldType::String
    }
}

/// Optional sign, digits, and no leading zero: `007` is an identifier, not 7.
fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    s.parse::<i64>().is_ok()
}

fn is_decimal(s: &str) -> bool {
    let charset_ok = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    let has_marker = s.contains(['.', 'e', 'E']);
    charset_ok
        && has_digit
        && has_marker
        && s.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn is_boolean(s: &str) -> bool {
    ["true", "false", "yes", "no"]
        .iter()
        .any(|b| s.eq_ignore_ascii_case(b))
}

fn is_datetime(s: &str, opts: &InferOptions) -> bool {
    if s.len() < 6 || !s.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    if DateTime::parse_from_rfc3339(s).is_ok() {
        return true;
    }
    if DATETIME_FORMATS
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
    {
        return true;
    }
    if DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
    {
        return true;
    }
    opts.datetime_formats.iter().any(|f| {
        NaiveDateTime::parse_from_str(s, f).is_ok() || NaiveDate::parse_from_str(s, f).is_ok()
    })
}

/// Accumulated observations for one path.
struct PathStats {
    path: String,
    /// Observed types in first-seen order with their counts.
    types: Vec<(FieldType, usize)>,
    non_empty: usize,
    example: Option<serde_json::Value>,
}

impl PathStats {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            types: Vec::new(),
            non_empty: 0,
            example: None,
        }
    }

    fn observe(&mut self, value: &FieldValue, opts: &InferOptions) {
        let Some(ty) = classify(value, opts) else {
            return;
        };
        self.non_empty += 1;
        match self.types.iter_mut().find(|(t, _)| *t == ty) {
            Some((_, n)) => *n += 1,
            None => self.types.push((ty, 1)),
        }
        if self.example.is_none() && !matches!(value, FieldValue::Object) {
            self.example = Some(example_of(value));
        }
    }

    fn into_descriptor(self, record_count: usize, warnings: &mut Vec<Warning>) -> FieldDescriptor {
        let (field_type, confidence) = match self.types.as_slice() {
            [] => (FieldType::Null, ALL_NULL_CONFIDENCE),
            [(ty, _)] => (*ty, 1.0),
            mixed if mixed
                .iter()
                .all(|(t, _)| matches!(t, FieldType::Integer | FieldType::Decimal)) =>
            {
                (FieldType::Decimal, 1.0)
            }
            mixed => {
                let strings = mixed
                    .iter()
                    .find(|(t, _)| *t == FieldType::String)
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                let seen: Vec<&str> = mixed.iter().map(|(t, _)| t.as_str()).collect();
                warnings.push(Warning::new(
                    WarningKind::InferenceConflict,
                    format!(
                        "'{}' observed as {}; using string",
                        self.path,
                        seen.join(", ")
                    ),
                ));
                (FieldType::String, strings as f64 / self.non_empty as f64)
            }
        };

        let suggested_index = suggests_index(&self.path, field_type);
        FieldDescriptor {
            nullable: self.non_empty < record_count,
            path: self.path,
            field_type,
            example_value: self.example,
            confidence,
            suggested_index,
        }
    }
}

fn example_of(value: &FieldValue) -> serde_json::Value {
    match value {
        FieldValue::String(s) | FieldValue::Text(s) => {
            let s = s.trim();
            serde_json::Value::String(s.chars().take(EXAMPLE_MAX_CHARS).collect())
        }
        other => other.to_json(),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn is_id_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id" || lower.ends_with("_id") || name.ends_with("Id")
}

fn suggests_index(path: &str, ty: FieldType) -> bool {
    if ty == FieldType::Integer {
        return true;
    }
    let name = last_segment(path);
    let lower = name.to_ascii_lowercase();
    is_id_name(name) || lower == "key" || lower.ends_with("_key") || lower.contains("email")
}

/// Non-nullable top-level scalar fields named like identifiers; failing
/// that, the first non-nullable top-level scalar field.
fn primary_key_candidates(fields: &[FieldDescriptor]) -> Vec<String> {
    let eligible = || {
        fields.iter().filter(|f| {
            !f.nullable
                && !f.path.contains('.')
                && !matches!(
                    f.field_type,
                    FieldType::Array | FieldType::Object | FieldType::Null
                )
        })
    };
    let ids: Vec<String> = eligible()
        .filter(|f| is_id_name(&f.path))
        .map(|f| f.path.clone())
        .collect();
    if !ids.is_empty() {
        return ids;
    }
    eligible().take(1).map(|f| f.path.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, FieldValue)]) -> NormalizedRecord {
        let mut r = NormalizedRecord::new(0);
        for (p, v) in fields {
            r.insert(*p, v.clone());
        }
        r
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn field<'a>(schema: &'a InferredSchema, path: &str) -> &'a FieldDescriptor {
        schema
            .fields
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("missing field {path}"))
    }

    #[test]
    fn text_values_follow_the_type_ladder() {
        let opts = InferOptions::default();
        assert_eq!(classify(&text("30"), &opts), Some(FieldType::Integer));
        assert_eq!(classify(&text("-4"), &opts), Some(FieldType::Integer));
        assert_eq!(classify(&text("19.99"), &opts), Some(FieldType::Decimal));
        assert_eq!(classify(&text("1e3"), &opts), Some(FieldType::Decimal));
        assert_eq!(classify(&text("Yes"), &opts), Some(FieldType::Boolean));
        assert_eq!(classify(&text("2024-03-01"), &opts), Some(FieldType::Datetime));
        assert_eq!(
            classify(&text("2024-03-01T10:00:00Z"), &opts),
            Some(FieldType::Datetime)
        );
        assert_eq!(classify(&text("007"), &opts), Some(FieldType::String));
        assert_eq!(classify(&text("inf"), &opts), Some(FieldType::String));
        assert_eq!(classify(&text("  "), &opts), None);
        assert_eq!(classify(&FieldValue::Null, &opts), None);
    }

    #[test]
    fn json_strings_are_not_coerced_to_numbers() {
        let opts = InferOptions::default();
        let s = FieldValue::String("19.99".into());
        assert_eq!(classify(&s, &opts), Some(FieldType::String));
        let d = FieldValue::String("2024-03-01 12:00:00".into());
        assert_eq!(classify(&d, &opts), Some(FieldType::Datetime));
    }

    #[test]
    fn extra_datetime_formats_are_tried() {
        let opts = InferOptions {
            datetime_formats: vec!["%d.%m.%Y".into()],
        };
        assert_eq!(classify(&text("01.03.2024"), &opts), Some(FieldType::Datetime));
        assert_eq!(
            classify(&text("01.03.2024"), &InferOptions::default()),
            Some(FieldType::String)
        );
    }

    #[test]
    fn integer_and_decimal_widen_to_decimal() {
        let records = vec![
            record(&[("price", text("3"))]),
            record(&[("price", FieldValue::Decimal(2.5))]),
        ];
        let out = infer(&records);
        let price = field(&out.schema, "price");
        assert_eq!(price.field_type, FieldType::Decimal);
        assert_eq!(price.confidence, 1.0);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn disagreement_falls_back_to_string() {
        let records = vec![
            record(&[("code", text("1"))]),
            record(&[("code", text("2"))]),
            record(&[("code", text("A-7"))]),
            record(&[("code", text("true"))]),
        ];
        let out = infer(&records);
        let code = field(&out.schema, "code");
        assert_eq!(code.field_type, FieldType::String);
        assert!((code.confidence - 0.25).abs() < 1e-9);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, WarningKind::InferenceConflict);
        assert!(out.warnings[0].message.contains("integer, string, boolean"));
    }

    #[test]
    fn nullable_when_missing_or_blank() {
        let records = vec![
            record(&[("id", text("1")), ("note", text("x"))]),
            record(&[("id", text("2"))]),
            record(&[("id", text("3")), ("email", text(""))]),
        ];
        let out = infer(&records);
        assert!(!field(&out.schema, "id").nullable);
        assert!(field(&out.schema, "note").nullable);
        let email = field(&out.schema, "email");
        assert!(email.nullable);
        assert_eq!(email.field_type, FieldType::Null);
        assert_eq!(email.example_value, None);
    }

    #[test]
    fn field_order_is_first_seen() {
        let records = vec![
            record(&[("b", text("1")), ("a", text("2"))]),
            record(&[("c", text("3")), ("a", text("4"))]),
        ];
        let out = infer(&records);
        let order: Vec<&str> = out.schema.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn reinference_is_stable() {
        let records = vec![
            record(&[("id", text("1")), ("tags", FieldValue::Array(vec![]))]),
            record(&[("id", text("x")), ("meta", FieldValue::Object)]),
        ];
        let first = infer(&records).schema;
        let second = infer(&records).schema;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn nested_paths_keep_object_and_children() {
        let records = vec![record(&[
            ("pricing", FieldValue::Object),
            ("pricing.price", FieldValue::Decimal(9.5)),
        ])];
        let out = infer(&records);
        let pricing = field(&out.schema, "pricing");
        assert_eq!(pricing.field_type, FieldType::Object);
        assert_eq!(pricing.example_value, None);
        assert_eq!(field(&out.schema, "pricing.price").field_type, FieldType::Decimal);
    }

    #[test]
    fn primary_keys_and_index_hints() {
        let records = vec![
            record(&[
                ("order_id", text("10")),
                ("customer_email", text("a@b.c")),
                ("name", text("A")),
            ]),
            record(&[
                ("order_id", text("11")),
                ("customer_email", text("d@e.f")),
                ("name", text("B")),
            ]),
        ];
        let out = infer(&records);
        assert_eq!(out.schema.primary_key_candidates, vec!["order_id"]);
        assert!(field(&out.schema, "order_id").suggested_index);
        assert!(field(&out.schema, "customer_email").suggested_index);
        assert!(!field(&out.schema, "name").suggested_index);

        let fallback = infer(&[record(&[("sku", text("A1")), ("qty", text("2"))])]);
        assert_eq!(fallback.schema.primary_key_candidates, vec!["sku"]);
    }

    #[test]
    fn example_value_is_first_non_null() {
        let records = vec![
            record(&[("v", FieldValue::Null)]),
            record(&[("v", text(" first "))]),
            record(&[("v", text("second"))]),
        ];
        let out = infer(&records);
        assert_eq!(
            field(&out.schema, "v").example_value,
            Some(serde_json::json!("first"))
        );
    }
}
