//! Fragment normalization into flat, dotted-path records.
//!
//! | Fragment | Records |
//! |----------|---------|
//! | JSON object | one, nested objects flattened to `parent.child` paths |
//! | JSON array of objects | one per element |
//! | HTML table | one per body row, paths from header cells |
//! | CSV block | one per data line, header from the first line or `col_N` |
//! | Key-value block | one, paths are the keys |
//! | Raw text | none |
//!
//! # Repeated groups
//!
//! A JSON array whose elements are all objects is a repeated group. The
//! owning record keeps the array as an `array` value at its own path, and
//! every element becomes an additional record that carries the parent's
//! scalar fields plus the element's fields under `array_path.child`. So
//! `{"id": 7, "items": [{"sku": "a"}, {"sku": "b"}]}` yields three records:
//! `{id, items}`, `{id, items.sku = a}`, `{id, items.sku = b}`.
//!
//! Child records never carry the parent's array path, so once a group
//! expands, that path (`items` above) is always inferred as nullable.
//!
//! Normalization is pure. A record that cannot be flattened (two values
//! land on the same path) is dropped with a warning; the rest of the
//! fragment is still used.

use serde_json::{Map, Value};

use crate::models::{
    FieldValue, Fragment, FragmentPayload, NormalizedRecord, Warning, WarningKind,
};

/// Records produced from one or more fragments.
#[derive(Debug, Clone, Default)]
pub struct Normalization {
    pub records: Vec<NormalizedRecord>,
    pub warnings: Vec<Warning>,
}

impl Normalization {
    fn extend(&mut self, other: Normalization) {
        self.records.extend(other.records);
        self.warnings.extend(other.warnings);
    }
}

/// Normalize every fragment, preserving fragment order.
pub fn normalize_all(fragments: &[Fragment]) -> Normalization {
    let mut out = Normalization::default();
    for (index, fragment) in fragments.iter().enumerate() {
        out.extend(normalize_fragment(index, fragment));
    }
    out
}

/// Normalize a single fragment. `index` is recorded on each record as the
/// back-reference to its fragment.
///
/// The detector only emits JSON arrays made entirely of objects; other
/// elements in a hand-built fragment are dropped with a warning.
pub fn normalize_fragment(index: usize, fragment: &Fragment) -> Normalization {
    let mut out = Normalization::default();
    match &fragment.payload {
        FragmentPayload::Json(value) => match value {
            Value::Object(map) => json_object(index, map, &mut out),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item {
                        json_object(index, map, &mut out);
                    } else {
                        out.warnings.push(
                            Warning::new(
                                WarningKind::Normalization,
                                "non-object element in top-level JSON array dropped",
                            )
                            .at(fragment.span),
                        );
                    }
                }
            }
            _ => {}
        },
        FragmentPayload::HtmlTable(table) => {
            let header = unique_headers(&table.header);
            rows_to_records(index, &header, &table.rows, &mut out);
        }
        FragmentPayload::Csv { lines, .. } => {
            let Some(first) = lines.first() else {
                return out;
            };
            if looks_like_header(first) {
                let header = unique_headers(first);
                rows_to_records(index, &header, &lines[1..], &mut out);
            } else {
                let header: Vec<String> = (0..first.len()).map(|i| format!("col_{}", i)).collect();
                rows_to_records(index, &header, lines, &mut out);
            }
        }
        FragmentPayload::KeyValue(pairs) => {
            let mut record = NormalizedRecord::new(index);
            for (key, value) in pairs {
                if !record.insert(key.clone(), text_value(value)) {
                    out.warnings.push(
                        Warning::new(
                            WarningKind::Normalization,
                            format!("key '{}' repeated in key-value block; record dropped", key),
                        )
                        .at(fragment.span),
                    );
                    return out;
                }
            }
            out.records.push(record);
        }
        FragmentPayload::RawText => {}
    }
    for warning in &mut out.warnings {
        warning.span.get_or_insert(fragment.span);
    }
    out
}

// ── JSON ────────────────────────────────────────────────────────────────

fn json_object(index: usize, map: &Map<String, Value>, out: &mut Normalization) {
    match object_records(index, map, "", &[]) {
        Ok(records) => out.records.extend(records),
        Err(path) => {
            tracing::debug!(path = %path, "dropping JSON record with colliding path");
            out.warnings.push(Warning::new(
                WarningKind::Normalization,
                format!("path '{}' produced twice while flattening; record dropped", path),
            ));
        }
    }
}

/// The record for `map` followed by one record per repeated-group element.
fn object_records(
    index: usize,
    map: &Map<String, Value>,
    prefix: &str,
    inherited: &[(String, FieldValue)],
) -> Result<Vec<NormalizedRecord>, String> {
    let mut record = NormalizedRecord::new(index);
    for (path, value) in inherited {
        record.insert(path.clone(), value.clone());
    }
    let mut groups = Vec::new();
    flatten_into(&mut record, map, prefix, &mut groups)?;

    let scalars: Vec<(String, FieldValue)> = record
        .fields
        .iter()
        .filter(|(_, v)| v.is_scalar())
        .cloned()
        .collect();

    let mut records = vec![record];
    for (path, items) in groups {
        for item in items {
            if let Value::Object(child) = item {
                records.extend(object_records(index, child, &path, &scalars)?);
            }
        }
    }
    Ok(records)
}

fn flatten_into<'v>(
    record: &mut NormalizedRecord,
    map: &'v Map<String, Value>,
    prefix: &str,
    groups: &mut Vec<(String, &'v Vec<Value>)>,
) -> Result<(), String> {
    for (key, value) in map {
        let path = join_path(prefix, key);
        let field = match value {
            Value::Object(_) => FieldValue::Object,
            Value::Array(items) if is_repeated_group(items) => {
                FieldValue::Array(items.iter().map(|_| FieldValue::Object).collect())
            }
            other => FieldValue::from_json(other),
        };
        if !record.insert(path.clone(), field) {
            return Err(path);
        }
        match value {
            Value::Object(child) => flatten_into(record, child, &path, groups)?,
            Value::Array(items) if is_repeated_group(items) => groups.push((path, items)),
            _ => {}
        }
    }
    Ok(())
}

fn is_repeated_group(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_object)
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

// ── Tables ──────────────────────────────────────────────────────────────

fn rows_to_records(index: usize, header: &[String], rows: &[Vec<String>], out: &mut Normalization) {
    for (row_no, row) in rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if row.len() > header.len() {
            out.warnings.push(Warning::new(
                WarningKind::Normalization,
                format!(
                    "row {} has {} cells but the header has {}; record dropped",
                    row_no + 1,
                    row.len(),
                    header.len()
                ),
            ));
            continue;
        }
        let mut record = NormalizedRecord::new(index);
        for (i, name) in header.iter().enumerate() {
            let value = row.get(i).map(|c| text_value(c)).unwrap_or(FieldValue::Null);
            record.insert(name.clone(), value);
        }
        out.records.push(record);
    }
}

/// Header names with blanks replaced by `col_N` and duplicates suffixed
/// `_2`, `_3`, ...
pub fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.iter().enumerate() {
        let base = match name.trim() {
            "" => format!("col_{}", i),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while out.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// A CSV first line is a header when none of its cells is purely numeric.
fn looks_like_header(cells: &[String]) -> bool {
    !cells.iter().any(|c| is_numeric_cell(c))
}

fn is_numeric_cell(cell: &str) -> bool {
    let cell = cell.trim();
    cell.chars().any(|c| c.is_ascii_digit())
        && cell
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
}

fn text_value(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Span, Table};
    use serde_json::json;

    fn fragment(payload: FragmentPayload) -> Fragment {
        Fragment {
            span: Span::new(0, 10),
            payload,
        }
    }

    fn paths(record: &NormalizedRecord) -> Vec<&str> {
        record.fields.iter().map(|(p, _)| p.as_str()).collect()
    }

    #[test]
    fn nested_objects_flatten_to_dotted_paths() {
        let f = fragment(FragmentPayload::Json(
            json!({"id": 1, "customer": {"name": "Ada", "address": {"city": "Oslo"}}}),
        ));
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(
            paths(record),
            vec![
                "id",
                "customer",
                "customer.name",
                "customer.address",
                "customer.address.city"
            ]
        );
        assert_eq!(record.get("customer"), Some(&FieldValue::Object));
        assert_eq!(
            record.get("customer.address.city"),
            Some(&FieldValue::String("Oslo".into()))
        );
    }

    #[test]
    fn repeated_group_expands_into_child_records() {
        let f = fragment(FragmentPayload::Json(
            json!({"id": 7, "items": [{"sku": "a"}, {"sku": "b", "qty": 2}]}),
        ));
        let out = normalize_fragment(3, &f);
        assert_eq!(out.records.len(), 3);
        assert!(out.records.iter().all(|r| r.fragment == 3));
        assert!(matches!(out.records[0].get("items"), Some(FieldValue::Array(a)) if a.len() == 2));
        assert_eq!(paths(&out.records[1]), vec!["id", "items.sku"]);
        assert_eq!(paths(&out.records[2]), vec!["id", "items.sku", "items.qty"]);
        assert_eq!(out.records[2].get("id"), Some(&FieldValue::Integer(7)));
    }

    #[test]
    fn scalar_arrays_stay_in_place() {
        let f = fragment(FragmentPayload::Json(json!({"tags": ["a", "b"], "empty": []})));
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 1);
        assert!(matches!(out.records[0].get("tags"), Some(FieldValue::Array(_))));
        assert!(matches!(out.records[0].get("empty"), Some(FieldValue::Array(a)) if a.is_empty()));
    }

    #[test]
    fn colliding_paths_drop_the_record() {
        let f = fragment(FragmentPayload::Json(
            json!([{"a.b": 1, "a": {"b": 2}}, {"ok": true}]),
        ));
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].get("ok"), Some(&FieldValue::Bool(true)));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, WarningKind::Normalization);
        assert_eq!(out.warnings[0].span, Some(Span::new(0, 10)));
    }

    #[test]
    fn non_object_array_elements_are_dropped() {
        let f = fragment(FragmentPayload::Json(json!([{"id": 1}, 2, "x", {"id": 3}])));
        let out = normalize_fragment(4, &f);
        let ids: Vec<_> = out.records.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(FieldValue::Integer(1)), Some(FieldValue::Integer(3))]);
        assert!(out.records.iter().all(|r| r.fragment == 4));
        assert_eq!(out.warnings.len(), 2);
        assert!(out
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::Normalization && w.span == Some(Span::new(0, 10))));
    }

    #[test]
    fn html_table_headers_are_made_unique() {
        let f = fragment(FragmentPayload::HtmlTable(Table {
            header: vec!["name".into(), "".into(), "name".into()],
            rows: vec![
                vec!["Ada".into(), "x".into(), "Lovelace".into()],
                vec!["Bob".into()],
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ],
        }));
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 2);
        assert_eq!(paths(&out.records[0]), vec!["name", "col_1", "name_2"]);
        assert_eq!(out.records[1].get("name_2"), Some(&FieldValue::Null));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn csv_header_is_taken_from_first_line() {
        let f = fragment(FragmentPayload::Csv {
            delimiter: ',',
            lines: vec![
                vec!["sku".into(), "price".into()],
                vec!["A1".into(), "3.50".into()],
                vec!["B2".into(), "".into()],
            ],
        });
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].get("price"), Some(&FieldValue::Text("3.50".into())));
        assert_eq!(out.records[1].get("price"), Some(&FieldValue::Null));
    }

    #[test]
    fn numeric_first_line_gets_synthetic_headers() {
        let f = fragment(FragmentPayload::Csv {
            delimiter: ';',
            lines: vec![
                vec!["1".into(), "alpha".into()],
                vec!["2".into(), "beta".into()],
            ],
        });
        let out = normalize_fragment(0, &f);
        assert_eq!(out.records.len(), 2);
        assert_eq!(paths(&out.records[0]), vec!["col_0", "col_1"]);
    }

    #[test]
    fn key_value_block_is_one_record() {
        let f = fragment(FragmentPayload::KeyValue(vec![
            ("status".into(), "ok".into()),
            ("count".into(), "3".into()),
        ]));
        let out = normalize_fragment(1, &f);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].get("count"), Some(&FieldValue::Text("3".into())));

        let dup = fragment(FragmentPayload::KeyValue(vec![
            ("a".into(), "1".into()),
            ("a".into(), "2".into()),
        ]));
        let out = normalize_fragment(1, &dup);
        assert!(out.records.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn raw_text_yields_no_records() {
        let out = normalize_fragment(0, &fragment(FragmentPayload::RawText));
        assert!(out.records.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn normalize_all_keeps_fragment_order() {
        let fragments = vec![
            fragment(FragmentPayload::RawText),
            fragment(FragmentPayload::Json(json!({"a": 1}))),
            fragment(FragmentPayload::KeyValue(vec![("b".into(), "2".into())])),
        ];
        let out = normalize_all(&fragments);
        let origins: Vec<usize> = out.records.iter().map(|r| r.fragment).collect();
        assert_eq!(origins, vec![1, 2]);
    }
}
