//! Projection of a [`Schema`] into target-specific descriptors.
//!
//! | Type | relational | document | graph | jsonschema |
//! |------|-----------|----------|-------|------------|
//! | string | `VARCHAR` | `string` | `string` | `{"type":"string"}` |
//! | integer | `BIGINT` | `int` | `integer` | `{"type":"integer"}` |
//! | decimal | `NUMERIC` | `double` | `float` | `{"type":"number"}` |
//! | boolean | `BOOLEAN` | `bool` | `boolean` | `{"type":"boolean"}` |
//! | datetime | `TIMESTAMP` | `date` | `datetime` | `{"type":"string","format":"date-time"}` |
//! | array | `JSON` column | `array` | `list` | `{"type":"array"}` |
//! | object | flattened, or `JSON` if childless | nested document | separate node | `{"type":"object"}` |
//! | null | `VARCHAR` | `null` | `string` | `{"type":"null"}` |
//!
//! A field is nested under its nearest ancestor path whose type is
//! `object`. Paths below an array keep their dotted name at the array's
//! level.
//!
//! Rendering is a pure function of its inputs; the same schema and options
//! always give byte-identical output.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::error::RenderError;
use crate::models::{FieldDescriptor, FieldType, Schema, SchemaDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Relational,
    Document,
    Graph,
    JsonSchema,
}

impl RenderTarget {
    pub const ALL: [RenderTarget; 4] = [
        RenderTarget::Relational,
        RenderTarget::Document,
        RenderTarget::Graph,
        RenderTarget::JsonSchema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderTarget::Relational => "relational",
            RenderTarget::Document => "document",
            RenderTarget::Graph => "graph",
            RenderTarget::JsonSchema => "jsonschema",
        }
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderTarget {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "sql" => Ok(RenderTarget::Relational),
            "document" => Ok(RenderTarget::Document),
            "graph" => Ok(RenderTarget::Graph),
            "jsonschema" | "json_schema" | "json-schema" => Ok(RenderTarget::JsonSchema),
            _ => Err(RenderError::UnknownTarget(s.to_string())),
        }
    }
}

/// Rendered output: DDL text for the relational target, a JSON descriptor
/// for the others.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    Document(Value),
}

impl Rendered {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(s) => Some(s),
            Rendered::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Rendered::Text(_) => None,
            Rendered::Document(v) => Some(v),
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Text(s) => f.write_str(s),
            Rendered::Document(v) => {
                let pretty = serde_json::to_string_pretty(v).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Prepended to table, collection, and root node names.
    pub table_prefix: String,
}

pub fn render(schema: &Schema, target: RenderTarget, opts: &RenderOptions) -> Rendered {
    match target {
        RenderTarget::Relational => Rendered::Text(relational(schema, opts)),
        RenderTarget::Document => Rendered::Document(document(schema, opts)),
        RenderTarget::Graph => Rendered::Document(graph(schema, opts)),
        RenderTarget::JsonSchema => Rendered::Document(json_schema(schema)),
    }
}

/// Lowercase identifier built from `prefix` and `source_id`, with anything
/// other than `[a-z0-9_]` replaced by `_`.
pub fn table_name(source_id: &str, prefix: &str) -> String {
    let mut name: String = format!("{}{}", prefix, source_id)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        name.push_str("data");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn column_name(path: &str) -> String {
    path.replace('.', "__")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ── Relational ──────────────────────────────────────────────────────────

fn sql_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Null => "VARCHAR",
        FieldType::Integer => "BIGINT",
        FieldType::Decimal => "NUMERIC",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Datetime => "TIMESTAMP",
        FieldType::Array | FieldType::Object => "JSON",
    }
}

fn has_children(path: &str, paths: &[&str]) -> bool {
    let prefix = format!("{}.", path);
    paths.iter().any(|p| p.starts_with(&prefix))
}

/// Fields that become columns: objects with children are flattened away.
fn columns<'s>(fields: &'s [FieldDescriptor]) -> Vec<&'s FieldDescriptor> {
    let paths: Vec<&str> = fields.iter().map(|f| f.path.as_str()).collect();
    fields
        .iter()
        .filter(|f| !(f.field_type == FieldType::Object && has_children(&f.path, &paths)))
        .collect()
}

fn relational(schema: &Schema, opts: &RenderOptions) -> String {
    let table = table_name(&schema.source_id, &opts.table_prefix);
    let cols = columns(&schema.fields);

    let primary_key = schema
        .primary_key_candidates
        .iter()
        .find(|pk| cols.iter().any(|c| &c.path == *pk && !c.nullable));

    let mut lines: Vec<String> = cols
        .iter()
        .map(|f| {
            format!(
                "    {} {} {}",
                quote_ident(&column_name(&f.path)),
                sql_type(f.field_type),
                if f.nullable { "NULL" } else { "NOT NULL" }
            )
        })
        .collect();
    if let Some(pk) = primary_key {
        lines.push(format!("    PRIMARY KEY ({})", quote_ident(&column_name(pk))));
    }

    let mut out = format!(
        "CREATE TABLE {} (\n{}\n);\n",
        quote_ident(&table),
        lines.join(",\n")
    );
    for f in cols
        .iter()
        .filter(|f| f.suggested_index && Some(&f.path) != primary_key)
    {
        let column = column_name(&f.path);
        out.push_str(&format!(
            "CREATE INDEX {} ON {} ({});\n",
            quote_ident(&format!("idx_{}_{}", table, column)),
            quote_ident(&table),
            quote_ident(&column)
        ));
    }
    out
}

// ── Nesting ─────────────────────────────────────────────────────────────

/// Path of the nearest object-typed ancestor, if any.
fn owner_of<'p>(path: &'p str, objects: &HashSet<&str>) -> Option<&'p str> {
    let mut end = path.len();
    while let Some(dot) = path[..end].rfind('.') {
        let candidate = &path[..dot];
        if objects.contains(candidate) {
            return Some(candidate);
        }
        end = dot;
    }
    None
}

/// Name of `field` relative to its owner.
fn local_name<'p>(path: &'p str, owner: Option<&str>) -> &'p str {
    match owner {
        Some(o) => &path[o.len() + 1..],
        None => path,
    }
}

struct Nesting<'s> {
    fields: &'s [FieldDescriptor],
    objects: HashSet<&'s str>,
}

impl<'s> Nesting<'s> {
    fn new(fields: &'s [FieldDescriptor]) -> Self {
        let objects = fields
            .iter()
            .filter(|f| f.field_type == FieldType::Object)
            .map(|f| f.path.as_str())
            .collect();
        Self { fields, objects }
    }

    /// Fields directly owned by `owner` (`None` for the root), in schema order.
    fn children(&self, owner: Option<&str>) -> impl Iterator<Item = &'s FieldDescriptor> + '_ {
        let owner = owner.map(str::to_string);
        self.fields
            .iter()
            .filter(move |f| owner_of(&f.path, &self.objects) == owner.as_deref())
    }

    fn is_object(&self, f: &FieldDescriptor) -> bool {
        f.field_type == FieldType::Object
    }
}

// ── Document ────────────────────────────────────────────────────────────

fn document_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "string",
        FieldType::Integer => "int",
        FieldType::Decimal => "double",
        FieldType::Boolean => "bool",
        FieldType::Datetime => "date",
        FieldType::Array => "array",
        FieldType::Object => "object",
        FieldType::Null => "null",
    }
}

fn document_fields(nesting: &Nesting<'_>, owner: Option<&str>) -> Map<String, Value> {
    let mut map = Map::new();
    for f in nesting.children(owner) {
        let name = local_name(&f.path, owner).to_string();
        let value = if nesting.is_object(f) {
            let nested = document_fields(nesting, Some(&f.path));
            if nested.is_empty() {
                Value::from(document_type(f.field_type))
            } else {
                Value::Object(nested)
            }
        } else {
            Value::from(document_type(f.field_type))
        };
        map.insert(name, value);
    }
    map
}

fn document(schema: &Schema, opts: &RenderOptions) -> Value {
    let nesting = Nesting::new(&schema.fields);
    json!({
        "collection": table_name(&schema.source_id, &opts.table_prefix),
        "version": schema.version,
        "fields": document_fields(&nesting, None),
    })
}

// ── Graph ───────────────────────────────────────────────────────────────

fn graph_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Null => "string",
        FieldType::Integer => "integer",
        FieldType::Decimal => "float",
        FieldType::Boolean => "boolean",
        FieldType::Datetime => "datetime",
        FieldType::Array => "list",
        FieldType::Object => "object",
    }
}

fn pascal_case(s: &str) -> String {
    let mut out = String::new();
    for word in s.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() {
        out.push_str("Record");
    }
    out
}

fn upper_snake(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn graph_node(
    nesting: &Nesting<'_>,
    owner: Option<&str>,
    label: &str,
    nodes: &mut Vec<Value>,
    relationships: &mut Vec<Value>,
) {
    let mut properties = Map::new();
    let mut pending = Vec::new();
    for f in nesting.children(owner) {
        if nesting.is_object(f) {
            pending.push(f);
        } else {
            properties.insert(
                local_name(&f.path, owner).to_string(),
                Value::from(graph_type(f.field_type)),
            );
        }
    }
    let mut node = Map::new();
    node.insert("label".into(), json!(label));
    if let Some(path) = owner {
        node.insert("path".into(), json!(path));
    }
    node.insert("properties".into(), Value::Object(properties));
    nodes.push(Value::Object(node));

    for f in pending {
        let child_label = pascal_case(&f.path);
        let segment = f.path.rsplit('.').next().unwrap_or(&f.path);
        relationships.push(json!({
            "type": format!("HAS_{}", upper_snake(segment)),
            "from": label,
            "to": child_label,
        }));
        graph_node(nesting, Some(&f.path), &child_label, nodes, relationships);
    }
}

fn graph(schema: &Schema, opts: &RenderOptions) -> Value {
    let nesting = Nesting::new(&schema.fields);
    let root = pascal_case(&format!("{}{}", opts.table_prefix, schema.source_id));
    let mut nodes = Vec::new();
    let mut relationships = Vec::new();
    graph_node(&nesting, None, &root, &mut nodes, &mut relationships);

    let constraints: Vec<Value> = schema
        .primary_key_candidates
        .iter()
        .find(|pk| schema.field(pk).is_some_and(|f| !f.nullable))
        .map(|pk| json!({ "label": root, "property": pk, "type": "UNIQUE" }))
        .into_iter()
        .collect();

    json!({
        "version": schema.version,
        "nodes": nodes,
        "relationships": relationships,
        "constraints": constraints,
    })
}

// ── JSON Schema ─────────────────────────────────────────────────────────

fn json_schema_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Datetime => "string",
        FieldType::Integer => "integer",
        FieldType::Decimal => "number",
        FieldType::Boolean => "boolean",
        FieldType::Array => "array",
        FieldType::Object => "object",
        FieldType::Null => "null",
    }
}

fn json_schema_property(nesting: &Nesting<'_>, f: &FieldDescriptor) -> Value {
    let base = json_schema_type(f.field_type);
    let mut prop = Map::new();
    if f.nullable && f.field_type != FieldType::Null {
        prop.insert("type".into(), json!([base, "null"]));
    } else {
        prop.insert("type".into(), json!(base));
    }
    if f.field_type == FieldType::Datetime {
        prop.insert("format".into(), json!("date-time"));
    }
    if nesting.is_object(f) {
        let (properties, required) = json_schema_members(nesting, Some(&f.path));
        if !properties.is_empty() {
            prop.insert("properties".into(), Value::Object(properties));
        }
        if !required.is_empty() {
            prop.insert("required".into(), json!(required));
        }
    }
    Value::Object(prop)
}

fn json_schema_members(
    nesting: &Nesting<'_>,
    owner: Option<&str>,
) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for f in nesting.children(owner) {
        let name = local_name(&f.path, owner).to_string();
        if !f.nullable {
            required.push(name.clone());
        }
        properties.insert(name, json_schema_property(nesting, f));
    }
    (properties, required)
}

fn json_schema(schema: &Schema) -> Value {
    let nesting = Nesting::new(&schema.fields);
    let (properties, required) = json_schema_members(&nesting, None);
    let mut root = Map::new();
    root.insert(
        "$schema".into(),
        json!("http://json-schema.org/draft-07/schema#"),
    );
    root.insert("title".into(), json!(schema.source_id));
    root.insert("type".into(), json!("object"));
    root.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        root.insert("required".into(), json!(required));
    }
    Value::Object(root)
}

// ── Migrations ──────────────────────────────────────────────────────────

/// Statements that move data shaped like the diff's old side to its new
/// side. Emitted as text only; nothing is executed.
pub fn migration_statements(
    diff: &SchemaDiff,
    target: RenderTarget,
    table: &str,
) -> Result<Vec<String>, RenderError> {
    match target {
        RenderTarget::Relational => Ok(relational_migration(diff, table)),
        RenderTarget::Document => Ok(document_migration(diff, table)),
        RenderTarget::Graph | RenderTarget::JsonSchema => Err(
            RenderError::MigrationUnsupported(target.as_str().to_string()),
        ),
    }
}

fn relational_migration(diff: &SchemaDiff, table: &str) -> Vec<String> {
    let table = quote_ident(table);
    let mut out = Vec::new();

    for f in columns(&diff.added) {
        out.push(format!(
            "ALTER TABLE {} ADD COLUMN {} {} {};",
            table,
            quote_ident(&column_name(&f.path)),
            sql_type(f.field_type),
            if f.nullable { "NULL" } else { "NOT NULL" }
        ));
    }
    for f in columns(&diff.removed) {
        out.push(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            table,
            quote_ident(&column_name(&f.path))
        ));
    }
    for change in &diff.modified {
        let column = quote_ident(&column_name(&change.path));
        if change.before.field_type != change.after.field_type {
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                table,
                column,
                sql_type(change.after.field_type)
            ));
        }
        if change.before.nullable != change.after.nullable {
            let action = if change.after.nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {};",
                table, column, action
            ));
        }
    }
    out
}

fn document_migration(diff: &SchemaDiff, collection: &str) -> Vec<String> {
    let mut out = Vec::new();
    for f in &diff.added {
        out.push(format!(
            "db.{}.updateMany({{}}, {{ $set: {{ {}: null }} }});",
            collection,
            json!(f.path)
        ));
    }
    for f in &diff.removed {
        out.push(format!(
            "db.{}.updateMany({{}}, {{ $unset: {{ {}: \"\" }} }});",
            collection,
            json!(f.path)
        ));
    }
    for change in &diff.modified {
        if change.before.field_type != change.after.field_type {
            out.push(format!(
                "// {} changed from {} to {}; convert existing values in application code",
                change.path, change.before.field_type, change.after.field_type
            ));
        }
        if change.before.nullable != change.after.nullable {
            let became = if change.after.nullable {
                "nullable"
            } else {
                "required"
            };
            out.push(format!("// {} became {}", change.path, became));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldChange, FieldShape, SchemaSummary};

    fn fd(path: &str, ty: FieldType, nullable: bool) -> FieldDescriptor {
        FieldDescriptor {
            path: path.to_string(),
            field_type: ty,
            nullable,
            example_value: None,
            confidence: 1.0,
            suggested_index: false,
        }
    }

    fn schema(fields: Vec<FieldDescriptor>, pks: &[&str]) -> Schema {
        Schema {
            schema_id: "sid".into(),
            source_id: "orders".into(),
            version: 3,
            created_at: chrono::Utc::now(),
            summary: SchemaSummary {
                field_count: fields.len(),
            },
            fields,
            primary_key_candidates: pks.iter().map(|s| s.to_string()).collect(),
            fingerprint: String::new(),
        }
    }

    fn sample() -> Schema {
        let mut id = fd("id", FieldType::Integer, false);
        id.suggested_index = true;
        let mut email = fd("customer.email", FieldType::String, true);
        email.suggested_index = true;
        schema(
            vec![
                id,
                fd("customer", FieldType::Object, false),
                fd("customer.name", FieldType::String, false),
                email,
                fd("tags", FieldType::Array, true),
                fd("placed_at", FieldType::Datetime, false),
                fd("meta", FieldType::Object, true),
                fd("note", FieldType::Null, true),
            ],
            &["id"],
        )
    }

    #[test]
    fn target_names_parse() {
        assert_eq!(
            "relational".parse::<RenderTarget>(),
            Ok(RenderTarget::Relational)
        );
        assert_eq!(
            "JSONSchema".parse::<RenderTarget>(),
            Ok(RenderTarget::JsonSchema)
        );
        assert_eq!(
            "xml".parse::<RenderTarget>(),
            Err(RenderError::UnknownTarget("xml".into()))
        );
        for t in RenderTarget::ALL {
            assert_eq!(t.as_str().parse::<RenderTarget>(), Ok(t));
        }
    }

    #[test]
    fn relational_ddl() {
        let out = render(&sample(), RenderTarget::Relational, &RenderOptions::default());
        let ddl = out.as_text().unwrap();
        assert!(ddl.starts_with("CREATE TABLE \"orders\" (\n"));
        assert!(ddl.contains("    \"id\" BIGINT NOT NULL,\n"));
        assert!(ddl.contains("\"customer__name\" VARCHAR NOT NULL"));
        assert!(ddl.contains("\"customer__email\" VARCHAR NULL"));
        assert!(ddl.contains("\"tags\" JSON NULL"));
        assert!(ddl.contains("\"placed_at\" TIMESTAMP NOT NULL"));
        assert!(ddl.contains("\"meta\" JSON NULL"));
        assert!(ddl.contains("\"note\" VARCHAR NULL"));
        assert!(!ddl.contains("\"customer\" JSON"));
        assert!(ddl.contains("    PRIMARY KEY (\"id\")\n);"));
        assert!(ddl.contains(
            "CREATE INDEX \"idx_orders_customer__email\" ON \"orders\" (\"customer__email\");"
        ));
        assert!(!ddl.contains("idx_orders_id\""));
    }

    #[test]
    fn table_names_are_sanitized() {
        assert_eq!(table_name("Orders/2024.json", ""), "orders_2024_json");
        assert_eq!(table_name("7eleven", ""), "_7eleven");
        assert_eq!(table_name("x", "raw_"), "raw_x");
    }

    #[test]
    fn document_nests_objects() {
        let out = render(&sample(), RenderTarget::Document, &RenderOptions::default());
        let doc = out.as_document().unwrap();
        assert_eq!(doc["collection"], "orders");
        assert_eq!(doc["version"], 3);
        assert_eq!(doc["fields"]["id"], "int");
        assert_eq!(doc["fields"]["customer"]["name"], "string");
        assert_eq!(doc["fields"]["customer"]["email"], "string");
        assert_eq!(doc["fields"]["tags"], "array");
        assert_eq!(doc["fields"]["placed_at"], "date");
        assert_eq!(doc["fields"]["meta"], "object");
        assert_eq!(doc["fields"]["note"], "null");
        let keys: Vec<&String> = doc["fields"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "customer", "tags", "placed_at", "meta", "note"]);
    }

    #[test]
    fn graph_splits_objects_into_nodes() {
        let out = render(&sample(), RenderTarget::Graph, &RenderOptions::default());
        let g = out.as_document().unwrap();
        let nodes = g["nodes"].as_array().unwrap();
        assert_eq!(nodes[0]["label"], "Orders");
        assert_eq!(nodes[0]["properties"]["id"], "integer");
        assert_eq!(nodes[0]["properties"]["tags"], "list");
        assert_eq!(nodes[0]["properties"]["note"], "string");
        assert!(nodes[0]["properties"].get("customer").is_none());
        assert_eq!(nodes[1]["label"], "Customer");
        assert_eq!(nodes[1]["path"], "customer");
        assert_eq!(nodes[1]["properties"]["email"], "string");
        assert_eq!(nodes[2]["label"], "Meta");
        assert_eq!(
            g["relationships"][0],
            json!({"type": "HAS_CUSTOMER", "from": "Orders", "to": "Customer"})
        );
        assert_eq!(
            g["constraints"][0],
            json!({"label": "Orders", "property": "id", "type": "UNIQUE"})
        );
    }

    #[test]
    fn json_schema_marks_nullable_and_required() {
        let out = render(&sample(), RenderTarget::JsonSchema, &RenderOptions::default());
        let s = out.as_document().unwrap();
        assert_eq!(s["$schema"], "http://json-schema.org/draft-07/schema#");
        assert_eq!(s["title"], "orders");
        assert_eq!(s["properties"]["id"], json!({"type": "integer"}));
        assert_eq!(s["properties"]["tags"], json!({"type": ["array", "null"]}));
        assert_eq!(
            s["properties"]["placed_at"],
            json!({"type": "string", "format": "date-time"})
        );
        assert_eq!(s["properties"]["note"], json!({"type": "null"}));
        assert_eq!(
            s["properties"]["customer"]["properties"]["email"],
            json!({"type": ["string", "null"]})
        );
        assert_eq!(s["properties"]["customer"]["required"], json!(["name"]));
        assert_eq!(s["required"], json!(["id", "customer", "placed_at"]));
    }

    #[test]
    fn every_type_maps_in_every_target() {
        let all = [
            FieldType::String,
            FieldType::Integer,
            FieldType::Decimal,
            FieldType::Boolean,
            FieldType::Datetime,
            FieldType::Array,
            FieldType::Object,
            FieldType::Null,
        ];
        let fields: Vec<FieldDescriptor> = all
            .iter()
            .map(|t| fd(&format!("f_{}", t), *t, false))
            .collect();
        let s = schema(fields, &[]);
        for target in RenderTarget::ALL {
            let out = render(&s, target, &RenderOptions::default()).to_string();
            for t in &all {
                assert!(out.contains(&format!("f_{}", t)), "{target} lost f_{t}");
            }
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let s = sample();
        let opts = RenderOptions {
            table_prefix: "raw_".into(),
        };
        for target in RenderTarget::ALL {
            assert_eq!(render(&s, target, &opts), render(&s, target, &opts));
            assert_eq!(
                render(&s, target, &opts).to_string(),
                render(&s, target, &opts).to_string()
            );
        }
    }

    fn price_diff() -> SchemaDiff {
        SchemaDiff {
            added: vec![fd("currency", FieldType::String, false)],
            removed: vec![fd("legacy", FieldType::String, true)],
            modified: vec![FieldChange {
                path: "price".into(),
                before: FieldShape {
                    field_type: FieldType::String,
                    nullable: false,
                },
                after: FieldShape {
                    field_type: FieldType::Decimal,
                    nullable: true,
                },
            }],
            rename_hints: Vec::new(),
            migration_notes: String::new(),
        }
    }

    #[test]
    fn relational_migration_statements() {
        let stmts =
            migration_statements(&price_diff(), RenderTarget::Relational, "orders").unwrap();
        assert_eq!(
            stmts,
            vec![
                "ALTER TABLE \"orders\" ADD COLUMN \"currency\" VARCHAR NOT NULL;",
                "ALTER TABLE \"orders\" DROP COLUMN \"legacy\";",
                "ALTER TABLE \"orders\" ALTER COLUMN \"price\" TYPE NUMERIC;",
                "ALTER TABLE \"orders\" ALTER COLUMN \"price\" DROP NOT NULL;",
            ]
        );
    }

    #[test]
    fn document_migration_statements() {
        let stmts = migration_statements(&price_diff(), RenderTarget::Document, "orders").unwrap();
        assert_eq!(
            stmts[0],
            "db.orders.updateMany({}, { $set: { \"currency\": null } });"
        );
        assert_eq!(
            stmts[1],
            "db.orders.updateMany({}, { $unset: { \"legacy\": \"\" } });"
        );
        assert!(stmts[2].starts_with("// price changed from string to decimal"));
        assert_eq!(stmts[3], "// price became nullable");
    }

    #[test]
    fn migrations_unsupported_for_graph_and_jsonschema() {
        assert_eq!(
            migration_statements(&price_diff(), RenderTarget::Graph, "t"),
            Err(RenderError::MigrationUnsupported("graph".into()))
        );
        assert!(migration_statements(&price_diff(), RenderTarget::JsonSchema, "t").is_err());
    }
}
