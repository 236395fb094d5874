//! Schema accumulator: incrementally infers a columnar schema from a stream
//! of flat records and serializes it to the nested `{Tag, Fields}` form the
//! columnar writer expects, matching the upstream `parquet_accumulator.go`
//! byte-for-byte.

use std::collections::HashSet;

use icelake_core::{ColumnType, FlatRecord, IcelakeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ROOT_TAG: &str = "name=parquet_go_root, repetitiontype=REQUIRED";

struct FieldEntry {
    schema_name: String,
    column_type: ColumnType,
}

/// Incrementally infers the union schema of a stream of flat records.
/// First-write-wins: once a field's type is set, later records never
/// change it (within the lifetime of one accumulator instance).
#[derive(Default)]
pub struct SchemaAccumulator {
    fields: Vec<FieldEntry>,
    seen: HashSet<String>,
}

impl SchemaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one flat record, appending any not-yet-seen field. Returns
    /// the number of new columns discovered.
    pub fn observe(&mut self, record: &FlatRecord) -> usize {
        let mut added = 0;
        for (key, value) in record {
            let schema_name = capitalize_first(key);
            if self.seen.contains(&schema_name) {
                continue;
            }
            if let Some(column_type) = infer_type(value) {
                self.seen.insert(schema_name.clone());
                self.fields.push(FieldEntry {
                    schema_name,
                    column_type,
                });
                added += 1;
            }
        }
        added
    }

    /// Merge a field set decoded from another file's stored schema string
    /// into this accumulator: fields not yet present are added, existing
    /// ones are left unchanged.
    pub fn merge_schema_string(&mut self, schema_json: &str) -> Result<(), IcelakeError> {
        let node: SchemaNode = serde_json::from_str(schema_json)
            .map_err(|e| IcelakeError::permanent(format!("invalid stored schema: {e}")))?;
        for field in node.fields.unwrap_or_default() {
            let (name, column_type) = parse_field_node(&field)?;
            if self.seen.insert(name.clone()) {
                self.fields.push(FieldEntry {
                    schema_name: name,
                    column_type,
                });
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.schema_name.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column_type.to_string()).collect()
    }

    pub fn columns(&self) -> Vec<(String, ColumnType)> {
        self.fields
            .iter()
            .map(|f| (f.schema_name.clone(), f.column_type.clone()))
            .collect()
    }

    /// Serialize to the nested `{Tag, Fields}` JSON contract. Field order
    /// follows order of first observation and must never be reordered — it
    /// is a stable external contract.
    pub fn schema_string(&self) -> String {
        let fields: Vec<SchemaNode> = self
            .fields
            .iter()
            .map(|f| build_node(&f.schema_name, &f.column_type))
            .collect();
        let root = SchemaNode {
            tag: ROOT_TAG.to_string(),
            fields: if fields.is_empty() { None } else { Some(fields) },
        };
        serde_json::to_string(&root).expect("schema node serialization cannot fail")
    }
}

fn capitalize_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Inverts `capitalize_first`: the codec uses this to recover the flat
/// record key a schema name was derived from, since only the first
/// character was ever touched.
pub fn original_key(schema_name: &str) -> String {
    let mut chars = schema_name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
    }
}

/// Type inference rules, applied in order: list (recurse on first non-null
/// element, or skip), string, else-double.
fn infer_type(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Array(items) => {
            let first_non_null = items.iter().find(|v| !v.is_null())?;
            infer_type(first_non_null).map(|t| ColumnType::List(Box::new(t)))
        }
        Value::String(_) => Some(ColumnType::String),
        _ => Some(ColumnType::Float),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaNode {
    #[serde(rename = "Tag")]
    tag: String,
    #[serde(rename = "Fields", skip_serializing_if = "Option::is_none", default)]
    fields: Option<Vec<SchemaNode>>,
}

fn build_node(name: &str, column_type: &ColumnType) -> SchemaNode {
    match column_type {
        ColumnType::String => SchemaNode {
            tag: format!(
                "type=BYTE_ARRAY, convertedtype=UTF8, encoding=PLAIN, name={name}, repetitiontype=OPTIONAL"
            ),
            fields: None,
        },
        ColumnType::Float => SchemaNode {
            tag: format!("type=DOUBLE, name={name}, repetitiontype=OPTIONAL"),
            fields: None,
        },
        ColumnType::List(inner) => SchemaNode {
            tag: format!("type=LIST, name={name}, repetitiontype=OPTIONAL"),
            fields: Some(vec![build_node("Element", inner)]),
        },
    }
}

fn parse_field_node(node: &SchemaNode) -> Result<(String, ColumnType), IcelakeError> {
    let tags = parse_tag(&node.tag)?;
    let name = tags
        .get("name")
        .ok_or_else(|| IcelakeError::permanent("stored schema field missing name"))?
        .clone();
    let column_type = match tags.get("type").map(String::as_str) {
        Some("BYTE_ARRAY") => ColumnType::String,
        Some("DOUBLE") => ColumnType::Float,
        Some("LIST") => {
            let element = node
                .fields
                .as_ref()
                .and_then(|f| f.first())
                .ok_or_else(|| IcelakeError::permanent("LIST field missing Element"))?;
            let (_, inner) = parse_field_node(element)?;
            ColumnType::List(Box::new(inner))
        }
        other => {
            return Err(IcelakeError::permanent(format!(
                "unrecognized stored column type: {other:?}"
            )))
        }
    };
    Ok((name, column_type))
}

fn parse_tag(tag: &str) -> Result<std::collections::HashMap<String, String>, IcelakeError> {
    let mut map = std::collections::HashMap::new();
    for part in tag.split(", ") {
        if let Some((k, v)) = part.split_once('=') {
            map.insert(k.to_string(), v.to_string());
        }
    }
    Ok(map)
}
