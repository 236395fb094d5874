//! Columnar codec: flat JSON records <-> Parquet bytes.
//!
//! Writing uses the schema accumulator's column list to pick one Arrow
//! `DataType` per column and fills arrays by looking up each row's value
//! under the column's original (pre-capitalization) record key. Reading
//! goes the other way: Parquet is self-describing, so decoding never needs
//! the accumulator — the file's own embedded Arrow schema drives it.

use std::sync::Arc;

use arrow_array::builder::{Float64Builder, StringBuilder};
use arrow_array::{Array, ArrayRef, Float64Array, ListArray, RecordBatch, StringArray};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{DataType, Field, FieldRef, Schema, SchemaRef};
use icelake_core::{ColumnType, FlatRecord, IcelakeError};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use serde_json::Value;

fn arrow_data_type(column_type: &ColumnType) -> DataType {
    match column_type {
        ColumnType::String => DataType::Utf8,
        ColumnType::Float => DataType::Float64,
        ColumnType::List(inner) => {
            DataType::List(Arc::new(Field::new("Element", arrow_data_type(inner), true)))
        }
    }
}

fn arrow_schema(columns: &[(String, ColumnType)]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, ty)| Field::new(name, arrow_data_type(ty), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Write a bucket of flat records to Parquet bytes under the given column
/// list (name, inferred type), in row order.
pub fn write_parquet(rows: &[FlatRecord], columns: &[(String, ColumnType)]) -> Result<Vec<u8>, IcelakeError> {
    if columns.is_empty() {
        return Err(IcelakeError::user_input("cannot write a file with zero columns"));
    }
    let schema = arrow_schema(columns);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for (name, column_type) in columns {
        let key = icelake_tx::original_key(name);
        let values: Vec<Option<&Value>> = rows.iter().map(|r| r.get(&key)).collect();
        arrays.push(build_array(column_type, &values)?);
    }
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| IcelakeError::permanent(format!("building record batch: {e}")))?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)
        .map_err(|e| IcelakeError::permanent(format!("opening parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| IcelakeError::permanent(format!("writing record batch: {e}")))?;
    writer
        .close()
        .map_err(|e| IcelakeError::permanent(format!("closing parquet writer: {e}")))?;
    Ok(buffer)
}

/// Read a Parquet file back into flat records, keyed by the Arrow field
/// names embedded in the file (the schema accumulator's column names).
pub fn read_parquet(bytes: bytes::Bytes) -> Result<Vec<FlatRecord>, IcelakeError> {
    let reader_builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| IcelakeError::permanent(format!("opening parquet reader: {e}")))?;
    let schema = reader_builder.schema().clone();
    let reader = reader_builder
        .build()
        .map_err(|e| IcelakeError::permanent(format!("building parquet reader: {e}")))?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| IcelakeError::permanent(format!("reading record batch: {e}")))?;
        for row in 0..batch.num_rows() {
            let mut record = FlatRecord::new();
            for (col_idx, field) in schema.fields().iter().enumerate() {
                let value = arrow_value_to_json(batch.column(col_idx).as_ref(), row);
                record.insert(field.name().clone(), value);
            }
            out.push(record);
        }
    }
    Ok(out)
}

fn build_array(column_type: &ColumnType, values: &[Option<&Value>]) -> Result<ArrayRef, IcelakeError> {
    match column_type {
        ColumnType::String => {
            let mut builder = StringBuilder::new();
            for v in values {
                match v {
                    Some(Value::String(s)) => builder.append_value(s),
                    _ => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        ColumnType::Float => {
            let mut builder = Float64Builder::new();
            for v in values {
                match v {
                    Some(Value::Number(n)) => builder.append_option(n.as_f64()),
                    Some(Value::Bool(b)) => builder.append_value(if *b { 1.0 } else { 0.0 }),
                    _ => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        ColumnType::List(inner) => build_list_array(inner, values),
    }
}

fn build_list_array(inner: &ColumnType, values: &[Option<&Value>]) -> Result<ArrayRef, IcelakeError> {
    let mut offsets: Vec<i32> = Vec::with_capacity(values.len() + 1);
    offsets.push(0);
    let mut flat: Vec<Option<&Value>> = Vec::new();
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());

    for v in values {
        match v {
            Some(Value::Array(items)) => {
                validity.push(true);
                for item in items {
                    flat.push(Some(item));
                }
            }
            _ => validity.push(false),
        }
        offsets.push(flat.len() as i32);
    }

    let child = build_array(inner, &flat)?;
    let field: FieldRef = Arc::new(Field::new("Element", child.data_type().clone(), true));
    let offset_buffer = OffsetBuffer::new(offsets.into());
    let null_buffer = NullBuffer::from(validity);
    let list = ListArray::try_new(field, offset_buffer, child, Some(null_buffer))
        .map_err(|e| IcelakeError::permanent(format!("building list array: {e}")))?;
    Ok(Arc::new(list))
}

fn arrow_value_to_json(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Utf8 => {
            let a = array.as_any().downcast_ref::<StringArray>().expect("Utf8 array");
            Value::String(a.value(row).to_string())
        }
        DataType::Float64 => {
            let a = array.as_any().downcast_ref::<Float64Array>().expect("Float64 array");
            serde_json::Number::from_f64(a.value(row))
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        DataType::List(_) => {
            let a = array.as_any().downcast_ref::<ListArray>().expect("List array");
            let child = a.value(row);
            let mut items = Vec::with_capacity(child.len());
            for i in 0..child.len() {
                items.push(arrow_value_to_json(child.as_ref(), i));
            }
            Value::Array(items)
        }
        other => panic!("unsupported arrow column type in icelake files: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icelake_core::flatten;
    use icelake_tx::SchemaAccumulator;
    use serde_json::json;

    #[test]
    fn round_trips_scalar_and_list_columns() {
        let records = vec![
            flatten(&json!({"name": "alice", "score": 1.5, "tags": ["a", "b"]})).unwrap(),
            flatten(&json!({"name": "bob", "score": 2.5, "tags": ["c"]})).unwrap(),
        ];
        let mut acc = SchemaAccumulator::new();
        for r in &records {
            acc.observe(r);
        }
        let bytes = write_parquet(&records, &acc.columns()).unwrap();
        let decoded = read_parquet(bytes::Bytes::from(bytes)).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].get("Name"), Some(&json!("alice")));
        assert_eq!(decoded[0].get("Score"), Some(&json!(1.5)));
        assert_eq!(decoded[0].get("Tags"), Some(&json!(["a", "b"])));
        assert_eq!(decoded[1].get("Tags"), Some(&json!(["c"])));
    }

    #[test]
    fn missing_values_become_null() {
        let records = vec![
            flatten(&json!({"name": "alice", "score": 1.0})).unwrap(),
            flatten(&json!({"name": "bob"})).unwrap(),
        ];
        let mut acc = SchemaAccumulator::new();
        for r in &records {
            acc.observe(r);
        }
        let bytes = write_parquet(&records, &acc.columns()).unwrap();
        let decoded = read_parquet(bytes::Bytes::from(bytes)).unwrap();

        assert_eq!(decoded[1].get("Score"), Some(&Value::Null));
    }

    #[test]
    fn zero_columns_is_a_user_error() {
        let err = write_parquet(&[], &[]).unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(_)));
    }
}
