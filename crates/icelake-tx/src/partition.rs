//! Partition router: maps a flat record through an ordered partition plan
//! to a deterministic path fragment. Grounded on the upstream Go
//! `partitioner.go`, with the function registry made an explicit,
//! once-initialized process-global table rather than a package `init()`.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use icelake_core::{FlatRecord, IcelakeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a partition plan: `func(args) as alias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStep {
    #[serde(rename = "func")]
    pub func: String,
    #[serde(rename = "args")]
    pub args: Vec<String>,
    #[serde(rename = "as")]
    pub alias: String,
}

/// An ordered sequence of partition steps. An empty plan routes every
/// record to the empty-string partition.
pub type PartitionPlan = Vec<PartitionStep>;

type PartitionFn = fn(&FlatRecord, &[String]) -> Result<String, IcelakeError>;

static REGISTRY: OnceLock<HashMap<&'static str, PartitionFn>> = OnceLock::new();

/// Populate the partition-function registry. Must be called once at
/// process startup before `partition_of` is used; calling it more than
/// once is harmless (the table is built fresh and discarded past the
/// first call).
pub fn init() {
    REGISTRY.get_or_init(build_registry);
}

fn registry() -> &'static HashMap<&'static str, PartitionFn> {
    REGISTRY.get().expect("partition::init() was not called at startup")
}

fn build_registry() -> HashMap<&'static str, PartitionFn> {
    let mut m: HashMap<&'static str, PartitionFn> = HashMap::new();
    m.insert("toYear", |row, args| {
        Ok(parse_time_func(row, args)?.format("%Y").to_string())
    });
    m.insert("toMonth", |row, args| {
        Ok(parse_time_func(row, args)?.format("%-m").to_string())
    });
    m.insert("toDay", |row, args| {
        Ok(parse_time_func(row, args)?.format("%-d").to_string())
    });
    m.insert("toYearDay", |row, args| {
        let t = parse_time_func(row, args)?;
        Ok(t.ordinal().to_string())
    });
    m.insert("toYearWeek", |row, args| {
        let t = parse_time_func(row, args)?;
        let iso = t.iso_week();
        Ok(format!("{} {}", iso.year(), iso.week()))
    });
    m.insert("toWeekDay", |row, args| {
        Ok(parse_time_func(row, args)?.format("%A").to_string())
    });
    m
}

/// Evaluate a partition plan against a flat record, producing
/// `alias=value` segments joined by `/`.
pub fn partition_of(record: &FlatRecord, plan: &PartitionPlan) -> Result<String, IcelakeError> {
    let mut parts = Vec::with_capacity(plan.len());
    for step in plan {
        let f = registry()
            .get(step.func.as_str())
            .ok_or_else(|| IcelakeError::user_input(format!("partition function not found: {}", step.func)))?;
        let value = f(record, &step.args)
            .map_err(|e| IcelakeError::user_input(format!("error processing partition function {}: {e}", step.func)))?;
        parts.push(format!("{}={}", step.alias, value));
    }
    Ok(parts.join("/"))
}

fn parse_time_func(row: &FlatRecord, args: &[String]) -> Result<DateTime<Utc>, IcelakeError> {
    let Some(key) = args.first() else {
        return Err(IcelakeError::user_input("missing-args"));
    };

    if key == "now()" {
        return Ok(Utc::now());
    }

    let Some(value) = row.get(key) else {
        return Err(IcelakeError::user_input("missing-columns"));
    };

    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| IcelakeError::user_input(format!("error parsing time string: {e}"))),
        Value::Number(n) if n.is_f64() => {
            let millis = n.as_f64().expect("checked is_f64") as i64;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| IcelakeError::user_input("timestamp out of range"))
        }
        _ => Err(IcelakeError::user_input("invalid-column-type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icelake_core::flatten;
    use serde_json::json;

    fn plan(func: &str, key: &str, alias: &str) -> PartitionPlan {
        vec![PartitionStep {
            func: func.to_string(),
            args: vec![key.to_string()],
            alias: alias.to_string(),
        }]
    }

    #[test]
    fn to_day_with_now() {
        init();
        let record = flatten(&json!({"hey": "ho"})).unwrap();
        let result = partition_of(&record, &plan("toDay", "now()", "d")).unwrap();
        let expected = format!("d={}", Utc::now().day());
        assert_eq!(result, expected);
    }

    #[test]
    fn to_day_from_rfc3339_string() {
        init();
        let record = flatten(&json!({"t": "2022-01-24T00:00:00.000Z"})).unwrap();
        let result = partition_of(&record, &plan("toDay", "t", "d")).unwrap();
        assert_eq!(result, "d=24");
    }

    #[test]
    fn to_day_from_epoch_millis_float() {
        init();
        let record = flatten(&json!({"t": 1672406408279.0})).unwrap();
        let result = partition_of(&record, &plan("toDay", "t", "d")).unwrap();
        assert_eq!(result, "d=30");
    }

    #[test]
    fn integer_literal_is_invalid_column_type() {
        init();
        let mut record = FlatRecord::new();
        record.insert("t".to_string(), serde_json::from_str("1672406408279").unwrap());
        let err = partition_of(&record, &plan("toDay", "t", "d")).unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(msg) if msg.contains("invalid-column-type")));
    }

    #[test]
    fn unregistered_function_is_an_error() {
        init();
        let record = flatten(&json!({"t": "x"})).unwrap();
        let err = partition_of(&record, &plan("toFortnight", "t", "f")).unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(msg) if msg.contains("partition function not found")));
    }

    #[test]
    fn missing_column_is_an_error() {
        init();
        let record = flatten(&json!({"other": "x"})).unwrap();
        let err = partition_of(&record, &plan("toDay", "t", "d")).unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(msg) if msg.contains("missing-columns")));
    }

    #[test]
    fn empty_plan_collapses_to_empty_string() {
        init();
        let record = flatten(&json!({"a": 1.0})).unwrap();
        assert_eq!(partition_of(&record, &Vec::new()).unwrap(), "");
    }

    #[test]
    fn two_records_same_day_share_a_partition() {
        init();
        let a = flatten(&json!({"ts": "2022-01-24T01:00:00.000Z"})).unwrap();
        let b = flatten(&json!({"ts": "2022-01-24T23:00:00.000Z"})).unwrap();
        let p = plan("toDay", "ts", "d");
        assert_eq!(partition_of(&a, &p).unwrap(), partition_of(&b, &p).unwrap());
    }
}
