//! Shared in-memory `Catalog` fake for ingest/merge tests. Not exposed
//! outside `#[cfg(test)]` — production code always talks to
//! `icelake_io::PostgresCatalog`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use icelake_core::{Catalog, CatalogTxn, ColumnEntry, FileDescriptor, IcelakeError, NewFileDescriptor};

#[derive(Default)]
struct State {
    files: Vec<FileDescriptor>,
    columns: Vec<ColumnEntry>,
}

#[derive(Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<State>>,
}

impl FakeCatalog {
    pub fn enabled_file_count(&self, namespace: &str, partition: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| f.namespace == namespace && f.partition == partition && f.enabled)
            .count()
    }

    pub fn enabled_files(&self, namespace: &str, partition: &str) -> Vec<FileDescriptor> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| f.namespace == namespace && f.partition == partition && f.enabled)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn list_namespaces(&self) -> Result<Vec<String>, IcelakeError> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state.files.iter().map(|f| f.namespace.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn list_columns(&self, _namespace: &str) -> Result<Vec<ColumnEntry>, IcelakeError> {
        Ok(self.state.lock().unwrap().columns.clone())
    }

    async fn select_files_for_merging(
        &self,
        namespace: &str,
        partition: Option<&str>,
        max_bytes: i64,
        max_files: i32,
    ) -> Result<Vec<FileDescriptor>, IcelakeError> {
        let state = self.state.lock().unwrap();
        let mut matches: Vec<FileDescriptor> = state
            .files
            .iter()
            .filter(|f| f.namespace == namespace && f.enabled && f.bytes < max_bytes)
            .filter(|f| partition.map_or(true, |p| f.partition == p))
            .cloned()
            .collect();
        matches.sort_by_key(|f| f.created_at);
        matches.truncate(max_files.max(0) as usize);
        Ok(matches)
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTxn>, IcelakeError> {
        Ok(Box::new(FakeTxn {
            state: self.state.clone(),
            inserted_files: Vec::new(),
            upserted_columns: Vec::new(),
            state_changes: Vec::new(),
        }))
    }
}

struct FakeTxn {
    state: Arc<Mutex<State>>,
    inserted_files: Vec<NewFileDescriptor>,
    upserted_columns: Vec<ColumnEntry>,
    state_changes: Vec<(String, String, Vec<String>, bool)>,
}

#[async_trait]
impl CatalogTxn for FakeTxn {
    async fn insert_file(&mut self, desc: &NewFileDescriptor) -> Result<(), IcelakeError> {
        self.inserted_files.push(desc.clone());
        Ok(())
    }

    async fn insert_columns(&mut self, _namespace: &str, names: &[String], types: &[String]) -> Result<(), IcelakeError> {
        for (name, column_type) in names.iter().zip(types) {
            self.upserted_columns.push(ColumnEntry {
                name: name.clone(),
                column_type: column_type.clone(),
            });
        }
        Ok(())
    }

    async fn set_file_states(
        &mut self,
        namespace: &str,
        partition: &str,
        names: &[String],
        enabled: bool,
    ) -> Result<(), IcelakeError> {
        self.state_changes
            .push((namespace.to_string(), partition.to_string(), names.to_vec(), enabled));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IcelakeError> {
        let mut state = self.state.lock().unwrap();
        for desc in self.inserted_files {
            state.files.push(FileDescriptor {
                namespace: desc.namespace,
                partition: desc.partition,
                name: desc.name,
                enabled: true,
                bytes: desc.bytes,
                rows: desc.rows,
                column_names: desc.column_names,
                column_types: desc.column_types,
                schema_json: desc.schema_json,
                created_at: Utc::now(),
            });
        }
        for entry in self.upserted_columns {
            if !state.columns.iter().any(|c| c.name == entry.name) {
                state.columns.push(entry);
            }
        }
        for (namespace, partition, names, enabled) in self.state_changes {
            for file in state.files.iter_mut() {
                if file.namespace == namespace && file.partition == partition && names.contains(&file.name) {
                    file.enabled = enabled;
                }
            }
        }
        Ok(())
    }
}
