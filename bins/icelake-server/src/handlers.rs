//! Route handlers for the external HTTP surface: inserting a batch,
//! triggering a merge, and the two read-only catalog listings.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use icelake_core::{Catalog, IcelakeError};
use icelake_engine::{ingest, merge, IngestRequest, MergeRequest, RowsInput};
use icelake_tx::PartitionPlan;
use object_store::ObjectStore;
use serde::Deserialize;
use serde_json::Value;

use crate::error::error_response;
use crate::middleware::RequestId;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn ObjectStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InsertBody {
    namespace: String,
    #[serde(default)]
    rows_string: Option<String>,
    #[serde(default)]
    rows: Option<Vec<Value>>,
    partitioner: PartitionPlan,
}

pub async fn insert(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<InsertBody>,
) -> Response {
    let rows = match (body.rows_string, body.rows) {
        (Some(text), _) => RowsInput::NewlineDelimited(text),
        (None, Some(records)) => RowsInput::Records(records),
        (None, None) => {
            return error_response(
                IcelakeError::user_input("request body must set RowsString or Rows"),
                &request_id,
            );
        }
    };

    let req = IngestRequest {
        namespace: body.namespace,
        rows,
        partition_plan: body.partitioner,
    };

    match ingest(state.catalog.as_ref(), state.store.clone(), req).await {
        Ok(stats) => (StatusCode::ACCEPTED, Json(stats)).into_response(),
        Err(err) => error_response(err, &request_id),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MergeBody {
    namespace: String,
    #[serde(default)]
    partition: Option<String>,
    #[serde(default)]
    max_pre_merge_file_bytes: Option<i64>,
    #[serde(default)]
    max_post_merge_file_bytes: Option<i64>,
    #[serde(default)]
    max_merge_files: Option<i32>,
    #[serde(default)]
    max_runtime_sec: Option<u64>,
}

pub async fn merge_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(body): Json<MergeBody>,
) -> Response {
    let defaults = MergeRequest::default();
    let req = MergeRequest {
        namespace: body.namespace,
        partition: body.partition,
        max_pre_merge_file_bytes: body.max_pre_merge_file_bytes.unwrap_or(defaults.max_pre_merge_file_bytes),
        max_post_merge_file_bytes: body.max_post_merge_file_bytes.unwrap_or(defaults.max_post_merge_file_bytes),
        max_merge_files: body.max_merge_files.unwrap_or(defaults.max_merge_files),
        max_runtime_sec: body.max_runtime_sec.unwrap_or(defaults.max_runtime_sec),
    };

    match merge(state.catalog.as_ref(), state.store.clone(), req).await {
        Ok(Some(stats)) => (StatusCode::OK, Json(stats)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err, &request_id),
    }
}

pub async fn list_namespaces(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Response {
    match state.catalog.list_namespaces().await {
        Ok(namespaces) => Json(namespaces).into_response(),
        Err(err) => error_response(err, &request_id),
    }
}

pub async fn list_columns(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(namespace): Path<String>,
) -> Response {
    match state.catalog.list_columns(&namespace).await {
        Ok(columns) => Json(columns).into_response(),
        Err(err) => error_response(err, &request_id),
    }
}

pub async fn healthcheck() -> &'static str {
    "ok"
}
