//! Per-request id generation: every request gets a k-sortable id attached
//! to its tracing span and echoed back in an `x-request-id` response
//! header, so a `500` response and its structured log line can be
//! correlated without the caller needing to parse the body.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use icelake_io::gen_ksorted_id;
use tracing::Instrument;

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn assign_request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = gen_ksorted_id("req_");
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!("http_request", request_id = %request_id, %method, %path);

    async move {
        let start = std::time::Instant::now();
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
        }
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
    .instrument(span)
    .await
}
