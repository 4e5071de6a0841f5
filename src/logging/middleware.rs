use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Request id set by [`request_id_layer`], or `"unknown"` outside it.
fn request_id(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Log one line when a request arrives and one when its response is ready.
///
/// Completion is logged at error level for 5xx, warn for 4xx, info otherwise.
pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let req_id = request_id(&request);

    tracing::info!(
        request_id = %req_id,
        method = %method,
        uri = %uri,
        version = ?request.version(),
        "incoming request"
    );

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(request_id = %req_id, method = %method, uri = %uri, status = %status, duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(request_id = %req_id, method = %method, uri = %uri, status = %status, duration_ms, "request rejected");
    } else {
        tracing::info!(request_id = %req_id, method = %method, uri = %uri, status = %status, duration_ms, "request completed");
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
