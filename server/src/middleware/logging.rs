use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Largest error body the middleware will buffer for logging.
const BODY_BUFFER_LIMIT: usize = 64 * 1024;
/// Longest body excerpt written to the log.
const BODY_EXCERPT_LIMIT: usize = 1024;

/// Logs every 4xx/5xx response together with an excerpt of its body, then
/// forwards the buffered body to the caller unchanged.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let latency_ms = started.elapsed().as_millis() as u64;
    let (mut parts, body) = response.into_parts();
    let (body, excerpt) = match to_bytes(body, BODY_BUFFER_LIMIT).await {
        Ok(bytes) => {
            let excerpt = if bytes.len() > BODY_EXCERPT_LIMIT {
                format!(
                    "{}... ({} bytes)",
                    String::from_utf8_lossy(&bytes[..BODY_EXCERPT_LIMIT]),
                    bytes.len()
                )
            } else {
                String::from_utf8_lossy(&bytes).to_string()
            };
            (Body::from(bytes), excerpt)
        }
        Err(err) => {
            // The stream failed mid-read; forward an empty body rather than a
            // half-written one.
            parts.headers.remove(CONTENT_LENGTH);
            (Body::empty(), format!("<unreadable body: {err}>"))
        }
    };

    if status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            latency_ms,
            body = %excerpt,
            "request failed"
        );
    } else {
        tracing::warn!(
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            latency_ms,
            body = %excerpt,
            "request failed"
        );
    }

    Response::from_parts(parts, body)
}
