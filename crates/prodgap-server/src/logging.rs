use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

/// Per-request trace id, stored in request extensions and echoed in the
/// `X-Trace-Id` response header.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 16 hex characters from 8 random bytes.
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// Request bodies above this size are not buffered for logging.
const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Truncates to at most `max` bytes on a char boundary.
fn body_snippet(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

fn log_response(trace_id: &str, status: StatusCode, elapsed: &str, body: &str) {
    let code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(trace_id, status = code, elapsed, body, "<-- response");
    } else if status.is_client_error() {
        tracing::warn!(trace_id, status = code, elapsed, body, "<-- response");
    } else if body.is_empty() {
        tracing::info!(trace_id, status = code, elapsed, "<-- response");
    } else {
        tracing::info!(trace_id, status = code, elapsed, body, "<-- response");
    }
}

/// Logs every request and response with a shared trace id.
///
/// JSON request bodies (POST/PUT/PATCH) and JSON response bodies are logged
/// as truncated snippets. The OpenAPI document is passed through untouched.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    if path == "/v1/openapi.json" {
        return next.run(req).await;
    }
    let url = match req.uri().query() {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    };

    let logs_body = matches!(method.as_str(), "POST" | "PUT" | "PATCH");
    let (req, req_snippet) = if logs_body {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES)
            .await
            .unwrap_or_default();
        let snippet = body_snippet(&bytes, MAX_BODY_LOG_CHARS);
        (Request::from_parts(parts, Body::from(bytes)), snippet)
    } else {
        (req, String::new())
    };

    if req_snippet.is_empty() {
        tracing::info!(trace_id = %trace_id, method = %method, path = %url, "--> request");
    } else {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            body = %req_snippet,
            "--> request"
        );
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());

    let (parts, body) = response.into_parts();
    let bytes: Bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let snippet = if is_json(&parts.headers) && !bytes.is_empty() {
        body_snippet(&bytes, MAX_BODY_LOG_CHARS)
    } else {
        String::new()
    };
    log_response(&trace_id, parts.status, &elapsed, &snippet);

    let mut response = Response::from_parts(parts, Body::from(bytes));
    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_16_hex_chars() {
        let id = generate_trace_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let text = "é".repeat(150);
        let snippet = body_snippet(text.as_bytes(), 201);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.trim_end_matches("...").len(), 200);
        assert_eq!(body_snippet(b"{\"ok\":true}", 200), "{\"ok\":true}");
    }

    #[test]
    fn elapsed_picks_a_unit() {
        assert_eq!(format_elapsed(850), "850µs");
        assert_eq!(format_elapsed(12_345), "12ms");
        assert_eq!(format_elapsed(2_500_000), "2.5s");
    }
}
