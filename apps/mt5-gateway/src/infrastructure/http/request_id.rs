//! Request-ID correlation middleware.
//!
//! Honors an inbound `X-Request-ID`, mints a UUIDv4 otherwise, exposes the
//! ID to handlers as an extension, and echoes it on the response.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Header carrying the correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The request's correlation ID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware attaching and echoing the correlation ID.
pub async fn propagate(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
