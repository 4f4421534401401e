//! API Middleware
//!
//! Request context extraction and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// =========================================================================
// Operation context
// =========================================================================

/// Parse an optional UUID header; present but malformed is an error
fn uuid_header(headers: &HeaderMap, name: &'static str) -> AppResult<Option<Uuid>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::InvalidHeader {
            name,
            reason: "expected a UUID".to_string(),
        })
}

/// Build the `OperationContext` for a request.
///
/// `X-Correlation-Id` is reused when valid and generated otherwise, then
/// echoed on the response. `Idempotency-Key` must be a UUID when present.
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Response {
    let headers = request.headers();

    let idempotency_key = match uuid_header(headers, IDEMPOTENCY_KEY_HEADER) {
        Ok(key) => key,
        Err(e) => return e.into_response(),
    };
    let mut context = OperationContext {
        correlation_id: uuid_header(headers, CORRELATION_ID_HEADER).ok().flatten(),
        idempotency_key,
    };
    let correlation_id = context.ensure_correlation_id();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }
    response
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let context = request.extensions().get::<OperationContext>();
    let correlation_id = context.and_then(|ctx| ctx.correlation_id);
    let idempotency_key = context.and_then(|ctx| ctx.idempotency_key);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        idempotency_key = ?idempotency_key,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert("idempotency-key", "not-secret".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);
        let value = |name: &str| masked.iter().find(|(k, _)| k == name).unwrap().1.clone();

        assert_eq!(value("authorization"), "[REDACTED]");
        assert_eq!(value("content-type"), "application/json");
        assert_eq!(value("idempotency-key"), "not-secret");
    }

    #[test]
    fn test_uuid_header() {
        let key = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        assert!(uuid_header(&headers, IDEMPOTENCY_KEY_HEADER).unwrap().is_none());

        headers.insert(IDEMPOTENCY_KEY_HEADER, key.to_string().parse().unwrap());
        assert_eq!(uuid_header(&headers, IDEMPOTENCY_KEY_HEADER).unwrap(), Some(key));

        headers.insert(IDEMPOTENCY_KEY_HEADER, "retry-1".parse().unwrap());
        assert!(matches!(
            uuid_header(&headers, IDEMPOTENCY_KEY_HEADER),
            Err(AppError::InvalidHeader { name: IDEMPOTENCY_KEY_HEADER, .. })
        ));
    }
}
