//! # Cross-Cutting Request Handling
//!
//! CORS and tus-protocol validation that every client-facing handler goes
//! through before its own logic runs (spec.md §5, §6.1).

use crate::constants::{
    CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, CORS_EXPOSE_HEADERS, CORS_MAX_AGE,
    HEADER_METHOD_OVERRIDE, HEADER_TUS_RESUMABLE, TUS_VERSION,
};
use crate::errors::{AppError, AppResult};
use worker::*;

/// Builds the CORS header set applied to every response this gateway
/// returns, client-facing or not — Non-goal in spec.md only scopes out a
/// per-origin allowlist, not CORS itself.
pub fn cors_headers() -> Headers {
    let headers = Headers::new();
    let _ = headers.set("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN);
    let _ = headers.set("Access-Control-Allow-Methods", CORS_ALLOW_METHODS);
    let _ = headers.set("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS);
    let _ = headers.set("Access-Control-Expose-Headers", CORS_EXPOSE_HEADERS);
    let _ = headers.set("Access-Control-Max-Age", CORS_MAX_AGE);
    headers
}

pub struct CorsMiddleware;

impl CorsMiddleware {
    /// Applies CORS headers to an existing response without disturbing
    /// whatever headers the handler already set.
    pub fn apply_headers(mut response: Response) -> Response {
        let existing = response.headers_mut();
        for (name, value) in cors_headers().entries() {
            let _ = existing.set(&name, &value);
        }
        response
    }

    /// Answers an `OPTIONS` preflight with an empty 204 and the CORS set.
    pub fn handle_preflight() -> Result<Response> {
        Ok(Response::empty()?.with_status(204).with_headers(cors_headers()))
    }
}

/// Validates the tus protocol concerns shared by every CREATE/HEAD/PATCH
/// request: resumable-version header and, for requests carrying a body
/// that isn't `application/offset+octet-stream`, content type.
pub struct ValidationMiddleware;

impl ValidationMiddleware {
    /// Checks `Tus-Resumable` equals the version this gateway implements.
    /// Per the tus protocol, a mismatch must still report the server's
    /// own version back to the client (handled in `AppError::to_response`).
    pub fn validate_tus_version(req: &Request) -> AppResult<()> {
        let header = req
            .headers()
            .get(HEADER_TUS_RESUMABLE)
            .ok()
            .flatten();

        match header.as_deref() {
            Some(TUS_VERSION) => Ok(()),
            _ => Err(AppError::InvalidTusVersion),
        }
    }

    /// Checks a PATCH (or creation-with-upload) body is declared as
    /// `application/offset+octet-stream`, the only body content type tus
    /// allows for chunk data.
    pub fn validate_offset_content_type(req: &Request) -> AppResult<()> {
        let content_type = req
            .headers()
            .get("Content-Type")
            .ok()
            .flatten()
            .unwrap_or_default();

        if content_type != "application/offset+octet-stream" {
            return Err(AppError::InvalidContentType {
                message: format!(
                    "expected application/offset+octet-stream, got {content_type}"
                ),
            });
        }
        Ok(())
    }

    /// Resolves the effective HTTP method, honoring `X-HTTP-Method-Override`
    /// for browser clients that can't issue PATCH/DELETE directly
    /// (spec.md §5).
    pub fn effective_method(req: &Request) -> Method {
        if req.method() != Method::Post {
            return req.method();
        }

        if let Ok(Some(overridden)) = req.headers().get(HEADER_METHOD_OVERRIDE) {
            return match overridden.to_uppercase().as_str() {
                "PATCH" => Method::Patch,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                _ => req.method(),
            };
        }
        req.method()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_method_defaults_to_request_method() {
        let req = Request::new("https://example.com/", Method::Post).unwrap();
        assert_eq!(ValidationMiddleware::effective_method(&req), Method::Post);
    }

    #[test]
    fn effective_method_ignores_override_on_non_post_requests() {
        let headers = Headers::new();
        headers.set(HEADER_METHOD_OVERRIDE, "DELETE").unwrap();
        let mut init = RequestInit::new();
        init.with_method(Method::Get).with_headers(headers);
        let req = Request::new_with_init("https://example.com/", &init).unwrap();
        assert_eq!(ValidationMiddleware::effective_method(&req), Method::Get);
    }
}
