//! # Error Handling and Response Management
//!
//! Defines the gateway's error taxonomy (spec.md §7), each variant carrying
//! a stable machine-readable `code`, an HTTP status, and whatever context
//! it needs to render a useful message. Unlike the teacher's nested
//! `{error:{code,message,timestamp}}` envelope, spec.md §6.1 calls for a
//! flat `{error, code, details?}` body, so `to_response` renders that shape
//! instead.

use serde_json::{json, Value};
use thiserror::Error;
use worker::{Response, Result as WorkerResult};

/// Application error enumeration covering every condition spec.md §7 names.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("tus version mismatch")]
    InvalidTusVersion,

    #[error("invalid content type: {message}")]
    InvalidContentType { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("offset mismatch: expected {expected}, received {received}")]
    OffsetMismatch { expected: u64, received: u64 },

    #[error("upload not found: {upload_id}")]
    UploadNotFound { upload_id: String },

    #[error("upload expired: {upload_id}")]
    UploadExpired { upload_id: String },

    #[error("upload too large: {size} exceeds maximum {max}")]
    UploadTooLarge { size: u64, max: u64 },

    #[error("file not found: {access_key}")]
    FileNotFound { access_key: String },

    #[error("signature invalid: {message}")]
    SignatureInvalid { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("project not found: {slug}")]
    ProjectNotFound { slug: String },

    #[error("mime type mismatch: claimed {claimed}, detected {detected}")]
    MimeTypeMismatch { claimed: String, detected: String },

    #[error("configuration error: {message}")]
    ConfigError { message: String },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl AppError {
    /// Stable machine-readable error code (spec.md §7's `code` column).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidTusVersion => "invalid_tus_version",
            AppError::InvalidContentType { .. } => "invalid_content_type",
            AppError::InvalidRequest { .. } => "invalid_request",
            AppError::OffsetMismatch { .. } => "offset_mismatch",
            AppError::UploadNotFound { .. } => "upload_not_found",
            AppError::UploadExpired { .. } => "upload_expired",
            AppError::UploadTooLarge { .. } => "upload_too_large",
            AppError::FileNotFound { .. } => "file_not_found",
            AppError::SignatureInvalid { .. } => "signature_invalid",
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::ProjectNotFound { .. } => "project_not_found",
            AppError::MimeTypeMismatch { .. } => "mime_type_mismatch",
            AppError::ConfigError { .. } => "internal_error",
            AppError::InternalError { .. } => "internal_error",
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            AppError::InvalidTusVersion => 412,
            AppError::InvalidContentType { .. } => 415,
            AppError::InvalidRequest { .. } => 400,
            AppError::OffsetMismatch { .. } => 409,
            AppError::UploadNotFound { .. } => 404,
            AppError::UploadExpired { .. } => 410,
            AppError::UploadTooLarge { .. } => 413,
            AppError::FileNotFound { .. } => 404,
            AppError::SignatureInvalid { .. } => 401,
            AppError::Unauthorized { .. } => 401,
            AppError::ProjectNotFound { .. } => 404,
            AppError::MimeTypeMismatch { .. } => 400,
            AppError::ConfigError { .. } => 500,
            AppError::InternalError { .. } => 500,
        }
    }

    /// Optional structured details to attach to the response body.
    fn details(&self) -> Option<Value> {
        match self {
            AppError::OffsetMismatch { expected, received } => Some(json!({
                "expected": expected,
                "received": received,
            })),
            AppError::UploadTooLarge { size, max } => Some(json!({
                "size": size,
                "max": max,
            })),
            AppError::MimeTypeMismatch { claimed, detected } => Some(json!({
                "claimed": claimed,
                "detected": detected,
            })),
            _ => None,
        }
    }

    /// Renders this error as the gateway's structured JSON error response.
    pub fn to_response(&self) -> WorkerResult<Response> {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let Some(details) = self.details() {
            body["details"] = details;
        }

        let mut response = Response::from_json(&body)?.with_status(self.status());

        if matches!(self, AppError::InvalidTusVersion) {
            response = response.with_headers({
                let mut headers = worker::Headers::new();
                let _ = headers.set(crate::constants::HEADER_TUS_VERSION, crate::constants::TUS_VERSION);
                headers
            });
        }

        Ok(response)
    }
}

/// Automatic conversion from Cloudflare Worker errors to application errors.
///
/// Workers-rs surfaces KV, R2, and fetch failures as an untyped
/// `worker::Error`; this classifies them heuristically from the message
/// the same way the teacher's conversion does, since the runtime does not
/// expose a richer error enum to match on.
impl From<worker::Error> for AppError {
    fn from(err: worker::Error) -> Self {
        AppError::InternalError {
            message: err.to_string(),
        }
    }
}

/// Type alias for Results using the gateway's application error type.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_mismatch_maps_to_409() {
        let err = AppError::OffsetMismatch {
            expected: 0,
            received: 42,
        };
        assert_eq!(err.status(), 409);
        assert_eq!(err.code(), "offset_mismatch");
    }

    #[test]
    fn mime_type_mismatch_maps_to_400_with_details() {
        let err = AppError::MimeTypeMismatch {
            claimed: "image/png".to_string(),
            detected: "image/jpeg".to_string(),
        };
        assert_eq!(err.status(), 400);
        let details = err.details().unwrap();
        assert_eq!(details["claimed"], "image/png");
        assert_eq!(details["detected"], "image/jpeg");
    }

    #[test]
    fn config_error_surfaces_as_internal_error_code() {
        let err = AppError::ConfigError {
            message: "missing WORKER_DOMAIN".to_string(),
        };
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.status(), 500);
    }
}
