//! # Utility Functions
//!
//! Small, independently-testable pieces shared across handlers: id
//! generation, `Upload-Metadata` header codec, subdomain parsing, and
//! RFC 1123 timestamp helpers (spec.md §3, §5, §9 GLOSSARY).

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Current UNIX timestamp, used by anything comparing against a
/// caller-supplied `expiresAt` (download signatures, cache TTLs).
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Collects a request's query string into a flat map. Last value wins for
/// a repeated key.
pub fn query_params(req: &worker::Request) -> AppResult<HashMap<String, String>> {
    let url = req.url()?;
    Ok(url.query_pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect())
}

/// Generates a per-request id used only for log correlation.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates the opaque upload id returned as the CREATE `Location` path
/// segment. 16 lowercase hex characters, not a full UUID, to keep URLs
/// short (spec.md §3 GLOSSARY "uploadId").
pub fn generate_upload_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    uuid[..crate::constants::UPLOAD_ID_LEN].to_string()
}

/// Generates the blob-store key a finished upload will live at:
/// `{projectId}/{environmentId}/{uuid}`.
pub fn generate_adapter_key(project_id: &str, environment_id: &str) -> String {
    format!("{}/{}/{}", project_id, environment_id, Uuid::new_v4())
}

/// Current time formatted as RFC 1123 ("imf-fixdate"), the format tus
/// uses for `Upload-Expires`.
pub fn now_rfc1123() -> String {
    to_rfc1123(Utc::now())
}

/// `hours` in the future, formatted as RFC 1123.
pub fn expires_at_rfc1123(hours: i64) -> String {
    to_rfc1123(Utc::now() + Duration::hours(hours))
}

fn to_rfc1123(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses a previously-formatted RFC 1123 timestamp back into a `DateTime`.
pub fn parse_rfc1123(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InternalError {
            message: format!("malformed timestamp: {value}"),
        })
}

/// Decodes a tus `Upload-Metadata` header into a key/value map.
///
/// Format: comma-separated `key base64(value)` pairs; a key with no
/// value (no trailing space) maps to an empty string. Keys must be
/// non-empty and must not themselves be base64 — only the value is
/// encoded. Control characters surviving decode (CR, LF, NUL) are
/// stripped, since they would otherwise corrupt the stored metadata
/// record or any header built from it later.
pub fn parse_upload_metadata_header(header: &str) -> AppResult<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in header.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = pair.splitn(2, ' ');
        let key = parts.next().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(AppError::InvalidRequest {
                message: "Upload-Metadata entry missing key".to_string(),
            });
        }
        let value = match parts.next() {
            Some(encoded) => {
                let decoded =
                    BASE64
                        .decode(encoded.trim())
                        .map_err(|_| AppError::InvalidRequest {
                            message: format!("Upload-Metadata value for {key} is not valid base64"),
                        })?;
                let decoded = String::from_utf8(decoded).map_err(|_| AppError::InvalidRequest {
                    message: format!("Upload-Metadata value for {key} is not valid UTF-8"),
                })?;
                sanitize_metadata_value(&decoded)
            }
            None => String::new(),
        };
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

/// Strips CR, LF, and NUL from a decoded metadata value.
fn sanitize_metadata_value(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')).collect()
}

/// Re-encodes a metadata map back into `Upload-Metadata` wire format, for
/// echoing it on HEAD responses.
pub fn encode_upload_metadata_header(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{} {}", key, BASE64.encode(value))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn subdomain_pattern() -> Regex {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("static regex is valid")
}

/// Extracts the project slug from a request's `Host` header, given the
/// gateway's own base domain. Returns `None` when `host` is exactly the
/// base domain (main-domain request, e.g. `/internal/*` or `/health`) and
/// an error when `host` doesn't end in the base domain at all, or the
/// extracted label isn't a syntactically valid subdomain.
pub fn extract_project_slug(host: &str, worker_domain: &str) -> AppResult<Option<String>> {
    let host = host.split(':').next().unwrap_or(host).to_lowercase();
    let worker_domain = worker_domain.to_lowercase();

    if host == worker_domain {
        return Ok(None);
    }

    let suffix = format!(".{worker_domain}");
    let label = host
        .strip_suffix(&suffix)
        .ok_or_else(|| AppError::ProjectNotFound { slug: host.clone() })?;

    if label.len() < 3 || label.len() > 63 || !subdomain_pattern().is_match(label) {
        return Err(AppError::ProjectNotFound {
            slug: label.to_string(),
        });
    }

    Ok(Some(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_upload_id_is_sixteen_hex_chars() {
        let id = generate_upload_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn upload_metadata_round_trips() {
        let header = "filename d29ybGQucG5n,isPublic";
        let map = parse_upload_metadata_header(header).unwrap();
        assert_eq!(map.get("filename").unwrap(), "world.png");
        assert_eq!(map.get("isPublic").unwrap(), "");

        let re_encoded = encode_upload_metadata_header(&map);
        let round_tripped = parse_upload_metadata_header(&re_encoded).unwrap();
        assert_eq!(map, round_tripped);
    }

    #[test]
    fn upload_metadata_rejects_bad_base64() {
        assert!(parse_upload_metadata_header("filename not-base64!!").is_err());
    }

    #[test]
    fn upload_metadata_strips_control_characters() {
        let encoded = BASE64.encode("line1\r\nline2\0tail");
        let header = format!("note {encoded}");
        let map = parse_upload_metadata_header(&header).unwrap();
        assert_eq!(map.get("note").unwrap(), "line1line2tail");
    }

    #[test]
    fn extract_project_slug_recognizes_main_domain() {
        assert_eq!(extract_project_slug("gateway.example.com", "gateway.example.com").unwrap(), None);
    }

    #[test]
    fn extract_project_slug_recognizes_subdomain() {
        let slug = extract_project_slug("acme.gateway.example.com", "gateway.example.com").unwrap();
        assert_eq!(slug.unwrap(), "acme");
    }

    #[test]
    fn extract_project_slug_ignores_port() {
        let slug = extract_project_slug("acme.gateway.example.com:8787", "gateway.example.com").unwrap();
        assert_eq!(slug.unwrap(), "acme");
    }

    #[test]
    fn extract_project_slug_rejects_foreign_host() {
        assert!(extract_project_slug("evil.com", "gateway.example.com").is_err());
    }

    #[test]
    fn extract_project_slug_rejects_invalid_label() {
        assert!(extract_project_slug("-bad-.gateway.example.com", "gateway.example.com").is_err());
    }

    #[test]
    fn extract_project_slug_rejects_label_shorter_than_three_chars() {
        assert!(extract_project_slug("ab.gateway.example.com", "gateway.example.com").is_err());
    }

    #[test]
    fn extract_project_slug_errors_surface_as_project_not_found() {
        let err = extract_project_slug("evil.com", "gateway.example.com").unwrap_err();
        assert!(matches!(err, AppError::ProjectNotFound { .. }));

        let err = extract_project_slug("-bad-.gateway.example.com", "gateway.example.com").unwrap_err();
        assert!(matches!(err, AppError::ProjectNotFound { .. }));
    }
}
