//! # Download Signature Verification
//!
//! Private-file downloads carry a short-lived HMAC signature this gateway
//! can verify without a round trip to the control-plane (spec.md §6.4).
//! Upload-side signatures are a separate, remotely-verified concern — see
//! `control_plane::verify_upload_signature`.

use crate::errors::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Builds the canonical string a download signature is computed over:
/// sorted `k=v` pairs joined by `&`. With only two keys, `accessKey` sorts
/// before `expiresAt` lexicographically, so the order below is fixed, not
/// incidental.
fn canonical_message(access_key: &str, expires_at: i64) -> String {
    format!("accessKey={access_key}&expiresAt={expires_at}")
}

/// Computes the hex-encoded signature for a download URL, used by tests
/// and by any internal issuance path that needs to mint one directly.
pub fn sign_download(secret: &str, access_key: &str, expires_at: i64) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InternalError {
        message: "signing secret has invalid length for HMAC-SHA256".to_string(),
    })?;
    mac.update(canonical_message(access_key, expires_at).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a download signature in constant time, rejecting it outright
/// if `expires_at` has already passed.
pub fn verify_download_signature(
    secret: &str,
    access_key: &str,
    expires_at: i64,
    now_unix: i64,
    signature_hex: &str,
) -> AppResult<()> {
    if expires_at < now_unix {
        return Err(AppError::SignatureInvalid {
            message: "signed URL has expired".to_string(),
        });
    }

    let signature = hex::decode(signature_hex).map_err(|_| AppError::SignatureInvalid {
        message: "signature is not valid hex".to_string(),
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InternalError {
        message: "signing secret has invalid length for HMAC-SHA256".to_string(),
    })?;
    mac.update(canonical_message(access_key, expires_at).as_bytes());

    mac.verify_slice(&signature).map_err(|_| AppError::SignatureInvalid {
        message: "signature does not match".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn verifies_a_signature_it_signed() {
        let sig = sign_download(SECRET, "ak_123", 1_000).unwrap();
        assert!(verify_download_signature(SECRET, "ak_123", 1_000, 500, &sig).is_ok());
    }

    #[test]
    fn rejects_expired_signature() {
        let sig = sign_download(SECRET, "ak_123", 1_000).unwrap();
        let err = verify_download_signature(SECRET, "ak_123", 1_000, 1_001, &sig).unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid { .. }));
    }

    #[test]
    fn rejects_tampered_access_key() {
        let sig = sign_download(SECRET, "ak_123", 1_000).unwrap();
        let err = verify_download_signature(SECRET, "ak_999", 1_000, 500, &sig).unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid { .. }));
    }

    #[test]
    fn rejects_malformed_hex() {
        let err = verify_download_signature(SECRET, "ak_123", 1_000, 500, "not-hex").unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid { .. }));
    }
}
