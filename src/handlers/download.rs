//! # Download Gateway
//!
//! `GET /f/{accessKey}` (spec.md §4.5): resolve the access key to a
//! `FileKey` through the control-plane (behind the short-TTL
//! [`crate::file_key_cache`]), enforce the public/private policy, honor
//! `If-None-Match` and `Range`, and stream the object back.

use crate::blob::{BlobStore, ByteRange as BlobByteRange};
use crate::constants::DOWNLOAD_CACHE_CONTROL;
use crate::context::AppContext;
use crate::errors::{AppError, AppResult};
use crate::range::parse_range_header;
use crate::signing::verify_download_signature;
use crate::utils::{now_unix, query_params};
use worker::{Headers, Request, Response};

pub async fn handle_download(
    ctx: &AppContext,
    req: Request,
    access_key: &str,
    project_id: &str,
    worker_ctx: &worker::Context,
) -> AppResult<Response> {
    let params = query_params(&req)?;
    let now = now_unix();

    // Fail fast on an already-expired signature before touching any
    // collaborator (spec.md §4.5 step 1, §8 testable property).
    let expires_at: Option<i64> = params
        .get("expiresAt")
        .map(|v| v.parse::<i64>())
        .transpose()
        .map_err(|_| AppError::InvalidRequest {
            message: "expiresAt must be an integer".to_string(),
        })?;

    if let Some(expires_at) = expires_at {
        if expires_at < now {
            return Err(AppError::SignatureInvalid {
                message: "signed URL has expired".to_string(),
            });
        }
    }

    let file_key = resolve_file_key(ctx, access_key, project_id, now).await?;

    if !file_key.is_public {
        let sig = params.get("sig").ok_or_else(|| AppError::SignatureInvalid {
            message: "private file requires sig and expiresAt".to_string(),
        })?;
        let expires_at = expires_at.ok_or_else(|| AppError::SignatureInvalid {
            message: "private file requires sig and expiresAt".to_string(),
        })?;
        verify_download_signature(&ctx.config.signing_secret, access_key, expires_at, now, sig)?;
    }

    let file = file_key.file.as_ref().ok_or_else(|| AppError::FileNotFound {
        access_key: access_key.to_string(),
    })?;

    let etag = file
        .hash
        .clone()
        .unwrap_or_else(|| format!("\"{}\"", file.id));

    if let Some(if_none_match) = req.headers().get("If-None-Match")?.flatten() {
        if if_none_match == etag {
            let headers = Headers::new();
            let _ = headers.set("ETag", &etag);
            let _ = headers.set("Cache-Control", DOWNLOAD_CACHE_CONTROL);
            return Ok(Response::empty()?.with_status(304).with_headers(headers));
        }
    }

    let range_header = req.headers().get("Range")?;
    let parsed_range = range_header
        .as_deref()
        .and_then(|header| parse_range_header(header, file.size));

    let (status, content_range, get_range) = match parsed_range {
        Some(range) => (
            206,
            Some(format!("bytes {}-{}/{}", range.start, range.end, file.size)),
            Some(BlobByteRange {
                offset: range.start,
                length: Some(range.len()),
            }),
        ),
        None => (200, None, None),
    };

    let object = ctx
        .blob
        .get(&file.adapter_key, get_range)
        .await?
        .ok_or_else(|| AppError::FileNotFound {
            access_key: access_key.to_string(),
        })?;

    let content_length = object.body.len() as u64;
    let file_name = params.get("fileName").cloned().unwrap_or_else(|| file_key.file_name.clone());

    let headers = Headers::new();
    let _ = headers.set("Content-Type", &file.mime_type);
    let _ = headers.set("Content-Length", &content_length.to_string());
    let _ = headers.set(
        "Content-Disposition",
        &format!("inline; filename=\"{file_name}\""),
    );
    let _ = headers.set("Cache-Control", DOWNLOAD_CACHE_CONTROL);
    let _ = headers.set("ETag", &etag);
    let _ = headers.set("Accept-Ranges", "bytes");
    if let Some(content_range) = content_range {
        let _ = headers.set("Content-Range", &content_range);
    }

    let response = Response::from_bytes(object.body)?
        .with_status(status)
        .with_headers(headers);

    track_download_fire_and_forget(ctx, worker_ctx, project_id, &file_key, content_length);

    Ok(response)
}

async fn resolve_file_key(
    ctx: &AppContext,
    access_key: &str,
    project_id: &str,
    now: i64,
) -> AppResult<crate::models::FileKey> {
    if let Some(cached) = ctx.file_key_cache.get(project_id, access_key, now) {
        return Ok(cached);
    }

    let file_key = ctx.control_plane.lookup_file_key(access_key, project_id).await?;
    ctx.file_key_cache
        .insert(project_id, access_key, file_key.clone(), now);
    Ok(file_key)
}

/// Enqueues the download-tracking callback via `wait_until` so it runs
/// after the response is already on the wire, per spec.md §4.5 step 7 and
/// §5's "MUST NOT block the response" rule. Failures are logged, never
/// surfaced — the download already succeeded.
fn track_download_fire_and_forget(
    ctx: &AppContext,
    worker_ctx: &worker::Context,
    project_id: &str,
    file_key: &crate::models::FileKey,
    bytes: u64,
) {
    let control_plane_url = ctx.config.control_plane_url.clone();
    let callback_secret = ctx.config.callback_secret.clone();
    let project_id = project_id.to_string();
    let environment_id = file_key.environment_id.clone();
    let file_id = file_key.file.as_ref().map(|f| f.id.clone()).unwrap_or_default();
    let logger = ctx.logger.clone();

    worker_ctx.wait_until(async move {
        let client = crate::control_plane::ControlPlaneClient::new(control_plane_url, callback_secret);
        if let Err(err) = client
            .track_download(&project_id, &environment_id, &file_id, bytes)
            .await
        {
            logger.warn(
                "download-tracking callback failed",
                Some(serde_json::json!({"error": err.to_string()})),
            );
        }
    });
}
