//! # Finalizer
//!
//! Runs once a chunk's byte range makes `offset == size`: completes any
//! multipart upload, verifies the finished object's MIME type against the
//! claim, fires the completion callback, and tears down the upload's
//! metadata (spec.md §4.4).

use crate::blob::{BlobStore, ByteRange, PartResult};
use crate::constants::MIME_SNIFF_WINDOW;
use crate::context::AppContext;
use crate::errors::{AppError, AppResult};
use crate::logging::Logger;
use crate::mime;
use crate::models::UploadMetadata;
use serde_json::json;

/// Finalizes a completed upload. On any fatal step, runs best-effort
/// cleanup and returns the triggering error (spec.md §4.4's cleanup path).
/// `logger` is expected to already be tagged with the upload id.
pub async fn finalize_upload(ctx: &AppContext, metadata: &UploadMetadata, logger: &Logger) -> AppResult<()> {
    if let Err(err) = complete_multipart(ctx, metadata).await {
        cleanup(ctx, metadata, logger).await;
        return Err(err);
    }

    if let Err(err) = verify_mime(ctx, metadata).await {
        cleanup(ctx, metadata, logger).await;
        return Err(err);
    }

    let callback_result = ctx
        .control_plane
        .callback(
            "upload-completed",
            json!({
                "projectId": metadata.project_id,
                "environmentId": metadata.environment_id,
                "fileKeyId": metadata.file_key_id,
                "accessKey": metadata.access_key,
                "adapterKey": metadata.adapter_key,
                "size": metadata.offset,
                "hash": metadata.claimed_hash,
                "mimeType": metadata.claimed_mime_type,
            }),
        )
        .await;

    if let Err(err) = callback_result {
        cleanup(ctx, metadata, logger).await;
        return Err(err);
    }

    ctx.metadata.delete(metadata).await?;
    Ok(())
}

async fn complete_multipart(ctx: &AppContext, metadata: &UploadMetadata) -> AppResult<()> {
    let Some(multipart_upload_id) = &metadata.multipart_upload_id else {
        return Ok(());
    };

    let mut parts: Vec<PartResult> = metadata
        .parts
        .iter()
        .map(|p| PartResult {
            part_number: p.part_number,
            etag: p.etag.clone(),
        })
        .collect();
    parts.sort_by_key(|p| p.part_number);

    ctx.blob
        .complete(&metadata.adapter_key, multipart_upload_id, parts)
        .await
}

async fn verify_mime(ctx: &AppContext, metadata: &UploadMetadata) -> AppResult<()> {
    let Some(claimed) = &metadata.claimed_mime_type else {
        return Ok(());
    };

    let window = ctx
        .blob
        .get(
            &metadata.adapter_key,
            Some(ByteRange {
                offset: 0,
                length: Some(MIME_SNIFF_WINDOW as u64),
            }),
        )
        .await?;

    let detected = window
        .and_then(|result| mime::sniff(&result.body))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !mime::equivalent(claimed, &detected) {
        return Err(AppError::MimeTypeMismatch {
            claimed: claimed.clone(),
            detected,
        });
    }

    Ok(())
}

/// Best-effort teardown: failures here are logged, never propagated, per
/// spec.md §4.4's cleanup path.
async fn cleanup(ctx: &AppContext, metadata: &UploadMetadata, logger: &Logger) {
    if let Err(err) = ctx.blob.delete(&metadata.adapter_key).await {
        logger.warn(
            "failed to delete blob during finalize cleanup",
            Some(json!({"adapterKey": metadata.adapter_key, "error": err.to_string()})),
        );
    }

    if let Err(err) = ctx.metadata.delete(metadata).await {
        logger.warn(
            "failed to delete upload metadata during finalize cleanup",
            Some(json!({"error": err.to_string()})),
        );
    }
}
