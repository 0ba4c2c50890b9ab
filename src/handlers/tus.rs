//! # tus Protocol Engine
//!
//! OPTIONS / CREATE / HEAD / PATCH / DELETE exactly per spec.md §4.2's
//! state machine, including the creation-with-upload and
//! creation-defer-length extensions.

use crate::blob::BlobStore;
use crate::constants::{
    HEADER_TUS_EXTENSION, HEADER_TUS_MAX_SIZE, HEADER_TUS_RESUMABLE, HEADER_UPLOAD_DEFER_LENGTH,
    HEADER_UPLOAD_EXPIRES, HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_METADATA, HEADER_UPLOAD_OFFSET,
    TUS_EXTENSIONS, TUS_VERSION,
};
use crate::context::AppContext;
use crate::control_plane::VerifySignaturePayload;
use crate::errors::{AppError, AppResult};
use crate::handlers::chunk::ingest_chunk;
use crate::handlers::finalize::finalize_upload;
use crate::middleware::ValidationMiddleware;
use crate::models::UploadMetadata;
use crate::utils::{
    expires_at_rfc1123, generate_adapter_key, generate_upload_id, now_rfc1123,
    parse_upload_metadata_header, query_params,
};
use serde_json::json;
use std::collections::HashMap;
use worker::{Request, Response, Result as WorkerResult};

fn base_tus_headers() -> worker::Headers {
    let headers = worker::Headers::new();
    let _ = headers.set(HEADER_TUS_RESUMABLE, TUS_VERSION);
    headers
}

pub fn handle_options(tus_max_size: u64) -> WorkerResult<Response> {
    let headers = base_tus_headers();
    let _ = headers.set(HEADER_TUS_EXTENSION, TUS_EXTENSIONS);
    let _ = headers.set(HEADER_TUS_MAX_SIZE, &tus_max_size.to_string());
    Ok(Response::empty()?.with_status(204).with_headers(headers))
}

fn required_query<'a>(params: &'a HashMap<String, String>, key: &str) -> AppResult<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| AppError::InvalidRequest {
            message: format!("missing required query parameter: {key}"),
        })
}

fn parse_non_negative(value: &str, field: &str) -> AppResult<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidRequest {
            message: format!("{field} must be a non-negative integer"),
        });
    }
    value.parse::<u64>().map_err(|_| AppError::InvalidRequest {
        message: format!("{field} is out of range"),
    })
}

pub async fn handle_create(
    ctx: &AppContext,
    mut req: Request,
    project_id: &str,
    default_file_access: crate::models::FileAccess,
) -> AppResult<Response> {
    ValidationMiddleware::validate_tus_version(&req)?;

    let headers = req.headers().clone();
    let defer_length = headers.get(HEADER_UPLOAD_DEFER_LENGTH)?.as_deref() == Some("1");
    let header_size = headers.get(HEADER_UPLOAD_LENGTH)?;

    if defer_length == header_size.is_some() {
        return Err(AppError::InvalidRequest {
            message: "exactly one of Upload-Length or Upload-Defer-Length is required".to_string(),
        });
    }

    let metadata_header = headers.get(HEADER_UPLOAD_METADATA)?;
    let upload_metadata = match metadata_header {
        Some(raw) => parse_upload_metadata_header(&raw)?,
        None => Default::default(),
    };

    let content_type = headers.get("Content-Type")?.unwrap_or_default();
    let content_length = match headers.get("Content-Length")? {
        Some(value) => parse_non_negative(&value, "Content-Length")?,
        None => 0,
    };
    let is_creation_with_upload =
        content_type == "application/offset+octet-stream" && content_length > 0;

    if !is_creation_with_upload && content_length > 0 {
        return Err(AppError::InvalidContentType {
            message: "non-empty body requires application/offset+octet-stream".to_string(),
        });
    }

    let params = query_params(&req)?;
    let key_id = required_query(&params, "keyId")?.to_string();
    let signature = required_query(&params, "sig")?.to_string();
    let signed_size = parse_non_negative(required_query(&params, "size")?, "size")?;
    let query_environment_id = required_query(&params, "environmentId")?.to_string();
    let file_key_id = required_query(&params, "fileKeyId")?.to_string();
    let access_key = required_query(&params, "accessKey")?.to_string();
    let file_name = required_query(&params, "fileName")?.to_string();
    let hash = params.get("hash").cloned();
    let mime_type = params.get("mimeType").cloned();
    let expires_at = params
        .get("expiresAt")
        .map(|v| v.parse::<i64>())
        .transpose()
        .map_err(|_| AppError::InvalidRequest {
            message: "expiresAt must be an integer".to_string(),
        })?;
    let is_public_hint = params
        .get("isPublic")
        .map(|v| v == "true" || v == "1");

    if let Some(declared) = header_size {
        let declared = parse_non_negative(&declared, "Upload-Length")?;
        if declared != signed_size {
            return Err(AppError::InvalidRequest {
                message: "Upload-Length does not match the signed size".to_string(),
            });
        }
    }

    let verification = ctx
        .control_plane
        .verify_signature(
            &key_id,
            &signature,
            VerifySignaturePayload {
                kind: "upload",
                environment_id: query_environment_id.clone(),
                file_key_id: file_key_id.clone(),
                access_key: access_key.clone(),
                file_name: file_name.clone(),
                size: Some(signed_size),
                key_id: key_id.clone(),
                hash: hash.clone(),
                mime_type: mime_type.clone(),
                expires_at,
                is_public: is_public_hint,
            },
        )
        .await?;

    let project_id = verification.project_id.unwrap_or_else(|| project_id.to_string());
    let environment_id = verification
        .environment_id
        .unwrap_or(query_environment_id);
    let declared_size = if defer_length { None } else { Some(signed_size) };

    // The signed `size` query param is required even for deferred uploads
    // (it's part of what the signature attests to), so it — not just the
    // `Upload-Length` header — is what the oversize check bounds.
    let size_to_check = verification.size.unwrap_or(signed_size);
    if size_to_check > ctx.config.tus_max_size {
        return Err(AppError::UploadTooLarge {
            size: size_to_check,
            max: ctx.config.tus_max_size,
        });
    }

    let upload_id = generate_upload_id();
    let adapter_key = generate_adapter_key(&project_id, &environment_id);
    // Resolution order (spec.md §3 "isPublic"): the client's query hint,
    // then the control-plane's resolved verdict, then the project default.
    let is_public = is_public_hint
        .or(verification.is_public)
        .unwrap_or_else(|| default_file_access.is_public());

    let mut metadata = UploadMetadata {
        upload_id: upload_id.clone(),
        project_id,
        environment_id,
        file_key_id: verification.file_key_id.unwrap_or(file_key_id),
        access_key,
        file_name: verification.file_name.unwrap_or(file_name),
        size: declared_size,
        offset: 0,
        adapter_key,
        multipart_upload_id: None,
        parts: vec![],
        is_public,
        claimed_hash: verification.claimed_hash.or(hash),
        claimed_mime_type: verification.claimed_mime_type.or(mime_type),
        claimed_size: declared_size,
        metadata: upload_metadata,
        created_at: now_rfc1123(),
        expires_at: expires_at_rfc1123(ctx.config.tus_expiration_hours),
    };

    let logger = ctx.logger.with_upload(&upload_id);

    if metadata.size == Some(0) {
        ctx.blob.put(&metadata.adapter_key, Vec::new()).await?;
        finalize_upload(ctx, &metadata, &logger).await?;
        return Ok(tus_response(201, &metadata, Some(&upload_id))?);
    }

    if is_creation_with_upload {
        let body = req.bytes().await?;
        validate_chunk_bounds(&metadata, body.len() as u64)?;
        let complete = ingest_chunk(ctx, &mut metadata, body).await?;
        if complete {
            finalize_upload(ctx, &metadata, &logger).await?;
        } else {
            ctx.metadata.put(&metadata).await?;
        }
    } else {
        ctx.metadata.put(&metadata).await?;
    }

    tus_response(201, &metadata, Some(&upload_id))
}

pub async fn handle_head(ctx: &AppContext, req: Request, upload_id: &str, project_id: &str) -> AppResult<Response> {
    ValidationMiddleware::validate_tus_version(&req)?;
    let metadata = load_owned_upload(ctx, upload_id, project_id).await?;

    let headers = base_tus_headers();
    let _ = headers.set(HEADER_UPLOAD_OFFSET, &metadata.offset.to_string());
    let _ = headers.set(HEADER_UPLOAD_EXPIRES, &metadata.expires_at);
    let _ = headers.set("Cache-Control", "no-store");

    match metadata.size {
        Some(size) => {
            let _ = headers.set(HEADER_UPLOAD_LENGTH, &size.to_string());
        }
        None => {
            let _ = headers.set(HEADER_UPLOAD_DEFER_LENGTH, "1");
        }
    }

    if !metadata.metadata.is_empty() {
        let _ = headers.set(
            HEADER_UPLOAD_METADATA,
            &crate::utils::encode_upload_metadata_header(&metadata.metadata),
        );
    }

    Ok(Response::empty()?.with_status(200).with_headers(headers))
}

pub async fn handle_patch(
    ctx: &AppContext,
    mut req: Request,
    upload_id: &str,
    project_id: &str,
) -> AppResult<Response> {
    ValidationMiddleware::validate_tus_version(&req)?;
    crate::middleware::ValidationMiddleware::validate_offset_content_type(&req)?;

    let mut metadata = load_owned_upload(ctx, upload_id, project_id).await?;

    let headers = req.headers().clone();
    let offset_header = headers
        .get(HEADER_UPLOAD_OFFSET)?
        .ok_or_else(|| AppError::InvalidRequest {
            message: "Upload-Offset header is required".to_string(),
        })?;
    let offset = parse_non_negative(&offset_header, HEADER_UPLOAD_OFFSET)?;

    if offset != metadata.offset {
        return Err(AppError::OffsetMismatch {
            expected: metadata.offset,
            received: offset,
        });
    }

    if let Some(length_header) = headers.get(HEADER_UPLOAD_LENGTH)? {
        let declared = parse_non_negative(&length_header, HEADER_UPLOAD_LENGTH)?;
        match metadata.size {
            None => metadata.size = Some(declared),
            Some(existing) if existing != declared => {
                return Err(AppError::InvalidRequest {
                    message: "Upload-Length may only be set once for a deferred upload".to_string(),
                })
            }
            _ => {}
        }
    }

    let content_length = match headers.get("Content-Length")? {
        Some(value) => parse_non_negative(&value, "Content-Length")?,
        None => 0,
    };

    if content_length == 0 {
        ctx.metadata.put(&metadata).await?;
        return tus_response(204, &metadata, None);
    }

    validate_chunk_bounds(&metadata, content_length)?;

    let logger = ctx.logger.with_upload(upload_id);
    let body = req.bytes().await?;
    let complete = ingest_chunk(ctx, &mut metadata, body).await?;

    if complete {
        finalize_upload(ctx, &metadata, &logger).await?;
    } else {
        ctx.metadata.put(&metadata).await?;
    }

    tus_response(204, &metadata, None)
}

pub async fn handle_delete(
    ctx: &AppContext,
    req: Request,
    upload_id: &str,
    project_id: &str,
) -> AppResult<Response> {
    ValidationMiddleware::validate_tus_version(&req)?;
    let metadata = load_owned_upload(ctx, upload_id, project_id).await?;
    let logger = ctx.logger.with_upload(upload_id);

    if let Some(multipart_upload_id) = &metadata.multipart_upload_id {
        if let Err(err) = ctx.blob.abort(&metadata.adapter_key, multipart_upload_id).await {
            logger.warn(
                "failed to abort multipart upload on DELETE",
                Some(json!({"error": err.to_string()})),
            );
        }
    }

    if let Err(err) = ctx.blob.delete(&metadata.adapter_key).await {
        logger.warn(
            "failed to delete blob on DELETE",
            Some(json!({"error": err.to_string()})),
        );
    }

    ctx.metadata.delete(&metadata).await?;

    Ok(Response::empty()?.with_status(204).with_headers(base_tus_headers()))
}

async fn load_owned_upload(ctx: &AppContext, upload_id: &str, project_id: &str) -> AppResult<UploadMetadata> {
    let metadata = ctx
        .metadata
        .get(upload_id)
        .await?
        .ok_or_else(|| AppError::UploadNotFound {
            upload_id: upload_id.to_string(),
        })?;

    if metadata.project_id != project_id {
        return Err(AppError::UploadNotFound {
            upload_id: upload_id.to_string(),
        });
    }

    let expires = crate::utils::parse_rfc1123(&metadata.expires_at)?;
    if expires.timestamp() < chrono::Utc::now().timestamp() {
        return Err(AppError::UploadExpired {
            upload_id: upload_id.to_string(),
        });
    }

    Ok(metadata)
}

fn validate_chunk_bounds(metadata: &UploadMetadata, chunk_len: u64) -> AppResult<()> {
    if let Some(size) = metadata.size {
        if metadata.offset + chunk_len > size {
            return Err(AppError::InvalidRequest {
                message: "offset + Content-Length exceeds declared Upload-Length".to_string(),
            });
        }
    }
    Ok(())
}

fn tus_response(status: u16, metadata: &UploadMetadata, location_id: Option<&str>) -> AppResult<Response> {
    let headers = base_tus_headers();
    let _ = headers.set(HEADER_UPLOAD_OFFSET, &metadata.offset.to_string());

    if !metadata.is_complete() {
        let _ = headers.set(HEADER_UPLOAD_EXPIRES, &metadata.expires_at);
    }

    if let Some(size) = metadata.size {
        let _ = headers.set(HEADER_UPLOAD_LENGTH, &size.to_string());
    }

    if let Some(id) = location_id {
        let _ = headers.set("Location", &format!("/ingest/tus/{id}"));
    }

    Ok(Response::empty()?.with_status(status).with_headers(headers))
}
