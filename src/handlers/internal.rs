//! # Internal Callback Endpoints
//!
//! The operator surface exposed only on the main (non-subdomain) host
//! (spec.md §4.7): thin, bearer-gated proxies onto [`crate::blob`]. Bearer
//! validation happens in the router before these are reached.

use crate::blob::BlobStore;
use crate::context::AppContext;
use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use serde_json::json;
use worker::{Request, Response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest {
    prefix: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
}

pub async fn handle_delete(ctx: &AppContext, adapter_key: &str) -> AppResult<Response> {
    ctx.blob.delete(adapter_key).await?;
    Ok(Response::empty()?.with_status(204))
}

pub async fn handle_list(ctx: &AppContext, mut req: Request) -> AppResult<Response> {
    let body: ListRequest = req.json().await.map_err(|_| AppError::InvalidRequest {
        message: "expected JSON body with a prefix field".to_string(),
    })?;

    let result = ctx
        .blob
        .list(&body.prefix, body.limit, body.cursor.as_deref())
        .await?;

    Ok(Response::from_json(&json!({
        "objects": result.objects.iter().map(|o| json!({"key": o.key, "size": o.size})).collect::<Vec<_>>(),
        "truncated": result.truncated,
        "cursor": result.cursor,
    }))?)
}

pub async fn handle_get_metadata(ctx: &AppContext, adapter_key: &str) -> AppResult<Response> {
    let head = ctx.blob.head(adapter_key).await?.ok_or_else(|| AppError::FileNotFound {
        access_key: adapter_key.to_string(),
    })?;

    Ok(Response::from_json(&json!({
        "size": head.size,
        "etag": head.http_etag,
        "customMetadata": head.custom_metadata,
    }))?)
}
