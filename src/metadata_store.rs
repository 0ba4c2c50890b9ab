//! # Metadata Store
//!
//! Thin wrapper over the two KV namespaces this gateway owns outright:
//! `upload:{id}` → `UploadMetadata` JSON, and `expiration:{rfc1123}:{id}`
//! → `id`, an enumerable TTL index kept in lockstep with the primary
//! record (spec.md §6.4). Nothing currently scans the expiration index,
//! but its presence/absence alongside the primary record is itself an
//! invariant this store maintains.

use crate::errors::AppResult;
use crate::models::UploadMetadata;
use crate::utils::parse_rfc1123;
use worker::{kv::KvStore, Env};

pub struct MetadataStore {
    uploads: KvStore,
    expirations: KvStore,
}

impl MetadataStore {
    pub fn new(env: &Env) -> AppResult<Self> {
        Ok(Self {
            uploads: env.kv(crate::constants::UPLOAD_METADATA_KV_NAME)?,
            expirations: env.kv(crate::constants::UPLOAD_EXPIRATIONS_KV_NAME)?,
        })
    }

    fn upload_key(upload_id: &str) -> String {
        format!("upload:{upload_id}")
    }

    fn expiration_key(expires_at: &str, upload_id: &str) -> String {
        format!("expiration:{expires_at}:{upload_id}")
    }

    pub async fn get(&self, upload_id: &str) -> AppResult<Option<UploadMetadata>> {
        let value = self.uploads.get(&Self::upload_key(upload_id)).text().await?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| {
                crate::errors::AppError::InternalError {
                    message: format!("corrupt upload metadata for {upload_id}: {e}"),
                }
            })?)),
            None => Ok(None),
        }
    }

    /// Persists the record and its expiration index entry, both with a TTL
    /// covering the record's remaining lifetime so an abandoned upload
    /// self-cleans even if DELETE is never called.
    pub async fn put(&self, metadata: &UploadMetadata) -> AppResult<()> {
        let ttl_seconds = remaining_ttl_seconds(&metadata.expires_at)?;
        let json = serde_json::to_string(metadata).map_err(|e| crate::errors::AppError::InternalError {
            message: format!("failed to serialize upload metadata: {e}"),
        })?;

        self.uploads
            .put(&Self::upload_key(&metadata.upload_id), json)?
            .expiration_ttl(ttl_seconds)
            .execute()
            .await?;

        self.expirations
            .put(
                &Self::expiration_key(&metadata.expires_at, &metadata.upload_id),
                metadata.upload_id.clone(),
            )?
            .expiration_ttl(ttl_seconds)
            .execute()
            .await?;

        Ok(())
    }

    /// Deletes both keys for an upload. Best-effort: callers (DELETE
    /// handler, finalizer) log and continue rather than fail the request
    /// when the blob store has already dropped its half of the state.
    pub async fn delete(&self, metadata: &UploadMetadata) -> AppResult<()> {
        self.uploads.delete(&Self::upload_key(&metadata.upload_id)).await?;
        self.expirations
            .delete(&Self::expiration_key(&metadata.expires_at, &metadata.upload_id))
            .await?;
        Ok(())
    }
}

/// KV requires a TTL of at least 60 seconds; an upload already past its
/// `expiresAt` (e.g. a PUT racing expiry) still gets the floor value
/// rather than failing the write.
fn remaining_ttl_seconds(expires_at: &str) -> AppResult<u64> {
    let expires = parse_rfc1123(expires_at)?;
    let remaining = expires.timestamp() - chrono::Utc::now().timestamp();
    Ok(remaining.max(60) as u64)
}
