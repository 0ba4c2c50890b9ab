//! # Blob Store
//!
//! `BlobStore` is the trait boundary spec.md §6.3 draws around R2: a fixed
//! capability surface (put / multipart / get / head / list / delete) that
//! the chunk pipeline and finalizer depend on abstractly, so tests can
//! substitute a fake. `R2BlobStore` is the one production implementation,
//! bound to the `STORAGE_BUCKET` binding. Grounded in the teacher's
//! `durable_object.rs`/`durable_objects/upload_tracker.rs`, the only places
//! in the pack that drive the real R2 multipart API end to end.

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use worker::{Data, Env, UploadedPart};

/// A single previously-uploaded part, as handed back to the caller to
/// accumulate in `UploadMetadata::parts` and later replayed into `complete`.
#[derive(Debug, Clone)]
pub struct PartResult {
    pub part_number: u16,
    pub etag: String,
}

/// An optional byte range for `get`, expressed as the wire model does:
/// an offset plus an optional length.
#[derive(Debug, Clone, Copy)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

pub struct GetResult {
    pub body: Vec<u8>,
    pub http_etag: String,
    pub size: u64,
}

pub struct HeadResult {
    pub size: u64,
    pub http_etag: String,
    pub custom_metadata: std::collections::HashMap<String, String>,
}

pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

pub struct ListResult {
    pub objects: Vec<ObjectSummary>,
    pub truncated: bool,
    pub cursor: Option<String>,
}

/// Capability surface over the blob store, object-safe so handlers can
/// hold `&dyn BlobStore` without generic fan-out (spec.md §6.3).
#[async_trait(?Send)]
pub trait BlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> AppResult<()>;
    async fn create_multipart_upload(&self, key: &str) -> AppResult<String>;
    async fn upload_part(
        &self,
        key: &str,
        multipart_upload_id: &str,
        part_number: u16,
        body: Vec<u8>,
    ) -> AppResult<PartResult>;
    async fn complete(
        &self,
        key: &str,
        multipart_upload_id: &str,
        parts: Vec<PartResult>,
    ) -> AppResult<()>;
    async fn abort(&self, key: &str, multipart_upload_id: &str) -> AppResult<()>;
    async fn get(&self, key: &str, range: Option<ByteRange>) -> AppResult<Option<GetResult>>;
    async fn head(&self, key: &str) -> AppResult<Option<HeadResult>>;
    async fn list(&self, prefix: &str, limit: Option<u32>, cursor: Option<&str>) -> AppResult<ListResult>;
    async fn delete(&self, key: &str) -> AppResult<()>;
}

pub struct R2BlobStore {
    bucket: worker::Bucket,
}

impl R2BlobStore {
    pub fn new(env: &Env) -> AppResult<Self> {
        Ok(Self {
            bucket: env.bucket(crate::constants::STORAGE_BUCKET_NAME)?,
        })
    }
}

#[async_trait(?Send)]
impl BlobStore for R2BlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> AppResult<()> {
        self.bucket.put(key, Data::Bytes(body)).execute().await?;
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> AppResult<String> {
        let upload = self.bucket.create_multipart_upload(key).execute().await?;
        Ok(upload.upload_id().await.to_string())
    }

    async fn upload_part(
        &self,
        key: &str,
        multipart_upload_id: &str,
        part_number: u16,
        body: Vec<u8>,
    ) -> AppResult<PartResult> {
        let upload = self
            .bucket
            .resume_multipart_upload(key, multipart_upload_id)?;
        let part = upload.upload_part(part_number, Data::Bytes(body)).await?;
        Ok(PartResult {
            part_number: part.part_number(),
            etag: part.etag(),
        })
    }

    async fn complete(
        &self,
        key: &str,
        multipart_upload_id: &str,
        parts: Vec<PartResult>,
    ) -> AppResult<()> {
        let upload = self
            .bucket
            .resume_multipart_upload(key, multipart_upload_id)?;
        let uploaded_parts: Vec<UploadedPart> = parts
            .into_iter()
            .map(|p| UploadedPart::new(p.part_number, p.etag))
            .collect();
        upload.complete(uploaded_parts).await?;
        Ok(())
    }

    async fn abort(&self, key: &str, multipart_upload_id: &str) -> AppResult<()> {
        let upload = self
            .bucket
            .resume_multipart_upload(key, multipart_upload_id)?;
        upload.abort().await?;
        Ok(())
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> AppResult<Option<GetResult>> {
        let mut builder = self.bucket.get(key);
        if let Some(range) = range {
            builder = builder.range(worker::Range {
                offset: Some(range.offset),
                length: range.length,
                suffix: None,
            });
        }

        let object = match builder.execute().await? {
            Some(object) => object,
            None => return Ok(None),
        };

        let size = object.size() as u64;
        let http_etag = object.http_etag();
        let body = match object.body() {
            Some(body) => body.bytes().await?,
            None => Vec::new(),
        };

        Ok(Some(GetResult { body, http_etag, size }))
    }

    async fn head(&self, key: &str) -> AppResult<Option<HeadResult>> {
        let object = match self.bucket.head(key).await? {
            Some(object) => object,
            None => return Ok(None),
        };

        Ok(Some(HeadResult {
            size: object.size() as u64,
            http_etag: object.http_etag(),
            custom_metadata: object.custom_metadata()?,
        }))
    }

    async fn list(&self, prefix: &str, limit: Option<u32>, cursor: Option<&str>) -> AppResult<ListResult> {
        let mut builder = self.bucket.list().prefix(prefix.to_string());
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if let Some(cursor) = cursor {
            builder = builder.cursor(cursor.to_string());
        }

        let objects = builder.execute().await?;
        Ok(ListResult {
            objects: objects
                .objects()
                .into_iter()
                .map(|o| ObjectSummary {
                    key: o.key(),
                    size: o.size() as u64,
                })
                .collect(),
            truncated: objects.truncated(),
            cursor: objects.cursor(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.bucket.delete(key).await.map_err(AppError::from)
    }
}
