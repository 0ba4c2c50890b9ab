//! # Chunk Pipeline
//!
//! Takes one PATCH/creation-with-upload body and lands it in the blob
//! store, choosing between a single-shot `put` and an R2 multipart part
//! upload (spec.md §4.3).

use crate::blob::{BlobStore, PartResult};
use crate::constants::SMALL_OBJECT_THRESHOLD;
use crate::context::AppContext;
use crate::errors::AppResult;
use crate::models::{UploadMetadata, UploadPart};

/// Whether a chunk of `chunk_len` bytes landing at `offset` and completing
/// the upload (`is_last_chunk`) should take the single-shot `put` path
/// instead of R2 multipart (spec.md §4.3): small, first, and final at once.
fn use_fast_path(chunk_len: u64, offset: u64, is_last_chunk: bool) -> bool {
    chunk_len < SMALL_OBJECT_THRESHOLD && is_last_chunk && offset == 0
}

/// Ingests `body` into the blob store and advances `metadata.offset`/
/// `metadata.parts` in place. Returns whether the upload is now complete.
pub async fn ingest_chunk(
    ctx: &AppContext,
    metadata: &mut UploadMetadata,
    body: Vec<u8>,
) -> AppResult<bool> {
    let chunk_len = body.len() as u64;
    let is_last_chunk = metadata
        .size
        .map(|size| metadata.offset + chunk_len >= size)
        .unwrap_or(false);

    if use_fast_path(chunk_len, metadata.offset, is_last_chunk) {
        ctx.blob.put(&metadata.adapter_key, body).await?;
    } else {
        let multipart_upload_id = match metadata.multipart_upload_id.clone() {
            Some(id) => id,
            None => {
                let id = ctx.blob.create_multipart_upload(&metadata.adapter_key).await?;
                metadata.multipart_upload_id = Some(id.clone());
                id
            }
        };

        // Part numbers are densely assigned from how many parts exist
        // already, not derived from offset — chunk sizes may vary.
        let part_number = metadata.parts.len() as u16 + 1;
        let PartResult { part_number, etag } = ctx
            .blob
            .upload_part(&metadata.adapter_key, &multipart_upload_id, part_number, body)
            .await?;
        metadata.parts.push(UploadPart { part_number, etag });
    }

    metadata.offset += chunk_len;
    Ok(metadata.is_complete())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata(size: Option<u64>, offset: u64) -> UploadMetadata {
        UploadMetadata {
            upload_id: "0123456789abcdef".to_string(),
            project_id: "proj".to_string(),
            environment_id: "env".to_string(),
            file_key_id: "fk".to_string(),
            access_key: "ak".to_string(),
            file_name: "f.bin".to_string(),
            size,
            offset,
            adapter_key: "proj/env/uuid".to_string(),
            multipart_upload_id: None,
            parts: vec![],
            is_public: false,
            claimed_hash: None,
            claimed_mime_type: None,
            claimed_size: None,
            metadata: Default::default(),
            created_at: "Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
            expires_at: "Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
        }
    }

    #[test]
    fn small_object_fast_path_conditions() {
        // Small, first, and final chunk together trigger the `put` path.
        assert!(use_fast_path(10, 0, true));
    }

    #[test]
    fn non_final_chunk_does_not_take_fast_path() {
        assert!(!use_fast_path(10, 0, false));
    }

    #[test]
    fn non_first_chunk_does_not_take_fast_path() {
        // Even a small, final chunk must go through multipart once a prior
        // chunk already moved the offset off zero.
        assert!(!use_fast_path(10, 90, true));
    }

    #[test]
    fn oversized_chunk_does_not_take_fast_path() {
        assert!(!use_fast_path(SMALL_OBJECT_THRESHOLD, 0, true));
    }

    #[test]
    fn sample_metadata_offset_feeds_fast_path_decision() {
        let metadata = sample_metadata(Some(10), 0);
        let chunk_len = 10u64;
        let is_last_chunk = metadata
            .size
            .map(|s| metadata.offset + chunk_len >= s)
            .unwrap_or(false);
        assert!(use_fast_path(chunk_len, metadata.offset, is_last_chunk));
    }
}
