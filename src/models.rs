//! # Data Models
//!
//! Types crossing the wire to/from the control-plane and the ones owned
//! outright by this gateway (spec.md §3). Control-plane-authoritative
//! types (`Project`, `FileKey`) are read-through only — this crate never
//! persists them. `UploadMetadata` is the one record this gateway owns,
//! stored in the `upload:{id}` KV namespace.

use serde::{Deserialize, Serialize};

/// Access policy resolved for a project or file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAccess {
    Public,
    Private,
}

impl FileAccess {
    pub fn is_public(self) -> bool {
        matches!(self, FileAccess::Public)
    }
}

/// Project record, authoritative in the control-plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub default_file_access: FileAccess,
}

/// The completed file object nested inside a `FileKey` once upload has
/// finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub hash: Option<String>,
    pub mime_type: String,
    pub size: u64,
    pub adapter_key: String,
}

/// FileKey record, authoritative in the control-plane; the public
/// identifier used in download URLs is `access_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKey {
    pub id: String,
    pub file_name: String,
    pub access_key: String,
    pub project_id: String,
    pub environment_id: String,
    pub is_public: bool,
    #[serde(default)]
    pub file: Option<FileObject>,
}

/// A single uploaded part, 1-based and densely numbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPart {
    pub part_number: u16,
    pub etag: String,
}

/// Full metadata for an in-flight upload session, owned exclusively by
/// this gateway (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub upload_id: String,
    pub project_id: String,
    pub environment_id: String,
    pub file_key_id: String,
    pub access_key: String,
    pub file_name: String,

    /// Declared total length, or `None` if deferred (`Upload-Defer-Length`).
    pub size: Option<u64>,

    /// Bytes acknowledged into the blob store so far.
    pub offset: u64,

    /// Final blob-store key: `{projectId}/{environmentId}/{uuid}`.
    pub adapter_key: String,

    /// Blob-store multipart handle, set the first time a part is uploaded.
    #[serde(default)]
    pub multipart_upload_id: Option<String>,

    /// Ordered, densely 1-based uploaded parts.
    #[serde(default)]
    pub parts: Vec<UploadPart>,

    pub is_public: bool,

    #[serde(default)]
    pub claimed_hash: Option<String>,
    #[serde(default)]
    pub claimed_mime_type: Option<String>,
    #[serde(default)]
    pub claimed_size: Option<u64>,

    /// User-supplied key/value pairs from `Upload-Metadata`, already
    /// sanitized (CR/LF/NUL stripped) at store time.
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, String>,

    /// RFC 1123 ("imf-fixdate") timestamps.
    pub created_at: String,
    pub expires_at: String,
}

impl UploadMetadata {
    /// `parts` empty iff `multipart_upload_id` is null — spec.md §3, §8.
    pub fn multipart_invariant_holds(&self) -> bool {
        self.parts.is_empty() == self.multipart_upload_id.is_none()
    }

    /// Whether the declared size has been fully received.
    pub fn is_complete(&self) -> bool {
        matches!(self.size, Some(size) if self.offset >= size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(parts: Vec<UploadPart>, multipart_upload_id: Option<&str>) -> UploadMetadata {
        UploadMetadata {
            upload_id: "0123456789abcdef".to_string(),
            project_id: "proj".to_string(),
            environment_id: "env".to_string(),
            file_key_id: "fk".to_string(),
            access_key: "ak".to_string(),
            file_name: "f.bin".to_string(),
            size: Some(10),
            offset: 0,
            adapter_key: "proj/env/uuid".to_string(),
            multipart_upload_id: multipart_upload_id.map(str::to_string),
            parts,
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
    fn multipart_invariant_holds_when_both_empty() {
        assert!(sample(vec![], None).multipart_invariant_holds());
    }

    #[test]
    fn multipart_invariant_holds_when_both_present() {
        let parts = vec![UploadPart {
            part_number: 1,
            etag: "e1".to_string(),
        }];
        assert!(sample(parts, Some("mp-1")).multipart_invariant_holds());
    }

    #[test]
    fn multipart_invariant_violated_when_mismatched() {
        let parts = vec![UploadPart {
            part_number: 1,
            etag: "e1".to_string(),
        }];
        assert!(!sample(parts, None).multipart_invariant_holds());
    }

    #[test]
    fn is_complete_true_when_offset_reaches_size() {
        let mut m = sample(vec![], None);
        m.offset = 10;
        assert!(m.is_complete());
    }

    #[test]
    fn is_complete_false_when_size_deferred() {
        let mut m = sample(vec![], None);
        m.size = None;
        m.offset = 10;
        assert!(!m.is_complete());
    }
}
