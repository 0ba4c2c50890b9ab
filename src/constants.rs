//! # Application Constants
//!
//! Centralizes binding names, protocol strings, and header names used
//! throughout the gateway so they stay consistent across modules.

/// R2 bucket binding name for the blob store.
pub const STORAGE_BUCKET_NAME: &str = "STORAGE_BUCKET";

/// KV binding holding `upload:{id}` metadata records.
pub const UPLOAD_METADATA_KV_NAME: &str = "UPLOAD_METADATA";

/// KV binding holding `expiration:{rfc1123}:{id}` index entries.
pub const UPLOAD_EXPIRATIONS_KV_NAME: &str = "UPLOAD_EXPIRATIONS";

/// tus resumable-upload protocol version this gateway implements.
pub const TUS_VERSION: &str = "1.0.0";

/// tus extensions advertised on OPTIONS responses.
pub const TUS_EXTENSIONS: &str =
    "creation, creation-with-upload, creation-defer-length, expiration, termination";

/// Small-object fast path threshold: chunks below this size on the final
/// PATCH of a fresh upload go through a single `put` instead of multipart.
pub const SMALL_OBJECT_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Bytes read from the head of a finalized object for MIME sniffing.
pub const MIME_SNIFF_WINDOW: usize = 8 * 1024;

/// Length of the opaque upload id generated at CREATE time.
pub const UPLOAD_ID_LEN: usize = 16;

/// Short-TTL bound on the in-process FileKey cache used by the download
/// gateway (seconds).
pub const FILE_KEY_CACHE_TTL_SECS: i64 = 60;

/// Cap on the in-process FileKey cache so a warm isolate can't grow it
/// unbounded across many distinct access keys.
pub const FILE_KEY_CACHE_CAPACITY: usize = 512;

/// Long-lived Cache-Control applied to successful downloads.
pub const DOWNLOAD_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Outbound call timeout for control-plane and blob-store RPCs (ms).
pub const OUTBOUND_TIMEOUT_MS: u32 = 15_000;

pub const HEADER_TUS_RESUMABLE: &str = "Tus-Resumable";
pub const HEADER_TUS_VERSION: &str = "Tus-Version";
pub const HEADER_TUS_EXTENSION: &str = "Tus-Extension";
pub const HEADER_TUS_MAX_SIZE: &str = "Tus-Max-Size";
pub const HEADER_UPLOAD_OFFSET: &str = "Upload-Offset";
pub const HEADER_UPLOAD_LENGTH: &str = "Upload-Length";
pub const HEADER_UPLOAD_DEFER_LENGTH: &str = "Upload-Defer-Length";
pub const HEADER_UPLOAD_EXPIRES: &str = "Upload-Expires";
pub const HEADER_UPLOAD_METADATA: &str = "Upload-Metadata";
pub const HEADER_METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";

/// CORS configuration for the client-facing surface (spec.md §6.1).
pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, HEAD, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Upload-Length, Upload-Offset, Upload-Metadata, Upload-Defer-Length, Tus-Resumable, X-HTTP-Method-Override, Authorization";
pub const CORS_EXPOSE_HEADERS: &str = "Upload-Offset, Upload-Length, Upload-Metadata, Upload-Defer-Length, Upload-Expires, Location, Tus-Resumable, Tus-Version, Tus-Extension, Tus-Max-Size, Content-Range, ETag, Accept-Ranges";
pub const CORS_MAX_AGE: &str = "86400";
