//! # Request Context
//!
//! Bundles the collaborators every handler needs — config, the blob store,
//! the metadata store, and the control-plane client — so the router builds
//! them once per request and passes a single reference through, the same
//! way the teacher threads its `Arc<Config>` end to end.

use crate::blob::{BlobStore, R2BlobStore};
use crate::config::Config;
use crate::control_plane::ControlPlaneClient;
use crate::errors::AppResult;
use crate::file_key_cache::FileKeyCache;
use crate::logging::Logger;
use crate::metadata_store::MetadataStore;
use std::sync::{Arc, OnceLock};
use worker::Env;

/// The download gateway's FileKey lookaside lives here rather than on
/// `AppContext`: it must survive across requests handled by the same warm
/// isolate, while `AppContext` is rebuilt fresh per request.
static FILE_KEY_CACHE: OnceLock<FileKeyCache> = OnceLock::new();

pub struct AppContext {
    pub config: Arc<Config>,
    pub blob: R2BlobStore,
    pub metadata: MetadataStore,
    pub control_plane: ControlPlaneClient,
    pub logger: Logger,
    pub file_key_cache: &'static FileKeyCache,
}

impl AppContext {
    pub fn build(env: &Env, config: Arc<Config>, logger: Logger) -> AppResult<Self> {
        let control_plane = ControlPlaneClient::new(
            config.control_plane_url.clone(),
            config.callback_secret.clone(),
        );

        Ok(Self {
            blob: R2BlobStore::new(env)?,
            metadata: MetadataStore::new(env)?,
            control_plane,
            logger,
            file_key_cache: FILE_KEY_CACHE.get_or_init(FileKeyCache::new),
            config,
        })
    }
}
