//! # Edge Ingestion Gateway
//!
//! A Cloudflare Workers service that accepts large file uploads through a
//! resumable, tus-inspired chunked-upload protocol, persists the assembled
//! objects into R2, and mediates authenticated downloads. See `SPEC_FULL.md`
//! for the full module breakdown.
//!
//! ## Architecture
//!
//! - **Router**: resolves the request's project subdomain and dispatches
//!   by method/path
//! - **tus protocol engine**: OPTIONS/CREATE/HEAD/PATCH/DELETE state
//!   machine for in-flight uploads
//! - **Chunk pipeline / finalizer**: lands bytes in R2 and verifies the
//!   finished object
//! - **Download gateway**: signed, range-aware, cache-friendly downloads
//! - **Control-plane client**: the one source of truth for projects,
//!   file keys, and upload-signature verification

use std::sync::{Arc, OnceLock};
use worker::*;

mod blob;
mod config;
mod constants;
mod context;
mod control_plane;
mod errors;
mod file_key_cache;
mod handlers;
mod logging;
mod metadata_store;
mod middleware;
mod mime;
mod models;
mod range;
mod router;
mod signing;
mod utils;

use config::Config;
use logging::Logger;
use utils::generate_request_id;

static CONFIG_CACHE: OnceLock<Arc<Config>> = OnceLock::new();

#[event(fetch)]
pub async fn main(req: Request, env: Env, worker_ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    let logger = Logger::new(generate_request_id());

    let config = match load_config(&env) {
        Ok(config) => config,
        Err(err) => {
            logger.error("configuration failed to load", Some(serde_json::json!({"error": err.to_string()})));
            return err.to_response();
        }
    };

    router::handle_request(req, env, worker_ctx, config, logger).await
}

fn load_config(env: &Env) -> errors::AppResult<Arc<Config>> {
    if let Some(config) = CONFIG_CACHE.get() {
        return Ok(config.clone());
    }

    let config = Arc::new(Config::load(env)?);
    let _ = CONFIG_CACHE.set(config.clone());
    Ok(config)
}
