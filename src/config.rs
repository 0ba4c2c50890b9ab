//! # Configuration Management
//!
//! Every setting here comes from Worker environment bindings (spec.md
//! §6.5), not KV: all five variables are required at startup, and a
//! missing one is a hard failure rather than a default. This mirrors the
//! shape of loading config once and sharing it across a request, just
//! sourced from `env.var`/`env.secret` instead of a KV-stored JSON blob.

use crate::errors::{AppError, AppResult};
use worker::Env;

/// Gateway-wide configuration sourced from Worker environment bindings.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base domain; a request's `Host` label minus this suffix is the
    /// project slug.
    pub worker_domain: String,

    /// Base URL of the control-plane collaborator (no trailing slash).
    pub control_plane_url: String,

    /// Bearer token shared with the control-plane for internal RPCs.
    pub callback_secret: String,

    /// Shared HMAC secret used to verify locally-checkable download
    /// signatures.
    pub signing_secret: String,

    /// Maximum accepted declared upload size, in bytes.
    pub tus_max_size: u64,

    /// Upload session lifetime, in hours, from CREATE to `expiresAt`.
    pub tus_expiration_hours: i64,
}

impl Config {
    /// Loads configuration from environment bindings, failing hard if any
    /// required variable is absent or malformed.
    pub fn load(env: &Env) -> AppResult<Self> {
        let worker_domain = required_var(env, "WORKER_DOMAIN")?;
        let control_plane_url = required_var(env, "CONTROL_PLANE_URL")?
            .trim_end_matches('/')
            .to_string();
        let callback_secret = required_secret(env, "CALLBACK_SECRET")?;
        let signing_secret = required_secret(env, "SIGNING_SECRET")?;
        let tus_max_size = required_var(env, "TUS_MAX_SIZE")?
            .parse::<u64>()
            .map_err(|_| AppError::ConfigError {
                message: "TUS_MAX_SIZE must be a non-negative integer".to_string(),
            })?;
        let tus_expiration_hours = required_var(env, "TUS_EXPIRATION_HOURS")?
            .parse::<i64>()
            .map_err(|_| AppError::ConfigError {
                message: "TUS_EXPIRATION_HOURS must be an integer".to_string(),
            })?;

        Ok(Self {
            worker_domain,
            control_plane_url,
            callback_secret,
            signing_secret,
            tus_max_size,
            tus_expiration_hours,
        })
    }
}

fn required_var(env: &Env, name: &'static str) -> AppResult<String> {
    env.var(name)
        .map(|v| v.to_string())
        .map_err(|_| AppError::ConfigError {
            message: format!("Missing required environment variable: {name}"),
        })
}

fn required_secret(env: &Env, name: &'static str) -> AppResult<String> {
    env.secret(name)
        .map(|v| v.to_string())
        .map_err(|_| AppError::ConfigError {
            message: format!("Missing required secret binding: {name}"),
        })
}
