//! # Host Router and Request Dispatch
//!
//! Parses the `Host` header to resolve "main domain" vs. a project
//! subdomain (spec.md §4.1), resolves the project through the
//! control-plane for everything that isn't CORS/health/internal, and
//! dispatches to the tus protocol engine, the download gateway, or the
//! internal operator endpoints (spec.md §6.1).

use crate::config::Config;
use crate::context::AppContext;
use crate::errors::{AppError, AppResult};
use crate::handlers::{download, internal, tus};
use crate::logging::Logger;
use crate::middleware::{CorsMiddleware, ValidationMiddleware};
use crate::utils::extract_project_slug;
use std::sync::Arc;
use worker::*;

pub async fn handle_request(
    req: Request,
    env: Env,
    worker_ctx: Context,
    config: Arc<Config>,
    logger: Logger,
) -> Result<Response> {
    let method = ValidationMiddleware::effective_method(&req);
    let url = req.url()?;
    let path = url.path().to_string();
    let host = req
        .headers()
        .get("Host")
        .ok()
        .flatten()
        .unwrap_or_default();

    let result = route(req, &env, &worker_ctx, config, logger, &host, &path, method).await;

    match result {
        Ok(response) => Ok(CorsMiddleware::apply_headers(response)),
        Err(err) => {
            let response = err.to_response()?;
            Ok(CorsMiddleware::apply_headers(response))
        }
    }
}

async fn route(
    req: Request,
    env: &Env,
    worker_ctx: &Context,
    config: Arc<Config>,
    logger: Logger,
    host: &str,
    path: &str,
    method: Method,
) -> AppResult<Response> {
    if method == Method::Options {
        return handle_preflight(path, config.tus_max_size);
    }

    if method == Method::Get && path == "/health" {
        return health_response();
    }

    let slug = extract_project_slug(host, &config.worker_domain)?;

    match slug {
        None => route_main_domain(req, env, config, logger, path, method).await,
        Some(slug) => {
            route_project(req, env, worker_ctx, config, logger, &slug, path, method).await
        }
    }
}

fn handle_preflight(path: &str, tus_max_size: u64) -> AppResult<Response> {
    if path == "/ingest/tus" || path.starts_with("/ingest/tus/") {
        return Ok(tus::handle_options(tus_max_size)?);
    }
    Ok(CorsMiddleware::handle_preflight()?)
}

fn health_response() -> AppResult<Response> {
    Ok(Response::from_json(&serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))?)
}

async fn route_main_domain(
    req: Request,
    env: &Env,
    config: Arc<Config>,
    logger: Logger,
    path: &str,
    method: Method,
) -> AppResult<Response> {
    if let Some(rest) = path.strip_prefix("/internal/") {
        require_internal_bearer(&req, &config)?;
        let ctx = AppContext::build(env, config, logger)?;
        return route_internal(&ctx, req, rest, method).await;
    }

    Err(AppError::ProjectNotFound {
        slug: String::new(),
    })
}

fn require_internal_bearer(req: &Request, config: &Config) -> AppResult<()> {
    let header = req
        .headers()
        .get("Authorization")
        .ok()
        .flatten()
        .unwrap_or_default();

    let expected = format!("Bearer {}", config.callback_secret);
    if header != expected {
        return Err(AppError::Unauthorized {
            message: "missing or invalid internal bearer token".to_string(),
        });
    }
    Ok(())
}

async fn route_internal(ctx: &AppContext, req: Request, rest: &str, method: Method) -> AppResult<Response> {
    if let Some(adapter_key) = rest.strip_prefix("delete/") {
        if method != Method::Delete {
            return Err(AppError::InvalidRequest {
                message: "expected DELETE".to_string(),
            });
        }
        return internal::handle_delete(ctx, adapter_key).await;
    }

    if rest == "list" {
        if method != Method::Post {
            return Err(AppError::InvalidRequest {
                message: "expected POST".to_string(),
            });
        }
        return internal::handle_list(ctx, req).await;
    }

    if let Some(adapter_key) = rest.strip_prefix("get-metadata/") {
        if method != Method::Post {
            return Err(AppError::InvalidRequest {
                message: "expected POST".to_string(),
            });
        }
        return internal::handle_get_metadata(ctx, adapter_key).await;
    }

    Err(AppError::ProjectNotFound {
        slug: String::new(),
    })
}

async fn route_project(
    req: Request,
    env: &Env,
    worker_ctx: &Context,
    config: Arc<Config>,
    logger: Logger,
    slug: &str,
    path: &str,
    method: Method,
) -> AppResult<Response> {
    let logger = logger.with_project(slug);
    let ctx = AppContext::build(env, config, logger)?;

    let project = ctx.control_plane.lookup_project_by_slug(slug).await?;
    let project_id = project.id;

    if path == "/ingest/tus" {
        return match method {
            Method::Post => {
                tus::handle_create(&ctx, req, &project_id, project.default_file_access).await
            }
            _ => Err(AppError::InvalidRequest {
                message: format!("method {method:?} not supported on /ingest/tus"),
            }),
        };
    }

    if let Some(upload_id) = path.strip_prefix("/ingest/tus/") {
        return match method {
            Method::Head => tus::handle_head(&ctx, req, upload_id, &project_id).await,
            Method::Patch => tus::handle_patch(&ctx, req, upload_id, &project_id).await,
            Method::Delete => tus::handle_delete(&ctx, req, upload_id, &project_id).await,
            _ => Err(AppError::InvalidRequest {
                message: format!("method {method:?} not supported on /ingest/tus/{{id}}"),
            }),
        };
    }

    if let Some(access_key) = path.strip_prefix("/f/") {
        if method != Method::Get {
            return Err(AppError::InvalidRequest {
                message: format!("method {method:?} not supported on /f/{{accessKey}}"),
            });
        }
        return download::handle_download(&ctx, req, access_key, &project_id, worker_ctx).await;
    }

    Err(AppError::ProjectNotFound {
        slug: slug.to_string(),
    })
}
