//! # Control-Plane Client
//!
//! Typed wrapper over the five internal RPCs the control-plane exposes
//! (spec.md §6.2), each authenticated with a Bearer token equal to
//! `CALLBACK_SECRET` and raced against a timeout so a slow collaborator
//! can't wedge a request indefinitely (spec.md §5).

use crate::errors::{AppError, AppResult};
use crate::models::{FileAccess, FileKey};
use futures::future::{select, Either};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;
use worker::{wasm_bindgen::JsValue, Delay, Fetch, Headers, Method, Request, RequestInit};

pub struct ControlPlaneClient {
    base_url: String,
    bearer_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignaturePayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub environment_id: String,
    pub file_key_id: String,
    pub access_key: String,
    pub file_name: String,
    pub size: Option<u64>,
    pub key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureResponse {
    pub valid: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub file_key_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub claimed_hash: Option<String>,
    #[serde(default)]
    pub claimed_mime_type: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLookup {
    pub id: String,
    pub default_file_access: FileAccess,
}

impl ControlPlaneClient {
    pub fn new(base_url: String, bearer_token: String) -> Self {
        Self { base_url, bearer_token }
    }

    /// Delegated upload-signature verification (spec.md §4.6). Any
    /// transport, timeout, or `valid: false` outcome surfaces uniformly as
    /// `SignatureInvalid` — the engine never learns *why* the control-plane
    /// rejected it, only that it did.
    pub async fn verify_signature(
        &self,
        key_id: &str,
        signature: &str,
        payload: VerifySignaturePayload,
    ) -> AppResult<VerifySignatureResponse> {
        let body = json!({
            "keyId": key_id,
            "signature": signature,
            "payload": payload,
        });

        let response: VerifySignatureResponse = self
            .post("/api/internal/verify-signature", &body)
            .await
            .map_err(|_| AppError::SignatureInvalid {
                message: "upload signature could not be verified".to_string(),
            })?;

        if !response.valid {
            return Err(AppError::SignatureInvalid {
                message: response
                    .error
                    .unwrap_or_else(|| "signature rejected".to_string()),
            });
        }

        Ok(response)
    }

    /// Completion/failure callback. Caller decides whether to await this
    /// or fire-and-forget; errors are always returned rather than swallowed
    /// here, so the finalizer can choose its own handling per spec.md §4.4.
    pub async fn callback(&self, kind: &str, data: Value) -> AppResult<()> {
        let body = json!({ "type": kind, "data": data });
        let _: Value = self.post("/api/internal/callback", &body).await?;
        Ok(())
    }

    pub async fn lookup_file_key(&self, access_key: &str, project_id: &str) -> AppResult<FileKey> {
        let body = json!({ "accessKey": access_key, "projectId": project_id });
        self.post("/api/internal/lookup-file-key", &body)
            .await
            .map_err(|_| AppError::FileNotFound {
                access_key: access_key.to_string(),
            })
    }

    /// Fire-and-forget download tracking (spec.md §4.5 step 7). Failures are
    /// logged by the caller and never propagate.
    pub async fn track_download(
        &self,
        project_id: &str,
        environment_id: &str,
        file_id: &str,
        bytes: u64,
    ) -> AppResult<()> {
        let body = json!({
            "projectId": project_id,
            "environmentId": environment_id,
            "fileId": file_id,
            "bytes": bytes,
        });
        let _: Value = self.post("/api/internal/track-download", &body).await?;
        Ok(())
    }

    pub async fn lookup_project_by_slug(&self, slug: &str) -> AppResult<ProjectLookup> {
        let body = json!({ "slug": slug });
        self.post("/api/internal/lookup-project-by-slug", &body)
            .await
            .map_err(|_| AppError::ProjectNotFound {
                slug: slug.to_string(),
            })
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &Value) -> AppResult<T> {
        let url = format!("{}{path}", self.base_url);

        let headers = Headers::new();
        headers.set("Content-Type", "application/json")?;
        headers.set("Authorization", &format!("Bearer {}", self.bearer_token))?;

        let mut init = RequestInit::new();
        init.with_method(Method::Post)
            .with_headers(headers)
            .with_body(Some(JsValue::from_str(&body.to_string())));

        let request = Request::new_with_init(&url, &init)?;

        let fetch = Box::pin(Fetch::Request(request).send());
        let timeout = Box::pin(Delay::from(std::time::Duration::from_millis(
            crate::constants::OUTBOUND_TIMEOUT_MS as u64,
        )));

        let fetch: Pin<Box<dyn std::future::Future<Output = worker::Result<worker::Response>>>> = fetch;
        let timeout: Pin<Box<dyn std::future::Future<Output = ()>>> = timeout;

        let mut response = match select(fetch, timeout).await {
            Either::Left((result, _)) => result?,
            Either::Right((_, _)) => {
                return Err(AppError::InternalError {
                    message: format!("control-plane call to {path} timed out"),
                })
            }
        };

        if response.status_code() >= 400 {
            return Err(AppError::InternalError {
                message: format!("control-plane returned {} for {path}", response.status_code()),
            });
        }

        response.json::<T>().await.map_err(AppError::from)
    }
}
