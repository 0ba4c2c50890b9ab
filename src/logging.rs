//! # Structured Logging
//!
//! JSON lines emitted through `console_log!`/`console_warn!`/`console_error!`
//! so they show up intact in `wrangler tail` and the dashboard's Logs tab.
//! Each request gets one `Logger`, tagged with a request id and whatever
//! upload/project context becomes known as handling proceeds.

use chrono::Utc;
use serde_json::json;
use worker::*;

#[derive(Clone)]
pub struct Logger {
    request_id: String,
    upload_id: Option<String>,
    project_id: Option<String>,
}

impl Logger {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            upload_id: None,
            project_id: None,
        }
    }

    /// Returns a copy of this logger tagged with an upload id, for handlers
    /// that learn it partway through a request (e.g. after parsing CREATE).
    pub fn with_upload(&self, upload_id: &str) -> Self {
        let mut logger = self.clone();
        logger.upload_id = Some(upload_id.to_string());
        logger
    }

    /// Returns a copy of this logger tagged with a project id.
    pub fn with_project(&self, project_id: &str) -> Self {
        let mut logger = self.clone();
        logger.project_id = Some(project_id.to_string());
        logger
    }

    pub fn info(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("INFO", message, data);
    }

    pub fn warn(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("WARN", message, data);
    }

    pub fn error(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("ERROR", message, data);
    }

    fn log(&self, level: &str, message: &str, data: Option<serde_json::Value>) {
        let log_data = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "requestId": self.request_id,
            "uploadId": self.upload_id,
            "projectId": self.project_id,
            "message": message,
            "data": data,
        });

        match level {
            "INFO" => console_log!("{}", log_data.to_string()),
            "WARN" => console_warn!("{}", log_data.to_string()),
            "ERROR" => console_error!("{}", log_data.to_string()),
            _ => console_log!("{}", log_data.to_string()),
        }
    }
}
