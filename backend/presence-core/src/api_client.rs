// src/api_client.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::models::{
    Employee, LoginRequest, LoginResponse, Producer, Scan, SegmentListResponse, Shift,
};
use crate::poller::PresenceSource;
use crate::session::{Role, Scope, Session, UserInfo};

pub const LOGIN_ENDPOINT: &str = "/api/auth/login";
pub const EMPLOYEES_ENDPOINT: &str = "/api/employees";
pub const SCANS_ENDPOINT: &str = "/api/mqtt/scans";
pub const SEGMENTS_ENDPOINT: &str = "/api/segments";
pub const SHIFTS_ENDPOINT: &str = "/api/employees/shifts";
pub const PRODUCERS_ENDPOINT: &str = "/api/users/producers-with-segments";
pub const HEALTH_ENDPOINT: &str = "/api/mqtt/test";

// --- Error type ---
#[derive(Error, Debug)]
pub enum ApiClientError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Not authenticated against the attendance API (Status {status})")]
    Unauthorized { status: u16 },

    #[error("Attendance API error: Status={status}, Message='{message}'")]
    ApiError { status: u16, message: String },

    #[error("Two-factor authentication is required for this account and is not supported")]
    TwoFactorRequired,

    #[error("Configuration error: {0}")]
    Config(String),
}

fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> ApiClientError {
    ApiClientError::Io {
        source: source.into(),
        context: context.into(),
    }
}

/// Pulls a human message out of an error body shaped like `{"message": ...}` or
/// `{"error": ...}`; falls back to the raw body.
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Maps a non-success status to the client error.
pub fn error_for_status(status: u16, body: &str) -> ApiClientError {
    match status {
        401 | 403 => ApiClientError::Unauthorized { status },
        _ => ApiClientError::ApiError {
            status,
            message: error_message_from_body(body),
        },
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub session_file: Option<PathBuf>,
}

// --- Client ---
#[derive(Clone, Debug)]
pub struct ApiClient {
    config: Arc<ApiConfig>,
    http_client: Client,
    session: Arc<Mutex<Option<Session>>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiClientError> {
        Url::parse(&config.base_url)
            .map_err(|e| ApiClientError::Config(format!("Invalid API URL '{}': {}", config.base_url, e)))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            session: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    // --- Session persistence ---

    pub fn load_session(path: &Path) -> Result<Option<Session>, ApiClientError> {
        if !path.exists() {
            return Ok(None);
        }

        let json_string = fs::read_to_string(path)
            .map_err(|e| io_context(e, format!("Failed to read session file: {:?}", path)))?;
        let session: Session = serde_json::from_str(&json_string)?;

        Ok(Some(session))
    }

    fn save_session(&self, session: &Session) -> Result<(), ApiClientError> {
        let Some(path) = self.config.session_file.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create session directory: {:?}", parent))
            })?;
        }
        let json_string = serde_json::to_string_pretty(session)?;
        fs::write(path, json_string)
            .map_err(|e| io_context(e, format!("Failed to write session file: {:?}", path)))?;
        debug!("Session saved to {:?}", path);
        Ok(())
    }

    fn remove_session_file(&self) {
        if let Some(path) = self.config.session_file.as_deref() {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    error!("Failed to remove session file {:?}: {}", path, e);
                }
            }
        }
    }

    /// Restores a session persisted by an earlier login. Returns whether one was found.
    pub async fn restore_session(&self) -> Result<bool, ApiClientError> {
        let Some(path) = self.config.session_file.as_deref() else {
            return Ok(false);
        };
        match Self::load_session(path)? {
            Some(session) => {
                info!(
                    "Restored {} session for '{}' from {:?}",
                    session.role,
                    session.display_name(),
                    path
                );
                *self.session.lock().await = Some(session);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Installs a session without going through login (pre-issued token).
    pub async fn use_session(&self, session: Session) {
        *self.session.lock().await = Some(session);
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiClientError> {
        info!("Logging in to attendance API as '{}'", email);
        let url = self.endpoint_url(LOGIN_ENDPOINT)?;
        let request = self
            .http_client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&LoginRequest { email, password });
        let response: LoginResponse = self.send_and_deserialize(request, "login").await?;

        let session = session_from_login(response, email)?;
        self.save_session(&session)?;
        *self.session.lock().await = Some(session.clone());
        info!("Logged in as {} ({})", session.display_name(), session.role);
        Ok(session)
    }

    pub async fn logout(&self) {
        *self.session.lock().await = None;
        self.remove_session_file();
        info!("Session cleared");
    }

    async fn invalidate_session(&self) {
        warn!("Attendance API rejected the session token; clearing session");
        *self.session.lock().await = None;
        self.remove_session_file();
    }

    // --- Request plumbing ---

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiClientError> {
        let base = self.config.base_url.trim_end_matches('/');
        let url = if endpoint.starts_with("http") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", base, endpoint)
        } else {
            format!("{}/{}", base, endpoint)
        };
        Ok(Url::parse(&url)?)
    }

    pub async fn build_request(
        &self,
        method: Method,
        url: Url,
    ) -> Result<RequestBuilder, ApiClientError> {
        let token = self
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ApiClientError::Unauthorized { status: 401 })?;

        Ok(self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json"))
    }

    pub async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, ApiClientError> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            ApiClientError::Request(e)
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = self.http_client.execute(request).await.map_err(|e| {
            error!("HTTP request for '{}' (URL: {}) failed: {}", context_msg, request_url, e);
            ApiClientError::Request(e)
        })?;
        let status = resp.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            let bytes = resp.bytes().await?;
            return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                error!(
                    "JSON deserialization failed for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                ApiClientError::Json(e)
            });
        }

        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        error!(
            "Request for '{}' failed: Status={}, Body={}",
            context_msg, status, error_body
        );
        let err = error_for_status(status.as_u16(), &error_body);
        if matches!(err, ApiClientError::Unauthorized { .. }) {
            self.invalidate_session().await;
        }
        Err(err)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url, context_msg: &str) -> Result<T, ApiClientError> {
        let request = self.build_request(Method::GET, url).await?;
        self.send_and_deserialize(request, context_msg).await
    }

    // --- Endpoints ---

    pub async fn fetch_employees(&self) -> Result<Vec<Employee>, ApiClientError> {
        let url = self.endpoint_url(EMPLOYEES_ENDPOINT)?;
        self.get(url, "employees").await
    }

    pub async fn fetch_employees_by_segment(
        &self,
        segment: &str,
    ) -> Result<Vec<Employee>, ApiClientError> {
        let url = self.segment_url(segment)?;
        self.get(url, "employees by segment").await
    }

    /// `/api/employees/segment/{segment}` with the segment percent-encoded.
    pub fn segment_url(&self, segment: &str) -> Result<Url, ApiClientError> {
        let mut url = self.endpoint_url(EMPLOYEES_ENDPOINT)?;
        url.path_segments_mut()
            .map_err(|_| ApiClientError::Config("API URL cannot be a base".to_string()))?
            .push("segment")
            .push(segment);
        Ok(url)
    }

    pub async fn fetch_scans(&self) -> Result<Vec<Scan>, ApiClientError> {
        let url = self.endpoint_url(SCANS_ENDPOINT)?;
        self.get(url, "scans").await
    }

    pub async fn fetch_segments(&self) -> Result<Vec<String>, ApiClientError> {
        let url = self.endpoint_url(SEGMENTS_ENDPOINT)?;
        let response: SegmentListResponse = self.get(url, "segments").await?;
        Ok(response.into_names())
    }

    pub async fn fetch_shifts(&self) -> Result<Vec<Shift>, ApiClientError> {
        let url = self.endpoint_url(SHIFTS_ENDPOINT)?;
        self.get(url, "shifts").await
    }

    pub async fn fetch_producers(&self) -> Result<Vec<Producer>, ApiClientError> {
        let url = self.endpoint_url(PRODUCERS_ENDPOINT)?;
        self.get(url, "producers").await
    }

    /// True iff the API health endpoint answers 2xx.
    pub async fn check_api_status(&self) -> bool {
        let url = match self.endpoint_url(HEALTH_ENDPOINT) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid health URL: {}", e);
                return false;
            }
        };
        match self.http_client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("Attendance API health check failed: {}", e);
                false
            }
        }
    }
}

/// Turns a login response into a session. Two-factor accounts and responses without a token
/// or role are rejected.
pub fn session_from_login(response: LoginResponse, email: &str) -> Result<Session, ApiClientError> {
    if response.requires_two_factor {
        return Err(ApiClientError::TwoFactorRequired);
    }
    let token = response
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiClientError::ApiError {
            status: 200,
            message: "Login response carried no token".to_string(),
        })?;
    let role: Role = response.role.ok_or_else(|| ApiClientError::ApiError {
        status: 200,
        message: "Login response carried no role".to_string(),
    })?;

    Ok(Session {
        token,
        role,
        segment: response.segment.clone(),
        user: UserInfo {
            name: response.name,
            email: response.email.or_else(|| Some(email.to_string())),
            segment: response.segment,
        },
    })
}

#[async_trait]
impl PresenceSource for ApiClient {
    async fn fetch_employees(&self, scope: &Scope) -> Result<Vec<Employee>, ApiClientError> {
        match scope {
            Scope::AllEmployees => ApiClient::fetch_employees(self).await,
            Scope::Segment(segment) => self.fetch_employees_by_segment(segment).await,
            Scope::Nothing => Ok(Vec::new()),
        }
    }

    async fn fetch_scans(&self) -> Result<Vec<Scan>, ApiClientError> {
        ApiClient::fetch_scans(self).await
    }

    async fn fetch_segments(&self) -> Result<Vec<String>, ApiClientError> {
        ApiClient::fetch_segments(self).await
    }

    async fn fetch_shifts(&self) -> Result<Vec<Shift>, ApiClientError> {
        ApiClient::fetch_shifts(self).await
    }
}
