// src/config.rs
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::api_client::ApiConfig;
use crate::attendance::ValidationPolicy;
use crate::session::{Role, Session, UserInfo};

pub const ENV_PREFIX: &str = "PRESENCE_";

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_session_file() -> String {
    "./presence_session.json".to_string()
}
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    3000
}
fn default_admin_poll_secs() -> u64 {
    300
}
fn default_producer_poll_secs() -> u64 {
    30
}
fn default_lookback_minutes() -> i64 {
    120
}
fn default_http_timeout_secs() -> u64 {
    30
}

/// Service configuration, read from `PRESENCE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    // Remote API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub api_email: Option<String>,
    pub api_password: Option<String>,
    pub api_token: Option<String>,
    pub api_role: Option<String>,
    pub api_segment: Option<String>,
    #[serde(default = "default_session_file")]
    pub session_file: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // Server
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,

    // Polling
    #[serde(default = "default_admin_poll_secs")]
    pub admin_poll_secs: u64,
    #[serde(default = "default_producer_poll_secs")]
    pub producer_poll_secs: u64,

    // Validation window
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,
    #[serde(default)]
    pub lookahead_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(pairs)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy::from_minutes(self.lookback_minutes, self.lookahead_minutes)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.trim_end_matches('/').to_string(),
            timeout_secs: self.http_timeout_secs,
            session_file: Some(PathBuf::from(&self.session_file)),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server_host, self.server_port)
            .parse()
            .map_err(|e| {
                format!(
                    "Invalid bind address {}:{}: {}",
                    self.server_host, self.server_port, e
                )
            })
    }

    /// TLS is enabled only when both paths are set.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (self.cert_path.as_deref(), self.key_path.as_deref()) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }

    pub fn poll_interval(&self, role: Role) -> Duration {
        let secs = match role {
            Role::Admin => self.admin_poll_secs,
            Role::Producer | Role::SegmentLeader => self.producer_poll_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Session built from a pre-issued token, if one is configured. Without a role the token
    /// is treated as an admin token.
    pub fn preset_session(&self) -> Result<Option<Session>, String> {
        let Some(token) = self.api_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let role = match self.api_role.as_deref() {
            Some(raw) => raw.parse::<Role>()?,
            None => Role::Admin,
        };
        Ok(Some(Session {
            token: token.trim().to_string(),
            role,
            segment: self.api_segment.clone(),
            user: UserInfo {
                email: self.api_email.clone(),
                segment: self.api_segment.clone(),
                ..Default::default()
            },
        }))
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_email.as_deref(), self.api_password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() => Some((email, password)),
            _ => None,
        }
    }
}
