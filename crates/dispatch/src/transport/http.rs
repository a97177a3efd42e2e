//! HTTP transport: posts commands to a REST API.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Parameters are sent form-encoded to
//! `{endpoint}/{command}`; the body must be a JSON [`Response`].

use async_trait::async_trait;
use tracing::debug;

use super::{Command, Transport};
use crate::error::TransportError;
use crate::response::Response;

/// Environment variable consulted when no auth token is configured.
pub const AUTH_TOKEN_ENV: &str = "ONYX_AUTH_TOKEN";

/// Transport that sends commands via HTTP POST.
///
/// - `endpoint` base URL, e.g. `https://www.example.com/api`
/// - `auth_token` from config or the `ONYX_AUTH_TOKEN` env var
pub struct HttpTransport {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `endpoint`, falling back to `ONYX_AUTH_TOKEN`
    /// when `auth_token` is `None`.
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        let auth_token = auth_token.or_else(|| std::env::var(AUTH_TOKEN_ENV).ok());
        HttpTransport {
            endpoint: endpoint.into(),
            auth_token,
        }
    }

    /// `https://host/api` + `OpenReport` → `https://host/api/OpenReport`
    pub fn command_url(&self, command: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), command)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, command: &Command) -> Result<Response, TransportError> {
        let url = self.command_url(&command.name);
        let auth_token = self.auth_token.clone();
        let form: Vec<(String, String)> = command
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();

        debug!(%url, params = form.len(), "sending command");

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url);

            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }

            let response = request
                .send_form(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .map_err(|e| match e {
                    ureq::Error::StatusCode(status) => TransportError::Status(status),
                    other => TransportError::Connection(other.to_string()),
                })?;

            response
                .into_body()
                .read_json::<Response>()
                .map_err(|e| TransportError::Malformed(e.to_string()))
        })
        .await
        .map_err(|e| TransportError::Connection(format!("task join error: {}", e)))?
    }

    fn transport_id(&self) -> &str {
        "http"
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
