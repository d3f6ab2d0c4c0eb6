//! Support panel HTTP API

use crate::error::{Error, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const PING_PATH: &str = "/api/ping";
const AUTH_PATH: &str = "/api/logs/auth/code";
const UPLOAD_PATH: &str = "/api/logs/upload";

/// Token issued for a one-time code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Bearer token
    pub token: String,
    /// Expiry as reported by the panel
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// One upload: a file plus who sent it and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File name shown in the panel
    pub file_name: String,
    /// File bytes
    pub contents: Vec<u8>,
    /// Sender id
    pub client_id: String,
    /// Free-text comment from the user
    pub comment: String,
}

/// What the panel answered to an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadReceipt {
    /// Panel-side id of the upload
    pub id: Option<String>,
    /// Human readable status
    pub message: Option<String>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    code: &'a str,
    client_id: &'a str,
}

/// Calls against the support panel
#[cfg_attr(test, mockall::automock)]
pub trait LogTransport: Send + Sync {
    /// Reachability check
    fn ping(&self) -> Result<()>;

    /// Exchange a one-time code for a token
    fn exchange_code(&self, code: &str, client_id: &str) -> Result<AuthToken>;

    /// Upload a file; `401` maps to [`Error::AuthRequired`]
    fn upload(&self, token: &str, request: &UploadRequest) -> Result<UploadReceipt>;
}

/// [`LogTransport`] over `reqwest::blocking`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("zapret-manager/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unexpected status").to_string()
    } else {
        body.trim().to_string()
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::AuthRequired(message)),
        _ => Err(Error::SupportApi {
            status: status.as_u16(),
            message,
        }),
    }
}

impl LogTransport for HttpTransport {
    fn ping(&self) -> Result<()> {
        let response = self.client.get(self.url(PING_PATH)).send()?;
        check(response)?;
        Ok(())
    }

    fn exchange_code(&self, code: &str, client_id: &str) -> Result<AuthToken> {
        let response = self
            .client
            .post(self.url(AUTH_PATH))
            .json(&AuthRequest { code, client_id })
            .send()?;
        let token: AuthToken = check(response)?.json()?;
        debug!(client_id = %client_id, expires_at = ?token.expires_at, "Support token issued");
        Ok(token)
    }

    fn upload(&self, token: &str, request: &UploadRequest) -> Result<UploadReceipt> {
        let part = multipart::Part::bytes(request.contents.clone())
            .file_name(request.file_name.clone())
            .mime_str("text/plain")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("client_id", request.client_id.clone())
            .text("comment", request.comment.clone());

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .bearer_auth(token)
            .multipart(form)
            .send()?;
        let body = check(response)?.text()?;
        Ok(parse_receipt(&body))
    }
}

/// Receipt from a successful upload response; an unreadable body yields an empty one
fn parse_receipt(body: &str) -> UploadReceipt {
    if body.trim().is_empty() {
        return UploadReceipt::default();
    }
    match serde_json::from_str(body) {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!(error = %e, body_len = body.len(), "Malformed upload receipt");
            UploadReceipt::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let t = HttpTransport::new(" https://panel.example/ ", Duration::from_secs(5)).unwrap();
        assert_eq!(t.base_url(), "https://panel.example");
        assert_eq!(t.url(PING_PATH), "https://panel.example/api/ping");
    }

    #[test]
    fn test_token_json() {
        let t: AuthToken = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(t.token, "abc");
        assert!(t.expires_at.is_none());
    }

    #[test]
    fn test_receipt_tolerates_extra_fields() {
        let r = parse_receipt(r#"{"id":"42","ok":true}"#);
        assert_eq!(r.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_malformed_receipt_is_empty() {
        assert_eq!(parse_receipt("<html>502</html>"), UploadReceipt::default());
        assert_eq!(parse_receipt(r#"{"id": 42"#), UploadReceipt::default());
        assert_eq!(parse_receipt("  "), UploadReceipt::default());
    }
}
