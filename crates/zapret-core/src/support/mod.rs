//! Log shipping to the support panel
//!
//! The user obtains a one-time code from the support bot, exchanges it for a
//! bearer token with [`LogShipper::authenticate`] and then uploads the newest
//! application logs with [`LogShipper::upload`].

mod logs;
mod transport;

pub use logs::{bundle_logs, collect_logs, LogFile};
pub use transport::{AuthToken, HttpTransport, LogTransport, UploadReceipt, UploadRequest};

#[cfg(test)]
pub use transport::MockLogTransport;

use crate::error::{Error, Result};
use crate::settings::SupportSettings;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Uploads logs through a [`LogTransport`] and keeps the session token
pub struct LogShipper<T: LogTransport> {
    transport: T,
    client_id: String,
    token: Option<String>,
    log_dir: PathBuf,
    max_files: usize,
    max_file_bytes: u64,
}

impl LogShipper<HttpTransport> {
    /// Shipper over HTTP configured from settings
    pub fn from_settings(settings: &SupportSettings, log_dir: &Path) -> Result<Self> {
        let transport = HttpTransport::new(&settings.base_url, Duration::from_secs(settings.timeout_secs))?;
        let mut shipper = Self::new(transport, settings.effective_client_id(), log_dir);
        shipper.token = settings.token.clone().filter(|t| !t.is_empty());
        shipper.max_files = settings.max_files;
        shipper.max_file_bytes = settings.max_file_bytes;
        Ok(shipper)
    }
}

impl<T: LogTransport> LogShipper<T> {
    /// Shipper with default limits and no token
    pub fn new(transport: T, client_id: impl Into<String>, log_dir: &Path) -> Self {
        let defaults = SupportSettings::default();
        Self {
            transport,
            client_id: client_id.into(),
            token: None,
            log_dir: log_dir.to_path_buf(),
            max_files: defaults.max_files,
            max_file_bytes: defaults.max_file_bytes,
        }
    }

    /// Use an already issued token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Current token, to be persisted by the caller
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Round-trip time of `/api/ping`
    pub fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.transport.ping()?;
        Ok(started.elapsed())
    }

    /// Exchange a one-time code for a token and keep it
    pub fn authenticate(&mut self, code: &str) -> Result<AuthToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::invalid_argument(code, "auth code is empty"));
        }
        let token = self.transport.exchange_code(code, &self.client_id)?;
        info!(client_id = %self.client_id, "Authenticated with support panel");
        self.token = Some(token.token.clone());
        Ok(token)
    }

    /// Upload the newest logs as one attachment
    ///
    /// A rejected token is dropped, so the caller has to authenticate again.
    pub fn upload(&mut self, comment: &str) -> Result<UploadReceipt> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| Error::AuthRequired("no token, authenticate with a code first".into()))?;

        let files = collect_logs(&self.log_dir, self.max_files, self.max_file_bytes)?;
        if files.is_empty() {
            return Err(Error::NoLogs {
                dir: self.log_dir.display().to_string(),
            });
        }

        let request = UploadRequest {
            file_name: format!("zapret-logs-{}.txt", chrono::Local::now().format("%Y%m%d-%H%M%S")),
            contents: bundle_logs(&files),
            client_id: self.client_id.clone(),
            comment: comment.trim().to_string(),
        };

        match self.transport.upload(&token, &request) {
            Ok(receipt) => {
                info!(files = files.len(), bytes = request.contents.len(), "Uploaded logs");
                Ok(receipt)
            }
            Err(e) if e.is_auth_required() => {
                warn!("Support panel rejected the token, clearing it");
                self.token = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zapret.log"), "started\n").unwrap();
        dir
    }

    #[test]
    fn test_authenticate_stores_token() {
        let mut transport = MockLogTransport::new();
        transport
            .expect_exchange_code()
            .withf(|code, client_id| code == "123456" && client_id == "pc-1")
            .times(1)
            .returning(|_, _| {
                Ok(AuthToken {
                    token: "tok".into(),
                    expires_at: None,
                })
            });

        let dir = log_dir();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path());
        shipper.authenticate(" 123456 ").unwrap();
        assert_eq!(shipper.token(), Some("tok"));
    }

    #[test]
    fn test_upload_without_token() {
        let transport = MockLogTransport::new();
        let dir = log_dir();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path());
        assert!(shipper.upload("hi").unwrap_err().is_auth_required());
    }

    #[test]
    fn test_upload_sends_bundle() {
        let mut transport = MockLogTransport::new();
        transport
            .expect_upload()
            .withf(|token, req| {
                token == "tok"
                    && req.client_id == "pc-1"
                    && req.comment == "youtube slow"
                    && String::from_utf8_lossy(&req.contents).contains("started")
            })
            .times(1)
            .returning(|_, _| Ok(UploadReceipt::default()));

        let dir = log_dir();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path()).with_token("tok");
        shipper.upload(" youtube slow ").unwrap();
        assert_eq!(shipper.token(), Some("tok"));
    }

    #[test]
    fn test_unauthorized_clears_token() {
        let mut transport = MockLogTransport::new();
        transport
            .expect_upload()
            .returning(|_, _| Err(Error::AuthRequired("expired".into())));

        let dir = log_dir();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path()).with_token("tok");
        assert!(shipper.upload("").unwrap_err().is_auth_required());
        assert_eq!(shipper.token(), None);
    }

    #[test]
    fn test_server_error_keeps_token() {
        let mut transport = MockLogTransport::new();
        transport.expect_upload().returning(|_, _| {
            Err(Error::SupportApi {
                status: 500,
                message: "boom".into(),
            })
        });

        let dir = log_dir();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path()).with_token("tok");
        assert!(shipper.upload("").is_err());
        assert_eq!(shipper.token(), Some("tok"));
    }

    #[test]
    fn test_no_logs() {
        let transport = MockLogTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let mut shipper = LogShipper::new(transport, "pc-1", dir.path()).with_token("tok");
        assert!(matches!(shipper.upload(""), Err(Error::NoLogs { .. })));
    }

    #[test]
    fn test_ping() {
        let mut transport = MockLogTransport::new();
        transport.expect_ping().times(1).returning(|| Ok(()));
        let dir = tempfile::tempdir().unwrap();
        let shipper = LogShipper::new(transport, "pc-1", dir.path());
        assert!(shipper.ping().is_ok());
    }
}
