use std::path::PathBuf;
use std::time::Duration;

use super::http_client::DEFAULT_MAX_CONNECTIONS;
use super::{Client, DriverError, HttpClient, LocalClient, MEMORY_TARGET};

pub struct ClientBuilder {
    addr: String,
    auth_token: Option<String>,
    timeout_ms: Option<u64>,
    max_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Local,
}

impl Transport {
    /// Pick the transport from a target descriptor. `None` when the
    /// descriptor is neither a server URL nor a local file designation.
    pub fn detect(addr: &str) -> Option<Self> {
        let addr = addr.trim();
        if addr.starts_with("http://") || addr.starts_with("https://") || addr.starts_with("libsql://")
        {
            Some(Transport::Http)
        } else if addr.starts_with("file:") || addr == MEMORY_TARGET {
            Some(Transport::Local)
        } else {
            None
        }
    }
}

impl ClientBuilder {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.trim().to_string(),
            auth_token: None,
            timeout_ms: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn auth_token(mut self, token: &str) -> Self {
        if !token.is_empty() {
            self.auth_token = Some(token.to_string());
        }
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Cap on concurrent requests to a server target. Ignored for local files.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn transport(&self) -> Option<Transport> {
        Transport::detect(&self.addr)
    }

    /// Path a `file:` descriptor points at. Query parameters
    /// (`file:local.db?mode=rwc`) are not supported and are dropped.
    pub fn local_path(&self) -> Option<PathBuf> {
        if self.addr == MEMORY_TARGET {
            return Some(PathBuf::from(MEMORY_TARGET));
        }
        let rest = self.addr.strip_prefix("file:")?;
        let rest = rest.split('?').next().unwrap_or(rest);
        // file:///abs/path -> /abs/path
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        if rest.is_empty() {
            None
        } else {
            Some(PathBuf::from(rest))
        }
    }

    pub fn build_http(self) -> Result<HttpClient, DriverError> {
        let timeout = Duration::from_millis(self.timeout_ms.unwrap_or(30_000));
        let mut client = HttpClient::with_limits(&self.addr, timeout, self.max_connections)?;
        if let Some(token) = &self.auth_token {
            client.set_token(token);
        }
        Ok(client)
    }

    pub fn build_local(self) -> Result<LocalClient, DriverError> {
        let path = self.local_path().ok_or_else(|| {
            DriverError::InvalidTarget(format!("'{}' is not a local file target", self.addr))
        })?;
        LocalClient::open(path)
    }

    pub async fn build(self) -> Result<Client, DriverError> {
        match self.transport() {
            Some(Transport::Http) => Ok(Client::Http(self.build_http()?)),
            Some(Transport::Local) => {
                // Opening a file touches the disk; keep it off the runtime threads.
                tokio::task::spawn_blocking(move || self.build_local())
                    .await
                    .map_err(|e| DriverError::InternalError(format!("Blocking task failed: {}", e)))?
                    .map(Client::Local)
            }
            None => Err(DriverError::InvalidTarget(format!(
                "'{}' is neither a server URL (http://, https://, libsql://) nor a local file (file:...)",
                self.addr
            ))),
        }
    }
}
