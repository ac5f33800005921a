use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::DriverError;
use crate::protocol::hrana::{PipelineRequest, PipelineResponse, Stmt, PIPELINE_PATH};
use crate::protocol::{ResultSet, Value};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests in flight at once per client, and so open sockets.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// libsql server client speaking Hrana over HTTP.
///
/// One `HttpClient` is shared by every concurrent statement of a benchmark
/// run. Callers may issue any number of requests at once; at most
/// `max_connections` of them are on the wire; the rest wait for a permit
/// and then reuse a pooled connection.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self, DriverError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DriverError> {
        Self::with_limits(base_url, timeout, DEFAULT_MAX_CONNECTIONS)
    }

    pub fn with_limits(
        base_url: &str,
        timeout: Duration,
        max_connections: usize,
    ) -> Result<Self, DriverError> {
        if max_connections == 0 {
            return Err(DriverError::InvalidTarget(
                "max_connections must be greater than zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(max_connections)
            .build()
            .map_err(|e| DriverError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(base_url),
            token: None,
            client,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn get_headers(&self) -> Result<reqwest::header::HeaderMap, DriverError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = &self.token {
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| DriverError::InvalidTarget(format!("Invalid auth token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let url = format!("{}{}", self.base_url, PIPELINE_PATH);
        let body = PipelineRequest::execute_once(Stmt::new(sql, params));

        // Held until the body is read so the connection is back in the pool
        // before the next waiter goes.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DriverError::InternalError(format!("Connection limiter closed: {}", e)))?;

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| DriverError::ConnectionError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DriverError::ServerError(format!(
                "HTTP {} {}: {}",
                status, PIPELINE_PATH, error_text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DriverError::ProtocolError(format!("Failed to read response: {}", e)))?;

        let pipeline: PipelineResponse = serde_json::from_str(&text).map_err(|e| {
            DriverError::ProtocolError(format!("Failed to parse response: {} - Text: {}", e, text))
        })?;

        pipeline.into_result_set()
    }
}

/// `libsql://` is the TLS form used by hosted deployments; the HTTP API
/// lives on the same host over https.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    match url.strip_prefix("libsql://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(normalize_base_url("libsql://db.example.io"), "https://db.example.io");
        assert_eq!(normalize_base_url(" https://x.io "), "https://x.io");
    }

    #[test]
    fn test_auth_header() {
        let mut client = HttpClient::new("http://localhost:8080").unwrap();
        assert!(client.get_headers().unwrap().get("authorization").is_none());

        client.set_token("secret");
        let headers = client.get_headers().unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 9 (discard) is closed on any sane test machine.
        let client = HttpClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.execute("select 1", &[]).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionError(_)));
        assert!(!err.is_backend_rejection());
    }

    /// Minimal Hrana endpoint: answers every pipeline with one row after
    /// `delay` and records how many requests it served at once.
    async fn spawn_fake_server(delay: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let peak_seen = peak.clone();

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _ = serve_pipeline(socket, delay, in_flight, peak).await;
                });
            }
        });

        (format!("http://{}", addr), peak_seen)
    }

    async fn serve_pipeline(
        socket: TcpStream,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> std::io::Result<()> {
        const PAYLOAD: &str = r#"{"baton":null,"base_url":null,"results":[{"type":"ok","response":{"type":"execute","result":{"cols":[{"name":"one"}],"rows":[[{"type":"integer","value":"1"}]],"affected_row_count":0,"last_insert_rowid":null}}},{"type":"ok","response":{"type":"close"}}]}"#;

        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let mut content_length = 0usize;
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 {
                    return Ok(());
                }
                let header = line.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await?;

            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                PAYLOAD.len(),
                PAYLOAD
            );
            write.write_all(response.as_bytes()).await?;
        }
    }

    #[tokio::test]
    async fn test_requests_beyond_cap_wait_for_a_connection() {
        let (url, peak) = spawn_fake_server(Duration::from_millis(20)).await;
        let client = HttpClient::with_limits(&url, Duration::from_secs(10), 8).unwrap();
        assert_eq!(client.max_connections(), 8);

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let client = client.clone();
            set.spawn(async move { client.execute("select 1 as one", &[]).await });
        }

        let mut answered = 0;
        while let Some(joined) = set.join_next().await {
            let rs = tokio_test::assert_ok!(joined.unwrap());
            assert_eq!(rs.rows[0][0], Value::Integer(1));
            answered += 1;
        }

        assert_eq!(answered, 64);
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=8).contains(&peak), "peak in-flight requests: {}", peak);
    }

    #[test]
    fn test_zero_connection_cap_is_rejected() {
        assert!(matches!(
            HttpClient::with_limits("http://localhost:8080", DEFAULT_TIMEOUT, 0),
            Err(DriverError::InvalidTarget(_))
        ));
        assert_eq!(
            HttpClient::new("http://localhost:8080").unwrap().max_connections(),
            DEFAULT_MAX_CONNECTIONS
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_server_roundtrip() {
        let client = HttpClient::new("http://localhost:8080").unwrap();
        let rs = client.execute("select 1 as one", &[]).await.unwrap();
        assert_eq!(rs.columns, vec!["one".to_string()]);
        assert_eq!(rs.rows[0][0], Value::Integer(1));
    }
}
