//! Retrying HTTP client with streaming gzip inflation

use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use tokio::io::BufReader;
use tokio::time::sleep;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ByteStream, FetchError, Probe};

/// HTTP fetcher shared by all payer pipelines.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
}

impl Fetcher {
    /// Build a fetcher. `request_timeout` bounds connection setup and idle
    /// reads; it intentionally does not bound total transfer time, since
    /// in-network files routinely stream for longer than any sane request
    /// deadline.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(request_timeout)
            .gzip(true)
            .deflate(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .user_agent(concat!("tic-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Permanent {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Open a decompressed byte stream over `url`.
    pub async fn open(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, FetchError> {
        let response = self.request_with_retry(Method::GET, url, cancel).await?;
        let inflate = wants_gzip(url, response.headers());

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let reader = StreamReader::new(Box::pin(stream)
            as std::pin::Pin<
                Box<dyn futures_util::Stream<Item = std::io::Result<bytes::Bytes>> + Send>,
            >);

        if inflate {
            debug!(url, "inflating gzip stream");
            let mut decoder = GzipDecoder::new(BufReader::new(reader));
            decoder.multiple_members(true);
            Ok(Box::new(decoder))
        } else {
            Ok(Box::new(reader))
        }
    }

    /// Probe a URL without downloading it.
    pub async fn head(&self, url: &str, cancel: &CancellationToken) -> Result<Probe, FetchError> {
        let response = self.request_with_retry(Method::HEAD, url, cancel).await?;
        let headers = response.headers();
        Ok(Probe {
            size: headers
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            content_encoding: headers
                .get(reqwest::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }

    async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let mut attempt = 0u32;
        loop {
            debug!(url, attempt = attempt + 1, "HTTP {method}");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.client.request(method.clone(), url).send() => outcome,
            };

            let error = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    classify_status(url, status)
                }
                Err(e) => classify_transport(url, e),
            };

            if error.is_transient() && attempt < self.max_retries {
                attempt += 1;
                let delay = backoff_delay(attempt);
                warn!(url, attempt, ?delay, "transient fetch failure, retrying: {error}");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = sleep(delay) => {}
                }
                continue;
            }
            return Err(error);
        }
    }
}

/// Exponential backoff with up to one second of jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_secs(2u64.pow(attempt.min(6)));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=1000));
    base + jitter
}

fn classify_status(url: &str, status: StatusCode) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }
    } else {
        FetchError::Permanent {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }
    }
}

fn classify_transport(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_builder() {
        FetchError::Permanent {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        FetchError::Transient {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

/// Whether the payload needs gzip inflation. The transport layer already
/// undoes `Content-Encoding: gzip`; this catches `.gz` artifacts served as
/// opaque bytes.
fn wants_gzip(url: &str, headers: &HeaderMap) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".gz") || path.ends_with(".gzip") {
        return true;
    }
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct == "application/gzip" || ct == "application/x-gzip")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5), 2).unwrap()
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[test]
    fn gzip_detection_ignores_query_and_fragment() {
        let empty = HeaderMap::new();
        assert!(wants_gzip("https://example.com/file.json.gz", &empty));
        assert!(wants_gzip("https://example.com/FILE.JSON.GZ?sig=abc", &empty));
        assert!(wants_gzip("https://example.com/file.gzip#frag", &empty));
        assert!(!wants_gzip("https://example.com/file.json", &empty));

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/gzip".parse().unwrap(),
        );
        assert!(wants_gzip("https://example.com/file", &headers));
    }

    #[tokio::test]
    async fn open_streams_plain_bodies() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data.json")
            .with_status(200)
            .with_body(r#"{"in_network": []}"#)
            .create_async()
            .await;

        let url = format!("{}/data.json", server.url());
        let stream = fetcher().open(&url, &CancellationToken::new()).await.unwrap();
        assert_eq!(read_all(stream).await, br#"{"in_network": []}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn open_inflates_gz_suffix() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"in_network\": []}").unwrap();
        let body = encoder.finish().unwrap();

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data.json.gz")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(body)
            .create_async()
            .await;

        let url = format!("{}/data.json.gz", server.url());
        let stream = fetcher().open(&url, &CancellationToken::new()).await.unwrap();
        assert_eq!(read_all(stream).await, b"{\"in_network\": []}");
    }

    #[tokio::test]
    async fn server_errors_retry_until_the_budget_is_spent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.json")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        // One retry: the initial attempt plus one more request.
        let client = Fetcher::new(Duration::from_secs(5), 1).unwrap();
        let url = format!("{}/flaky.json", server.url());
        let err = match client.open(&url, &CancellationToken::new()).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.is_transient());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_permanent_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/missing.json", server.url());
        let err = match fetcher().open(&url, &CancellationToken::new()).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(!err.is_transient());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn head_probe_reports_size() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/big.json.gz")
            .with_status(200)
            .with_header("content-length", "123456")
            .create_async()
            .await;

        let url = format!("{}/big.json.gz", server.url());
        let probe = fetcher().head(&url, &CancellationToken::new()).await.unwrap();
        assert_eq!(probe.size, Some(123456));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = match fetcher().open("http://192.0.2.1/never.json", &cancel).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.is_cancelled());
    }
}
