//! Where tile bytes come from.

use std::time::Duration;

use async_trait::async_trait;
use sat_mosaic_geo_models::TileCoordinate;

use crate::TileDownloadError;
use crate::provider::{USER_AGENT, UrlTemplate};

/// Produces the raw encoded bytes of a tile.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetches one tile. Implementations make a single attempt; retrying
    /// is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`TileDownloadError`] if the tile cannot be fetched.
    async fn fetch(&self, coord: TileCoordinate) -> Result<Vec<u8>, TileDownloadError>;
}

/// Fetches tiles over HTTP from a URL template.
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: reqwest::Client,
    template: UrlTemplate,
}

impl HttpTileSource {
    /// Builds a source with a browser-like user agent and the given
    /// per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TileDownloadError::Http`] if the client cannot be built.
    pub fn new(template: UrlTemplate, timeout: Duration) -> Result<Self, TileDownloadError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, template })
    }

    /// URL requested for `coord`.
    #[must_use]
    pub fn url(&self, coord: &TileCoordinate) -> String {
        self.template.render(coord)
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(&self, coord: TileCoordinate) -> Result<Vec<u8>, TileDownloadError> {
        let url = self.url(&coord);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TileDownloadError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(TileDownloadError::EmptyBody { url });
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    /// Answers one connection with `response` and yields the raw request.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn source(base: &str) -> HttpTileSource {
        let template = UrlTemplate::new(format!("{base}/tile?x={{x}}&y={{y}}&z={{z}}")).unwrap();
        HttpTileSource::new(template, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_sends_browser_agent_and_returns_body() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\nConnection: close\r\n\r\njpeg",
        )
        .await;

        let bytes = source(&base)
            .fetch(TileCoordinate::new(17, 1, 2))
            .await
            .unwrap();
        assert_eq!(bytes, b"jpeg");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /tile?x=1&y=2&z=17 "), "{request}");
        assert!(request.contains(&format!("user-agent: {}", USER_AGENT.to_ascii_lowercase())));
    }

    #[tokio::test]
    async fn non_success_status_is_permanent_http_error() {
        let (base, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = source(&base)
            .fetch(TileCoordinate::new(17, 1, 2))
            .await
            .unwrap_err();
        assert!(
            matches!(err, TileDownloadError::HttpStatus { status: 404, ref url } if url.ends_with("z=17")),
            "{err}"
        );
        assert!(!err.is_transient());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (base, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = source(&base)
            .fetch(TileCoordinate::new(17, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TileDownloadError::HttpStatus { status: 503, .. }));
        assert!(err.is_transient());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let (base, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let err = source(&base)
            .fetch(TileCoordinate::new(17, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TileDownloadError::EmptyBody { .. }), "{err}");
        server.await.unwrap();
    }
}
