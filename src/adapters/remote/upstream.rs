use crate::domain::FetchError;
use crate::ports::upstream::UpstreamPort;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER,
    USER_AGENT,
};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Headers the upstream origin insists on; it rejects anything that does
/// not look like its own embedded browser player.
#[derive(Debug, Clone)]
pub struct BrowserHeaders {
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
}

impl Default for BrowserHeaders {
    fn default() -> Self {
        Self {
            origin: "https://www.abbeyroad.com".to_string(),
            referer: "https://www.abbeyroad.com/".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// reqwest-backed `UpstreamPort`.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(headers: &BrowserHeaders) -> Result<Self, ClientBuildError> {
        let mut defaults = HeaderMap::new();
        defaults.insert(ACCEPT, HeaderValue::from_static("*/*"));
        defaults.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        defaults.insert(ORIGIN, HeaderValue::from_str(&headers.origin)?);
        defaults.insert(REFERER, HeaderValue::from_str(&headers.referer)?);
        defaults.insert(USER_AGENT, HeaderValue::from_str(&headers.user_agent)?);

        let client = Client::builder().default_headers(defaults).build()?;
        Ok(Self { client })
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

#[async_trait]
impl UpstreamPort for HttpUpstream {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| Self::classify(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upstream() -> HttpUpstream {
        HttpUpstream::new(&BrowserHeaders::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chunklist_w1700000000.m3u8"))
            .and(header("origin", "https://www.abbeyroad.com"))
            .and(header("referer", "https://www.abbeyroad.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/chunklist_w1700000000.m3u8", server.uri());
        let body = upstream().fetch(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(body, Bytes::from_static(b"#EXTM3U\n"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/media_w1_5.ts", server.uri());
        let err = upstream().fetch(&url, Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let url = format!("{}/media_w1_6.ts", server.uri());
        let err = upstream()
            .fetch(&url, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
    }
}
