//! Upstream frame source
//!
//! One HTTP GET per fetch against the node's still-image endpoint, bounded by
//! the configured timeout. Retrying is the caller's job.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::relay::frame::Frame;

/// Anything that can produce the next frame for a relay
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Fetch exactly one frame, making a single attempt
    async fn fetch(&self) -> Result<Frame, UpstreamError>;
}

/// Fetches frames from the camera node over HTTP
pub struct HttpFrameSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFrameSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| UpstreamError::Misconfigured(e.to_string()))?;

        if reqwest::Url::parse(&config.url).is_err() {
            tracing::warn!("Upstream URL {:?} does not parse; relays will stop immediately", config.url);
        }

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: config.fetch_timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch(&self) -> Result<Frame, UpstreamError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let data = response.bytes().await?;
        Ok(Frame::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_reports_its_settings() {
        let source = HttpFrameSource::new(&UpstreamConfig {
            url: "http://10.0.0.7:8000/video_feed".to_string(),
            fetch_timeout_ms: 750,
        })
        .unwrap();

        assert_eq!(source.url(), "http://10.0.0.7:8000/video_feed");
        assert_eq!(source.timeout(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_invalid_url_is_fatal() {
        let config = UpstreamConfig {
            url: "not a url".to_string(),
            fetch_timeout_ms: 100,
        };
        let source = HttpFrameSource::new(&config).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Misconfigured(_)), "got {:?}", err);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = UpstreamConfig {
            url: format!("http://127.0.0.1:{}/video_feed", port),
            fetch_timeout_ms: 500,
        };
        let source = HttpFrameSource::new(&config).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(err.is_transient(), "got {:?}", err);
    }
}
