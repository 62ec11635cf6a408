//! Page rendering
//!
//! The scheduler only needs HTML for a URL. [`HttpRenderer`] fetches it with a
//! plain GET, which is enough for the server-rendered parts of the supported
//! platforms; the dynamic-content options are carried for renderers that
//! drive a real browser.

use crate::config::RendererConfig;
use crate::crawler::backoff::IsRetryable;
use crate::extract::Document;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// How a page should be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub wait_for_dynamic_content: bool,
    pub scroll_count: u32,
    pub headless: bool,
    pub timeout: Duration,
}

impl RenderOptions {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            wait_for_dynamic_content: config.wait_for_dynamic_content,
            scroll_count: config.scroll_count,
            headless: config.headless,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("render timed out")]
    Timeout,

    #[error("page not found")]
    NotFound,

    #[error("blocked: {0}")]
    Blocked(String),
}

impl IsRetryable for RenderError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Turns a URL into a document snapshot
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<Document, RenderError>;
}

/// Builds the HTTP client used for page fetches
pub fn build_http_client(config: &RendererConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Static HTML renderer backed by reqwest
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    /// Fetches a page and classifies failures
    ///
    /// | Condition            | Result      |
    /// |----------------------|-------------|
    /// | HTTP 404 / 410       | `NotFound`  |
    /// | HTTP 401 / 403 / 429 | `Blocked`   |
    /// | other non-2xx        | `Blocked`   |
    /// | timeout              | `Timeout`   |
    /// | connection error     | `Blocked`   |
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<Document, RenderError> {
        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(RenderError::NotFound);
        }
        if !status.is_success() {
            return Err(RenderError::Blocked(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(classify_reqwest_error)?;

        Ok(Document::new(final_url, html))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> RenderError {
    if e.is_timeout() {
        RenderError::Timeout
    } else if e.is_connect() {
        RenderError::Blocked("connection refused".to_string())
    } else {
        RenderError::Blocked(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn renderer() -> HttpRenderer {
        HttpRenderer::new(&RendererConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_render_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artist"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><a href=\"/artist/track\">t</a></html>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/artist", server.uri());
        let document = renderer()
            .render(&url, &RenderOptions::default())
            .await
            .unwrap();

        assert_eq!(document.url, url);
        assert!(document.html.contains("/artist/track"));
    }

    #[tokio::test]
    async fn test_render_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = renderer()
            .render(&format!("{}/gone", server.uri()), &RenderOptions::default())
            .await;
        assert_eq!(result.unwrap_err(), RenderError::NotFound);
    }

    #[tokio::test]
    async fn test_render_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = renderer()
            .render(&server.uri(), &RenderOptions::default())
            .await;
        assert!(matches!(result, Err(RenderError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_render_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let options = RenderOptions {
            timeout: Duration::from_millis(100),
            ..RenderOptions::default()
        };
        let result = renderer().render(&server.uri(), &options).await;
        assert_eq!(result.unwrap_err(), RenderError::Timeout);
    }

    #[test]
    fn test_retry_classification() {
        assert!(RenderError::Timeout.is_retryable());
        assert!(RenderError::Blocked("HTTP 503".to_string()).is_retryable());
        assert!(!RenderError::NotFound.is_retryable());
    }

    #[test]
    fn test_options_from_config() {
        let config = RendererConfig {
            headless: false,
            scroll_count: 4,
            ..RendererConfig::default()
        };
        let options = RenderOptions::from_config(&config);
        assert!(!options.headless);
        assert_eq!(options.scroll_count, 4);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }
}
