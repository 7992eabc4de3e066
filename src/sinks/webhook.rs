//! Webhook sink
//!
//! POSTs the raw issue content to an HTTP endpoint. Issue metadata travels in
//! headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-Issue-Title` | Title, percent-encoded UTF-8 |
//! | `X-Issue-Date` | `YYYY-MM-DD` |
//! | `X-Issue-Source` | Newspaper name, percent-encoded UTF-8 |

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{DeliveryError, DeliveryResult, IssueContent, Sink};
use crate::sources::Issue;

/// Webhook sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving the issues
    pub url: String,

    /// Optional bearer token
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each following one
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl WebhookConfig {
    /// Create a configuration with default timeout and retries
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }

    /// Set the bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the retry policy
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.url).map_err(|e| format!("Invalid webhook URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("Webhook URL must use http or https".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Sink POSTing issues to a webhook
pub struct WebhookSink {
    config: WebhookConfig,
    client: Client,
    critical: bool,
}

impl WebhookSink {
    /// Create a non-critical webhook sink
    pub fn new(config: WebhookConfig) -> DeliveryResult<Self> {
        config.validate().map_err(DeliveryError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            critical: false,
        })
    }

    /// Set whether a delivery failure fails the download
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn post_with_retry(&self, issue: &Issue, body: Bytes) -> DeliveryResult<()> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(
                    self.config
                        .retry_delay_ms
                        .saturating_mul(2_u64.saturating_pow(attempt - 1)),
                );
                tokio::time::sleep(delay).await;
                tracing::debug!(
                    "Retrying webhook delivery (attempt {}/{})",
                    attempt + 1,
                    self.config.max_retries + 1
                );
            }

            let mut request = self
                .client
                .post(&self.config.url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .header("X-Issue-Title", encode_header(&issue.title))
                .header("X-Issue-Date", issue.date.format("%Y-%m-%d").to_string())
                .header("X-Issue-Source", encode_header(&issue.newspaper));

            if let Some(token) = &self.config.auth_token {
                request = request.bearer_auth(token);
            }
            for (key, value) in &self.config.headers {
                request = request.header(key, value);
            }

            match request.body(body.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(
                        url = %self.config.url,
                        status = %response.status(),
                        issue = %issue,
                        "Issue posted to webhook"
                    );
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    last_error = Some(DeliveryError::Rejected(format!("HTTP {status}: {text}")));

                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(DeliveryError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DeliveryError::Rejected("Unknown error".to_string())))
    }
}

fn encode_header(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    async fn deliver(&self, issue: &Issue, content: &IssueContent) -> DeliveryResult<()> {
        let body = Bytes::from(content.read().await?);
        self.post_with_retry(issue, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issue() -> Issue {
        Issue::new(
            "Le Temps",
            "Le Temps du jour",
            NaiveDate::from_ymd_opt(2013, 6, 7).unwrap(),
            "https://example.com/2013-06-07.pdf",
        )
    }

    fn content(bytes: &[u8]) -> IssueContent {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        IssueContent::new(file, bytes.len() as u64, "hash".to_string())
    }

    #[test]
    fn test_webhook_config_validation() {
        assert!(WebhookConfig::new("https://example.com/in").validate().is_ok());
        assert!(WebhookConfig::new("").validate().is_err());
        assert!(WebhookConfig::new("example.com/in").validate().is_err());
        assert!(WebhookConfig::new("ftp://example.com/in").validate().is_err());
        assert!(WebhookConfig::new("https://example.com")
            .with_timeout(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_webhook_config_defaults_from_toml() {
        let config: WebhookConfig = toml::from_str("url = \"https://example.com/in\"").unwrap();
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 3);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_webhook_sink_creation() {
        let sink = WebhookSink::new(WebhookConfig::new("https://example.com/in")).unwrap();
        assert_eq!(sink.name(), "webhook");
        assert!(!sink.is_critical());
        assert!(sink.with_critical(true).is_critical());

        assert!(matches!(
            WebhookSink::new(WebhookConfig::new("not-a-url")),
            Err(DeliveryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_encode_header() {
        assert_eq!(encode_header("Le Temps"), "Le+Temps");
        assert_eq!(encode_header("Zürich"), "Z%C3%BCrich");
    }

    #[tokio::test]
    async fn test_deliver_posts_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in"))
            .and(header("X-Issue-Date", "2013-06-07"))
            .and(header("X-Issue-Source", "Le+Temps"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_bytes(b"%PDF-1.4".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = WebhookConfig::new(format!("{}/in", server.uri())).with_auth_token("secret");
        let sink = WebhookSink::new(config).unwrap();

        sink.deliver(&issue(), &content(b"%PDF-1.4")).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(413))
            .expect(1)
            .mount(&server)
            .await;

        let config = WebhookConfig::new(server.uri()).with_retries(3, 1);
        let sink = WebhookSink::new(config).unwrap();

        let result = sink.deliver(&issue(), &content(b"big")).await;
        assert!(matches!(result, Err(DeliveryError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_retry_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let config = WebhookConfig::new(server.uri()).with_retries(2, 1);
        let sink = WebhookSink::new(config).unwrap();

        assert!(sink.deliver(&issue(), &content(b"pdf")).await.is_err());
    }
}
