//! HTTP manifest source
//!
//! The publisher exposes a JSON manifest listing its recent issues:
//!
//! ```json
//! [
//!   { "title": "Le Temps", "date": "2013-06-07", "url": "/pdf/2013-06-07.pdf" },
//!   { "title": "Le Temps", "date": "06.06.2013", "url": "https://cdn.example.com/x.pdf" }
//! ]
//! ```
//!
//! Relative URLs are resolved against the manifest URL. When a `login_url` is
//! configured, `init` posts the credentials there and keeps the session
//! cookies for the listing and download requests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{Issue, IssueStream, Source, SourceError, SourceResult};

/// Accepted manifest date formats
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Options of a `feed` source
#[derive(Debug, Clone, Deserialize)]
pub struct FeedOptions {
    /// Manifest URL
    pub url: String,

    /// Login form endpoint; credentials are required when set
    #[serde(default)]
    pub login_url: Option<String>,

    /// Account name
    #[serde(default)]
    pub username: Option<String>,

    /// Account password
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("paperboy/{}", env!("CARGO_PKG_VERSION"))
}

impl FeedOptions {
    /// Options pointing at `url`, without authentication
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            login_url: None,
            username: None,
            password: None,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Manifest entry as served by the publisher
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    title: String,
    date: String,
    url: String,
}

/// Source reading a JSON manifest over HTTP
pub struct FeedSource {
    name: String,
    options: FeedOptions,
    manifest_url: Url,
    client: Option<Client>,
}

impl FeedSource {
    /// Create a new feed source
    pub fn new(name: impl Into<String>, options: FeedOptions) -> Result<Self, String> {
        let manifest_url =
            Url::parse(&options.url).map_err(|e| format!("invalid manifest URL: {e}"))?;
        if options.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        Ok(Self {
            name: name.into(),
            options,
            manifest_url,
            client: None,
        })
    }

    fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// Attach basic credentials when no login form is used
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.options.login_url, &self.options.username) {
            (None, Some(username)) => request.basic_auth(username, self.options.password.as_ref()),
            _ => request,
        }
    }

    async fn login(&self, client: &Client, login_url: &str) -> SourceResult<()> {
        let username = self
            .options
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SourceError::init(&self.name, "invalid username"))?;
        let password = self.options.password.as_deref().unwrap_or_default();

        let response = client
            .post(login_url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| SourceError::init(&self.name, e))?;

        if !response.status().is_success() {
            return Err(SourceError::init(
                &self.name,
                format!("login rejected with HTTP {}", response.status()),
            ));
        }

        tracing::info!(source = %self.name, "Logged in");
        Ok(())
    }

    fn entry_to_issue(&self, entry: ManifestEntry) -> Option<Issue> {
        let date = DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(entry.date.trim(), format).ok());

        let Some(date) = date else {
            tracing::warn!(
                source = %self.name,
                date = %entry.date,
                "Invalid date for an issue, skipping"
            );
            return None;
        };

        let url = match self.manifest_url.join(&entry.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(source = %self.name, url = %entry.url, error = %e, "Invalid issue URL, skipping");
                return None;
            }
        };

        Some(Issue::new(&self.name, entry.title.trim(), date, url.as_str()))
    }
}

#[async_trait]
impl Source for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> SourceResult<()> {
        self.client = None;

        let client = Client::builder()
            .user_agent(&self.options.user_agent)
            .timeout(Duration::from_secs(self.options.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| SourceError::init(&self.name, e))?;

        if let Some(login_url) = &self.options.login_url {
            self.login(&client, login_url).await?;
        }

        self.client = Some(client);
        Ok(())
    }

    async fn list_issues(&self) -> SourceResult<Vec<Issue>> {
        let client = self
            .client()
            .ok_or_else(|| SourceError::list(&self.name, "source is not initialized"))?;

        let response = self
            .authorize(client.get(self.manifest_url.clone()))
            .send()
            .await
            .map_err(|e| SourceError::list(&self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::list(&self.name, format!("HTTP {status}")));
        }

        let entries: Vec<ManifestEntry> = response
            .json()
            .await
            .map_err(|e| SourceError::list(&self.name, e))?;

        let mut issues: Vec<Issue> = entries
            .into_iter()
            .filter_map(|entry| self.entry_to_issue(entry))
            .collect();
        issues.sort_by(|a, b| (b.date, &b.title).cmp(&(a.date, &a.title)));

        tracing::info!(source = %self.name, count = issues.len(), "Issues found on the website");
        Ok(issues)
    }

    async fn open(&self, issue: &Issue) -> SourceResult<Box<dyn IssueStream>> {
        let client = self
            .client()
            .ok_or_else(|| SourceError::fetch(&issue.title, "source is not initialized"))?;

        let response = self
            .authorize(client.get(&issue.reference))
            .send()
            .await
            .map_err(|e| SourceError::fetch(&issue.title, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::fetch(&issue.title, format!("HTTP {status}")));
        }

        Ok(Box::new(ResponseStream {
            title: issue.title.clone(),
            response: Some(response),
        }))
    }
}

/// Streaming body of an issue download
struct ResponseStream {
    title: String,
    response: Option<Response>,
}

#[async_trait]
impl IssueStream for ResponseStream {
    async fn next_chunk(&mut self) -> SourceResult<Option<Bytes>> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        response
            .chunk()
            .await
            .map_err(|e| SourceError::fetch(&self.title, e))
    }

    async fn close(&mut self) {
        self.response = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> FeedSource {
        FeedSource::new("Le Temps", FeedOptions::new("https://example.com/epaper/list.json"))
            .unwrap()
    }

    #[test]
    fn test_invalid_manifest_url() {
        assert!(FeedSource::new("x", FeedOptions::new("not a url")).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut options = FeedOptions::new("https://example.com/list.json");
        options.timeout_secs = 0;
        assert!(FeedSource::new("x", options).is_err());
    }

    #[test]
    fn test_entry_dates_and_urls() {
        let source = source();

        let issue = source
            .entry_to_issue(ManifestEntry {
                title: " Le Temps ".to_string(),
                date: "07.06.2013".to_string(),
                url: "../pdf/lt-2013-06-07.pdf".to_string(),
            })
            .unwrap();
        assert_eq!(issue.title, "Le Temps");
        assert_eq!(issue.date, NaiveDate::from_ymd_opt(2013, 6, 7).unwrap());
        assert_eq!(issue.reference, "https://example.com/pdf/lt-2013-06-07.pdf");
        assert_eq!(issue.newspaper, "Le Temps");

        let invalid = source.entry_to_issue(ManifestEntry {
            title: "Le Temps".to_string(),
            date: "yesterday".to_string(),
            url: "x.pdf".to_string(),
        });
        assert!(invalid.is_none());
    }

    #[tokio::test]
    async fn test_list_requires_init() {
        let source = source();
        assert!(matches!(
            source.list_issues().await,
            Err(SourceError::List { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_requires_username() {
        let mut options = FeedOptions::new("https://example.com/list.json");
        options.login_url = Some("https://example.com/login".to_string());
        let mut source = FeedSource::new("Le Temps", options).unwrap();

        assert!(matches!(source.init().await, Err(SourceError::Init { .. })));
    }
}
