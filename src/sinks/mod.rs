//! Delivery sinks for downloaded issues
//!
//! Every downloaded issue is handed to each configured sink in order. A sink
//! flagged *critical* is one whose failure makes the whole download count as
//! failed, so the scheduler retries later. Non-critical sinks are best effort.
//!
//! ```text
//!                  ┌──────────────┐
//!   issue ───────► │  SinkFanout  │
//!                  └──────┬───────┘
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!    ┌──────────┐   ┌──────────┐   ┌──────────┐
//!    │ Archive  │   │ Webhook  │   │   ...    │
//!    │(critical)│   │          │   │          │
//!    └──────────┘   └──────────┘   └──────────┘
//! ```

pub mod archive;
pub mod fanout;
pub mod webhook;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::config::{ConfigError, SinkConfig, StorageConfig};
use crate::sources::Issue;
use crate::storage::{CatalogError, IssueCatalog};

pub use archive::ArchiveSink;
pub use fanout::SinkFanout;
pub use webhook::{WebhookConfig, WebhookSink};

/// Result type for delivery operations
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors raised while delivering an issue to one sink
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Sink configuration is unusable
    #[error("Invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// Remote endpoint refused the issue
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Downloaded content of one issue, held in transient storage
///
/// The backing file is removed when the value is dropped.
#[derive(Debug)]
pub struct IssueContent {
    file: NamedTempFile,
    size: u64,
    sha256: String,
}

impl IssueContent {
    /// Wrap a fully written transient file
    pub fn new(file: NamedTempFile, size: u64, sha256: String) -> Self {
        Self { file, size, sha256 }
    }

    /// Location of the transient file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Content length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex-encoded SHA-256 of the content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Read the whole content
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// A delivery destination
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink name used in logs
    fn name(&self) -> &str;

    /// Whether a failure of this sink fails the whole download
    fn is_critical(&self) -> bool;

    /// Deliver one issue
    async fn deliver(&self, issue: &Issue, content: &IssueContent) -> DeliveryResult<()>;
}

/// Build the configured sinks in order
///
/// The issue catalog is opened lazily, only when an `archive` sink is present.
pub fn build_sinks(
    configs: &[SinkConfig],
    storage: &StorageConfig,
) -> crate::error::Result<Vec<Arc<dyn Sink>>> {
    let mut catalog: Option<Arc<IssueCatalog>> = None;
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(configs.len());

    for config in configs {
        let sink: Arc<dyn Sink> = match config.kind.as_str() {
            "archive" => {
                let options: archive::ArchiveOptions = config.options()?;
                let catalog = match &catalog {
                    Some(catalog) => Arc::clone(catalog),
                    None => {
                        let opened = Arc::new(IssueCatalog::open(&storage.catalog_path)?);
                        catalog = Some(Arc::clone(&opened));
                        opened
                    }
                };
                let dir = options
                    .dir
                    .unwrap_or_else(|| storage.archive_dir.clone());
                Arc::new(ArchiveSink::new(dir, catalog).with_critical(config.critical.unwrap_or(true)))
            }
            "webhook" => {
                let options: WebhookConfig = config.options()?;
                let sink = WebhookSink::new(options)
                    .map_err(|e| ConfigError::options("webhook", e.to_string()))?;
                Arc::new(sink.with_critical(config.critical.unwrap_or(false)))
            }
            other => {
                return Err(ConfigError::UnknownSinkKind {
                    kind: other.to_string(),
                }
                .into())
            }
        };

        tracing::info!(sink = %sink.name(), critical = sink.is_critical(), "Sink configured");
        sinks.push(sink);
    }

    Ok(sinks)
}

/// Check every sink configuration without creating anything on disk
///
/// Unlike [`build_sinks`], the issue catalog is not opened.
pub fn validate_sinks(configs: &[SinkConfig]) -> Result<(), ConfigError> {
    for config in configs {
        match config.kind.as_str() {
            "archive" => {
                let _: archive::ArchiveOptions = config.options()?;
            }
            "webhook" => {
                let options: WebhookConfig = config.options()?;
                options
                    .validate()
                    .map_err(|reason| ConfigError::options("webhook", reason))?;
            }
            other => {
                return Err(ConfigError::UnknownSinkKind {
                    kind: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_issue_content_removed_on_drop() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"pdf").unwrap();
        let content = IssueContent::new(file, 3, "hash".to_string());

        let path = content.path().to_path_buf();
        assert_eq!(content.read().await.unwrap(), b"pdf");
        assert_eq!(content.size(), 3);

        drop(content);
        assert!(!path.exists());
    }

    #[test]
    fn test_build_sinks_defaults() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig {
            archive_dir: dir.path().join("issues"),
            catalog_path: dir.path().join("catalog.db"),
            staging_dir: None,
        };
        let configs: Vec<SinkConfig> = toml::from_str::<toml::Table>(
            r#"
            [[sinks]]
            kind = "archive"

            [[sinks]]
            kind = "webhook"
            options = { url = "https://hooks.example.com/in" }
            "#,
        )
        .unwrap()["sinks"]
            .clone()
            .try_into()
            .unwrap();

        let sinks = build_sinks(&configs, &storage).unwrap();
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].name(), "archive");
        assert!(sinks[0].is_critical());
        assert_eq!(sinks[1].name(), "webhook");
        assert!(!sinks[1].is_critical());
    }

    #[test]
    fn test_build_sinks_unknown_kind() {
        let storage = StorageConfig::default();
        let configs = vec![SinkConfig {
            kind: "fax".to_string(),
            critical: None,
            options: toml::Table::new(),
        }];
        assert!(build_sinks(&configs, &storage).is_err());
        assert!(matches!(
            validate_sinks(&configs),
            Err(ConfigError::UnknownSinkKind { .. })
        ));
    }

    #[test]
    fn test_validate_sinks() {
        let configs: Vec<SinkConfig> = toml::from_str::<toml::Table>(
            r#"
            [[sinks]]
            kind = "archive"

            [[sinks]]
            kind = "webhook"
            options = { url = "ftp://hooks.example.com/in" }
            "#,
        )
        .unwrap()["sinks"]
            .clone()
            .try_into()
            .unwrap();

        assert!(matches!(
            validate_sinks(&configs),
            Err(ConfigError::InvalidOptions { .. })
        ));
        assert!(validate_sinks(&configs[..1]).is_ok());
    }
}
