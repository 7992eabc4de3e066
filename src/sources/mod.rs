//! Newspaper sources
//!
//! A source is the site-specific half of a download: it knows how to open a
//! session, list the issues currently on offer and stream one of them. The
//! scheduling and distribution logic only sees the [`Source`] trait.
//!
//! # Built-in sources
//!
//! | Kind | Module | Issues come from |
//! |------|--------|------------------|
//! | `feed` | [`feed`] | A JSON manifest served over HTTP |
//! | `directory` | [`directory`] | Files dropped in a local folder |
//!
//! New kinds are added to the [`SourceRegistry`] at startup.

pub mod directory;
pub mod feed;
pub mod registry;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use directory::DirectorySource;
pub use feed::FeedSource;
pub use registry::SourceRegistry;

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by a source
///
/// All of them are recoverable: the scheduler retries later.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Session could not be established
    #[error("Failed to initialize '{source_name}': {reason}")]
    Init { source_name: String, reason: String },

    /// Issue listing failed
    #[error("Failed to list issues of '{source_name}': {reason}")]
    List { source_name: String, reason: String },

    /// Issue content could not be retrieved
    #[error("Failed to fetch '{title}': {reason}")]
    Fetch { title: String, reason: String },
}

impl SourceError {
    /// Create an initialization error
    pub fn init(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Init {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a listing error
    pub fn list(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::List {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a fetch error
    pub fn fetch(title: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            title: title.into(),
            reason: reason.to_string(),
        }
    }
}

/// One issue of a newspaper as advertised by its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue title
    pub title: String,

    /// Publication date
    pub date: NaiveDate,

    /// Name of the newspaper
    pub newspaper: String,

    /// Opaque reference understood by the source (URL, path, ...)
    pub reference: String,
}

impl Issue {
    /// Create a new issue
    pub fn new(
        newspaper: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            date,
            newspaper: newspaper.into(),
            reference: reference.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.date)
    }
}

/// Byte stream of one issue
#[async_trait]
pub trait IssueStream: Send {
    /// Next chunk of content, `None` at the end of the stream
    async fn next_chunk(&mut self) -> SourceResult<Option<Bytes>>;

    /// Release the underlying resource
    async fn close(&mut self) {}
}

/// A newspaper that can be polled
#[async_trait]
pub trait Source: Send + Sync {
    /// Newspaper name
    fn name(&self) -> &str;

    /// Establish a session (log in, warm up a client, check a folder, ...)
    async fn init(&mut self) -> SourceResult<()>;

    /// Issues currently on offer
    async fn list_issues(&self) -> SourceResult<Vec<Issue>>;

    /// Open the content of `issue`
    async fn open(&self, issue: &Issue) -> SourceResult<Box<dyn IssueStream>>;
}
