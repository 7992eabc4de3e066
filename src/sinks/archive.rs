//! Local archive sink
//!
//! Copies each issue into the archive directory and records it in the issue
//! catalog. File names are `<title>-<date>-<n>.<ext>` where the title is
//! reduced to ASCII without `:` and `n` is the first free counter.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::fs::{File, OpenOptions};

use super::{DeliveryError, DeliveryResult, IssueContent, Sink};
use crate::sources::Issue;
use crate::storage::IssueCatalog;

/// Extension used when the issue reference does not carry one
const DEFAULT_EXTENSION: &str = "pdf";

/// Upper bound on the collision counter
const MAX_NAME_ATTEMPTS: u32 = 10_000;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 ._'()&,+-]").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Options of an `archive` sink
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveOptions {
    /// Archive directory, defaults to `storage.archive_dir`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Sink storing issues on disk and in the catalog
pub struct ArchiveSink {
    dir: PathBuf,
    catalog: Arc<IssueCatalog>,
    critical: bool,
}

impl ArchiveSink {
    /// Create a critical archive sink
    pub fn new(dir: impl Into<PathBuf>, catalog: Arc<IssueCatalog>) -> Self {
        Self {
            dir: dir.into(),
            catalog,
            critical: true,
        }
    }

    /// Set whether a delivery failure fails the download
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Archive directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty file with a free name for `issue`
    async fn create_unique(&self, issue: &Issue) -> DeliveryResult<(File, PathBuf)> {
        let base = format!("{}-{}", sanitize(&issue.title), issue.date.format("%Y-%m-%d"));
        let extension = extension_of(&issue.reference);

        for n in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(format!("{base}-{n}.{extension}"));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DeliveryError::Rejected(format!(
            "No free file name for '{base}' in {}",
            self.dir.display()
        )))
    }
}

/// Reduce a title to a file-name friendly ASCII string
fn sanitize(title: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE.replace_all(cleaned.trim(), "_");
    if collapsed.is_empty() {
        "issue".to_string()
    } else {
        collapsed.into_owned()
    }
}

/// Extension of the last path segment of `reference`
fn extension_of(reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit(['/', '\\']).next().unwrap_or_default();

    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

#[async_trait]
impl Sink for ArchiveSink {
    fn name(&self) -> &str {
        "archive"
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    async fn deliver(&self, issue: &Issue, content: &IssueContent) -> DeliveryResult<()> {
        if self.catalog.contains_hash(&issue.newspaper, content.sha256())? {
            tracing::info!(issue = %issue, sha256 = %content.sha256(), "Issue already archived");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let (mut dest, target) = self.create_unique(issue).await?;

        let copied = async {
            let mut src = File::open(content.path()).await?;
            tokio::io::copy(&mut src, &mut dest).await?;
            dest.sync_all().await
        }
        .await;

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e.into());
        }

        if let Err(e) = self.catalog.add_issue(issue, &target.to_string_lossy(), content.sha256()) {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e.into());
        }

        tracing::info!(issue = %issue, path = %target.display(), "Issue archived");
        Ok(())
    }
}
