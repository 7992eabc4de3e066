//! Fetch-and-distribute cycle
//!
//! A [`DownloadTask`] binds one source to the shared sink fanout. Each run
//! looks for the issue published on the target date, stages its content in a
//! temporary file and hands it to every sink.
//!
//! # Outcome
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Issue found, no critical sink failed | `true` |
//! | No issue for the date | `false` |
//! | A critical sink failed | `false` |
//! | Source error (init, list, fetch) or staging I/O error | `true` iff no sink is critical |
//!
//! The last row lets an unreachable source advance normally when nothing
//! critical depends on its content.

use async_trait::async_trait;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::scheduler::PollTask;
use crate::sinks::{IssueContent, SinkFanout};
use crate::sources::{Issue, IssueStream, Source};

/// One source bound to the sink fanout
pub struct DownloadTask {
    source: Box<dyn Source>,
    fanout: SinkFanout,
    staging_dir: Option<PathBuf>,
}

impl DownloadTask {
    /// Create a task staging into the system temporary directory
    pub fn new(source: Box<dyn Source>, fanout: SinkFanout) -> Self {
        Self {
            source,
            fanout,
            staging_dir: None,
        }
    }

    /// Stage downloads in `dir` instead of the system temporary directory
    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Run one cycle for `date`, propagating source and staging errors
    async fn download(&mut self, date: NaiveDate) -> Result<bool> {
        self.source.init().await?;

        let issues: Vec<Issue> = self
            .source
            .list_issues()
            .await?
            .into_iter()
            .filter(|issue| issue.date == date)
            .collect();

        if issues.is_empty() {
            tracing::info!(source = %self.source.name(), %date, "No issue published yet");
            return Ok(false);
        }

        let mut success = true;
        for issue in &issues {
            tracing::info!(source = %self.source.name(), issue = %issue, "New issue found");

            let stream = self.source.open(issue).await?;
            let content = stage(stream, self.staging_dir.as_deref()).await?;
            tracing::debug!(
                issue = %issue,
                size = content.size(),
                sha256 = %content.sha256(),
                "Issue staged"
            );

            if !self.fanout.distribute(issue, &content).await {
                success = false;
            }
        }

        Ok(success)
    }
}

/// Copy `stream` into a new temporary file, hashing it on the way
///
/// The stream is closed whatever happens. The file is removed when the
/// returned content (or the error path) drops it.
async fn stage(mut stream: Box<dyn IssueStream>, dir: Option<&Path>) -> Result<IssueContent> {
    let copied = copy_to_temp(stream.as_mut(), dir).await;
    stream.close().await;
    copied
}

async fn copy_to_temp(stream: &mut dyn IssueStream, dir: Option<&Path>) -> Result<IssueContent> {
    let temp = match dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            NamedTempFile::new_in(dir)?
        }
        None => NamedTempFile::new()?,
    };

    let mut file = tokio::fs::File::from_std(temp.reopen()?);
    let mut hasher = Sha256::new();
    let mut size = 0u64;

    while let Some(chunk) = stream.next_chunk().await? {
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(IssueContent::new(temp, size, format!("{:x}", hasher.finalize())))
}

#[async_trait]
impl PollTask for DownloadTask {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn run(&mut self, date: NaiveDate) -> bool {
        tracing::info!(source = %self.source.name(), %date, "Ready to download");

        match self.download(date).await {
            Ok(success) => success,
            Err(e) => {
                let tolerated = !self.fanout.any_critical();
                tracing::error!(
                    source = %self.source.name(),
                    %date,
                    error = %e,
                    tolerated,
                    "Error when loading issue"
                );
                tolerated
            }
        }
    }
}
