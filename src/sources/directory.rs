//! Local drop-folder source
//!
//! Issues are files named `<title>_<YYYY-MM-DD>.<ext>` placed in a directory,
//! for instance by a scanner or a manual download.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::{Issue, IssueStream, Source, SourceError, SourceResult};

/// Read buffer size for issue files
const CHUNK_SIZE: usize = 64 * 1024;

/// Options of a `directory` source
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryOptions {
    /// Folder scanned for issues
    pub path: PathBuf,
}

/// Source listing issue files in a local folder
pub struct DirectorySource {
    name: String,
    path: PathBuf,
}

impl DirectorySource {
    /// Create a new directory source
    pub fn new(name: impl Into<String>, options: DirectoryOptions) -> Self {
        Self {
            name: name.into(),
            path: options.path,
        }
    }

    /// Folder scanned by this source
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split `<title>_<YYYY-MM-DD>.<ext>` into its title and date
fn parse_file_name(path: &Path) -> Option<(String, NaiveDate)> {
    let stem = path.file_stem()?.to_str()?;
    let (title, date) = stem.rsplit_once('_')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some((title.replace('_', " "), date))
}

#[async_trait]
impl Source for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> SourceResult<()> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| SourceError::init(&self.name, format!("{}: {e}", self.path.display())))?;

        if !metadata.is_dir() {
            return Err(SourceError::init(
                &self.name,
                format!("'{}' is not a directory", self.path.display()),
            ));
        }
        Ok(())
    }

    async fn list_issues(&self) -> SourceResult<Vec<Issue>> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| SourceError::list(&self.name, e))?;

        let mut issues = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::list(&self.name, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| SourceError::list(&self.name, e))?
                .is_file();
            if !is_file {
                continue;
            }
            match parse_file_name(&path) {
                Some((title, date)) => {
                    issues.push(Issue::new(&self.name, title, date, path.to_string_lossy()));
                }
                None => tracing::debug!(path = %path.display(), "Ignoring file without issue date"),
            }
        }

        issues.sort_by(|a, b| (b.date, &b.title).cmp(&(a.date, &a.title)));
        Ok(issues)
    }

    async fn open(&self, issue: &Issue) -> SourceResult<Box<dyn IssueStream>> {
        let file = File::open(&issue.reference)
            .await
            .map_err(|e| SourceError::fetch(&issue.title, e))?;

        Ok(Box::new(FileStream {
            title: issue.title.clone(),
            file: Some(file),
        }))
    }
}

struct FileStream {
    title: String,
    file: Option<File>,
}

#[async_trait]
impl IssueStream for FileStream {
    async fn next_chunk(&mut self) -> SourceResult<Option<Bytes>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; CHUNK_SIZE];
        let read = file
            .read(&mut buf)
            .await
            .map_err(|e| SourceError::fetch(&self.title, e))?;

        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(Bytes::from(buf)))
    }

    async fn close(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name(Path::new("/drop/L_Hebdo_2013-06-13.pdf")),
            Some(("L Hebdo".to_string(), date(2013, 6, 13)))
        );
        assert_eq!(parse_file_name(Path::new("/drop/notes.txt")), None);
        assert_eq!(parse_file_name(Path::new("/drop/_2013-06-13.pdf")), None);
        assert_eq!(parse_file_name(Path::new("/drop/x_2013-13-40.pdf")), None);
    }

    #[tokio::test]
    async fn test_init_fails_on_missing_folder() {
        let mut source = DirectorySource::new(
            "Drop",
            DirectoryOptions {
                path: PathBuf::from("/nonexistent/paperboy/drop"),
            },
        );
        assert!(matches!(source.init().await, Err(SourceError::Init { .. })));
    }

    #[tokio::test]
    async fn test_list_and_read() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Hebdo_2013-06-13.pdf"), b"issue content").unwrap();
        std::fs::write(dir.path().join("Hebdo_2013-06-06.pdf"), b"older").unwrap();
        std::fs::write(dir.path().join("README"), b"ignored").unwrap();
        std::fs::create_dir(dir.path().join("Hebdo_2013-06-20.pdf")).unwrap();

        let mut source = DirectorySource::new(
            "Hebdo",
            DirectoryOptions {
                path: dir.path().to_path_buf(),
            },
        );
        source.init().await.unwrap();

        let issues = source.list_issues().await.unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].date, date(2013, 6, 13));
        assert_eq!(issues[1].date, date(2013, 6, 6));

        let mut stream = source.open(&issues[0]).await.unwrap();
        let mut content = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            content.extend_from_slice(&chunk);
        }
        stream.close().await;
        assert_eq!(content, b"issue content");
    }
}
