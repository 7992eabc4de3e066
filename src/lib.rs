//! paperboy - Adaptive newspaper issue poller
//!
//! Polls a set of irregularly publishing newspapers, downloads each new issue
//! once it appears and hands it to a list of delivery sinks.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`scheduler`] - Publication calendars, per-source backoff and the dispatch loop
//! - [`download`] - The fetch-and-distribute cycle run on each wakeup
//! - [`sources`] - Source trait, built-in sources and their registry
//! - [`sinks`] - Sink trait, built-in sinks and the fanout
//! - [`storage`] - SQLite issue catalog
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use paperboy::config::Config;
//! use paperboy::download::DownloadTask;
//! use paperboy::scheduler::{DispatchLoop, PollTask, SystemClock};
//! use paperboy::sinks::{build_sinks, SinkFanout};
//! use paperboy::sources::SourceRegistry;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some(Path::new("paperboy.toml")))?;
//!     config.validate()?;
//!
//!     let fanout = SinkFanout::new(build_sinks(&config.sinks, &config.storage)?);
//!     let registry = SourceRegistry::with_builtin();
//!     let today = chrono::Local::now().date_naive();
//!
//!     let mut entries: Vec<(_, Box<dyn PollTask>)> = Vec::new();
//!     for source in &config.sources {
//!         let task = DownloadTask::new(registry.build(source)?, fanout.clone());
//!         entries.push((source.scheduler(today)?, Box::new(task)));
//!     }
//!
//!     let mut dispatch = DispatchLoop::new(entries, SystemClock)?;
//!     match dispatch.run().await {}
//! }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod scheduler;
pub mod sinks;
pub mod sources;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigError};
    pub use crate::download::DownloadTask;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::scheduler::{
        BackoffSequence, CalendarPolicy, DispatchLoop, PollTask, SourceScheduler, SystemClock,
    };
    pub use crate::sinks::{Sink, SinkFanout};
    pub use crate::sources::{Issue, Source, SourceRegistry};
    pub use crate::storage::IssueCatalog;
}

// Direct re-exports for convenience
pub use sources::Issue;
