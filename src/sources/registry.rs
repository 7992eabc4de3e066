//! Source registry
//!
//! Maps the `kind` of a `[[sources]]` entry to the constructor of its
//! implementation. Kinds are registered once at startup.

use std::collections::BTreeMap;

use super::directory::{DirectoryOptions, DirectorySource};
use super::feed::{FeedOptions, FeedSource};
use super::Source;
use crate::config::{ConfigError, SourceConfig};

/// Constructor of a source from its configuration entry
pub type SourceFactory = fn(&SourceConfig) -> Result<Box<dyn Source>, ConfigError>;

/// Registry of source kinds
#[derive(Clone, Default)]
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `feed` and `directory` kinds
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("feed", build_feed);
        registry.register("directory", build_directory);
        registry
    }

    /// Register (or replace) a kind
    pub fn register(&mut self, kind: impl Into<String>, factory: SourceFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the source described by `config`
    pub fn build(&self, config: &SourceConfig) -> Result<Box<dyn Source>, ConfigError> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| ConfigError::UnknownSourceKind {
                kind: config.kind.clone(),
            })?;
        factory(config)
    }
}

fn build_feed(config: &SourceConfig) -> Result<Box<dyn Source>, ConfigError> {
    let options: FeedOptions = config.options()?;
    let source =
        FeedSource::new(&config.name, options).map_err(|e| ConfigError::options(&config.name, e))?;
    Ok(Box::new(source))
}

fn build_directory(config: &SourceConfig) -> Result<Box<dyn Source>, ConfigError> {
    let options: DirectoryOptions = config.options()?;
    Ok(Box::new(DirectorySource::new(&config.name, options)))
}
