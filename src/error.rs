//! Unified error handling for the paperboy crate
//!
//! Each layer has its own error type ([`ConfigError`], [`SourceError`],
//! [`DeliveryError`], [`CatalogError`]). [`Error`] wraps all of them so that
//! code crossing module boundaries can use a single `Result`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use paperboy::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!("Retrying later: {err}");
//!     } else {
//!         tracing::error!(category = ?err.category(), "Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::sinks::DeliveryError;
pub use crate::sources::SourceError;
pub use crate::storage::CatalogError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Source unreachable or misbehaving
    Source,
    /// Sink refused or failed a delivery
    Delivery,
    /// Catalog and file system errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Delivery => "delivery",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the paperboy crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors, fatal at startup
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Source errors (init, list, fetch)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Sink delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Issue catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (worth retrying later)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Source(_) => true,
            Self::Delivery(e) => !matches!(e, DeliveryError::InvalidConfig(_)),
            Self::Catalog(e) => !matches!(e, CatalogError::Corrupted(_)),
            Self::Io(_) => true,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Source(_) => ErrorCategory::Source,
            Self::Delivery(DeliveryError::InvalidConfig(_)) => ErrorCategory::Config,
            Self::Delivery(_) => ErrorCategory::Delivery,
            Self::Catalog(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
