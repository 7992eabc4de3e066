//! Intra-day backoff sequences
//!
//! The sequence is a fixed list of wait increments. Every retry episode walks
//! it from the start with its own cursor, so one episode can never exhaust the
//! sequence for the next one.

use std::time::Duration;

use crate::config::ConfigError;

/// Ordered, replayable list of wait increments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSequence {
    steps: Vec<Duration>,
}

impl BackoffSequence {
    /// Build a sequence from explicit durations
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyBackoff`] when `steps` is empty: the first
    /// value is the initial wait of every episode. Returns
    /// [`ConfigError::ZeroBackoffStep`] when a retry step after the first one
    /// is zero, since each retry must wait strictly later than the previous.
    pub fn new(steps: Vec<Duration>) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptyBackoff);
        }
        if let Some(index) = steps.iter().skip(1).position(Duration::is_zero) {
            return Err(ConfigError::ZeroBackoffStep { index: index + 1 });
        }
        Ok(Self { steps })
    }

    /// Build a sequence from a list of seconds, as found in configuration files
    ///
    /// # Errors
    ///
    /// Same as [`BackoffSequence::new`].
    pub fn from_secs(secs: &[u64]) -> Result<Self, ConfigError> {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// Wait applied before the first attempt of an episode
    pub fn first(&self) -> Duration {
        self.steps[0]
    }

    /// Step at `index`, or `None` once the sequence is exhausted
    pub fn get(&self, index: usize) -> Option<Duration> {
        self.steps.get(index).copied()
    }

    /// Number of steps, i.e. attempts per episode
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed sequence
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate over the steps from the start
    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.steps.iter().copied()
    }
}
