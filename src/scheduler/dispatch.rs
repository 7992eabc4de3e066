//! Single-timeline dispatch loop
//!
//! The loop owns every `(scheduler, task)` pair for the lifetime of the
//! process. It always services the pair whose next attempt is due first,
//! sleeps until then, runs the task and feeds the outcome back into that
//! pair's scheduler. Tasks never run concurrently.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::convert::Infallible;
use std::time::Duration;

use super::source::{FailureOutcome, SourceScheduler};
use crate::config::ConfigError;

/// Time source used by the dispatch loop
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current local date
    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;

    /// Suspend the loop for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the local time zone and tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Unit of work bound to one scheduler
///
/// Implementors fetch the issue published on `date` and report whether the
/// attempt counts as a success.
#[async_trait]
pub trait PollTask: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run one attempt for `date`
    async fn run(&mut self, date: NaiveDate) -> bool;
}

/// What happened during one iteration of the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Task that was run
    pub task: String,
    /// Date that was attempted
    pub date: NaiveDate,
    /// Time slept before running the task
    pub slept: Duration,
    /// Outcome of the attempt
    pub outcome: AttemptOutcome,
}

/// Outcome of a single attempt as seen by the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The task succeeded; the scheduler moved to the next publication
    Succeeded,
    /// The task failed and will be retried for the same date
    RetryLater,
    /// The task failed and the date was abandoned
    GaveUp,
}

impl From<FailureOutcome> for AttemptOutcome {
    fn from(outcome: FailureOutcome) -> Self {
        match outcome {
            FailureOutcome::RetryLater => Self::RetryLater,
            FailureOutcome::GaveUp => Self::GaveUp,
        }
    }
}

/// Dispatch loop over a fixed set of sources
pub struct DispatchLoop<C: Clock> {
    entries: Vec<(SourceScheduler, Box<dyn PollTask>)>,
    clock: C,
}

impl<C: Clock> DispatchLoop<C> {
    /// Create the loop
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSources`] when `entries` is empty.
    pub fn new(
        entries: Vec<(SourceScheduler, Box<dyn PollTask>)>,
        clock: C,
    ) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoSources);
        }
        Ok(Self { entries, clock })
    }

    /// Number of sources served by the loop
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: an empty loop cannot be built
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedulers in configured order
    pub fn schedulers(&self) -> impl Iterator<Item = (&str, &SourceScheduler)> {
        self.entries
            .iter()
            .map(|(scheduler, task)| (task.name(), scheduler))
    }

    /// Index of the entry due first; ties go to the earliest configured entry
    fn next_due(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, (scheduler, _))| scheduler.wait_until())
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Run one iteration: select, sleep, execute, update the scheduler
    pub async fn step(&mut self) -> DispatchReport {
        let index = self.next_due();
        let wait_until = self.entries[index].0.wait_until();

        let slept = (wait_until - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        tracing::info!(
            task = %self.entries[index].1.name(),
            wait_secs = slept.as_secs(),
            wait_until = %wait_until,
            "Waiting for next attempt"
        );
        self.clock.sleep(slept).await;

        let (scheduler, task) = &mut self.entries[index];
        let date = scheduler.target_date();

        let outcome = if task.run(date).await {
            scheduler.success();
            tracing::info!(task = %task.name(), date = %date, "Attempt succeeded");
            AttemptOutcome::Succeeded
        } else {
            let outcome = scheduler.failure();
            match outcome {
                FailureOutcome::RetryLater => tracing::warn!(
                    task = %task.name(),
                    date = %date,
                    retry_at = %scheduler.wait_until(),
                    "Attempt failed, retrying later"
                ),
                FailureOutcome::GaveUp => tracing::error!(
                    task = %task.name(),
                    date = %date,
                    next_date = %scheduler.target_date(),
                    "Failed to download issue, giving up on this date"
                ),
            }
            outcome.into()
        };

        DispatchReport {
            task: task.name().to_string(),
            date,
            slept,
            outcome,
        }
    }

    /// Run until the hosting process stops
    pub async fn run(&mut self) -> Infallible {
        loop {
            self.step().await;
        }
    }
}
