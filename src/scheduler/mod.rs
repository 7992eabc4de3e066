//! Adaptive per-source polling
//!
//! Newspapers appear on their own calendars and rarely at a predictable time
//! of day. Each source therefore gets a [`SourceScheduler`] that chases one
//! publication date at a time, probing it less and less eagerly as the day
//! goes on, and abandoning the date once retries would spill into the next
//! publication.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── DispatchLoop ────────────────────────────┐
//! │                                                                      │
//! │   (SourceScheduler, PollTask)   (SourceScheduler, PollTask)   ...     │
//! │           │                             │                            │
//! │           └──────── min(wait_until) ────┘                            │
//! │                          │                                           │
//! │                  sleep until due ──► run task ──► success / failure  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`calendar`] - Publication rules (daily, weekly)
//! - [`backoff`] - Replayable intra-day wait increments
//! - [`source`] - Episode state machine for one source
//! - [`dispatch`] - The single-timeline dispatch loop
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use paperboy::scheduler::{BackoffSequence, CalendarPolicy, FailureOutcome, SourceScheduler};
//!
//! let today = NaiveDate::from_ymd_opt(2012, 12, 22).unwrap();
//! let backoff = BackoffSequence::from_secs(&[44, 45]).unwrap();
//! let mut scheduler = SourceScheduler::new(CalendarPolicy::weekly(7), backoff, today);
//!
//! assert_eq!(scheduler.target_date(), NaiveDate::from_ymd_opt(2012, 12, 23).unwrap());
//! assert_eq!(scheduler.failure(), FailureOutcome::RetryLater);
//! assert_eq!(scheduler.failure(), FailureOutcome::GaveUp);
//! assert_eq!(scheduler.target_date(), NaiveDate::from_ymd_opt(2012, 12, 30).unwrap());
//! ```

pub mod backoff;
pub mod calendar;
pub mod dispatch;
pub mod source;

pub use backoff::BackoffSequence;
pub use calendar::CalendarPolicy;
pub use dispatch::{AttemptOutcome, Clock, DispatchLoop, DispatchReport, PollTask, SystemClock};
pub use source::{FailureOutcome, SourceScheduler};
