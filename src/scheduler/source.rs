//! Per-source retry scheduling
//!
//! A [`SourceScheduler`] tracks which publication date a source is currently
//! chasing (the *episode*) and when the next attempt is due. Failures walk the
//! backoff sequence; an episode is abandoned once the next attempt would fall
//! on or after the following publication date.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration;

use super::backoff::BackoffSequence;
use super::calendar::CalendarPolicy;

/// Result of reporting a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The same date will be tried again later
    RetryLater,

    /// The date was missed for good; the scheduler moved to the next one
    GaveUp,
}

/// Mutable state of one episode
#[derive(Debug, Clone, PartialEq, Eq)]
struct SchedulerState {
    target_date: NaiveDate,
    accumulated_wait: Duration,
    backoff_cursor: usize,
}

/// Scheduler for a single source
#[derive(Debug, Clone)]
pub struct SourceScheduler {
    policy: CalendarPolicy,
    backoff: BackoffSequence,
    state: SchedulerState,
}

impl SourceScheduler {
    /// Create a scheduler whose first target is the next publication after `today`
    pub fn new(policy: CalendarPolicy, backoff: BackoffSequence, today: NaiveDate) -> Self {
        let state = SchedulerState {
            target_date: policy.next_eligible(today),
            accumulated_wait: backoff.first(),
            backoff_cursor: 0,
        };
        Self {
            policy,
            backoff,
            state,
        }
    }

    /// Publication rule of this scheduler
    pub fn policy(&self) -> CalendarPolicy {
        self.policy
    }

    /// Backoff sequence of this scheduler
    pub fn backoff(&self) -> &BackoffSequence {
        &self.backoff
    }

    /// Publication date pursued by the current episode
    pub fn target_date(&self) -> NaiveDate {
        self.state.target_date
    }

    /// Moment of the next attempt: midnight of the target date plus the
    /// accumulated backoff
    pub fn wait_until(&self) -> NaiveDateTime {
        let midnight = self.state.target_date.and_time(NaiveTime::MIN);
        chrono::Duration::from_std(self.state.accumulated_wait)
            .ok()
            .and_then(|wait| midnight.checked_add_signed(wait))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Number of failed attempts in the current episode
    pub fn attempts_failed(&self) -> usize {
        self.state.backoff_cursor
    }

    /// The current episode succeeded; move on to the next publication date
    pub fn success(&mut self) {
        self.start_next_episode();
    }

    /// The current attempt failed
    ///
    /// Returns [`FailureOutcome::GaveUp`] when the backoff sequence is
    /// exhausted or the next attempt would reach the next publication date.
    /// The scheduler then behaves exactly as after [`SourceScheduler::success`].
    pub fn failure(&mut self) -> FailureOutcome {
        let cursor = self.state.backoff_cursor + 1;

        let Some(step) = self.backoff.get(cursor) else {
            self.start_next_episode();
            return FailureOutcome::GaveUp;
        };

        self.state.backoff_cursor = cursor;
        self.state.accumulated_wait += step;

        let next_publication = self.policy.next_eligible(self.state.target_date);
        if self.wait_until().date() >= next_publication {
            self.start_next_episode();
            return FailureOutcome::GaveUp;
        }

        FailureOutcome::RetryLater
    }

    fn start_next_episode(&mut self) {
        self.state = SchedulerState {
            target_date: self.policy.next_eligible(self.state.target_date),
            accumulated_wait: self.backoff.first(),
            backoff_cursor: 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, s).unwrap()
    }

    fn backoff(secs: &[u64]) -> BackoffSequence {
        BackoffSequence::from_secs(secs).unwrap()
    }

    #[test]
    fn test_weekly_seeded_scheduler() {
        let scheduler =
            SourceScheduler::new(CalendarPolicy::weekly(7), backoff(&[44, 45]), date(2012, 12, 22));

        assert_eq!(scheduler.target_date(), date(2012, 12, 23));
        assert_eq!(scheduler.wait_until(), at(2012, 12, 23, 0, 0, 44));
    }

    #[test]
    fn test_weekly_failures_then_give_up() {
        let mut scheduler =
            SourceScheduler::new(CalendarPolicy::weekly(7), backoff(&[44, 45]), date(2012, 12, 22));

        assert_eq!(scheduler.failure(), FailureOutcome::RetryLater);
        assert_eq!(scheduler.target_date(), date(2012, 12, 23));
        assert_eq!(scheduler.wait_until(), at(2012, 12, 23, 0, 1, 29));

        // sequence exhausted
        assert_eq!(scheduler.failure(), FailureOutcome::GaveUp);
        assert_eq!(scheduler.target_date(), date(2012, 12, 30));
        assert_eq!(scheduler.wait_until(), at(2012, 12, 30, 0, 0, 44));
    }

    #[test]
    fn test_success_starts_new_episode() {
        let mut scheduler =
            SourceScheduler::new(CalendarPolicy::daily(), backoff(&[3600, 43_200]), date(2013, 6, 6));
        assert_eq!(scheduler.target_date(), date(2013, 6, 7));

        scheduler.failure();
        scheduler.success();

        assert_eq!(scheduler.target_date(), date(2013, 6, 8));
        assert_eq!(scheduler.wait_until(), at(2013, 6, 8, 1, 0, 0));
        assert_eq!(scheduler.attempts_failed(), 0);
    }

    #[test]
    fn test_success_twice_advances_twice() {
        let mut scheduler =
            SourceScheduler::new(CalendarPolicy::daily(), backoff(&[60]), date(2013, 6, 5));
        assert_eq!(scheduler.target_date(), date(2013, 6, 6));

        scheduler.success();
        assert_eq!(scheduler.target_date(), date(2013, 6, 7));
        scheduler.success();
        assert_eq!(scheduler.target_date(), date(2013, 6, 8));
    }

    #[test]
    fn test_give_up_when_crossing_next_publication() {
        // Friday target, daily including Saturday: next publication is Saturday
        let mut scheduler = SourceScheduler::new(
            CalendarPolicy::daily(),
            backoff(&[3600, 43_200, 43_200]),
            date(2013, 6, 6),
        );
        assert_eq!(scheduler.target_date(), date(2013, 6, 7));

        // 01:00 + 12h = 13:00, same day
        assert_eq!(scheduler.failure(), FailureOutcome::RetryLater);
        assert_eq!(scheduler.wait_until(), at(2013, 6, 7, 13, 0, 0));

        // 13:00 + 12h = 01:00 next day, which is the next publication date
        assert_eq!(scheduler.failure(), FailureOutcome::GaveUp);
        assert_eq!(scheduler.target_date(), date(2013, 6, 8));
        assert_eq!(scheduler.wait_until(), at(2013, 6, 8, 1, 0, 0));
    }

    #[test]
    fn test_retry_may_spill_past_midnight_when_next_publication_is_later() {
        // Weekly on Sunday: a retry on Monday is still before the next issue
        let mut scheduler = SourceScheduler::new(
            CalendarPolicy::weekly(7),
            backoff(&[0, 86_400, 86_400]),
            date(2013, 6, 14),
        );
        assert_eq!(scheduler.target_date(), date(2013, 6, 16));

        assert_eq!(scheduler.failure(), FailureOutcome::RetryLater);
        assert_eq!(scheduler.wait_until(), at(2013, 6, 17, 0, 0, 0));
        assert_eq!(scheduler.target_date(), date(2013, 6, 16));
    }

    #[test]
    fn test_wait_until_strictly_increases_within_episode() {
        let mut scheduler = SourceScheduler::new(
            CalendarPolicy::weekly(1),
            backoff(&[10, 20, 30, 40, 50]),
            date(2020, 1, 1),
        );
        let target = scheduler.target_date();
        let mut previous = scheduler.wait_until();

        for _ in 0..4 {
            assert_eq!(scheduler.failure(), FailureOutcome::RetryLater);
            assert_eq!(scheduler.target_date(), target);
            assert!(scheduler.wait_until() > previous);
            previous = scheduler.wait_until();
        }

        assert_eq!(scheduler.failure(), FailureOutcome::GaveUp);
        assert!(scheduler.target_date() > target);
    }

    #[test]
    fn test_single_step_sequence_gives_up_on_first_failure() {
        let mut scheduler =
            SourceScheduler::new(CalendarPolicy::daily(), backoff(&[0]), date(2013, 6, 3));
        let target = scheduler.target_date();

        assert_eq!(scheduler.failure(), FailureOutcome::GaveUp);
        assert_eq!(scheduler.target_date(), CalendarPolicy::daily().next_eligible(target));
    }
}
