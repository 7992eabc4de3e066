//! Integration tests for the dispatch loop driving real download tasks
//!
//! These tests wire a directory source, the archive sink and the dispatch
//! loop together under a fake clock.

mod common;

use common::{date, drop_issue, midnight, FakeClock};
use paperboy::download::DownloadTask;
use paperboy::scheduler::{
    AttemptOutcome, BackoffSequence, CalendarPolicy, DispatchLoop, PollTask, SourceScheduler,
};
use paperboy::sinks::{ArchiveSink, Sink, SinkFanout};
use paperboy::sources::directory::{DirectoryOptions, DirectorySource};
use paperboy::storage::IssueCatalog;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn directory_task(drop_dir: &Path, fanout: SinkFanout) -> Box<dyn PollTask> {
    let source = DirectorySource::new(
        "Hebdo",
        DirectoryOptions {
            path: drop_dir.to_path_buf(),
        },
    );
    Box::new(DownloadTask::new(Box::new(source), fanout))
}

fn archive_fanout(archive: &Path, catalog: &Arc<IssueCatalog>) -> SinkFanout {
    let sink: Arc<dyn Sink> = Arc::new(ArchiveSink::new(archive, Arc::clone(catalog)));
    SinkFanout::new(vec![sink])
}

// ============================================================================
// Weekly Source Tests
// ============================================================================

#[tokio::test]
async fn test_weekly_issue_archived_then_next_week_targeted() {
    let drop_dir = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    let catalog = Arc::new(IssueCatalog::open_in_memory().unwrap());

    // Thursday 2013-06-13 is the publication day
    drop_issue(drop_dir.path(), "Hebdo", date(2013, 6, 13), b"%PDF weekly");

    let scheduler = SourceScheduler::new(
        CalendarPolicy::weekly(4),
        BackoffSequence::from_secs(&[3600, 43200]).unwrap(),
        date(2013, 6, 10),
    );
    let clock = FakeClock::at(midnight(2013, 6, 10));
    let mut dispatch = DispatchLoop::new(
        vec![(
            scheduler,
            directory_task(drop_dir.path(), archive_fanout(archive.path(), &catalog)),
        )],
        clock.clone(),
    )
    .unwrap();

    let report = dispatch.step().await;
    assert_eq!(report.date, date(2013, 6, 13));
    assert_eq!(report.outcome, AttemptOutcome::Succeeded);
    // Three days plus the first backoff step
    assert_eq!(report.slept, Duration::from_secs(3 * 86_400 + 3600));

    let archived = catalog.issues(Some("Hebdo"), None).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].date, date(2013, 6, 13));

    let (_, scheduler) = dispatch.schedulers().next().unwrap();
    assert_eq!(scheduler.target_date(), date(2013, 6, 20));
}

#[tokio::test]
async fn test_missing_issue_retried_then_given_up() {
    let drop_dir = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    let catalog = Arc::new(IssueCatalog::open_in_memory().unwrap());

    // Daily source, Monday target, nothing is ever published
    let scheduler = SourceScheduler::new(
        CalendarPolicy::daily(),
        BackoffSequence::from_secs(&[3600, 43200, 43200]).unwrap(),
        date(2013, 6, 2),
    );
    let clock = FakeClock::at(midnight(2013, 6, 3));
    let mut dispatch = DispatchLoop::new(
        vec![(
            scheduler,
            directory_task(drop_dir.path(), archive_fanout(archive.path(), &catalog)),
        )],
        clock.clone(),
    )
    .unwrap();

    // 01:00, no issue
    let report = dispatch.step().await;
    assert_eq!(report.date, date(2013, 6, 3));
    assert_eq!(report.outcome, AttemptOutcome::RetryLater);

    // 13:00, still nothing; the next step would land on Tuesday
    let report = dispatch.step().await;
    assert_eq!(report.date, date(2013, 6, 3));
    assert_eq!(report.slept, Duration::from_secs(43200));
    assert_eq!(report.outcome, AttemptOutcome::GaveUp);

    // Tuesday's issue shows up and is picked at 01:00
    drop_issue(drop_dir.path(), "Hebdo", date(2013, 6, 4), b"%PDF tuesday");
    let report = dispatch.step().await;
    assert_eq!(report.date, date(2013, 6, 4));
    assert_eq!(report.outcome, AttemptOutcome::Succeeded);
    assert_eq!(report.slept, Duration::from_secs(12 * 3600));

    assert_eq!(catalog.issues(None, None).unwrap().len(), 1);
}

// ============================================================================
// Multi-Source Tests
// ============================================================================

#[tokio::test]
async fn test_sources_interleave_by_wait_time() {
    let early = TempDir::new().unwrap();
    let late = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    let catalog = Arc::new(IssueCatalog::open_in_memory().unwrap());
    let fanout = archive_fanout(archive.path(), &catalog);

    drop_issue(early.path(), "Early", date(2013, 6, 4), b"early");
    drop_issue(late.path(), "Late", date(2013, 6, 4), b"late");

    let today = date(2013, 6, 3);
    let clock = FakeClock::at(midnight(2013, 6, 4));
    let mut dispatch = DispatchLoop::new(
        vec![
            (
                SourceScheduler::new(
                    CalendarPolicy::daily(),
                    BackoffSequence::from_secs(&[200]).unwrap(),
                    today,
                ),
                directory_task(late.path(), fanout.clone()),
            ),
            (
                SourceScheduler::new(
                    CalendarPolicy::daily(),
                    BackoffSequence::from_secs(&[12]).unwrap(),
                    today,
                ),
                directory_task(early.path(), fanout.clone()),
            ),
        ],
        clock.clone(),
    )
    .unwrap();

    dispatch.step().await;
    dispatch.step().await;

    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(12), Duration::from_secs(188)]
    );
    assert_eq!(catalog.issues(None, None).unwrap().len(), 2);
}
