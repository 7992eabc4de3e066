//! Common test utilities

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use paperboy::scheduler::Clock;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shorthand for a calendar date
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midnight of the given date
#[allow(dead_code)]
pub fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(0, 0, 0).unwrap()
}

/// Clock that only moves when slept on
#[allow(dead_code)]
#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<NaiveDateTime>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl FakeClock {
    #[allow(dead_code)]
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every duration slept so far
    #[allow(dead_code)]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += chrono::Duration::from_std(duration).unwrap();
    }
}

/// Drop an issue file named the way the directory source expects
#[allow(dead_code)]
pub fn drop_issue(dir: &Path, title: &str, date: NaiveDate, content: &[u8]) {
    let name = format!("{title}_{}.pdf", date.format("%Y-%m-%d"));
    std::fs::write(dir.join(name), content).unwrap();
}
