//! Publication calendars
//!
//! A [`CalendarPolicy`] maps the last publication date a scheduler worked on to
//! the next date on which the newspaper is expected to appear.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO weekday number of Saturday (Monday = 1)
const SATURDAY: u32 = 6;

/// ISO weekday number of Sunday
const SUNDAY: u32 = 7;

/// Rule deciding which dates a newspaper is published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarPolicy {
    /// Published every day except Sunday, and optionally except Saturday
    Daily {
        #[serde(default = "default_include_saturday")]
        include_saturday: bool,
    },

    /// Published once a week on a fixed ISO weekday (1 = Monday, 7 = Sunday)
    Weekly { publication_day: u32 },
}

fn default_include_saturday() -> bool {
    true
}

impl CalendarPolicy {
    /// Daily publication, Saturdays included
    pub fn daily() -> Self {
        Self::Daily {
            include_saturday: true,
        }
    }

    /// Daily publication on weekdays only
    pub fn weekdays() -> Self {
        Self::Daily {
            include_saturday: false,
        }
    }

    /// Weekly publication on the given ISO weekday
    pub fn weekly(publication_day: u32) -> Self {
        Self::Weekly { publication_day }
    }

    /// Check that the rule can ever produce a date
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Daily { .. } => true,
            Self::Weekly { publication_day } => (1..=7).contains(publication_day),
        }
    }

    /// The first publication date strictly after `date`
    ///
    /// A weekly rule whose `publication_day` is outside 1..=7 never matches;
    /// callers are expected to reject it with [`CalendarPolicy::is_valid`]
    /// first, and in that case the date one day later is returned.
    #[must_use]
    pub fn next_eligible(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);

        match *self {
            Self::Daily { include_saturday } => {
                while is_skipped_by_daily(next, include_saturday) {
                    next += Duration::days(1);
                }
            }
            Self::Weekly { publication_day } => {
                if !self.is_valid() {
                    return next;
                }
                while next.weekday().number_from_monday() != publication_day {
                    next += Duration::days(1);
                }
            }
        }

        next
    }
}

fn is_skipped_by_daily(date: NaiveDate, include_saturday: bool) -> bool {
    match date.weekday().number_from_monday() {
        SUNDAY => true,
        SATURDAY => !include_saturday,
        _ => false,
    }
}

impl fmt::Display for CalendarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily {
                include_saturday: true,
            } => write!(f, "daily (Mon-Sat)"),
            Self::Daily {
                include_saturday: false,
            } => write!(f, "daily (Mon-Fri)"),
            Self::Weekly { publication_day } => write!(f, "weekly (ISO day {publication_day})"),
        }
    }
}
