use std::collections::HashSet;
use std::fmt;

use chrono::{Datelike, TimeDelta};

use crate::backup::Backup;
use crate::clock::SharedClock;

use super::sort_ascending;

/// Decides which backups of a repository have to go.
pub trait CleanupPolicy: fmt::Debug {
    /// Backups that survive the cleanup.
    fn filter_to_keep(&self, backups: &[Backup]) -> Vec<Backup>;

    /// Backups that are deleted, the complement of [filter_to_keep](Self::filter_to_keep).
    fn filter_to_cleanup(&self, backups: &[Backup]) -> Vec<Backup> {
        let keep: HashSet<String> = self
            .filter_to_keep(backups)
            .iter()
            .map(Backup::name)
            .collect();

        backups
            .iter()
            .filter(|backup| !keep.contains(&backup.name()))
            .cloned()
            .collect()
    }
}

/// Deletes every backup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearAllPolicy;

impl CleanupPolicy for ClearAllPolicy {
    fn filter_to_keep(&self, _backups: &[Backup]) -> Vec<Backup> {
        Vec::new()
    }

    fn filter_to_cleanup(&self, backups: &[Backup]) -> Vec<Backup> {
        backups.to_vec()
    }
}

/// Keeps backups younger than `max_age`, but never less than the `minimum`
/// most recent ones.
#[derive(Debug, Clone)]
pub struct LifetimePolicy {
    max_age: TimeDelta,
    minimum: usize,
    clock: SharedClock,
}

impl LifetimePolicy {
    pub fn new(max_age: TimeDelta, minimum: usize, clock: SharedClock) -> Self {
        Self {
            max_age,
            minimum,
            clock,
        }
    }

    pub fn max_age(&self) -> TimeDelta {
        self.max_age
    }

    pub fn minimum(&self) -> usize {
        self.minimum
    }

    /// Returns if the backup is older than `max_age`.
    pub fn outdated(&self, backup: &Backup) -> bool {
        self.clock.now() - *backup.datetime() > self.max_age
    }

    fn valid_backups(&self, backups: &[Backup]) -> Vec<Backup> {
        backups
            .iter()
            .filter(|backup| !self.outdated(backup))
            .cloned()
            .collect()
    }

    fn minimal_backups(&self, backups: &[Backup]) -> Vec<Backup> {
        let mut backups = backups.to_vec();
        sort_ascending(&mut backups);

        let skip = backups.len().saturating_sub(self.minimum);
        backups.split_off(skip)
    }
}

impl CleanupPolicy for LifetimePolicy {
    fn filter_to_keep(&self, backups: &[Backup]) -> Vec<Backup> {
        let valid = self.valid_backups(backups);
        let minimal = self.minimal_backups(backups);

        let mut keep = if valid.len() > minimal.len() {
            valid
        } else {
            minimal
        };
        sort_ascending(&mut keep);
        keep
    }
}

/// Number of periods to keep per calendar granularity.
///
/// [None] keeps every period of the granularity, `Some(0)` disables it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    /// Days represented by their most recent backup.
    pub daily: Option<usize>,
    /// ISO weeks.
    pub weekly: Option<usize>,
    pub monthly: Option<usize>,
    pub quarterly: Option<usize>,
    pub yearly: Option<usize>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            daily: Some(10),
            weekly: Some(0),
            monthly: Some(10),
            quarterly: Some(0),
            yearly: Some(10),
        }
    }
}

/// Keeps the most recent backup of each of the latest periods configured
/// in [CalendarConfig].
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarPolicy {
    pub config: CalendarConfig,
}

impl CalendarPolicy {
    pub fn new(config: CalendarConfig) -> Self {
        Self { config }
    }
}

impl CleanupPolicy for CalendarPolicy {
    fn filter_to_keep(&self, backups: &[Backup]) -> Vec<Backup> {
        let mut newest_first = backups.to_vec();
        sort_ascending(&mut newest_first);
        newest_first.reverse();

        let mut seen: [HashSet<(i32, u32)>; 5] = Default::default();
        let mut keep: Vec<Backup> = newest_first
            .into_iter()
            .filter(|backup| {
                let mut opens_period = false;
                for (period, seen) in Period::ALL.into_iter().zip(&mut seen) {
                    let has_room = period
                        .limit(&self.config)
                        .is_none_or(|limit| seen.len() < limit);
                    // every granularity has to record the backup's period
                    opens_period |= has_room && seen.insert(period.of(backup.datetime()));
                }
                opens_period
            })
            .collect();
        sort_ascending(&mut keep);
        keep
    }
}

#[derive(Debug, Clone, Copy)]
enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    const ALL: [Period; 5] = [
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Quarter,
        Period::Year,
    ];

    fn limit(self, config: &CalendarConfig) -> Option<usize> {
        match self {
            Period::Day => config.daily,
            Period::Week => config.weekly,
            Period::Month => config.monthly,
            Period::Quarter => config.quarterly,
            Period::Year => config.yearly,
        }
    }

    /// Key identifying the period `date` falls into.
    fn of(self, date: &impl Datelike) -> (i32, u32) {
        match self {
            Period::Day => (date.year(), date.ordinal()),
            Period::Week => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Period::Month => (date.year(), date.month()),
            Period::Quarter => (date.year(), date.month0() / 3),
            Period::Year => (date.year(), 0),
        }
    }
}
