use std::fmt;

use chrono::TimeDelta;

use crate::backup::Backup;
use crate::clock::SharedClock;

/// Decides whether a new backup is due.
pub trait BackupPolicy: fmt::Debug {
    fn should_backup(&self, backups: &[Backup]) -> bool;
}

/// A backup is due once `interval` has passed since the most recent one.
#[derive(Debug, Clone)]
pub struct TimeIntervalPolicy {
    interval: TimeDelta,
    clock: SharedClock,
}

impl TimeIntervalPolicy {
    pub fn new(interval: TimeDelta, clock: SharedClock) -> Self {
        Self { interval, clock }
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }
}

impl BackupPolicy for TimeIntervalPolicy {
    fn should_backup(&self, backups: &[Backup]) -> bool {
        let Some(last) = backups.iter().map(Backup::datetime).max() else {
            return true;
        };

        self.clock.now() - *last >= self.interval
    }
}
