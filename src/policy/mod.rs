//! Policies deciding when to back up, what to keep and what to replicate.
//!
//! Policies are pure functions over a snapshot of backups. They classify
//! backups but never touch a repository themselves.

pub mod backup;
pub mod cleanup;
pub mod sync;

pub use backup::{BackupPolicy, TimeIntervalPolicy};
pub use cleanup::{CalendarConfig, CalendarPolicy, CleanupPolicy, ClearAllPolicy, LifetimePolicy};
pub use sync::{
    ClonePolicy, CopyPastePolicy, MovePolicy, SynchronizationPolicy, SynchronizeRecentPolicy,
};

use crate::backup::Backup;

/// Sorts backups from oldest to most recent.
pub(crate) fn sort_ascending(backups: &mut [Backup]) {
    backups.sort_by(|a, b| a.datetime().cmp(b.datetime()));
}
