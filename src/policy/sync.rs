use std::collections::HashSet;
use std::fmt;

use crate::backup::Backup;

use super::sort_ascending;

/// Computes how a target repository is reconciled with a source repository.
///
/// Both operations see the same pair of snapshots within one synchronization
/// cycle. Backups are compared by [name](Backup::name).
pub trait SynchronizationPolicy: fmt::Debug {
    /// Backups of `source` to copy to the target.
    fn to_copy(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup>;

    /// Backups of `target` to delete once copying finished.
    fn to_delete(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup>;

    /// Backups of `source` to delete once copying finished.
    fn to_delete_from_source(&self, _source: &[Backup], _target: &[Backup]) -> Vec<Backup> {
        Vec::new()
    }
}

/// Backups of `backups` whose name is absent from `other`.
fn missing_from(backups: &[Backup], other: &[Backup]) -> Vec<Backup> {
    let present: HashSet<String> = other.iter().map(Backup::name).collect();

    backups
        .iter()
        .filter(|backup| !present.contains(&backup.name()))
        .cloned()
        .collect()
}

/// Copies everything missing on the target, never deletes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPastePolicy;

impl SynchronizationPolicy for CopyPastePolicy {
    fn to_copy(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        missing_from(source, target)
    }

    fn to_delete(&self, _source: &[Backup], _target: &[Backup]) -> Vec<Backup> {
        Vec::new()
    }
}

/// Keeps exactly the `minimum` most recent backups on the target.
///
/// The most recent backups known to either side are kept. Those missing on
/// the target are copied, every other target backup is evicted.
#[derive(Debug, Clone, Copy)]
pub struct SynchronizeRecentPolicy {
    minimum: usize,
}

impl SynchronizeRecentPolicy {
    pub fn new(minimum: usize) -> Self {
        Self { minimum }
    }

    pub fn minimum(&self) -> usize {
        self.minimum
    }

    /// The `minimum` most recent backups of source and target together.
    fn retained(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        let mut known = target.to_vec();
        known.extend(missing_from(source, target));
        known.sort_by(|a, b| {
            a.datetime()
                .cmp(b.datetime())
                .then_with(|| a.name().cmp(&b.name()))
        });

        let skip = known.len().saturating_sub(self.minimum);
        known.split_off(skip)
    }
}

impl SynchronizationPolicy for SynchronizeRecentPolicy {
    fn to_copy(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        missing_from(&self.retained(source, target), target)
    }

    fn to_delete(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        let mut evicted = missing_from(target, &self.retained(source, target));
        sort_ascending(&mut evicted);
        evicted
    }
}

/// Copies everything missing on the target, then empties the source.
///
/// Used for temporary stages of a pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovePolicy;

impl SynchronizationPolicy for MovePolicy {
    fn to_copy(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        missing_from(source, target)
    }

    fn to_delete(&self, _source: &[Backup], _target: &[Backup]) -> Vec<Backup> {
        Vec::new()
    }

    fn to_delete_from_source(&self, source: &[Backup], _target: &[Backup]) -> Vec<Backup> {
        source.to_vec()
    }
}

/// Makes the target hold exactly the backups of the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClonePolicy;

impl SynchronizationPolicy for ClonePolicy {
    fn to_copy(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        missing_from(source, target)
    }

    fn to_delete(&self, source: &[Backup], target: &[Backup]) -> Vec<Backup> {
        missing_from(target, source)
    }
}
