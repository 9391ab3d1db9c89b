//! Lifecycle notifications.
//!
//! Supervisors, repositories and links report what they do to the
//! [Observers] they were constructed with. Observers only watch, the result
//! of a run never depends on them.

use std::fmt;
use std::rc::Rc;

use crate::backup::{Backup, Volume};
use crate::creator::BackupCreator;
use crate::policy::{CleanupPolicy, SynchronizationPolicy};
use crate::repository::Repository;

/// A point in the lifecycle of a supervisor run.
pub enum Event<'a> {
    BeforeBuildBackup {
        creator: &'a dyn BackupCreator,
        backup: &'a Backup,
    },
    AfterBuildBackup {
        creator: &'a dyn BackupCreator,
        backup: &'a Backup,
    },
    BeforeFetch {
        repository: &'a Repository,
        volume: Option<&'a Volume>,
    },
    AfterFetch {
        repository: &'a Repository,
        volume: Option<&'a Volume>,
        backups: &'a [Backup],
    },
    Synchronize {
        source: &'a Repository,
        target: &'a Repository,
        volume: Option<&'a Volume>,
        policy: &'a dyn SynchronizationPolicy,
        to_copy: &'a [Backup],
        to_delete: &'a [Backup],
    },
    Cleanup {
        repository: &'a Repository,
        volume: Option<&'a Volume>,
        policy: &'a dyn CleanupPolicy,
        cleaned: &'a [Backup],
    },
}

pub trait Observer {
    fn notify(&self, event: &Event<'_>);
}

/// Ordered list of observers handed to every component of a composition.
#[derive(Clone, Default)]
pub struct Observers(Vec<Rc<dyn Observer>>);

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl Observer + 'static) -> Self {
        self.push(Rc::new(observer));
        self
    }

    pub fn push(&mut self, observer: Rc<dyn Observer>) {
        self.0.push(observer);
    }

    pub fn notify(&self, event: &Event<'_>) {
        for observer in &self.0 {
            observer.notify(event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observers({})", self.0.len())
    }
}

/// Writes every event to the [log] facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &Event<'_>) {
        match event {
            Event::BeforeBuildBackup { creator, backup } => {
                log::info!(target: "supervisor", "Creating backup {backup} with {creator}");
            }
            Event::AfterBuildBackup { creator, backup } => {
                log::info!(target: "supervisor", "Backup {backup} has been created by {creator}");
            }
            Event::BeforeFetch { repository, volume } => match volume {
                Some(volume) => {
                    log::trace!(target: "repository", "Fetching {volume} backups from {repository}")
                }
                None => log::trace!(target: "repository", "Fetching backups from {repository}"),
            },
            Event::AfterFetch {
                repository,
                backups,
                ..
            } => {
                log::debug!(target: "repository", "Fetched {} backup(s) from {repository}", backups.len());
            }
            Event::Synchronize {
                source,
                target,
                policy,
                to_copy,
                to_delete,
                ..
            } => {
                log::info!(
                    target: "link",
                    "Synchronizing {source} to {target} ({policy:?}): {} to copy, {} to delete",
                    to_copy.len(),
                    to_delete.len(),
                );
            }
            Event::Cleanup {
                repository,
                volume,
                cleaned,
                ..
            } => match volume {
                Some(volume) => log::info!(
                    target: "repository",
                    "Cleaned up {} {volume} backup(s) in {repository}",
                    cleaned.len()
                ),
                None => log::info!(
                    target: "repository",
                    "Cleaned up {} backup(s) in {repository}",
                    cleaned.len()
                ),
            },
        }
    }
}
