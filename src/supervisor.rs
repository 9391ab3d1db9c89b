//! Orchestration of one backup stream.
//!
//! A [BackupSupervisor] owns the `(project, volume)` stream of a creator. One
//! [run](BackupSupervisor::run) first cleans up the repository, then creates
//! a new backup if one is due and replicates it through every synchronizer.
//! Both phases are optional.

use derive_more::Display;

use crate::backup::{Backup, Volume};
use crate::clock::{self, SharedClock};
use crate::creator::BackupCreator;
use crate::error::Error;
use crate::event::{Event, Observers};
use crate::link::{Pipeline, SyncReport};
use crate::policy::{BackupPolicy, CleanupPolicy};
use crate::repository::Repository;

/// What a [BackupSupervisor::run] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Backups deleted by the cleanup phase.
    pub cleaned: Vec<Backup>,
    /// The backup created by the backup phase, if one was due.
    pub created: Option<Backup>,
    /// One report per synchronizer stage, in execution order.
    pub synchronized: Vec<SyncReport>,
}

#[derive(Debug, Display)]
#[display("BackupSupervisor({project}/{volume})")]
pub struct BackupSupervisor {
    project: String,
    volume: String,
    creator: Box<dyn BackupCreator>,
    repository: Repository,
    synchronizers: Vec<Pipeline>,
    cleanup_policy: Option<Box<dyn CleanupPolicy>>,
    backup_policy: Option<Box<dyn BackupPolicy>>,
    clock: SharedClock,
    observers: Observers,
}

impl BackupSupervisor {
    /// A supervisor storing into the creator's own repository.
    ///
    /// Without policies a run does nothing.
    pub fn new(project: &str, volume: &str, creator: Box<dyn BackupCreator>) -> Self {
        let repository = creator.target_repository();

        Self {
            project: project.to_string(),
            volume: volume.to_string(),
            creator,
            repository,
            synchronizers: Vec::new(),
            cleanup_policy: None,
            backup_policy: None,
            clock: clock::system(),
            observers: Observers::default(),
        }
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = repository.with_observers(self.observers.clone());
        self
    }

    /// Appends a synchronizer, run after the ones added before.
    pub fn with_synchronizer(mut self, mut pipeline: Pipeline) -> Self {
        pipeline.set_observers(self.observers.clone());
        self.synchronizers.push(pipeline);
        self
    }

    pub fn with_cleanup_policy(mut self, policy: Box<dyn CleanupPolicy>) -> Self {
        self.cleanup_policy = Some(policy);
        self
    }

    pub fn with_backup_policy(mut self, policy: Box<dyn BackupPolicy>) -> Self {
        self.backup_policy = Some(policy);
        self
    }

    /// Clock stamping new backups.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Observers notified by the supervisor, its repository and synchronizers.
    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.repository = self.repository.with_observers(observers.clone());
        for pipeline in &mut self.synchronizers {
            pipeline.set_observers(observers.clone());
        }
        self.observers = observers;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn creator(&self) -> &dyn BackupCreator {
        self.creator.as_ref()
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn synchronizers(&self) -> &[Pipeline] {
        &self.synchronizers
    }

    pub fn cleanup_policy(&self) -> Option<&dyn CleanupPolicy> {
        self.cleanup_policy.as_deref()
    }

    pub fn backup_policy(&self) -> Option<&dyn BackupPolicy> {
        self.backup_policy.as_deref()
    }

    /// Selector of the supervised stream.
    pub fn volume_selector(&self) -> Volume {
        Volume::new(&self.volume, &self.project)
    }

    /// Backups of the supervised stream, without running anything.
    pub fn fetch(&self) -> Result<Vec<Backup>, Error> {
        self.repository.fetch(Some(&self.volume_selector()))
    }

    /// Runs the cleanup phase and then the backup phase.
    ///
    /// The first error aborts the run. A backup that has been built stays in
    /// the repository even if a synchronizer fails afterwards.
    pub fn run(&self) -> Result<RunReport, Error> {
        log::debug!(target: "supervisor", "Running {self}");
        let mut report = RunReport::default();

        if let Some(policy) = &self.cleanup_policy {
            report.cleaned = self.run_cleanup(policy.as_ref())?;
        }

        if let Some(policy) = &self.backup_policy {
            if let Some(backup) = self.run_backup(policy.as_ref())? {
                report.created = Some(backup);
                report.synchronized = self.synchronize()?;
            }
        }

        Ok(report)
    }

    /// Deletes what `policy` flags among the backups of the stream.
    pub fn run_cleanup(&self, policy: &dyn CleanupPolicy) -> Result<Vec<Backup>, Error> {
        self.repository
            .cleanup(policy, Some(&self.volume_selector()))
    }

    /// Builds a backup if `policy` considers one due.
    pub fn run_backup(&self, policy: &dyn BackupPolicy) -> Result<Option<Backup>, Error> {
        let backups = self.fetch()?;

        if !policy.should_backup(&backups) {
            log::debug!(target: "supervisor", "No backup due for {self}");
            return Ok(None);
        }

        self.build_backup().map(Some)
    }

    /// Creates a backup stamped with the current time.
    pub fn build_backup(&self) -> Result<Backup, Error> {
        let mut backup = Backup::new(self.clock.now(), &self.project, &self.volume);

        self.observers.notify(&Event::BeforeBuildBackup {
            creator: self.creator.as_ref(),
            backup: &backup,
        });
        self.creator.build_backup(&mut backup)?;
        self.observers.notify(&Event::AfterBuildBackup {
            creator: self.creator.as_ref(),
            backup: &backup,
        });

        Ok(backup)
    }

    /// Runs every synchronizer in order.
    pub fn synchronize(&self) -> Result<Vec<SyncReport>, Error> {
        let mut reports = Vec::new();
        for pipeline in &self.synchronizers {
            reports.extend(pipeline.synchronize()?);
        }
        Ok(reports)
    }
}
