//! Replication of backups between repositories.
//!
//! A [RepositoryLink] copies single backups from its source adapter to its
//! target adapter. A [Stage] drives a link with a [SynchronizationPolicy]
//! and a [Pipeline] runs stages one after another, e.g.
//! `local → intermediate → offsite`.

use std::fmt;
use std::rc::Rc;

use crate::backup::{Backup, Volume};
use crate::error::{ChainIncompatibility, Error};
use crate::event::{Event, Observers};
use crate::policy::{sort_ascending, CopyPastePolicy, SynchronizationPolicy};
use crate::repository::{Repository, RepositoryAdapter};

/// Transfer of backups between two adapters.
pub trait RepositoryLink: fmt::Debug {
    fn source_adapter(&self) -> Rc<dyn RepositoryAdapter>;

    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter>;

    /// Copies one backup from the source to the target.
    fn copy_backup(&self, backup: &Backup) -> Result<(), Error>;
}

/// Builds the link between two adapters of the registered kinds.
pub type LinkConstructor =
    fn(Rc<dyn RepositoryAdapter>, Rc<dyn RepositoryAdapter>) -> Result<Box<dyn RepositoryLink>, Error>;

/// Outcome of one synchronization cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: Vec<Backup>,
    /// Backups evicted from the target.
    pub deleted: Vec<Backup>,
    /// Backups removed from the source after copying.
    pub drained: Vec<Backup>,
}

/// Reconciles the target of `link` with its source according to `policy`.
///
/// Both repositories are fetched once. Backups are copied oldest first, and
/// only then are the evicted backups deleted from the target and the
/// drained ones from the source.
pub fn synchronize(
    link: &dyn RepositoryLink,
    policy: &dyn SynchronizationPolicy,
    volume: Option<&Volume>,
    observers: &Observers,
) -> Result<SyncReport, Error> {
    let source = Repository::new(link.source_adapter()).with_observers(observers.clone());
    let target = Repository::new(link.target_adapter()).with_observers(observers.clone());

    let source_backups = source.fetch(volume)?;
    let target_backups = target.fetch(volume)?;

    let mut to_copy = policy.to_copy(&source_backups, &target_backups);
    sort_ascending(&mut to_copy);
    let to_delete = policy.to_delete(&source_backups, &target_backups);
    let to_drain = policy.to_delete_from_source(&source_backups, &target_backups);

    observers.notify(&Event::Synchronize {
        source: &source,
        target: &target,
        volume,
        policy,
        to_copy: &to_copy,
        to_delete: &to_delete,
    });

    for backup in &to_copy {
        log::debug!(target: "link", "Copying {backup} to {target}");
        link.copy_backup(backup)?;
    }
    target.cleanup_backups(&to_delete)?;
    source.cleanup_backups(&to_drain)?;

    Ok(SyncReport {
        copied: to_copy,
        deleted: to_delete,
        drained: to_drain,
    })
}

/// A link together with the policy it is synchronized with.
#[derive(Debug)]
pub struct Stage {
    link: Box<dyn RepositoryLink>,
    policy: Box<dyn SynchronizationPolicy>,
    volume: Option<Volume>,
}

impl Stage {
    /// A stage copying every missing backup.
    pub fn new(link: Box<dyn RepositoryLink>) -> Self {
        Self {
            link,
            policy: Box::new(CopyPastePolicy),
            volume: None,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn SynchronizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Restricts the stage to the backups of `volume`.
    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn link(&self) -> &dyn RepositoryLink {
        self.link.as_ref()
    }

    pub fn policy(&self) -> &dyn SynchronizationPolicy {
        self.policy.as_ref()
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }
}

/// Ordered sequence of stages, each reading from the target of the previous.
///
/// Adapter kinds of adjacent stages are checked while the pipeline is
/// built, so an incompatible chain never moves data.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
    observers: Observers,
}

impl Pipeline {
    pub fn new(first: Stage) -> Self {
        Self {
            stages: vec![first],
            observers: Observers::default(),
        }
    }

    /// Appends a stage reading from the target of the last stage.
    pub fn chain(mut self, next: Stage) -> Result<Self, ChainIncompatibility> {
        let upstream = self
            .stages
            .last()
            .map(|stage| stage.link.target_adapter().kind());
        let downstream = next.link.source_adapter().kind();

        if let Some(upstream) = upstream {
            if upstream != downstream {
                return Err(ChainIncompatibility {
                    upstream,
                    downstream,
                });
            }
        }

        self.stages.push(next);
        Ok(self)
    }

    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.set_observers(observers);
        self
    }

    pub fn set_observers(&mut self, observers: Observers) {
        self.observers = observers;
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Synchronizes every stage with its own policy.
    pub fn synchronize(&self) -> Result<Vec<SyncReport>, Error> {
        self.synchronize_with(None)
    }

    /// Synchronizes every stage, the first one with `policy` if given.
    pub fn synchronize_with(
        &self,
        policy: Option<&dyn SynchronizationPolicy>,
    ) -> Result<Vec<SyncReport>, Error> {
        let mut reports = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            let policy = match policy {
                Some(policy) if index == 0 => policy,
                _ => stage.policy(),
            };

            let report = synchronize(stage.link(), policy, stage.volume(), &self.observers)?;
            reports.push(report);
        }

        Ok(reports)
    }
}

impl From<Stage> for Pipeline {
    fn from(stage: Stage) -> Self {
        Self::new(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ClonePolicy, MovePolicy, SynchronizeRecentPolicy};
    use crate::testing::{Bucket, MemoryLink, MOCK_BACKUPS};

    #[test]
    fn copy_paste_synchronization() {
        let a = Bucket::with(&MOCK_BACKUPS);
        let b = Bucket::with(&MOCK_BACKUPS[..2]);
        let link = MemoryLink::between(&a, &b);

        let report = synchronize(&link, &CopyPastePolicy, None, &Observers::default()).unwrap();

        assert_eq!(report.copied.len(), 2);
        assert!(report.deleted.is_empty());
        assert_eq!(b.sorted_names(), a.sorted_names());
    }

    #[test]
    fn copy_paste_is_idempotent() {
        let a = Bucket::with(&MOCK_BACKUPS);
        let b = Bucket::default();
        let stage = Stage::new(Box::new(MemoryLink::between(&a, &b)));
        let pipeline = Pipeline::new(stage);

        let first = pipeline.synchronize().unwrap();
        assert_eq!(first[0].copied.len(), 4);

        let second = pipeline.synchronize().unwrap();
        assert!(second[0].copied.is_empty());
        assert_eq!(b.names().len(), 4);
    }

    #[test]
    fn copies_oldest_first() {
        let a = Bucket::with(&[
            "easybackup-myproject-db-20200422_130000.tar",
            "easybackup-myproject-db-20200420_130000.tar",
            "easybackup-myproject-db-20200421_130000.tar",
        ]);
        let b = Bucket::default();

        synchronize(
            &MemoryLink::between(&a, &b),
            &CopyPastePolicy,
            None,
            &Observers::default(),
        )
        .unwrap();

        assert_eq!(
            b.names(),
            [
                "easybackup-myproject-db-20200420_130000.tar",
                "easybackup-myproject-db-20200421_130000.tar",
                "easybackup-myproject-db-20200422_130000.tar",
            ]
        );
    }

    #[test]
    fn recent_synchronization_keeps_minimum_on_target() {
        let source: Vec<String> = (10..16)
            .map(|hour| format!("easybackup-myproject-db-20200420_{hour}0000.tar"))
            .collect();
        let source: Vec<&str> = source.iter().map(String::as_str).collect();
        let a = Bucket::with(&source);
        let b = Bucket::with(&source[..3]);

        let report = synchronize(
            &MemoryLink::between(&a, &b),
            &SynchronizeRecentPolicy::new(2),
            None,
            &Observers::default(),
        )
        .unwrap();

        assert_eq!(report.copied.len(), 2);
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(
            b.sorted_names(),
            [
                "easybackup-myproject-db-20200420_140000.tar",
                "easybackup-myproject-db-20200420_150000.tar",
            ]
        );
    }

    #[test]
    fn synchronization_is_scoped_to_volume() {
        let a = Bucket::with(&[
            "easybackup-myproject-db-20200420_130000.tar",
            "easybackup-myproject-app-20200420_130000.tar",
        ]);
        let b = Bucket::with(&["easybackup-myproject-app-20200401_130000.tar"]);

        let stage = Stage::new(Box::new(MemoryLink::between(&a, &b)))
            .with_policy(Box::new(ClonePolicy))
            .with_volume(Volume::new("db", "myproject"));
        Pipeline::new(stage).synchronize().unwrap();

        assert_eq!(
            b.sorted_names(),
            [
                "easybackup-myproject-app-20200401_130000.tar",
                "easybackup-myproject-db-20200420_130000.tar",
            ]
        );
    }

    #[test]
    fn chained_stages_replicate_through_every_hop() {
        let [a, b, c, d] = [(); 4].map(|_| Bucket::default());
        a.push("easybackup-myproject-db-20200420_130000.tar");

        let pipeline = Pipeline::new(Stage::new(Box::new(MemoryLink::between(&a, &b))))
            .chain(Stage::new(Box::new(MemoryLink::between(&b, &c))))
            .unwrap()
            .chain(Stage::new(Box::new(MemoryLink::between(&c, &d))))
            .unwrap();

        let reports = pipeline.synchronize().unwrap();
        assert_eq!(reports.len(), 3);

        for bucket in [&a, &b, &c, &d] {
            assert_eq!(
                bucket.names(),
                ["easybackup-myproject-db-20200420_130000.tar"]
            );
        }
    }

    #[test]
    fn moving_stages_leave_temporary_repositories_empty() {
        let [a, b, c, d] = [(); 4].map(|_| Bucket::default());
        a.push("easybackup-myproject-db-20200420_130000.tar");

        let moving = |source: &Bucket, target: &Bucket| {
            Stage::new(Box::new(MemoryLink::between(source, target)))
                .with_policy(Box::new(MovePolicy))
        };
        let pipeline = Pipeline::new(moving(&a, &b))
            .chain(Stage::new(Box::new(MemoryLink::between(&b, &c))))
            .unwrap()
            .chain(moving(&c, &d))
            .unwrap();

        let reports = pipeline.synchronize().unwrap();

        assert_eq!(reports[0].drained.len(), 1);
        assert!(reports[1].drained.is_empty());
        assert!(a.names().is_empty());
        assert_eq!(b.names(), ["easybackup-myproject-db-20200420_130000.tar"]);
        assert!(c.names().is_empty());
        assert_eq!(d.names(), ["easybackup-myproject-db-20200420_130000.tar"]);
    }

    #[test]
    fn move_is_scoped_to_volume() {
        let a = Bucket::with(&[
            "easybackup-myproject-db-20200420_130000.tar",
            "easybackup-myproject-app-20200420_130000.tar",
        ]);
        let b = Bucket::default();

        let stage = Stage::new(Box::new(MemoryLink::between(&a, &b)))
            .with_policy(Box::new(MovePolicy))
            .with_volume(Volume::new("db", "myproject"));
        Pipeline::new(stage).synchronize().unwrap();

        assert_eq!(a.names(), ["easybackup-myproject-app-20200420_130000.tar"]);
        assert_eq!(b.names(), ["easybackup-myproject-db-20200420_130000.tar"]);
    }

    #[test]
    fn override_only_applies_to_first_stage() {
        let a = Bucket::with(&MOCK_BACKUPS);
        let [b, c] = [(); 2].map(|_| Bucket::default());

        let pipeline = Pipeline::new(Stage::new(Box::new(MemoryLink::between(&a, &b))))
            .chain(Stage::new(Box::new(MemoryLink::between(&b, &c))))
            .unwrap();

        let reports = pipeline
            .synchronize_with(Some(&SynchronizeRecentPolicy::new(1)))
            .unwrap();

        assert_eq!(reports[0].copied.len(), 1);
        assert_eq!(b.names(), ["easybackup-myproject-db-20200422_130000.tar"]);
        assert_eq!(c.names(), b.names());
    }

    #[test]
    fn incompatible_chain_fails_before_copying() {
        let a = Bucket::with(&MOCK_BACKUPS);
        let local = Bucket::default();
        let ftp = Bucket::default();
        let remote = Bucket::default();

        let first = MemoryLink::of_kinds(&a, "local", &local, "local");
        let second = MemoryLink::of_kinds(&ftp, "ftp", &remote, "ftp");

        let err = Pipeline::new(Stage::new(Box::new(first)))
            .chain(Stage::new(Box::new(second)))
            .unwrap_err();

        assert_eq!(
            err,
            ChainIncompatibility {
                upstream: "local",
                downstream: "ftp",
            }
        );
        assert!(local.names().is_empty());
        assert!(remote.names().is_empty());
    }
}
