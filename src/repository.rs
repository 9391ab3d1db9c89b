//! Storage abstraction.
//!
//! A [RepositoryAdapter] knows how to list and delete backups in one kind of
//! storage. [Repository] wraps an adapter and adds volume filtering, cleanup
//! and lifecycle notifications. Nothing is cached, every call goes to the
//! backing store.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::backup::{Backup, Volume};
use crate::error::Error;
use crate::event::{Event, Observers};
use crate::policy::CleanupPolicy;

/// Generic storage of backups.
pub trait RepositoryAdapter: fmt::Debug + fmt::Display {
    /// Tag naming the kind of storage, e.g. `local`.
    ///
    /// Links are resolved and chained by these tags.
    fn kind(&self) -> &'static str;

    /// Lists all backups of the storage in no particular order.
    fn fetch_backups(&self) -> Result<Vec<Backup>, Error>;

    /// Deletes the given backups from the storage.
    fn cleanup_backups(&self, backups: &[Backup]) -> Result<(), Error>;

    /// Upcast used by link constructors to recover the concrete adapter.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Read and delete façade over a [RepositoryAdapter].
#[derive(Debug, Clone)]
pub struct Repository {
    adapter: Rc<dyn RepositoryAdapter>,
    name: Option<String>,
    observers: Observers,
}

impl Repository {
    pub fn new(adapter: Rc<dyn RepositoryAdapter>) -> Self {
        Self {
            adapter,
            name: None,
            observers: Observers::default(),
        }
    }

    pub fn named(adapter: Rc<dyn RepositoryAdapter>, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(adapter)
        }
    }

    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    pub fn adapter(&self) -> &Rc<dyn RepositoryAdapter> {
        &self.adapter
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Backups of the repository, restricted to `volume` if given.
    pub fn fetch(&self, volume: Option<&Volume>) -> Result<Vec<Backup>, Error> {
        self.observers.notify(&Event::BeforeFetch {
            repository: self,
            volume,
        });

        let mut backups = self.adapter.fetch_backups()?;
        if let Some(volume) = volume {
            backups = volume.filter(backups);
        }

        self.observers.notify(&Event::AfterFetch {
            repository: self,
            volume,
            backups: &backups,
        });
        Ok(backups)
    }

    /// Most recent backup of the repository.
    pub fn last_backup(&self) -> Result<Option<Backup>, Error> {
        let backups = self.fetch(None)?;
        Ok(backups.into_iter().max_by(|a, b| a.datetime().cmp(b.datetime())))
    }

    /// Backups the `policy` would delete, without deleting them.
    pub fn to_cleanup(
        &self,
        policy: &dyn CleanupPolicy,
        volume: Option<&Volume>,
    ) -> Result<Vec<Backup>, Error> {
        let backups = self.fetch(volume)?;
        Ok(policy.filter_to_cleanup(&backups))
    }

    /// Deletes what the `policy` flags and returns the deleted backups.
    pub fn cleanup(
        &self,
        policy: &dyn CleanupPolicy,
        volume: Option<&Volume>,
    ) -> Result<Vec<Backup>, Error> {
        let to_cleanup = self.to_cleanup(policy, volume)?;
        self.cleanup_backups(&to_cleanup)?;

        self.observers.notify(&Event::Cleanup {
            repository: self,
            volume,
            policy,
            cleaned: &to_cleanup,
        });
        Ok(to_cleanup)
    }

    /// Deletes the given backups through the adapter.
    pub fn cleanup_backups(&self, backups: &[Backup]) -> Result<(), Error> {
        if backups.is_empty() {
            return Ok(());
        }

        log::debug!(target: "repository", "Deleting {} backup(s) from {self}", backups.len());
        self.adapter.cleanup_backups(backups)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} {}", self.adapter),
            None => write!(f, "{}", self.adapter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ClearAllPolicy, LifetimePolicy};
    use crate::testing::{datetime, fixed_clock, Bucket, MOCK_BACKUPS};
    use chrono::TimeDelta;

    #[test]
    fn fetch_parses_every_backup() {
        let bucket = Bucket::with(&MOCK_BACKUPS);
        let repository = Repository::new(bucket.adapter());

        let backups = repository.fetch(None).unwrap();

        assert_eq!(backups.len(), 4);
        assert_eq!(backups[0].formatted_datetime(), "20200420_130000");
        assert_eq!(backups[0].volume(), "db");
        assert_eq!(backups[0].project(), "myproject");
        assert_eq!(backups[0].file_type(), Some("tar"));
    }

    #[test]
    fn fetch_surfaces_malformed_names() {
        let bucket = Bucket::with(&["easybackup-myproject-db.tar"]);
        let repository = Repository::new(bucket.adapter());

        let err = repository.fetch(None).unwrap_err();
        assert!(matches!(err, Error::NameParse(_)));
    }

    #[test]
    fn fetch_filters_by_volume() {
        let bucket = Bucket::with(&[
            "easybackup-myproject-db-20200420_130000.tar",
            "easybackup-myproject-app-20200420_130000.tar",
            "easybackup-yourproject-db-20200420_130100.tar",
        ]);
        let repository = Repository::new(bucket.adapter());

        let volume = Volume::new("db", "myproject");
        let backups = repository.fetch(Some(&volume)).unwrap();

        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].project(), "myproject");
        assert_eq!(backups[0].volume(), "db");
    }

    #[test]
    fn last_backup_is_the_most_recent() {
        let bucket = Bucket::with(&[
            "easybackup-myproject-db-20200421_130000.tar",
            "easybackup-myproject-db-20200422_130000.tar",
            "easybackup-myproject-db-20200420_130000.tar",
        ]);
        let repository = Repository::new(bucket.adapter());

        let last = repository.last_backup().unwrap().unwrap();
        assert_eq!(last.formatted_datetime(), "20200422_130000");

        let empty = Repository::new(Bucket::default().adapter());
        assert_eq!(empty.last_backup().unwrap(), None);
    }

    #[test]
    fn to_cleanup_does_not_delete() {
        let bucket = Bucket::with(&MOCK_BACKUPS);
        let repository = Repository::new(bucket.adapter());
        let policy = LifetimePolicy::new(
            TimeDelta::hours(24),
            2,
            fixed_clock("20200422_130000"),
        );

        let to_cleanup = repository.to_cleanup(&policy, None).unwrap();

        assert_eq!(to_cleanup.len(), 2);
        assert_eq!(to_cleanup[0].formatted_datetime(), "20200420_130000");
        assert_eq!(bucket.names().len(), 4);
    }

    #[test]
    fn cleanup_deletes_flagged_backups() {
        let bucket = Bucket::with(&MOCK_BACKUPS);
        let repository = Repository::new(bucket.adapter());
        let policy = LifetimePolicy::new(
            TimeDelta::hours(24),
            2,
            fixed_clock("20200422_130000"),
        );

        let cleaned = repository.cleanup(&policy, None).unwrap();
        assert_eq!(cleaned.len(), 2);

        let backups = repository.fetch(None).unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(*backups[0].datetime(), datetime("20200421_130000"));
        assert_eq!(*backups[1].datetime(), datetime("20200422_130000"));
    }

    #[test]
    fn cleanup_only_touches_the_volume() {
        let bucket = Bucket::with(&[
            "easybackup-myproject-db-20200420_130000.tar",
            "easybackup-myproject-app-20200420_130000.tar",
        ]);
        let repository = Repository::new(bucket.adapter());

        let volume = Volume::new("db", "myproject");
        repository.cleanup(&ClearAllPolicy, Some(&volume)).unwrap();

        assert_eq!(
            bucket.names(),
            vec!["easybackup-myproject-app-20200420_130000.tar".to_string()]
        );
    }
}
