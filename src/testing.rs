//! In-memory fixtures shared by the unit tests.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;

use chrono::NaiveDateTime;

use crate::backup::{Backup, DATE_FORMAT};
use crate::clock::{FixedClock, SharedClock};
use crate::creator::BackupCreator;
use crate::error::Error;
use crate::event::{Event, Observer};
use crate::link::RepositoryLink;
use crate::repository::RepositoryAdapter;

pub const MOCK_BACKUPS: [&str; 4] = [
    "easybackup-myproject-db-20200420_130000.tar",
    "easybackup-myproject-db-20200420_130100.tar",
    "easybackup-myproject-db-20200421_130000.tar",
    "easybackup-myproject-db-20200422_130000.tar",
];

pub fn datetime(formatted: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(formatted, DATE_FORMAT).unwrap()
}

pub fn fixed_clock(formatted: &str) -> SharedClock {
    Rc::new(FixedClock(datetime(formatted)))
}

/// A `tar` backup taken at `formatted`.
pub fn backup(project: &str, volume: &str, formatted: &str) -> Backup {
    Backup::new(datetime(formatted), project, volume).with_file_type("tar")
}

/// Shared list of archive names standing in for a storage.
#[derive(Debug, Clone, Default)]
pub struct Bucket(Rc<RefCell<Vec<String>>>);

impl Bucket {
    pub fn with(names: &[&str]) -> Self {
        let bucket = Self::default();
        for name in names {
            bucket.push(name);
        }
        bucket
    }

    pub fn push(&self, name: &str) {
        self.0.borrow_mut().push(name.to_string());
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn sorted_names(&self) -> Vec<String> {
        let mut names = self.names();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().iter().any(|n| n == name)
    }

    pub fn adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.adapter_of_kind(MemoryAdapter::KIND)
    }

    pub fn adapter_of_kind(&self, kind: &'static str) -> Rc<dyn RepositoryAdapter> {
        Rc::new(MemoryAdapter::new(self, kind))
    }
}

thread_local! {
    static BUCKETS: RefCell<HashMap<String, Bucket>> = RefCell::new(HashMap::new());
}

/// The bucket registered under `name` for the current test thread.
pub fn named_bucket(name: &str) -> Bucket {
    BUCKETS.with(|buckets| {
        buckets
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone()
    })
}

#[derive(Debug)]
pub struct MemoryAdapter {
    bucket: Bucket,
    kind: &'static str,
}

impl MemoryAdapter {
    pub const KIND: &'static str = "memory";

    pub fn new(bucket: &Bucket, kind: &'static str) -> Self {
        Self {
            bucket: bucket.clone(),
            kind,
        }
    }

    /// Adapter over the [named_bucket] given by the `bucket` option.
    pub fn from_table(table: toml::Table) -> Result<Rc<dyn RepositoryAdapter>, toml::de::Error> {
        #[derive(serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Options {
            bucket: String,
        }

        let options: Options = toml::Value::Table(table).try_into()?;
        Ok(Rc::new(Self::new(&named_bucket(&options.bucket), Self::KIND)))
    }
}

impl fmt::Display for MemoryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Repository", self.kind)
    }
}

impl RepositoryAdapter for MemoryAdapter {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn fetch_backups(&self) -> Result<Vec<Backup>, Error> {
        let mut backups = Vec::new();
        for name in self.bucket.names() {
            backups.push(name.parse()?);
        }
        Ok(backups)
    }

    fn cleanup_backups(&self, backups: &[Backup]) -> Result<(), Error> {
        let names: Vec<String> = backups.iter().map(Backup::name).collect();
        self.bucket.0.borrow_mut().retain(|name| !names.contains(name));
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[derive(Debug)]
pub struct MemoryLink {
    source: Rc<MemoryAdapter>,
    target: Rc<MemoryAdapter>,
}

impl MemoryLink {
    pub fn between(source: &Bucket, target: &Bucket) -> Self {
        Self::of_kinds(source, MemoryAdapter::KIND, target, MemoryAdapter::KIND)
    }

    pub fn of_kinds(
        source: &Bucket,
        source_kind: &'static str,
        target: &Bucket,
        target_kind: &'static str,
    ) -> Self {
        Self {
            source: Rc::new(MemoryAdapter::new(source, source_kind)),
            target: Rc::new(MemoryAdapter::new(target, target_kind)),
        }
    }

    pub fn from_adapters(
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
    ) -> Result<Box<dyn RepositoryLink>, Error> {
        let downcast = |adapter: Rc<dyn RepositoryAdapter>| {
            adapter
                .into_any()
                .downcast::<MemoryAdapter>()
                .map_err(|_| Error::UnexpectedAdapter {
                    expected: MemoryAdapter::KIND,
                })
        };

        Ok(Box::new(Self {
            source: downcast(source)?,
            target: downcast(target)?,
        }))
    }
}

impl RepositoryLink for MemoryLink {
    fn source_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.source.clone()
    }

    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.target.clone()
    }

    fn copy_backup(&self, backup: &Backup) -> Result<(), Error> {
        let name = backup.name();
        if !self.source.bucket.contains(&name) {
            return Err(io::Error::new(io::ErrorKind::NotFound, name).into());
        }

        self.target.bucket.push(&name);
        Ok(())
    }
}

/// Creates `tar` backups in a bucket, or fails every time.
#[derive(Debug)]
pub struct MemoryCreator {
    bucket: Bucket,
    failing: bool,
}

impl MemoryCreator {
    pub fn new(bucket: &Bucket) -> Self {
        Self {
            bucket: bucket.clone(),
            failing: false,
        }
    }

    pub fn failing(bucket: &Bucket) -> Self {
        Self {
            failing: true,
            ..Self::new(bucket)
        }
    }

    pub fn from_table(table: toml::Table) -> Result<Box<dyn BackupCreator>, toml::de::Error> {
        #[derive(serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Options {
            bucket: String,
        }

        let options: Options = toml::Value::Table(table).try_into()?;
        Ok(Box::new(Self::new(&named_bucket(&options.bucket))))
    }
}

impl fmt::Display for MemoryCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MemoryCreator")
    }
}

impl BackupCreator for MemoryCreator {
    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.bucket.adapter()
    }

    fn build_backup(&self, backup: &mut Backup) -> Result<(), Error> {
        if self.failing {
            return Err(Error::CommandFailed {
                command: "memory".to_string(),
                stderr: "creator is failing".to_string(),
            });
        }

        backup.set_file_type("tar");
        self.bucket.push(&backup.name());
        Ok(())
    }
}

/// Records the name of every event it sees.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<&'static str>>>);

impl Recorder {
    pub fn events(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}

impl Observer for Recorder {
    fn notify(&self, event: &Event<'_>) {
        let name = match event {
            Event::BeforeBuildBackup { .. } => "before_build_backup",
            Event::AfterBuildBackup { .. } => "after_build_backup",
            Event::BeforeFetch { .. } => "before_fetch",
            Event::AfterFetch { .. } => "after_fetch",
            Event::Synchronize { .. } => "synchronize",
            Event::Cleanup { .. } => "cleanup",
        };
        self.0.borrow_mut().push(name);
    }
}
