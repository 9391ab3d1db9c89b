//! Composition of supervisors from a TOML document.
//!
//! ```toml
//! version = "1.0.0"
//!
//! [repositories.offsite]
//! type = "local"
//! directory = "/mnt/offsite"
//!
//! [projects.myproject.db]
//! type = "docker_container_sql"
//! container_name = "db"
//! container_user = "postgres"
//! database = "app"
//! dump_cmd = "pg_dump"
//! backup_directory = "/var/backups"
//! backup_policy = { policy = "timeinterval", interval = "1d" }
//! cleanup_policy = { policy = "lifetime", max_age = "30d", minimum = 5 }
//!
//! [projects.myproject.db.dispatchers.offsite]
//! policy = "recent"
//! minimum = 5
//! ```
//!
//! Every volume of a project becomes a [BackupSupervisor]. The `type` of a
//! volume selects its [BackupCreator](crate::creator::BackupCreator), the
//! keys next to it are the creator's options. Each dispatcher replicates the
//! volume to the named repository, optionally passing through the
//! repositories listed in `via`.

use std::fs;
use std::io;
use std::iter;
use std::path::Path;
use std::rc::Rc;

use derive_more::{Display, Error, From};

use crate::backup::Volume;
use crate::clock::SharedClock;
use crate::error::Error;
use crate::event::Observers;
use crate::link::{Pipeline, Stage};
use crate::repository::{Repository, RepositoryAdapter};
use crate::supervisor::BackupSupervisor;

pub mod duration;
pub mod policy;
pub mod registry;

pub use duration::{parse_duration, DurationParseError};
pub use policy::{BackupPolicyConfig, CleanupPolicyConfig, DispatcherConfig, SyncPolicyKind};
pub use registry::Registry;

#[derive(Debug, Display, Error, From)]
/// Errors on loading a composition document.
pub enum ConfigError {
    /// The document can't be read.
    #[from]
    #[display("Reading the configuration failed: {_0}")]
    Read(io::Error),
    /// The document isn't valid TOML.
    #[from]
    #[display("Parsing the configuration failed: {_0}")]
    Syntax(toml::de::Error),
    /// `version` is missing or not a `X.Y.Z` number.
    #[display("Version number is missing or invalid")]
    InvalidVersion,
    /// The document has no project.
    #[display("Configuration should have at least one project")]
    NoProject,
    /// A section is a plain value instead of a table.
    #[display("{context} should be a table")]
    ExpectedTable { context: String },
    /// A volume lacks a `backup_policy`.
    #[display("Backup policy is required in {project}/{volume}")]
    BackupPolicyRequired { project: String, volume: String },
    /// A repository or volume lacks a `type`.
    #[display("Missing `type` in {context}")]
    MissingType { context: String },
    /// No constructor is registered for a `type`.
    #[display("Unknown {category} type: {kind}")]
    UnknownType { category: &'static str, kind: String },
    /// A dispatcher names a repository that isn't declared.
    #[display("Unknown repository: {_0}")]
    UnknownRepository(#[error(ignore)] String),
    /// Options are missing, unexpected or malformed.
    #[display("Invalid options in {context}: {source}")]
    InvalidOptions {
        context: String,
        source: toml::de::Error,
    },
    /// A policy requires an option that isn't given.
    #[display("Policy {policy} requires option `{option}`")]
    MissingOption {
        policy: &'static str,
        option: &'static str,
    },
    /// Resolving or chaining links failed.
    #[from]
    #[display("{_0}")]
    Engine(Error),
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    version: Option<toml::Value>,
    #[serde(default)]
    repositories: toml::Table,
    #[serde(default)]
    projects: toml::Table,
}

/// Returns if `version` is a dotted `X.Y.Z` number.
fn is_number_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

fn into_table(value: toml::Value, context: &str) -> Result<toml::Table, ConfigError> {
    match value {
        toml::Value::Table(table) => Ok(table),
        _ => Err(ConfigError::ExpectedTable {
            context: context.to_string(),
        }),
    }
}

fn take_type(options: &mut toml::Table, context: &str) -> Result<String, ConfigError> {
    match options.remove("type") {
        Some(toml::Value::String(kind)) => Ok(kind),
        _ => Err(ConfigError::MissingType {
            context: context.to_string(),
        }),
    }
}

fn deserialize<T: serde::de::DeserializeOwned>(
    value: toml::Value,
    context: &str,
) -> Result<T, ConfigError> {
    value
        .try_into()
        .map_err(|source| ConfigError::InvalidOptions {
            context: context.to_string(),
            source,
        })
}

/// Repositories and supervisors declared by a document.
#[derive(Debug)]
pub struct Composition {
    repositories: Vec<Repository>,
    supervisors: Vec<BackupSupervisor>,
}

impl Composition {
    /// Builds every repository and supervisor of `document`.
    ///
    /// Policies read the time from `clock`, every component reports to
    /// `observers`.
    pub fn load(
        document: &str,
        registry: &Registry,
        clock: SharedClock,
        observers: Observers,
    ) -> Result<Self, ConfigError> {
        let document: Document = toml::from_str(document)?;

        match &document.version {
            Some(toml::Value::String(version)) if is_number_version(version) => {}
            _ => return Err(ConfigError::InvalidVersion),
        }
        if document.projects.is_empty() {
            return Err(ConfigError::NoProject);
        }

        let mut repositories = Vec::new();
        for (name, options) in document.repositories {
            let context = format!("repository {name}");
            let mut options = into_table(options, &context)?;
            let kind = take_type(&mut options, &context)?;

            let adapter = registry.adapter(&kind, options)?;
            log::debug!(target: "config", "Loaded repository {name}: {adapter}");
            repositories.push(Repository::named(adapter, &name).with_observers(observers.clone()));
        }

        let loader = Loader {
            registry,
            clock: &clock,
            observers: &observers,
            repositories: &repositories,
        };

        let mut supervisors = Vec::new();
        for (project, volumes) in document.projects {
            let volumes = into_table(volumes, &format!("project {project}"))?;
            for (volume, options) in volumes {
                let options = into_table(options, &format!("volume {project}/{volume}"))?;
                supervisors.push(loader.supervisor(&project, &volume, options)?);
            }
        }

        log::info!(
            target: "config",
            "Loaded {} repositories and {} supervisors",
            repositories.len(),
            supervisors.len()
        );
        Ok(Self {
            repositories,
            supervisors,
        })
    }

    /// Reads and loads the document at `path`.
    pub fn load_file(
        path: &Path,
        registry: &Registry,
        clock: SharedClock,
        observers: Observers,
    ) -> Result<Self, ConfigError> {
        log::debug!(target: "config", "Reading configuration {}", path.display());
        let document = fs::read_to_string(path)?;
        Self::load(&document, registry, clock, observers)
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// The repository declared as `repositories.<name>`.
    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories
            .iter()
            .find(|repository| repository.name() == Some(name))
    }

    /// Supervisors in document order.
    pub fn supervisors(&self) -> &[BackupSupervisor] {
        &self.supervisors
    }
}

struct Loader<'a> {
    registry: &'a Registry,
    clock: &'a SharedClock,
    observers: &'a Observers,
    repositories: &'a [Repository],
}

impl Loader<'_> {
    fn supervisor(
        &self,
        project: &str,
        volume: &str,
        mut options: toml::Table,
    ) -> Result<BackupSupervisor, ConfigError> {
        let context = format!("volume {project}/{volume}");

        let backup_policy: BackupPolicyConfig = match options.remove("backup_policy") {
            Some(value) => deserialize(value, &format!("backup_policy of {project}/{volume}"))?,
            None => {
                return Err(ConfigError::BackupPolicyRequired {
                    project: project.to_string(),
                    volume: volume.to_string(),
                })
            }
        };
        let cleanup_policy: Option<CleanupPolicyConfig> = options
            .remove("cleanup_policy")
            .map(|value| deserialize(value, &format!("cleanup_policy of {project}/{volume}")))
            .transpose()?;
        let dispatchers = match options.remove("dispatchers") {
            Some(value) => into_table(value, &format!("dispatchers of {project}/{volume}"))?,
            None => toml::Table::new(),
        };

        let kind = take_type(&mut options, &context)?;
        let creator = self.registry.creator(&kind, options)?;
        let source = creator.target_adapter();

        let mut supervisor = BackupSupervisor::new(project, volume, creator)
            .with_clock(self.clock.clone())
            .with_backup_policy(backup_policy.build(self.clock));
        if let Some(cleanup_policy) = cleanup_policy {
            supervisor = supervisor.with_cleanup_policy(cleanup_policy.build(self.clock));
        }

        let selector = supervisor.volume_selector();
        for (name, dispatcher) in dispatchers {
            let dispatcher: DispatcherConfig =
                deserialize(dispatcher, &format!("dispatcher {name} of {project}/{volume}"))?;
            let pipeline = self.pipeline(source.clone(), &name, &dispatcher, &selector)?;
            supervisor = supervisor.with_synchronizer(pipeline);
        }

        Ok(supervisor.with_observers(self.observers.clone()))
    }

    fn adapter(&self, name: &str) -> Result<Rc<dyn RepositoryAdapter>, ConfigError> {
        self.repositories
            .iter()
            .find(|repository| repository.name() == Some(name))
            .map(|repository| repository.adapter().clone())
            .ok_or_else(|| ConfigError::UnknownRepository(name.to_string()))
    }

    fn stage(
        &self,
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
        dispatcher: &DispatcherConfig,
        volume: &Volume,
    ) -> Result<Stage, ConfigError> {
        let link = self.registry.link(source, target)?;
        Ok(Stage::new(link)
            .with_policy(dispatcher.build()?)
            .with_volume(volume.clone()))
    }

    /// Pipeline from `source` through the `via` repositories to `name`.
    fn pipeline(
        &self,
        source: Rc<dyn RepositoryAdapter>,
        name: &str,
        dispatcher: &DispatcherConfig,
        volume: &Volume,
    ) -> Result<Pipeline, ConfigError> {
        let mut route = dispatcher
            .via
            .iter()
            .map(String::as_str)
            .chain(iter::once(name));

        let mut previous = self.adapter(route.next().unwrap_or(name))?;
        let mut pipeline = Pipeline::new(self.stage(source, previous.clone(), dispatcher, volume)?);

        for hop in route {
            let next = self.adapter(hop)?;
            let stage = self.stage(previous, next.clone(), dispatcher, volume)?;
            pipeline = pipeline.chain(stage).map_err(Error::from)?;
            previous = next;
        }

        Ok(pipeline)
    }
}
