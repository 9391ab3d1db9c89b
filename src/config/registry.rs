//! Constructors of adapters, creators and links by their `type` tag.

use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use super::ConfigError;
use crate::backends::docker::{DockerContainerDirectory, DockerContainerSql};
use crate::backends::ftp::{FtpRepositoryAdapter, FtpToLocal, LocalToFtp};
use crate::backends::local::{LocalBackupCreator, LocalRepositoryAdapter, LocalToLocal};
use crate::creator::BackupCreator;
use crate::error::{Error, LinkNotFound};
use crate::link::{LinkConstructor, RepositoryLink};
use crate::repository::RepositoryAdapter;

/// Builds an adapter from the options of a `repositories.<name>` section.
pub type AdapterConstructor =
    fn(toml::Table) -> Result<Rc<dyn RepositoryAdapter>, toml::de::Error>;

/// Builds a creator from the options of a volume section.
pub type CreatorConstructor = fn(toml::Table) -> Result<Box<dyn BackupCreator>, toml::de::Error>;

/// Type tags known to the composition loader.
///
/// [Registry::default] knows every backend of this crate. More can be
/// registered before a document is loaded.
#[derive(Debug, Clone)]
pub struct Registry {
    adapters: HashMap<&'static str, AdapterConstructor>,
    creators: HashMap<&'static str, CreatorConstructor>,
    links: HashMap<(&'static str, &'static str), LinkConstructor>,
}

impl Registry {
    /// A registry without any type.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
            creators: HashMap::new(),
            links: HashMap::new(),
        }
    }

    pub fn register_adapter(
        &mut self,
        kind: &'static str,
        constructor: AdapterConstructor,
    ) -> &mut Self {
        self.adapters.insert(kind, constructor);
        self
    }

    pub fn register_creator(
        &mut self,
        kind: &'static str,
        constructor: CreatorConstructor,
    ) -> &mut Self {
        self.creators.insert(kind, constructor);
        self
    }

    /// Registers the link copying from `source` adapters to `target` adapters.
    pub fn register_link(
        &mut self,
        source: &'static str,
        target: &'static str,
        constructor: LinkConstructor,
    ) -> &mut Self {
        self.links.insert((source, target), constructor);
        self
    }

    pub fn adapter(
        &self,
        kind: &str,
        options: toml::Table,
    ) -> Result<Rc<dyn RepositoryAdapter>, ConfigError> {
        let constructor = self.adapters.get(kind).ok_or_else(|| ConfigError::UnknownType {
            category: "repository",
            kind: kind.to_string(),
        })?;

        constructor(options).map_err(|source| ConfigError::InvalidOptions {
            context: format!("{kind} repository"),
            source,
        })
    }

    pub fn creator(
        &self,
        kind: &str,
        options: toml::Table,
    ) -> Result<Box<dyn BackupCreator>, ConfigError> {
        let constructor = self.creators.get(kind).ok_or_else(|| ConfigError::UnknownType {
            category: "creator",
            kind: kind.to_string(),
        })?;

        constructor(options).map_err(|source| ConfigError::InvalidOptions {
            context: format!("{kind} creator"),
            source,
        })
    }

    /// The link copying from `source` to `target`, resolved by their kinds.
    pub fn link(
        &self,
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
    ) -> Result<Box<dyn RepositoryLink>, Error> {
        let key = (source.kind(), target.kind());
        let constructor = self.links.get(&key).ok_or_else(|| LinkNotFound {
            source_kind: key.0.to_string(),
            target_kind: key.1.to_string(),
        })?;

        constructor(source, target)
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register_adapter(
                LocalRepositoryAdapter::KIND,
                deserialize_adapter::<LocalRepositoryAdapter>,
            )
            .register_adapter(
                FtpRepositoryAdapter::KIND,
                deserialize_adapter::<FtpRepositoryAdapter>,
            )
            .register_creator("local", deserialize_creator::<LocalBackupCreator>)
            .register_creator("docker_container_sql", deserialize_creator::<DockerContainerSql>)
            .register_creator(
                "docker_container_directory",
                deserialize_creator::<DockerContainerDirectory>,
            )
            .register_link(
                LocalRepositoryAdapter::KIND,
                LocalRepositoryAdapter::KIND,
                LocalToLocal::from_adapters,
            )
            .register_link(
                LocalRepositoryAdapter::KIND,
                FtpRepositoryAdapter::KIND,
                LocalToFtp::from_adapters,
            )
            .register_link(
                FtpRepositoryAdapter::KIND,
                LocalRepositoryAdapter::KIND,
                FtpToLocal::from_adapters,
            );
        registry
    }
}

/// [AdapterConstructor] deserializing `T` from the options.
pub fn deserialize_adapter<T>(
    options: toml::Table,
) -> Result<Rc<dyn RepositoryAdapter>, toml::de::Error>
where
    T: RepositoryAdapter + DeserializeOwned + 'static,
{
    let adapter: T = toml::Value::Table(options).try_into()?;
    Ok(Rc::new(adapter))
}

/// [CreatorConstructor] deserializing `T` from the options.
pub fn deserialize_creator<T>(
    options: toml::Table,
) -> Result<Box<dyn BackupCreator>, toml::de::Error>
where
    T: BackupCreator + DeserializeOwned + 'static,
{
    let creator: T = toml::Value::Table(options).try_into()?;
    Ok(Box::new(creator))
}
