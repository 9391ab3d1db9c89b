//! Backups in a directory of the local filesystem.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::backup::{filename_matches_backup, Backup};
use crate::creator::BackupCreator;
use crate::error::Error;
use crate::link::RepositoryLink;
use crate::repository::RepositoryAdapter;

use super::downcast;

/// Repository of the archives stored in `directory`.
///
/// A directory that doesn't exist yet is an empty repository.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalRepositoryAdapter {
    directory: PathBuf,
}

impl LocalRepositoryAdapter {
    pub const KIND: &'static str = "local";

    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        if directory.is_relative() {
            log::warn!(target: "backend::local", "Repository directory is relative: {}", directory.display());
        }

        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the archive of `backup` is stored.
    pub fn backup_path(&self, backup: &Backup) -> PathBuf {
        self.directory.join(backup.name())
    }
}

impl fmt::Display for LocalRepositoryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalRepository({})", self.directory.display())
    }
}

impl RepositoryAdapter for LocalRepositoryAdapter {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn fetch_backups(&self) -> Result<Vec<Backup>, Error> {
        if !self.directory.exists() {
            log::debug!(target: "backend::local", "{} doesn't exist yet", self.directory.display());
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if filename_matches_backup(file_name) {
                backups.push(file_name.parse()?);
            }
        }

        backups.sort_by_key(|backup: &Backup| *backup.datetime());
        Ok(backups)
    }

    fn cleanup_backups(&self, backups: &[Backup]) -> Result<(), Error> {
        for backup in backups {
            let path = self.backup_path(backup);
            log::debug!(target: "backend::local", "Removing {}", path.display());
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
        self
    }
}

/// Writes a gzip compressed tarball of `source` to `archive`.
///
/// `source` is stored under its file name. A partially written archive is
/// removed again.
pub(crate) fn write_tarball(source: &Path, archive: &Path) -> Result<(), Error> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        )
    })?;
    if !source.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} doesn't exist", source.display()),
        )
        .into());
    }

    let file = File::create_new(archive)?;
    let written = append_tarball(file, source, Path::new(name));
    if written.is_err() {
        log::warn!(target: "backend::local", "Removing incomplete archive {}", archive.display());
        fs::remove_file(archive)?;
    }

    written.map_err(Error::from)
}

fn append_tarball(file: File, source: &Path, name: &Path) -> io::Result<()> {
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    if source.is_dir() {
        builder.append_dir_all(name, source)?;
    } else {
        builder.append_path_with_name(source, name)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

/// Archives a local file or directory into `backup_directory`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalBackupCreator {
    source: PathBuf,
    backup_directory: PathBuf,
}

impl LocalBackupCreator {
    pub const FILE_TYPE: &'static str = "tar";

    pub fn new(source: impl Into<PathBuf>, backup_directory: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            backup_directory: backup_directory.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl fmt::Display for LocalBackupCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalBackupCreator({})", self.source.display())
    }
}

impl BackupCreator for LocalBackupCreator {
    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        Rc::new(LocalRepositoryAdapter::new(&self.backup_directory))
    }

    fn build_backup(&self, backup: &mut Backup) -> Result<(), Error> {
        backup.set_file_type(Self::FILE_TYPE);

        fs::create_dir_all(&self.backup_directory)?;
        let archive = LocalRepositoryAdapter::new(&self.backup_directory).backup_path(backup);
        log::info!(target: "backend::local", "Archiving {} to {}", self.source.display(), archive.display());

        write_tarball(&self.source, &archive)
    }
}

/// Copies archives between two local directories.
#[derive(Debug)]
pub struct LocalToLocal {
    source: Rc<LocalRepositoryAdapter>,
    target: Rc<LocalRepositoryAdapter>,
}

impl LocalToLocal {
    pub fn new(source: LocalRepositoryAdapter, target: LocalRepositoryAdapter) -> Self {
        Self {
            source: Rc::new(source),
            target: Rc::new(target),
        }
    }

    /// [LinkConstructor](crate::link::LinkConstructor) for two local adapters.
    pub fn from_adapters(
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
    ) -> Result<Box<dyn RepositoryLink>, Error> {
        Ok(Box::new(Self {
            source: downcast(source, LocalRepositoryAdapter::KIND)?,
            target: downcast(target, LocalRepositoryAdapter::KIND)?,
        }))
    }
}

impl RepositoryLink for LocalToLocal {
    fn source_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.source.clone()
    }

    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.target.clone()
    }

    fn copy_backup(&self, backup: &Backup) -> Result<(), Error> {
        let from = self.source.backup_path(backup);
        let to = self.target.backup_path(backup);
        log::debug!(target: "backend::local", "Copying {} to {}", from.display(), to.display());

        fs::create_dir_all(self.target.directory())?;
        fs::copy(from, to)?;
        Ok(())
    }
}
