//! Backups taken inside running docker containers.
//!
//! Both creators store their archives in a local `backup_directory`, so
//! they are replicated with the links of the [local](super::local) backend.

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use crate::backends::local::{write_tarball, LocalRepositoryAdapter};
use crate::backup::Backup;
use crate::creator::BackupCreator;
use crate::error::Error;
use crate::repository::RepositoryAdapter;

/// Runs `command` and fails on an unsuccessful exit.
///
/// Output on stderr of a successful command is relayed as warning.
fn run(command: &mut Command) -> Result<(), Error> {
    let description = format!("{command:?}");
    log::trace!(target: "backend::docker", "Running {description}");

    let output = command.output()?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: description,
            stderr: stderr.trim().to_string(),
        });
    }
    if !stderr.trim().is_empty() {
        log::warn!(target: "backend::docker", "{}", stderr.trim());
    }

    Ok(())
}

/// Dumps a database with `dump_cmd` inside a container.
///
/// The dump is archived as `tar` next to the other backups of the volume.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerContainerSql {
    container_name: String,
    container_user: String,
    database: String,
    /// Dump program and its arguments, e.g. `pg_dump --clean`.
    dump_cmd: String,
    backup_directory: PathBuf,
}

impl DockerContainerSql {
    fn adapter(&self) -> LocalRepositoryAdapter {
        LocalRepositoryAdapter::new(&self.backup_directory)
    }

    fn dump_command(&self) -> Command {
        let mut command = Command::new("docker");
        command
            .arg("exec")
            .args(["-u", self.container_user.as_str(), self.container_name.as_str()])
            .args(self.dump_cmd.split_whitespace())
            .arg(&self.database);
        command
    }
}

impl fmt::Display for DockerContainerSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DockerContainerSql({}/{})", self.container_name, self.database)
    }
}

impl BackupCreator for DockerContainerSql {
    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        Rc::new(self.adapter())
    }

    fn build_backup(&self, backup: &mut Backup) -> Result<(), Error> {
        fs::create_dir_all(&self.backup_directory)?;
        let adapter = self.adapter();

        let dump = adapter.backup_path(&backup.clone().with_file_type("sql"));
        log::info!(target: "backend::docker", "Dumping database {} of container {}", self.database, self.container_name);
        log::debug!(target: "backend::docker", "Save database dump at: {}", dump.display());

        let dump_file = File::create_new(&dump)?;
        let dumped = run(self.dump_command().stdout(Stdio::from(dump_file)));

        backup.set_file_type("tar");
        let archived = dumped.and_then(|()| write_tarball(&dump, &adapter.backup_path(backup)));
        remove_dump(&dump, archived)
    }
}

/// Removes the intermediate dump once it has been archived.
///
/// A failed dump or archive takes precedence over a failed removal.
fn remove_dump(dump: &Path, archived: Result<(), Error>) -> Result<(), Error> {
    let removed = fs::remove_file(dump);

    match (archived, removed) {
        (Err(e), Err(removal)) => {
            log::warn!(target: "backend::docker", "Removing dump {} failed: {removal}", dump.display());
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), removed) => removed.map_err(Error::from),
    }
}

/// Archives a directory inside a container with `tar`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerContainerDirectory {
    container_name: String,
    container_user: String,
    directory: String,
    backup_directory: PathBuf,
}

impl DockerContainerDirectory {
    pub const FILE_TYPE: &'static str = "tar";

    fn adapter(&self) -> LocalRepositoryAdapter {
        LocalRepositoryAdapter::new(&self.backup_directory)
    }

    fn exec(&self) -> Command {
        let mut command = Command::new("docker");
        command
            .arg("exec")
            .args(["-u", self.container_user.as_str(), self.container_name.as_str()]);
        command
    }

    fn tar_command(&self, container_archive: &str) -> Command {
        let mut command = self.exec();
        command.args(["tar", "-czf", container_archive, self.directory.as_str()]);
        command
    }

    fn copy_command(&self, container_archive: &str, archive: &Path) -> Command {
        let mut command = Command::new("docker");
        command
            .arg("cp")
            .arg(format!("{}:{container_archive}", self.container_name))
            .arg(archive);
        command
    }

    fn remove_command(&self, container_archive: &str) -> Command {
        let mut command = self.exec();
        command.args(["rm", container_archive]);
        command
    }
}

impl fmt::Display for DockerContainerDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DockerContainerDirectory({}:{})", self.container_name, self.directory)
    }
}

impl BackupCreator for DockerContainerDirectory {
    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        Rc::new(self.adapter())
    }

    fn build_backup(&self, backup: &mut Backup) -> Result<(), Error> {
        backup.set_file_type(Self::FILE_TYPE);

        let container_archive = format!("/tmp/{}", backup.name());
        let archive = self.adapter().backup_path(backup);
        log::info!(target: "backend::docker", "Archiving {} of container {}", self.directory, self.container_name);

        run(&mut self.tar_command(&container_archive))?;

        fs::create_dir_all(&self.backup_directory)?;
        let copied = run(&mut self.copy_command(&container_archive, &archive));
        // the temporary archive goes even if copying failed
        let removed = run(&mut self.remove_command(&container_archive));

        copied.and(removed)
    }
}
