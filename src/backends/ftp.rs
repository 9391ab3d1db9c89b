//! Backups in a directory of an FTP server.
//!
//! Every operation opens its own session: connect, login, switch to binary
//! mode and change into `directory`.

use std::fmt;
use std::fs::{self, File};
use std::rc::Rc;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use crate::backup::{filename_matches_backup, Backup};
use crate::error::Error;
use crate::link::RepositoryLink;
use crate::repository::RepositoryAdapter;

use super::downcast;
use super::local::LocalRepositoryAdapter;

const DEFAULT_PORT: u16 = 21;

/// Repository of the archives stored in `directory` of an FTP server.
#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FtpRepositoryAdapter {
    /// `host` or `host:port`.
    host: String,
    user: String,
    password: String,
    directory: String,
}

impl FtpRepositoryAdapter {
    pub const KIND: &'static str = "ftp";

    pub fn new(host: &str, user: &str, password: &str, directory: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            directory: directory.to_string(),
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Socket address of the server, port 21 unless given.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            self.host.clone()
        } else {
            format!("{}:{DEFAULT_PORT}", self.host)
        }
    }

    /// Remote path of the archive of `backup`.
    pub fn backup_path(&self, backup: &Backup) -> String {
        format!("{}/{}", self.directory.trim_end_matches('/'), backup.name())
    }

    fn session(&self) -> Result<FtpStream, FtpError> {
        log::debug!(target: "backend::ftp", "Connecting to {}", self.address());
        let mut ftp = FtpStream::connect(self.address())?;
        ftp.login(&self.user, &self.password)?;
        ftp.transfer_type(FileType::Binary)?;
        ftp.cwd(&self.directory)?;
        Ok(ftp)
    }

    /// Runs `action` within a fresh session.
    fn with_session<T>(
        &self,
        action: impl FnOnce(&mut FtpStream) -> Result<T, FtpError>,
    ) -> Result<T, Error> {
        let mut ftp = self.session()?;
        let result = action(&mut ftp);
        if let Err(e) = ftp.quit() {
            log::debug!(target: "backend::ftp", "Closing session with {} failed: {e}", self.host);
        }

        result.map_err(Error::from)
    }
}

/// Backups among the names of an NLST listing.
fn parse_listing(names: &[String]) -> Result<Vec<Backup>, Error> {
    let mut backups = Vec::new();
    for name in names {
        // some servers list paths instead of bare names
        let file_name = name.rsplit('/').next().unwrap_or(name);
        if filename_matches_backup(file_name) {
            backups.push(file_name.parse()?);
        }
    }

    backups.sort_by_key(|backup: &Backup| *backup.datetime());
    Ok(backups)
}

impl fmt::Debug for FtpRepositoryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpRepositoryAdapter")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("directory", &self.directory)
            .finish()
    }
}

impl fmt::Display for FtpRepositoryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FtpRepository({}@{}:{})", self.user, self.host, self.directory)
    }
}

impl RepositoryAdapter for FtpRepositoryAdapter {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn fetch_backups(&self) -> Result<Vec<Backup>, Error> {
        let names = self.with_session(|ftp| ftp.nlst(None))?;
        parse_listing(&names)
    }

    fn cleanup_backups(&self, backups: &[Backup]) -> Result<(), Error> {
        self.with_session(|ftp| {
            for backup in backups {
                log::debug!(target: "backend::ftp", "Removing {}", self.backup_path(backup));
                ftp.rm(backup.name())?;
            }
            Ok(())
        })
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
        self
    }
}

/// Uploads archives of a local directory to an FTP server.
#[derive(Debug)]
pub struct LocalToFtp {
    source: Rc<LocalRepositoryAdapter>,
    target: Rc<FtpRepositoryAdapter>,
}

impl LocalToFtp {
    /// [LinkConstructor](crate::link::LinkConstructor) from a local to an FTP adapter.
    pub fn from_adapters(
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
    ) -> Result<Box<dyn RepositoryLink>, Error> {
        Ok(Box::new(Self {
            source: downcast(source, LocalRepositoryAdapter::KIND)?,
            target: downcast(target, FtpRepositoryAdapter::KIND)?,
        }))
    }
}

impl RepositoryLink for LocalToFtp {
    fn source_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.source.clone()
    }

    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.target.clone()
    }

    fn copy_backup(&self, backup: &Backup) -> Result<(), Error> {
        let from = self.source.backup_path(backup);
        let to = self.target.backup_path(backup);
        log::debug!(target: "backend::ftp", "Uploading {} to {to}", from.display());

        let mut archive = File::open(from)?;
        self.target
            .with_session(|ftp| ftp.put_file(backup.name(), &mut archive).map(|_| ()))
    }
}

/// Downloads archives of an FTP server to a local directory.
#[derive(Debug)]
pub struct FtpToLocal {
    source: Rc<FtpRepositoryAdapter>,
    target: Rc<LocalRepositoryAdapter>,
}

impl FtpToLocal {
    /// [LinkConstructor](crate::link::LinkConstructor) from an FTP to a local adapter.
    pub fn from_adapters(
        source: Rc<dyn RepositoryAdapter>,
        target: Rc<dyn RepositoryAdapter>,
    ) -> Result<Box<dyn RepositoryLink>, Error> {
        Ok(Box::new(Self {
            source: downcast(source, FtpRepositoryAdapter::KIND)?,
            target: downcast(target, LocalRepositoryAdapter::KIND)?,
        }))
    }
}

impl RepositoryLink for FtpToLocal {
    fn source_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.source.clone()
    }

    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter> {
        self.target.clone()
    }

    fn copy_backup(&self, backup: &Backup) -> Result<(), Error> {
        let from = self.source.backup_path(backup);
        let to = self.target.backup_path(backup);
        log::debug!(target: "backend::ftp", "Downloading {from} to {}", to.display());

        let archive = self
            .source
            .with_session(|ftp| ftp.retr_as_buffer(&backup.name()))?;

        fs::create_dir_all(self.target.directory())?;
        fs::write(to, archive.into_inner())?;
        Ok(())
    }
}
