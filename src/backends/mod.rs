//! Storage adapters, backup creators and links.
//!
//! Currently the following backends are implemented:
//!
//! - [local]: Archives in a directory of the local filesystem, created from
//!   a local file or directory and copied between directories.
//! - [docker]: Database dumps and directory archives taken inside docker
//!   containers, stored like [local] archives.
//! - [ftp]: Archives in a directory of an FTP server, uploaded from and
//!   downloaded to [local] directories.

use std::rc::Rc;

use crate::error::Error;
use crate::repository::RepositoryAdapter;

pub mod docker;
pub mod ftp;
pub mod local;

pub use docker::{DockerContainerDirectory, DockerContainerSql};
pub use ftp::{FtpRepositoryAdapter, FtpToLocal, LocalToFtp};
pub use local::{LocalBackupCreator, LocalRepositoryAdapter, LocalToLocal};

/// Recovers the concrete adapter handed to a link constructor.
pub(crate) fn downcast<T: RepositoryAdapter + 'static>(
    adapter: Rc<dyn RepositoryAdapter>,
    expected: &'static str,
) -> Result<Rc<T>, Error> {
    adapter
        .into_any()
        .downcast::<T>()
        .map_err(|_| Error::UnexpectedAdapter { expected })
}
