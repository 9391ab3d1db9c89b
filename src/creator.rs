use std::fmt;
use std::rc::Rc;

use crate::backup::Backup;
use crate::error::Error;
use crate::repository::{Repository, RepositoryAdapter};

/// Materializes new backups.
///
/// The capture itself (dumping a database, archiving a directory, ...) is
/// up to the implementation. The archive is stored through the creator's
/// own [target adapter](BackupCreator::target_adapter).
pub trait BackupCreator: fmt::Debug + fmt::Display {
    /// Storage the created archives land in.
    fn target_adapter(&self) -> Rc<dyn RepositoryAdapter>;

    /// Creates the archive of `backup` and assigns its file type.
    fn build_backup(&self, backup: &mut Backup) -> Result<(), Error>;

    fn target_repository(&self) -> Repository {
        Repository::new(self.target_adapter())
    }
}
