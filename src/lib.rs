//! Library to schedule, retain and replicate backups.
//!
//! A [BackupSupervisor](supervisor::BackupSupervisor) looks after one volume
//! of a project. On every run it cleans up its [repository] according to a
//! [cleanup policy](policy::CleanupPolicy), creates a new backup when the
//! [backup policy](policy::BackupPolicy) says one is due, and replicates it
//! to other repositories through [link]s driven by a
//! [synchronization policy](policy::SynchronizationPolicy).
//!
//! Backups are identified by their archive name
//! `easybackup-{project}-{volume}-{YYYYMMDD_HHMMSS}.{file_type}`, see
//! [backup::Backup]. Storage and capture are provided by the [backends], the
//! whole setup is usually declared in a TOML document loaded by [config].

#![forbid(unsafe_code)]

pub mod backends;
pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod creator;
pub mod error;
pub mod event;
pub mod link;
pub mod policy;
pub mod repository;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use backup::{Backup, Volume};
pub use error::Error;
pub use repository::{Repository, RepositoryAdapter};
pub use supervisor::BackupSupervisor;
