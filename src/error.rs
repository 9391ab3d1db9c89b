//! Errors raised by the backup engine.

use std::io;

use derive_more::{Display, Error, From};

use crate::backup::NameParseError;

#[derive(Debug, Display, Error, From)]
/// Errors on fetching, building, copying or deleting backups.
pub enum Error {
    /// A repository lists a file that is not a valid backup name.
    #[from]
    #[display("{_0}")]
    NameParse(NameParseError),
    /// Two repository links can't be chained.
    #[from]
    #[display("{_0}")]
    ChainIncompatibility(ChainIncompatibility),
    /// No link is registered for a pair of repository kinds.
    #[from]
    #[display("{_0}")]
    LinkNotFound(LinkNotFound),
    /// A link was built for adapters of another kind.
    #[display("Adapter is not a {expected} repository")]
    UnexpectedAdapter { expected: &'static str },
    /// Storage access failed.
    #[from]
    #[display("I/O error: {_0}")]
    Io(io::Error),
    /// An FTP session or transfer failed.
    #[from]
    #[display("FTP error: {_0}")]
    Ftp(suppaftp::FtpError),
    /// An external command exited unsuccessfully.
    #[display("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// The target of one link is not the source of the next.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display(
    "Cannot chain a link writing to a {upstream} repository with a link reading from a {downstream} repository"
)]
pub struct ChainIncompatibility {
    /// Target kind of the earlier link.
    pub upstream: &'static str,
    /// Source kind of the later link.
    pub downstream: &'static str,
}

/// No link connects the two repository kinds.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("No repository link from {source_kind} to {target_kind}")]
pub struct LinkNotFound {
    pub source_kind: String,
    pub target_kind: String,
}
