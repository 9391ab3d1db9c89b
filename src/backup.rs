//! Identity of backup archives.
//!
//! A [Backup] is identified by its formatted name
//! `easybackup-{project}-{volume}-{datetime}.{file_type}`, which is also the
//! file name adapters persist it under.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use derive_more::{Display, Error};

/// Prefix of every backup archive name.
pub const PREFIX: &str = "easybackup";

/// File extensions recognised as backup archives in repository listings.
pub const ARCHIVE_TYPES: [&str; 3] = ["zip", "tar", "sql"];

/// Format of the timestamp embedded in archive names.
///
/// Lexical order of formatted timestamps equals chronological order.
pub const DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One backup artifact of a `(project, volume)` stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Backup {
    #[serde(serialize_with = "serialize_datetime")]
    datetime: NaiveDateTime,
    project: String,
    volume: String,
    file_type: Option<String>,
}

fn serialize_datetime<S: serde::Serializer>(
    datetime: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&datetime.format(DATE_FORMAT))
}

impl Backup {
    /// A backup whose file type is not known yet.
    ///
    /// The [BackupCreator](crate::creator::BackupCreator) assigns the file
    /// type when it materializes the archive.
    pub fn new(datetime: NaiveDateTime, project: &str, volume: &str) -> Self {
        Self {
            datetime,
            project: project.to_string(),
            volume: volume.to_string(),
            file_type: None,
        }
    }

    pub fn with_file_type(mut self, file_type: &str) -> Self {
        self.file_type = Some(file_type.to_string());
        self
    }

    pub fn datetime(&self) -> &NaiveDateTime {
        &self.datetime
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn file_type(&self) -> Option<&str> {
        self.file_type.as_deref()
    }

    pub fn set_file_type(&mut self, file_type: &str) {
        self.file_type = Some(file_type.to_string());
    }

    /// Timestamp as embedded in the archive name.
    pub fn formatted_datetime(&self) -> String {
        self.datetime.format(DATE_FORMAT).to_string()
    }

    /// The persisted identity of the backup.
    ///
    /// Without a file type the trailing `.{file_type}` is omitted.
    pub fn name(&self) -> String {
        let stem = format!(
            "{PREFIX}-{}-{}-{}",
            self.project,
            self.volume,
            self.formatted_datetime()
        );

        match &self.file_type {
            Some(file_type) => format!("{stem}.{file_type}"),
            None => stem,
        }
    }
}

impl std::fmt::Display for Backup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// A file name does not follow the backup naming scheme.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Backup name is malformed: {name}")]
pub struct NameParseError {
    pub name: String,
}

impl FromStr for Backup {
    type Err = NameParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let malformed = || NameParseError {
            name: name.to_string(),
        };

        let parts: Vec<&str> = name.split('-').collect();
        let [prefix, project, volume, tail] = parts.as_slice() else {
            return Err(malformed());
        };
        if *prefix != PREFIX {
            return Err(malformed());
        }

        let (datetime, file_type) = tail.split_once('.').ok_or_else(malformed)?;
        if file_type.is_empty() || file_type.contains('.') {
            return Err(malformed());
        }

        let parsed =
            NaiveDateTime::parse_from_str(datetime, DATE_FORMAT).map_err(|_| malformed())?;
        // reject lenient parses, the name must be reproducible
        if parsed.format(DATE_FORMAT).to_string() != *datetime {
            return Err(malformed());
        }

        Ok(Backup::new(parsed, project, volume).with_file_type(file_type))
    }
}

/// Returns if a file name looks like a backup archive.
///
/// The name must start with [PREFIX] and carry one of the [ARCHIVE_TYPES]
/// as extension. Whether it actually parses is decided by [Backup::from_str].
pub fn filename_matches_backup(filename: &str) -> bool {
    if !filename.starts_with(PREFIX) {
        return false;
    }

    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARCHIVE_TYPES.contains(&ext))
}

/// Selector of one backup stream of a project.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("Volume({project}/{name})")]
pub struct Volume {
    pub name: String,
    pub project: String,
}

impl Volume {
    pub fn new(name: &str, project: &str) -> Self {
        Self {
            name: name.to_string(),
            project: project.to_string(),
        }
    }

    pub fn matches(&self, backup: &Backup) -> bool {
        backup.volume == self.name && backup.project == self.project
    }

    /// Keeps only the backups of this volume.
    pub fn filter(&self, backups: Vec<Backup>) -> Vec<Backup> {
        backups.into_iter().filter(|b| self.matches(b)).collect()
    }
}
