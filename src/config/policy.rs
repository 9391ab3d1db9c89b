//! Policy sections of a composition document.
//!
//! Every policy is selected by its `policy` tag, the remaining keys are its
//! options.

use chrono::TimeDelta;

use super::{duration, ConfigError};
use crate::clock::SharedClock;
use crate::policy::{
    BackupPolicy, CalendarConfig, CalendarPolicy, CleanupPolicy, ClearAllPolicy, ClonePolicy,
    CopyPastePolicy, LifetimePolicy, MovePolicy, SynchronizationPolicy, SynchronizeRecentPolicy,
    TimeIntervalPolicy,
};

/// `backup_policy` of a volume.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase", deny_unknown_fields)]
pub enum BackupPolicyConfig {
    TimeInterval {
        #[serde(deserialize_with = "duration::deserialize")]
        interval: TimeDelta,
    },
}

impl BackupPolicyConfig {
    pub fn build(&self, clock: &SharedClock) -> Box<dyn BackupPolicy> {
        match self {
            Self::TimeInterval { interval } => {
                Box::new(TimeIntervalPolicy::new(*interval, clock.clone()))
            }
        }
    }
}

/// `cleanup_policy` of a volume.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase", deny_unknown_fields)]
pub enum CleanupPolicyConfig {
    Lifetime {
        #[serde(deserialize_with = "duration::deserialize")]
        max_age: TimeDelta,
        #[serde(default)]
        minimum: usize,
    },
    ClearAll,
    Calendar(CalendarConfig),
}

impl CleanupPolicyConfig {
    pub fn build(&self, clock: &SharedClock) -> Box<dyn CleanupPolicy> {
        match self {
            Self::Lifetime { max_age, minimum } => {
                Box::new(LifetimePolicy::new(*max_age, *minimum, clock.clone()))
            }
            Self::ClearAll => Box::new(ClearAllPolicy),
            Self::Calendar(config) => Box::new(CalendarPolicy { config: *config }),
        }
    }
}

/// Synchronization strategy of a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicyKind {
    #[default]
    CopyPaste,
    Recent,
    Clone,
    Move,
}

/// A `dispatchers.<repository>` section of a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub policy: SyncPolicyKind,

    /// Number of backups kept by the `recent` policy.
    pub minimum: Option<usize>,

    /// Repositories the backups pass through before the dispatcher's one.
    #[serde(default)]
    pub via: Vec<String>,
}

impl DispatcherConfig {
    pub fn build(&self) -> Result<Box<dyn SynchronizationPolicy>, ConfigError> {
        if self.policy != SyncPolicyKind::Recent && self.minimum.is_some() {
            log::warn!(target: "config", "Option `minimum` is ignored by the {:?} policy", self.policy);
        }

        Ok(match self.policy {
            SyncPolicyKind::CopyPaste => Box::new(CopyPastePolicy),
            SyncPolicyKind::Clone => Box::new(ClonePolicy),
            SyncPolicyKind::Move => Box::new(MovePolicy),
            SyncPolicyKind::Recent => {
                let minimum = self.minimum.ok_or(ConfigError::MissingOption {
                    policy: "recent",
                    option: "minimum",
                })?;
                Box::new(SynchronizeRecentPolicy::new(minimum))
            }
        })
    }
}
