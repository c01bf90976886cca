//! Sync phase enum for the per-shop synchronization lifecycle.
//!
//! Stored as a string column so the database stays readable and portable
//! across backends.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a shop's synchronization stream.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// No run active and no terminal outcome recorded (also the state after
    /// a user cancellation).
    #[default]
    #[sea_orm(string_value = "idle")]
    Idle,
    /// A run is walking the remote collection.
    #[sea_orm(string_value = "syncing")]
    Syncing,
    /// The last run finished the full walk.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// The last run ended with a non-retryable failure.
    #[sea_orm(string_value = "error")]
    Error,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Syncing => write!(f, "syncing"),
            SyncPhase::Completed => write!(f, "completed"),
            SyncPhase::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SyncPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncPhase::Idle),
            "syncing" => Ok(SyncPhase::Syncing),
            "completed" => Ok(SyncPhase::Completed),
            "error" => Ok(SyncPhase::Error),
            _ => Err(format!("Unknown sync phase: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SyncPhase::Idle.to_string(), "idle");
        assert_eq!(SyncPhase::Syncing.to_string(), "syncing");
        assert_eq!(SyncPhase::Completed.to_string(), "completed");
        assert_eq!(SyncPhase::Error.to_string(), "error");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("idle".parse::<SyncPhase>().unwrap(), SyncPhase::Idle);
        assert_eq!("SYNCING".parse::<SyncPhase>().unwrap(), SyncPhase::Syncing);
        assert_eq!(
            "completed".parse::<SyncPhase>().unwrap(),
            SyncPhase::Completed
        );
        assert_eq!("error".parse::<SyncPhase>().unwrap(), SyncPhase::Error);
        assert!("running".parse::<SyncPhase>().is_err());
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(SyncPhase::default(), SyncPhase::Idle);
    }
}
