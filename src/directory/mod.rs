//! Directory-service onboarding through the vendor admin CLI.
//!
//! The admin CLI changed its argument surface between module versions. Rather
//! than probing at runtime, one [`DirectoryAdmin`] implementation per known
//! version is chosen at startup from configuration, and every command runs
//! inside a scoped [`session::with_session`] that always disconnects.

pub mod modules;
pub mod session;

use crate::error::DirectoryError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use modules::{CurrentModule, DirectoryAdmin, LegacyModule, admin_for};
pub use session::{
    CommandOutput, CommandRunner, DirectorySession, DryRunRunner, ProcessRunner, SessionTarget,
    with_session,
};

/// Known admin module versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleVersion {
    /// Principal names passed as `user@domain`.
    V1,
    /// Separate name and domain arguments.
    #[default]
    V2,
}

impl FromStr for ModuleVersion {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" | "legacy" => Ok(Self::V1),
            "v2" | "2" | "current" => Ok(Self::V2),
            other => Err(DirectoryError::UnknownVersion(other.to_string())),
        }
    }
}

/// A person account to create in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDirectoryUser {
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub group: Option<String>,
}
