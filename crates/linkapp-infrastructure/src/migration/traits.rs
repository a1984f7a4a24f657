//! Core traits for the schema migration chain.

use anyhow::Result;
use semver::Version;

/// Version metadata of a single migration step.
pub trait Migration: Send + Sync {
    /// Version this step starts from.
    fn from_version(&self) -> Version;

    /// Version this step produces.
    fn to_version(&self) -> Version;

    fn can_migrate(&self, version: &Version) -> bool {
        version == &self.from_version()
    }

    /// Human-readable description, used in logs.
    fn description(&self) -> &str;
}

/// A migration step over data of type `T`.
pub trait TypedMigration<T>: Migration + std::fmt::Debug {
    /// # Errors
    ///
    /// Returns an error if the data cannot be brought to `to_version()`.
    fn migrate(&self, data: T) -> Result<T>;
}

/// A chain that upgrades data through every intermediate version.
pub trait MigrationChain<T> {
    /// Applies every step from `current_version` up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is newer than the chain knows, if no
    /// step starts at `current_version`, or if any step fails.
    fn migrate_to_latest(&self, data: T, current_version: &Version) -> Result<T>;
}
