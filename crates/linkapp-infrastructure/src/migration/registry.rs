//! Linear migration registry.

use super::traits::{MigrationChain, TypedMigration};
use anyhow::{Context, Result};
use semver::Version;
use std::sync::Arc;

/// Ordered chain of migration steps ending at `latest_version`.
///
/// Each registered step must start where the previous one ended:
/// 1.0.0 → 2.0.0 → 2.1.0 → ...
///
/// # Example
///
/// ```ignore
/// let mut registry = MigrationRegistry::new(Version::new(2, 0, 0));
/// registry.register(Arc::new(FlatToNestedPages))?;
///
/// let upgraded = registry.migrate_to_latest(raw, &Version::new(1, 0, 0))?;
/// ```
#[derive(Debug)]
pub struct MigrationRegistry<T> {
    migrations: Vec<Arc<dyn TypedMigration<T>>>,
    latest_version: Version,
}

impl<T> MigrationRegistry<T> {
    pub fn new(latest_version: Version) -> Self {
        Self {
            migrations: Vec::new(),
            latest_version,
        }
    }

    pub fn latest_version(&self) -> &Version {
        &self.latest_version
    }

    /// Appends a step.
    ///
    /// # Errors
    ///
    /// Fails when the step does not continue the chain or overshoots the
    /// latest version.
    pub fn register(&mut self, migration: Arc<dyn TypedMigration<T>>) -> Result<()> {
        if let Some(last) = self.migrations.last() {
            anyhow::ensure!(
                last.to_version() == migration.from_version(),
                "Migration chain broken: '{}' ends at {} but '{}' starts at {}",
                last.description(),
                last.to_version(),
                migration.description(),
                migration.from_version()
            );
        }
        anyhow::ensure!(
            migration.to_version() <= self.latest_version,
            "Migration target version {} exceeds registry's latest version {}",
            migration.to_version(),
            self.latest_version
        );
        self.migrations.push(migration);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    fn find_start_index(&self, from_version: &Version) -> Option<usize> {
        self.migrations.iter().position(|m| m.can_migrate(from_version))
    }
}

impl<T> MigrationChain<T> for MigrationRegistry<T> {
    fn migrate_to_latest(&self, mut data: T, current_version: &Version) -> Result<T> {
        if current_version == &self.latest_version {
            tracing::debug!(version = %current_version, "Data already at latest schema");
            return Ok(data);
        }

        if current_version > &self.latest_version {
            anyhow::bail!(
                "Data version ({}) is newer than the latest supported version ({})",
                current_version,
                self.latest_version
            );
        }

        let start_idx = self.find_start_index(current_version).ok_or_else(|| {
            anyhow::anyhow!("No migration found starting from version {}", current_version)
        })?;
        let steps = &self.migrations[start_idx..];

        tracing::info!(
            "Upgrading schema from {} to {} ({} steps)",
            current_version,
            self.latest_version,
            steps.len()
        );

        for (i, migration) in steps.iter().enumerate() {
            tracing::debug!(
                "Migration step {}/{}: {} -> {} ({})",
                i + 1,
                steps.len(),
                migration.from_version(),
                migration.to_version(),
                migration.description()
            );
            data = migration.migrate(data).with_context(|| {
                format!(
                    "Migration failed at step {}: {} -> {}",
                    i + 1,
                    migration.from_version(),
                    migration.to_version()
                )
            })?;
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::traits::Migration;

    #[derive(Debug)]
    struct AppendVersion {
        from: Version,
        to: Version,
    }

    impl Migration for AppendVersion {
        fn from_version(&self) -> Version {
            self.from.clone()
        }

        fn to_version(&self) -> Version {
            self.to.clone()
        }

        fn description(&self) -> &str {
            "append version"
        }
    }

    impl TypedMigration<Vec<String>> for AppendVersion {
        fn migrate(&self, mut data: Vec<String>) -> Result<Vec<String>> {
            data.push(self.to.to_string());
            Ok(data)
        }
    }

    fn step(from: (u64, u64), to: (u64, u64)) -> Arc<dyn TypedMigration<Vec<String>>> {
        Arc::new(AppendVersion {
            from: Version::new(from.0, from.1, 0),
            to: Version::new(to.0, to.1, 0),
        })
    }

    fn three_step_registry() -> MigrationRegistry<Vec<String>> {
        let mut registry = MigrationRegistry::new(Version::new(3, 0, 0));
        registry.register(step((1, 0), (2, 0))).unwrap();
        registry.register(step((2, 0), (2, 1))).unwrap();
        registry.register(step((2, 1), (3, 0))).unwrap();
        registry
    }

    #[test]
    fn test_broken_chain_is_rejected() {
        let mut registry = MigrationRegistry::new(Version::new(3, 0, 0));
        registry.register(step((1, 0), (2, 0))).unwrap();
        let err = registry.register(step((2, 5), (3, 0))).unwrap_err();
        assert!(err.to_string().contains("Migration chain broken"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overshooting_step_is_rejected() {
        let mut registry = MigrationRegistry::new(Version::new(2, 0, 0));
        assert!(registry.register(step((1, 0), (3, 0))).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_runs_every_step_from_the_middle() {
        let registry = three_step_registry();
        let out = registry
            .migrate_to_latest(Vec::new(), &Version::new(2, 0, 0))
            .unwrap();
        assert_eq!(out, vec!["2.1.0", "3.0.0"]);
    }

    #[test]
    fn test_latest_is_untouched_and_newer_fails() {
        let registry = three_step_registry();
        let out = registry
            .migrate_to_latest(vec!["x".into()], &Version::new(3, 0, 0))
            .unwrap();
        assert_eq!(out, vec!["x"]);
        assert!(registry
            .migrate_to_latest(Vec::new(), &Version::new(4, 0, 0))
            .is_err());
    }
}
