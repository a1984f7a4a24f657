//! Schema evolution for persisted documents.
//!
//! Steps are registered in a [`MigrationRegistry`] as a linear chain of
//! semver versions. Stored documents carry no explicit version (exports
//! do), so [`document::detect_version`] infers one from the shape.
//!
//! # Adding a migration
//!
//! 1. Bump `SCHEMA_V*` and the registry's latest version
//! 2. Implement [`Migration`] and [`TypedMigration<Value>`] for the step
//! 3. Register it in `document::registry`
//!
//! [`TypedMigration<Value>`]: TypedMigration

pub mod document;
pub mod registry;
pub mod traits;

pub use document::{
    FlatToNestedPages, SCHEMA_V1, SCHEMA_V2, decode_document, detect_version, parse_document,
    prepare_import,
};
pub use registry::MigrationRegistry;
pub use traits::{Migration, MigrationChain, TypedMigration};
