//! RMU (Resonite Mod Updater)
//!
//! Finds the repository a mod DLL points at by reading its .NET metadata,
//! resolves the newest published build and replaces the local file when the
//! content differs. The error type and platform paths live in `rmu-core`
//! and are re-exported here.

pub use rmu_core::{RmuError, RmuResult};

/// Core module re-exported from rmu-core.
pub mod core {
    pub use rmu_core::core::*;
}

/// Configuration management.
pub mod config;

/// Dependency injection seams and test doubles.
pub mod di;

/// .NET assembly metadata reading.
pub mod metadata;

/// Embedded repository reference extraction.
pub mod extractor;

/// GitHub API, tag feed and downloads.
pub mod github;

/// Reference to download URL resolution.
pub mod resolver;

/// Hash-gated artifact installation.
pub mod package;

/// Per-directory update runs.
pub mod updater;
