//! GitHub integration
//!
//! This module provides functionality for interacting with GitHub to:
//! - Fetch the latest release of a repository and its assets
//! - Read a repository's tag feed when releases are not used
//! - Download release assets
//! - Share one rate-limit back-off between every concurrent worker

pub mod client;
pub mod feed;
pub mod rate_limit;
pub mod types;

pub use client::GitHubClient;
pub use rate_limit::{RateLimitGate, RetryPolicy};
pub use types::{GitHubRelease, ReleaseAsset};
