//! Fetching and installing mod builds

pub mod checksum;
pub mod installer;

pub use checksum::{file_md5, md5_hex};
pub use installer::ArtifactInstaller;
