//! Core utilities shared by the RMU library and binary.
//!
//! Holds the error taxonomy and the platform path helpers. Everything that
//! talks to the network or parses binaries lives in the `rmu` crate.

pub mod core;

pub use core::error::{RmuError, RmuResult};
