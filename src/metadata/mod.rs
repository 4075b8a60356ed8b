//! Static introspection of compiled plugin binaries
//!
//! The extractor never needs more than three questions answered about a
//! binary: which types does it declare (and what do they derive from), which
//! properties does a type have, and which string literals does a method body
//! load. [`MetadataReader`] is exactly that surface; [`clr`] answers it for
//! .NET assemblies, and tests answer it from fixtures.

pub mod clr;

pub use clr::{ClrAssembly, ClrLoader};

use crate::core::RmuResult;
use std::path::Path;

/// Opaque handle to a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(pub u32);

/// Opaque handle to a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle(pub u32);

/// A type declared by the binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub handle: TypeHandle,
    pub name: String,
    pub namespace: String,
    /// Simple name of the supertype, when it is a plain type reference
    pub base_type: Option<String>,
}

/// A property declared on a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub getter: Option<MethodHandle>,
}

/// Read-only view over a binary's metadata tables
pub trait MetadataReader {
    /// All types declared in the binary, in declaration order
    fn types(&self) -> RmuResult<Vec<TypeInfo>>;

    /// Properties declared directly on `ty`
    fn properties(&self, ty: TypeHandle) -> RmuResult<Vec<PropertyInfo>>;

    /// String literals loaded by the method body, in instruction order
    ///
    /// Returns `None` when the method has no body (abstract or extern).
    fn string_constants(&self, method: MethodHandle) -> RmuResult<Option<Vec<String>>>;
}

/// Opens binaries for reading
pub trait MetadataLoader: Send + Sync {
    fn load(&self, path: &Path) -> RmuResult<Box<dyn MetadataReader>>;
}
