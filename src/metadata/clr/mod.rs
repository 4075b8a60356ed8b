//! ECMA-335 (.NET CLI) assembly reader
//!
//! Reads the PE container, the metadata root and its streams, and the handful
//! of tables needed to answer [`MetadataReader`] queries. Nothing is executed
//! and every read is bounds-checked, so foreign or damaged files surface as
//! [`RmuError::Parse`].

mod bytes;
mod heaps;
mod il;
mod pe;
mod tables;

#[cfg(test)]
pub(crate) mod fixture;

use self::bytes::{read_u16, read_u32, slice};
use self::heaps::{string_at, user_string_at, Heap};
use self::pe::PeImage;
use self::tables::{
    CodedIndex, TableStream, METHOD_DEF, METHOD_SEMANTICS, PROPERTY, PROPERTY_MAP, PROPERTY_PTR,
    TYPE_DEF, TYPE_REF,
};
use super::{MetadataLoader, MetadataReader, MethodHandle, PropertyInfo, TypeHandle, TypeInfo};
use crate::core::{RmuError, RmuResult};
use std::path::Path;

const METADATA_SIGNATURE: u32 = 0x424A_5342; // "BSJB"
const SEMANTICS_GETTER: u32 = 0x0002;
const MAX_STREAM_NAME: usize = 32;

struct StreamHeader {
    name: String,
    offset: usize,
    size: usize,
}

/// A parsed .NET assembly image
pub struct ClrAssembly {
    data: Vec<u8>,
    image: PeImage,
    strings: Heap,
    user_strings: Heap,
    tables: TableStream,
}

impl ClrAssembly {
    /// Read and parse the assembly at `path`
    pub fn open(path: &Path) -> RmuResult<Self> {
        let data = std::fs::read(path)?;
        Self::parse(data)
    }

    /// Parse an in-memory image
    pub fn parse(data: Vec<u8>) -> RmuResult<Self> {
        let image = PeImage::parse(&data)?;
        let streams = stream_headers(&data, image.metadata_offset, image.metadata_size)?;

        let find = |names: &[&str]| streams.iter().find(|s| names.contains(&s.name.as_str()));

        let table_stream = find(&["#~", "#-"])
            .ok_or_else(|| RmuError::Parse("no metadata table stream".to_string()))?;
        let tables = TableStream::parse(&data, table_stream.offset, table_stream.size)?;

        let strings = find(&["#Strings"])
            .map(|s| Heap {
                offset: s.offset,
                size: s.size,
            })
            .ok_or_else(|| RmuError::Parse("no #Strings heap".to_string()))?;
        let user_strings = find(&["#US"])
            .map(|s| Heap {
                offset: s.offset,
                size: s.size,
            })
            .unwrap_or_default();

        Ok(Self {
            data,
            image,
            strings,
            user_strings,
            tables,
        })
    }

    fn string(&self, table: usize, row: u32, col: usize) -> RmuResult<String> {
        let index = self.tables.value(&self.data, table, row, col)?;
        string_at(&self.data, self.strings, index)
    }

    /// Name of the type a TypeDefOrRef coded index points at
    fn referenced_type_name(&self, coded: u32) -> RmuResult<Option<String>> {
        match CodedIndex::TypeDefOrRef.decode(coded) {
            Some((_, 0)) | None => Ok(None),
            Some((TYPE_DEF, row)) => self.string(TYPE_DEF, row, 1).map(Some),
            Some((TYPE_REF, row)) => self.string(TYPE_REF, row, 1).map(Some),
            // Generic instantiations live in TypeSpec blobs; they never match a plain name
            Some(_) => Ok(None),
        }
    }

    /// Property rows owned by `ty`, resolved through PropertyPtr when present
    fn property_rows(&self, ty: TypeHandle) -> RmuResult<Vec<u32>> {
        let map_rows = self.tables.row_count(PROPERTY_MAP);
        let indirect = self.tables.row_count(PROPERTY_PTR) > 0;
        let list_len = if indirect {
            self.tables.row_count(PROPERTY_PTR)
        } else {
            self.tables.row_count(PROPERTY)
        };

        for map_row in 1..=map_rows {
            if self.tables.value(&self.data, PROPERTY_MAP, map_row, 0)? != ty.0 {
                continue;
            }
            let start = self.tables.value(&self.data, PROPERTY_MAP, map_row, 1)?;
            let end = if map_row < map_rows {
                self.tables.value(&self.data, PROPERTY_MAP, map_row + 1, 1)?
            } else {
                list_len + 1
            };

            return (start..end.min(list_len + 1))
                .map(|i| {
                    if indirect {
                        self.tables.value(&self.data, PROPERTY_PTR, i, 0)
                    } else {
                        Ok(i)
                    }
                })
                .collect();
        }
        Ok(Vec::new())
    }

    fn getter_of(&self, property: u32) -> RmuResult<Option<MethodHandle>> {
        for row in 1..=self.tables.row_count(METHOD_SEMANTICS) {
            let semantics = self.tables.value(&self.data, METHOD_SEMANTICS, row, 0)?;
            let association = self.tables.value(&self.data, METHOD_SEMANTICS, row, 2)?;
            if semantics & SEMANTICS_GETTER != 0
                && CodedIndex::HasSemantics.decode(association) == Some((PROPERTY, property))
            {
                let method = self.tables.value(&self.data, METHOD_SEMANTICS, row, 1)?;
                return Ok(Some(MethodHandle(method)));
            }
        }
        Ok(None)
    }
}

impl MetadataReader for ClrAssembly {
    fn types(&self) -> RmuResult<Vec<TypeInfo>> {
        (1..=self.tables.row_count(TYPE_DEF))
            .map(|row| {
                let extends = self.tables.value(&self.data, TYPE_DEF, row, 3)?;
                Ok(TypeInfo {
                    handle: TypeHandle(row),
                    name: self.string(TYPE_DEF, row, 1)?,
                    namespace: self.string(TYPE_DEF, row, 2)?,
                    base_type: self.referenced_type_name(extends)?,
                })
            })
            .collect()
    }

    fn properties(&self, ty: TypeHandle) -> RmuResult<Vec<PropertyInfo>> {
        self.property_rows(ty)?
            .into_iter()
            .map(|row| {
                Ok(PropertyInfo {
                    name: self.string(PROPERTY, row, 1)?,
                    getter: self.getter_of(row)?,
                })
            })
            .collect()
    }

    fn string_constants(&self, method: MethodHandle) -> RmuResult<Option<Vec<String>>> {
        let rva = self.tables.value(&self.data, METHOD_DEF, method.0, 0)?;
        if rva == 0 {
            return Ok(None);
        }

        let offset = self.image.rva_to_offset(rva)?;
        let code = il::method_code(&self.data, offset)?;
        il::string_tokens(code)?
            .into_iter()
            .filter(|token| token >> 24 == il::USER_STRING_TOKEN)
            .map(|token| user_string_at(&self.data, self.user_strings, token & 0x00FF_FFFF))
            .collect::<RmuResult<Vec<_>>>()
            .map(Some)
    }
}

/// Loads assemblies from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ClrLoader;

impl MetadataLoader for ClrLoader {
    fn load(&self, path: &Path) -> RmuResult<Box<dyn MetadataReader>> {
        Ok(Box::new(ClrAssembly::open(path)?))
    }
}

/// Parse the metadata root (ECMA-335 II.24.2.1) and its stream headers
fn stream_headers(data: &[u8], root: usize, size: usize) -> RmuResult<Vec<StreamHeader>> {
    if read_u32(data, root)? != METADATA_SIGNATURE {
        return Err(RmuError::Parse("bad metadata signature".to_string()));
    }

    let version_len = read_u32(data, root + 12)? as usize;
    let mut pos = root + 16 + version_len + 2;
    let count = read_u16(data, pos)?;
    pos += 2;

    let mut streams = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = read_u32(data, pos)? as usize;
        let stream_size = read_u32(data, pos + 4)? as usize;
        pos += 8;

        let raw = slice(data, pos, MAX_STREAM_NAME.min(data.len().saturating_sub(pos)))?;
        let name_len = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| RmuError::Parse("unterminated stream name".to_string()))?;
        let name = String::from_utf8_lossy(&raw[..name_len]).into_owned();
        pos += (name_len + 1 + 3) & !3;

        if offset.saturating_add(stream_size) > size {
            return Err(RmuError::Parse(format!(
                "stream {} extends past metadata",
                name
            )));
        }
        streams.push(StreamHeader {
            name,
            offset: root + offset,
            size: stream_size,
        });
    }
    Ok(streams)
}
