//! The `#~` metadata table stream (ECMA-335 II.24.2.6)
//!
//! Every table present in the image has to be sized, even the ones we never
//! read, because rows are laid out back to back and column widths depend on
//! the row counts of other tables.

use super::bytes::{read_u16, read_u32, read_u64, read_u8};
use crate::core::{RmuError, RmuResult};

pub(crate) const MODULE: usize = 0x00;
pub(crate) const TYPE_REF: usize = 0x01;
pub(crate) const TYPE_DEF: usize = 0x02;
pub(crate) const FIELD_PTR: usize = 0x03;
pub(crate) const FIELD: usize = 0x04;
pub(crate) const METHOD_PTR: usize = 0x05;
pub(crate) const METHOD_DEF: usize = 0x06;
pub(crate) const PARAM_PTR: usize = 0x07;
pub(crate) const PARAM: usize = 0x08;
pub(crate) const INTERFACE_IMPL: usize = 0x09;
pub(crate) const MEMBER_REF: usize = 0x0A;
pub(crate) const CONSTANT: usize = 0x0B;
pub(crate) const CUSTOM_ATTRIBUTE: usize = 0x0C;
pub(crate) const FIELD_MARSHAL: usize = 0x0D;
pub(crate) const DECL_SECURITY: usize = 0x0E;
pub(crate) const CLASS_LAYOUT: usize = 0x0F;
pub(crate) const FIELD_LAYOUT: usize = 0x10;
pub(crate) const STAND_ALONE_SIG: usize = 0x11;
pub(crate) const EVENT_MAP: usize = 0x12;
pub(crate) const EVENT_PTR: usize = 0x13;
pub(crate) const EVENT: usize = 0x14;
pub(crate) const PROPERTY_MAP: usize = 0x15;
pub(crate) const PROPERTY_PTR: usize = 0x16;
pub(crate) const PROPERTY: usize = 0x17;
pub(crate) const METHOD_SEMANTICS: usize = 0x18;
pub(crate) const METHOD_IMPL: usize = 0x19;
pub(crate) const MODULE_REF: usize = 0x1A;
pub(crate) const TYPE_SPEC: usize = 0x1B;
pub(crate) const IMPL_MAP: usize = 0x1C;
pub(crate) const FIELD_RVA: usize = 0x1D;
pub(crate) const ENC_LOG: usize = 0x1E;
pub(crate) const ENC_MAP: usize = 0x1F;
pub(crate) const ASSEMBLY: usize = 0x20;
pub(crate) const ASSEMBLY_PROCESSOR: usize = 0x21;
pub(crate) const ASSEMBLY_OS: usize = 0x22;
pub(crate) const ASSEMBLY_REF: usize = 0x23;
pub(crate) const ASSEMBLY_REF_PROCESSOR: usize = 0x24;
pub(crate) const ASSEMBLY_REF_OS: usize = 0x25;
pub(crate) const FILE: usize = 0x26;
pub(crate) const EXPORTED_TYPE: usize = 0x27;
pub(crate) const MANIFEST_RESOURCE: usize = 0x28;
pub(crate) const NESTED_CLASS: usize = 0x29;
pub(crate) const GENERIC_PARAM: usize = 0x2A;
pub(crate) const METHOD_SPEC: usize = 0x2B;
pub(crate) const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;

const TABLE_COUNT: usize = 0x2D;

const HEAP_STRING_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Coded index kinds (ECMA-335 II.24.2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    /// Tag width and the tables the tag selects between
    fn layout(self) -> (u32, &'static [usize]) {
        match self {
            CodedIndex::TypeDefOrRef => (2, &[TYPE_DEF, TYPE_REF, TYPE_SPEC]),
            CodedIndex::HasConstant => (2, &[FIELD, PARAM, PROPERTY]),
            CodedIndex::HasCustomAttribute => (
                5,
                &[
                    METHOD_DEF,
                    FIELD,
                    TYPE_REF,
                    TYPE_DEF,
                    PARAM,
                    INTERFACE_IMPL,
                    MEMBER_REF,
                    MODULE,
                    DECL_SECURITY,
                    PROPERTY,
                    EVENT,
                    STAND_ALONE_SIG,
                    MODULE_REF,
                    TYPE_SPEC,
                    ASSEMBLY,
                    ASSEMBLY_REF,
                    FILE,
                    EXPORTED_TYPE,
                    MANIFEST_RESOURCE,
                    GENERIC_PARAM,
                    GENERIC_PARAM_CONSTRAINT,
                    METHOD_SPEC,
                ],
            ),
            CodedIndex::HasFieldMarshal => (1, &[FIELD, PARAM]),
            CodedIndex::HasDeclSecurity => (2, &[TYPE_DEF, METHOD_DEF, ASSEMBLY]),
            CodedIndex::MemberRefParent => {
                (3, &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC])
            }
            CodedIndex::HasSemantics => (1, &[EVENT, PROPERTY]),
            CodedIndex::MethodDefOrRef => (1, &[METHOD_DEF, MEMBER_REF]),
            CodedIndex::MemberForwarded => (1, &[FIELD, METHOD_DEF]),
            CodedIndex::Implementation => (2, &[FILE, ASSEMBLY_REF, EXPORTED_TYPE]),
            // Tags 0, 1 and 4 are unused; only MethodDef (2) and MemberRef (3) matter for sizing
            CodedIndex::CustomAttributeType => (3, &[METHOD_DEF, MEMBER_REF]),
            CodedIndex::ResolutionScope => (2, &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF]),
            CodedIndex::TypeOrMethodDef => (1, &[TYPE_DEF, METHOD_DEF]),
        }
    }

    /// Split a raw coded value into (table, 1-based row). Row 0 means null.
    pub(crate) fn decode(self, value: u32) -> Option<(usize, u32)> {
        let (bits, tables) = self.layout();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let row = value >> bits;
        tables.get(tag).map(|&table| (table, row))
    }
}

#[derive(Debug, Clone, Copy)]
enum Col {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Idx(usize),
    Coded(CodedIndex),
}

fn schema(table: usize) -> Option<&'static [Col]> {
    use CodedIndex as C;
    use Col::*;

    Some(match table {
        MODULE => &[U16, Str, Guid, Guid, Guid],
        TYPE_REF => &[Coded(C::ResolutionScope), Str, Str],
        TYPE_DEF => &[U32, Str, Str, Coded(C::TypeDefOrRef), Idx(FIELD), Idx(METHOD_DEF)],
        FIELD_PTR => &[Idx(FIELD)],
        FIELD => &[U16, Str, Blob],
        METHOD_PTR => &[Idx(METHOD_DEF)],
        METHOD_DEF => &[U32, U16, U16, Str, Blob, Idx(PARAM)],
        PARAM_PTR => &[Idx(PARAM)],
        PARAM => &[U16, U16, Str],
        INTERFACE_IMPL => &[Idx(TYPE_DEF), Coded(C::TypeDefOrRef)],
        MEMBER_REF => &[Coded(C::MemberRefParent), Str, Blob],
        // Type is a single byte followed by a padding byte
        CONSTANT => &[U16, Coded(C::HasConstant), Blob],
        CUSTOM_ATTRIBUTE => &[
            Coded(C::HasCustomAttribute),
            Coded(C::CustomAttributeType),
            Blob,
        ],
        FIELD_MARSHAL => &[Coded(C::HasFieldMarshal), Blob],
        DECL_SECURITY => &[U16, Coded(C::HasDeclSecurity), Blob],
        CLASS_LAYOUT => &[U16, U32, Idx(TYPE_DEF)],
        FIELD_LAYOUT => &[U32, Idx(FIELD)],
        STAND_ALONE_SIG => &[Blob],
        EVENT_MAP => &[Idx(TYPE_DEF), Idx(EVENT)],
        EVENT_PTR => &[Idx(EVENT)],
        EVENT => &[U16, Str, Coded(C::TypeDefOrRef)],
        PROPERTY_MAP => &[Idx(TYPE_DEF), Idx(PROPERTY)],
        PROPERTY_PTR => &[Idx(PROPERTY)],
        PROPERTY => &[U16, Str, Blob],
        METHOD_SEMANTICS => &[U16, Idx(METHOD_DEF), Coded(C::HasSemantics)],
        METHOD_IMPL => &[
            Idx(TYPE_DEF),
            Coded(C::MethodDefOrRef),
            Coded(C::MethodDefOrRef),
        ],
        MODULE_REF => &[Str],
        TYPE_SPEC => &[Blob],
        IMPL_MAP => &[U16, Coded(C::MemberForwarded), Str, Idx(MODULE_REF)],
        FIELD_RVA => &[U32, Idx(FIELD)],
        ENC_LOG => &[U32, U32],
        ENC_MAP => &[U32],
        ASSEMBLY => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
        ASSEMBLY_PROCESSOR => &[U32],
        ASSEMBLY_OS => &[U32, U32, U32],
        ASSEMBLY_REF => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
        ASSEMBLY_REF_PROCESSOR => &[U32, Idx(ASSEMBLY_REF)],
        ASSEMBLY_REF_OS => &[U32, U32, U32, Idx(ASSEMBLY_REF)],
        FILE => &[U32, Str, Blob],
        EXPORTED_TYPE => &[U32, U32, Str, Str, Coded(C::Implementation)],
        MANIFEST_RESOURCE => &[U32, U32, Str, Coded(C::Implementation)],
        NESTED_CLASS => &[Idx(TYPE_DEF), Idx(TYPE_DEF)],
        GENERIC_PARAM => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
        METHOD_SPEC => &[Coded(C::MethodDefOrRef), Blob],
        GENERIC_PARAM_CONSTRAINT => &[Idx(GENERIC_PARAM), Coded(C::TypeDefOrRef)],
        _ => return None,
    })
}

#[derive(Debug, Clone, Default)]
struct TableLayout {
    offset: usize,
    row_size: usize,
    /// (offset within row, width) per column
    columns: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub(crate) struct TableStream {
    rows: [u32; TABLE_COUNT],
    layouts: Vec<TableLayout>,
}

struct HeapWidths {
    string: usize,
    guid: usize,
    blob: usize,
}

impl TableStream {
    pub(crate) fn parse(data: &[u8], offset: usize, size: usize) -> RmuResult<Self> {
        let heap_sizes = read_u8(data, offset + 6)?;
        let valid = read_u64(data, offset + 8)?;

        let mut pos = offset + 24;
        let mut rows = [0u32; TABLE_COUNT];
        for table in 0..64 {
            if valid & (1u64 << table) == 0 {
                continue;
            }
            if table >= TABLE_COUNT {
                return Err(RmuError::Parse(format!(
                    "unsupported metadata table {:#x}",
                    table
                )));
            }
            rows[table] = read_u32(data, pos)?;
            pos += 4;
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            pos += 4;
        }

        let widths = HeapWidths {
            string: if heap_sizes & HEAP_STRING_WIDE != 0 { 4 } else { 2 },
            guid: if heap_sizes & HEAP_GUID_WIDE != 0 { 4 } else { 2 },
            blob: if heap_sizes & HEAP_BLOB_WIDE != 0 { 4 } else { 2 },
        };

        let mut layouts = Vec::with_capacity(TABLE_COUNT);
        for (table, &count) in rows.iter().enumerate() {
            let mut layout = TableLayout {
                offset: pos,
                ..TableLayout::default()
            };
            if let Some(columns) = schema(table) {
                for col in columns {
                    let width = column_width(*col, &rows, &widths);
                    layout.columns.push((layout.row_size, width));
                    layout.row_size += width;
                }
            }
            pos = (count as usize)
                .checked_mul(layout.row_size)
                .and_then(|bytes| pos.checked_add(bytes))
                .ok_or_else(|| RmuError::Parse("metadata table size overflow".to_string()))?;
            layouts.push(layout);
        }

        if pos > offset + size || pos > data.len() {
            return Err(RmuError::Parse(
                "metadata tables extend past the #~ stream".to_string(),
            ));
        }

        Ok(Self { rows, layouts })
    }

    pub(crate) fn row_count(&self, table: usize) -> u32 {
        self.rows.get(table).copied().unwrap_or(0)
    }

    /// Read column `col` of 1-based `row`
    pub(crate) fn value(&self, data: &[u8], table: usize, row: u32, col: usize) -> RmuResult<u32> {
        if row == 0 || row > self.row_count(table) {
            return Err(RmuError::Parse(format!(
                "row {} out of range for table {:#x}",
                row, table
            )));
        }
        let layout = &self.layouts[table];
        let (col_offset, width) = *layout.columns.get(col).ok_or_else(|| {
            RmuError::Parse(format!("column {} out of range for table {:#x}", col, table))
        })?;
        let at = layout.offset + (row as usize - 1) * layout.row_size + col_offset;
        match width {
            2 => Ok(u32::from(read_u16(data, at)?)),
            _ => read_u32(data, at),
        }
    }
}

fn column_width(col: Col, rows: &[u32; TABLE_COUNT], widths: &HeapWidths) -> usize {
    match col {
        Col::U16 => 2,
        Col::U32 => 4,
        Col::Str => widths.string,
        Col::Guid => widths.guid,
        Col::Blob => widths.blob,
        Col::Idx(table) => {
            if rows[table] < 0x1_0000 {
                2
            } else {
                4
            }
        }
        Col::Coded(kind) => {
            let (bits, tables) = kind.layout();
            let max = tables.iter().map(|&t| rows[t]).max().unwrap_or(0);
            if u64::from(max) < (1u64 << (16 - bits)) {
                2
            } else {
                4
            }
        }
    }
}
