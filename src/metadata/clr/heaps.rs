//! `#Strings` and `#US` heaps

use super::bytes::{read_u8, slice};
use crate::core::{RmuError, RmuResult};

/// Location of a heap stream inside the image
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Heap {
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

impl Heap {
    fn bytes<'a>(&self, data: &'a [u8]) -> RmuResult<&'a [u8]> {
        slice(data, self.offset, self.size)
    }
}

/// Null-terminated UTF-8 string from the `#Strings` heap
pub(crate) fn string_at(data: &[u8], heap: Heap, index: u32) -> RmuResult<String> {
    let bytes = heap.bytes(data)?;
    let start = index as usize;
    let rest = bytes
        .get(start..)
        .ok_or_else(|| RmuError::Parse(format!("#Strings index {:#x} out of range", index)))?;
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| RmuError::Parse("unterminated #Strings entry".to_string()))?;
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Length-prefixed UTF-16 string from the `#US` heap
pub(crate) fn user_string_at(data: &[u8], heap: Heap, index: u32) -> RmuResult<String> {
    let bytes = heap.bytes(data)?;
    let (len, header) = read_compressed(bytes, index as usize)?;
    let start = index as usize + header;
    let blob = slice(bytes, start, len as usize)?;

    // Trailing byte flags whether any char needs special handling; not part of the text
    let text = &blob[..blob.len() & !1];
    let units: Vec<u16> = text
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Decode an ECMA-335 compressed unsigned integer, returning (value, bytes consumed)
pub(crate) fn read_compressed(data: &[u8], offset: usize) -> RmuResult<(u32, usize)> {
    let first = read_u8(data, offset)?;
    if first & 0x80 == 0 {
        Ok((u32::from(first), 1))
    } else if first & 0xC0 == 0x80 {
        let second = read_u8(data, offset + 1)?;
        Ok(((u32::from(first & 0x3F) << 8) | u32::from(second), 2))
    } else if first & 0xE0 == 0xC0 {
        let b = slice(data, offset + 1, 3)?;
        Ok((
            (u32::from(first & 0x1F) << 24)
                | (u32::from(b[0]) << 16)
                | (u32::from(b[1]) << 8)
                | u32::from(b[2]),
            4,
        ))
    } else {
        Err(RmuError::Parse(format!(
            "invalid compressed integer prefix {:#x}",
            first
        )))
    }
}
