//! Bounds-checked little-endian reads over an image buffer

use crate::core::{RmuError, RmuResult};

pub(crate) fn slice(data: &[u8], offset: usize, len: usize) -> RmuResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            RmuError::Parse(format!(
                "read of {} bytes at {:#x} runs past end of data ({:#x})",
                len,
                offset,
                data.len()
            ))
        })
}

pub(crate) fn read_u8(data: &[u8], offset: usize) -> RmuResult<u8> {
    Ok(slice(data, offset, 1)?[0])
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> RmuResult<u16> {
    let b = slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> RmuResult<u32> {
    let b = slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> RmuResult<u64> {
    let b = slice(data, offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Ok(u64::from_le_bytes(buf))
}
