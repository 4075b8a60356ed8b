//! CIL method bodies: header decoding and an opcode walker that yields `ldstr` tokens

use super::bytes::{read_u16, read_u32, read_u8, slice};
use crate::core::{RmuError, RmuResult};

const TINY_FORMAT: u8 = 0x2;
const FAT_FORMAT: u8 = 0x3;

const OP_LDSTR: u8 = 0x72;
const OP_SWITCH: u8 = 0x45;
const OP_PREFIX: u8 = 0xFE;

/// Token table tag for `#US` heap references
pub(crate) const USER_STRING_TOKEN: u32 = 0x70;

/// The IL bytes of the method body starting at `offset`
pub(crate) fn method_code(data: &[u8], offset: usize) -> RmuResult<&[u8]> {
    let first = read_u8(data, offset)?;
    match first & 0x3 {
        TINY_FORMAT => slice(data, offset + 1, (first >> 2) as usize),
        FAT_FORMAT => {
            let flags = read_u16(data, offset)?;
            let header_size = usize::from(flags >> 12) * 4;
            let code_size = read_u32(data, offset + 4)? as usize;
            slice(data, offset + header_size, code_size)
        }
        _ => Err(RmuError::Parse(format!(
            "unknown method header format {:#x}",
            first
        ))),
    }
}

/// Metadata tokens of every `ldstr` operand, in instruction order
pub(crate) fn string_tokens(code: &[u8]) -> RmuResult<Vec<u32>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < code.len() {
        let op = code[pos];
        pos += 1;

        let operand = match op {
            OP_PREFIX => {
                let op2 = read_u8(code, pos)?;
                pos += 1;
                prefixed_operand_size(op2)
            }
            OP_LDSTR => {
                tokens.push(read_u32(code, pos)?);
                4
            }
            OP_SWITCH => {
                let targets = read_u32(code, pos)? as usize;
                targets
                    .checked_mul(4)
                    .and_then(|n| n.checked_add(4))
                    .ok_or_else(|| RmuError::Parse("switch table overflow".to_string()))?
            }
            _ => operand_size(op),
        };
        pos += operand;
    }

    if pos > code.len() {
        return Err(RmuError::Parse("truncated IL instruction".to_string()));
    }
    Ok(tokens)
}

/// Operand width of a single-byte opcode
fn operand_size(op: u8) -> usize {
    match op {
        // ldarg.s .. stloc.s, ldc.i4.s, short branches, leave.s
        0x0E..=0x13 | 0x1F | 0x2B..=0x37 | 0xDE => 1,
        // ldc.i4, ldc.r4
        0x20 | 0x22 => 4,
        // ldc.i8, ldc.r8
        0x21 | 0x23 => 8,
        // jmp, call, calli, long branches, callvirt..isinst, unbox, field ops,
        // stobj, box, newarr, ldelema, ldelem, stelem, unbox.any, refanyval,
        // mkrefany, ldtoken, leave
        0x27..=0x29
        | 0x38..=0x44
        | 0x6F..=0x75
        | 0x79
        | 0x7B..=0x81
        | 0x8C
        | 0x8D
        | 0x8F
        | 0xA3..=0xA5
        | 0xC2
        | 0xC6
        | 0xD0
        | 0xDD => 4,
        _ => 0,
    }
}

/// Operand width of a 0xFE-prefixed opcode
fn prefixed_operand_size(op: u8) -> usize {
    match op {
        // ldftn, ldvirtftn, initobj, constrained., sizeof
        0x06 | 0x07 | 0x15 | 0x16 | 0x1C => 4,
        // ldarg, ldarga, starg, ldloc, ldloca, stloc
        0x09..=0x0E => 2,
        // unaligned., no.
        0x12 | 0x19 => 1,
        _ => 0,
    }
}
