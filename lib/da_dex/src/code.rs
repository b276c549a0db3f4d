//! Dalvik instruction stream scanning.
//!
//! Instructions are only decoded as far as needed to find method, string
//! and type references: every other instruction is skipped by width.

use crate::errors::{DexError, DexResult};

/// A constant pool reference found in an instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeRef {
    Method(u32),
    String(u32),
    Type(u32),
}

const PACKED_SWITCH_PAYLOAD: u16 = 0x0100;
const SPARSE_SWITCH_PAYLOAD: u16 = 0x0200;
const FILL_ARRAY_DATA_PAYLOAD: u16 = 0x0300;

/// Width in code units of each opcode.
const fn width(opcode: u8) -> usize {
    match opcode {
        0x00..=0x01 | 0x04 | 0x07 | 0x0a..=0x12 | 0x1d..=0x1e | 0x21 | 0x27..=0x28 => 1,
        0x3e..=0x43 | 0x73 | 0x79..=0x8f | 0xb0..=0xcf | 0xe3..=0xf9 => 1,
        0x02 | 0x05 | 0x08 | 0x13 | 0x15..=0x16 | 0x19..=0x1a | 0x1c | 0x1f..=0x20 => 2,
        0x22..=0x23 | 0x29 | 0x2d..=0x3d | 0x44..=0x6d | 0x90..=0xaf | 0xd0..=0xe2 | 0xfe..=0xff => 2,
        0x03 | 0x06 | 0x09 | 0x14 | 0x17 | 0x1b | 0x24..=0x26 | 0x2a..=0x2c => 3,
        0x6e..=0x72 | 0x74..=0x78 | 0xfc..=0xfd => 3,
        0xfa..=0xfb => 4,
        0x18 => 5,
    }
}

/// Width of the payload pseudo-instruction starting at `insns[0]`, if any.
fn payload_width(insns: &[u16]) -> Option<usize> {
    let unit = |i: usize| insns.get(i).copied().map(usize::from);
    match insns.first().copied()? {
        PACKED_SWITCH_PAYLOAD => Some(unit(1)? * 2 + 4),
        SPARSE_SWITCH_PAYLOAD => Some(unit(1)? * 4 + 2),
        FILL_ARRAY_DATA_PAYLOAD => {
            let element_width = unit(1)?;
            let size = unit(2)? | (unit(3)? << 16);
            Some((size * element_width + 1) / 2 + 4)
        }
        _ => None,
    }
}

/// Returns the references of an instruction stream, in code order.
pub(crate) fn scan(insns: &[u16]) -> DexResult<Vec<CodeRef>> {
    let mut refs = Vec::new();
    let mut pc = 0;

    while pc < insns.len() {
        let unit = insns[pc];
        let opcode = (unit & 0xff) as u8;
        let size = match payload_width(&insns[pc..]) {
            Some(size) => size,
            None => width(opcode),
        };
        let Some(insn) = insns.get(pc..pc + size) else {
            return Err(DexError::TruncatedInstruction { addr: pc });
        };

        match opcode {
            // const-string, const-class, check-cast, new-instance
            0x1a | 0x1c | 0x1f | 0x22 => {
                let idx = u32::from(insn[1]);
                refs.push(if opcode == 0x1a {
                    CodeRef::String(idx)
                } else {
                    CodeRef::Type(idx)
                });
            }
            // const-string/jumbo
            0x1b => refs.push(CodeRef::String(
                u32::from(insn[1]) | (u32::from(insn[2]) << 16),
            )),
            // instance-of, new-array, filled-new-array(/range)
            0x20 | 0x23..=0x25 => refs.push(CodeRef::Type(u32::from(insn[1]))),
            // invoke-kind(/range), invoke-polymorphic(/range)
            0x6e..=0x72 | 0x74..=0x78 | 0xfa..=0xfb => {
                refs.push(CodeRef::Method(u32::from(insn[1])));
            }
            _ => (),
        }
        pc += size;
    }

    Ok(refs)
}
