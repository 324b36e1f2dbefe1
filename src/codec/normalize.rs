// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-place normalization of an inbound CDR payload: byte-swap to a
//! canonical little-endian layout while validating every length, bounded
//! string and union discriminant against the program that describes them.
//! Mandatory on every inbound fragment before the serdata built from it is
//! handed anywhere else — a buffer that fails to normalize is discarded
//! rather than partially trusted.

use super::opcode::{Op, OpFlags, OpKind, Subtype};
use super::{CdrHeader, CdrId};
use crate::error::{Error, Result};

fn need(buf: &[u8], pos: usize, n: usize) -> Result<()> {
    let ok = matches!(pos.checked_add(n), Some(end) if end <= buf.len());
    if !ok {
        return Err(Error::DeserializationFailed(format!(
            "need {n} bytes at offset {pos}, have {}",
            buf.len().saturating_sub(pos)
        )));
    }
    Ok(())
}

fn align(buf: &[u8], pos: &mut usize, n: usize) -> Result<()> {
    let padded = (*pos + n - 1) / n * n;
    need(buf, padded, 0)?;
    *pos = padded;
    Ok(())
}

/// Swap `n` bytes at `buf[pos..pos+n]` in place if `from_le != to_le`.
fn reswap(buf: &mut [u8], pos: usize, n: usize, from_le: bool, to_le: bool) {
    if from_le == to_le {
        return;
    }
    buf[pos..pos + n].reverse();
}

fn read_u32_at(buf: &[u8], pos: usize, le: bool) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[pos..pos + 4]);
    if le {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    }
}

const TARGET_LE: bool = true;

fn le_variant(id: CdrId) -> CdrId {
    match id {
        CdrId::CdrBe => CdrId::CdrLe,
        CdrId::Cdr2Be => CdrId::Cdr2Le,
        CdrId::DCdr2Be => CdrId::DCdr2Le,
        CdrId::PlCdr2Be => CdrId::PlCdr2Le,
        already_le => already_le,
    }
}

/// Normalize `buf` (header included) to little-endian in place, validating
/// it against `ops` as it goes. Returns the rewritten header.
///
/// # Errors
///
/// Returns [`Error::DeserializationFailed`] on any bounds, bounded-string or
/// union-discriminant violation, or an unrecognized representation
/// identifier.
pub fn normalize(ops: &[u32], buf: &mut [u8]) -> Result<CdrHeader> {
    need(buf, 0, 4)?;
    let mut header_bytes = [0u8; 4];
    header_bytes.copy_from_slice(&buf[0..4]);
    let header = CdrHeader::decode(header_bytes)?;
    let from_le = header.id.is_little_endian();

    let mut pos = 4usize;
    walk(ops, 0, buf, &mut pos, from_le)?;

    let new_id = le_variant(header.id);
    let new_header = CdrHeader {
        id: new_id,
        options: header.options,
    };
    buf[0..4].copy_from_slice(&new_header.encode());
    Ok(new_header)
}

fn walk(ops: &[u32], mut pc: usize, buf: &mut [u8], pos: &mut usize, from_le: bool) -> Result<()> {
    loop {
        if pc >= ops.len() {
            return Ok(());
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => return Ok(()),
            OpKind::Jsr => {
                let target = (pc as i64 + op.signed_offset() as i64) as usize;
                walk(ops, target, buf, pos, from_le)?;
                pc += 1;
            }
            OpKind::Adr => {
                pc = normalize_adr(ops, pc + 1, op, buf, pos, from_le)?;
            }
            OpKind::Dlc | OpKind::XcdrDlh => {
                need(buf, *pos, 4)?;
                let len = read_u32_at(buf, *pos, from_le) as usize;
                reswap(buf, *pos, 4, from_le, TARGET_LE);
                *pos += 4;
                let end = pos.checked_add(len).ok_or_else(|| {
                    Error::DeserializationFailed("DHEADER length overflows buffer".into())
                })?;
                need(buf, *pos, len)?;
                walk(ops, pc + 1, buf, pos, from_le)?;
                *pos = end;
                return Ok(());
            }
            OpKind::Plc | OpKind::Plm | OpKind::Jeq | OpKind::Kof => {
                return Err(Error::DeserializationFailed(format!(
                    "{:?} encountered outside its expected context",
                    op.kind()
                )))
            }
        }
    }
}

fn normalize_adr(
    ops: &[u32],
    pc: usize,
    op: Op,
    buf: &mut [u8],
    pos: &mut usize,
    from_le: bool,
) -> Result<usize> {
    match op.subtype() {
        Subtype::By1 => {
            need(buf, *pos, 1)?;
            *pos += 1;
            Ok(pc)
        }
        Subtype::By2 => {
            align(buf, pos, 2)?;
            need(buf, *pos, 2)?;
            reswap(buf, *pos, 2, from_le, TARGET_LE);
            *pos += 2;
            Ok(pc)
        }
        Subtype::By4 | Subtype::Enu => {
            align(buf, pos, 4)?;
            need(buf, *pos, 4)?;
            reswap(buf, *pos, 4, from_le, TARGET_LE);
            *pos += 4;
            Ok(pc)
        }
        Subtype::By8 => {
            align(buf, pos, 8)?;
            need(buf, *pos, 8)?;
            reswap(buf, *pos, 8, from_le, TARGET_LE);
            *pos += 8;
            Ok(pc)
        }
        Subtype::Str | Subtype::Bst => {
            let bound = if matches!(op.subtype(), Subtype::Bst) {
                Some(ops[pc])
            } else {
                None
            };
            let pc = if bound.is_some() { pc + 1 } else { pc };
            align(buf, pos, 4)?;
            need(buf, *pos, 4)?;
            let len = read_u32_at(buf, *pos, from_le);
            if len == 0 {
                return Err(Error::DeserializationFailed(
                    "string length must include the terminator".into(),
                ));
            }
            if let Some(bound) = bound {
                if bound > 0 && len > bound {
                    return Err(Error::DeserializationFailed(format!(
                        "string length {len} exceeds bound {bound}"
                    )));
                }
            }
            reswap(buf, *pos, 4, from_le, TARGET_LE);
            *pos += 4;
            let byte_len = (len - 1) as usize;
            need(buf, *pos, byte_len + 1)?;
            std::str::from_utf8(&buf[*pos..*pos + byte_len])
                .map_err(|e| Error::DeserializationFailed(format!("invalid UTF-8 string: {e}")))?;
            *pos += byte_len + 1;
            Ok(pc)
        }
        Subtype::Seq => {
            let target = ops[pc] as usize;
            align(buf, pos, 4)?;
            need(buf, *pos, 4)?;
            let count = read_u32_at(buf, *pos, from_le);
            reswap(buf, *pos, 4, from_le, TARGET_LE);
            *pos += 4;
            for _ in 0..count {
                walk(ops, target, buf, pos, from_le)?;
            }
            Ok(pc + 1)
        }
        Subtype::Arr => {
            let declared_len = ops[pc];
            let target = ops[pc + 1] as usize;
            for _ in 0..declared_len {
                walk(ops, target, buf, pos, from_le)?;
            }
            Ok(pc + 2)
        }
        Subtype::Uni => {
            let case_list = ops[pc] as usize;
            align(buf, pos, 4)?;
            need(buf, *pos, 4)?;
            let discriminant = read_u32_at(buf, *pos, from_le) as i32;
            reswap(buf, *pos, 4, from_le, TARGET_LE);
            *pos += 4;
            dispatch_union(ops, case_list, discriminant, buf, pos, from_le)?;
            Ok(pc + 1)
        }
        Subtype::Stu | Subtype::Ext => {
            let target = ops[pc] as usize;
            walk(ops, target, buf, pos, from_le)?;
            Ok(pc + 1)
        }
    }
}

fn dispatch_union(
    ops: &[u32],
    mut pc: usize,
    discriminant: i32,
    buf: &mut [u8],
    pos: &mut usize,
    from_le: bool,
) -> Result<()> {
    loop {
        if pc >= ops.len() {
            return Err(Error::DeserializationFailed(
                "union discriminant matched no case and no default".into(),
            ));
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => {
                return Err(Error::DeserializationFailed(
                    "union discriminant matched no case and no default".into(),
                ))
            }
            OpKind::Jeq => {
                pc += 1;
                if op.flags().contains(OpFlags::DEF) {
                    return walk(ops, op.offset() as usize, buf, pos, from_le);
                }
                let constant = ops[pc] as i32;
                pc += 1;
                if constant == discriminant {
                    return walk(ops, op.offset() as usize, buf, pos, from_le);
                }
            }
            other => {
                return Err(Error::DeserializationFailed(format!(
                    "malformed union case list: unexpected {other:?}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{serialize, CdrId, Value};

    fn single_i32_program() -> Vec<u32> {
        vec![Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0]
    }

    #[test]
    fn normalize_swaps_big_endian_to_little_endian() {
        let ops = single_i32_program();
        let mut payload = Vec::new();
        serialize::serialize(&ops, &Value::Struct(vec![Value::I32(42)]), false, &mut payload).unwrap();
        let mut buf = vec![0x00, 0x00, 0x00, 0x00];
        buf[0..2].copy_from_slice(&CdrId::CdrBe.to_u16().to_be_bytes());
        buf.extend_from_slice(&payload);

        let header = normalize(&ops, &mut buf).unwrap();
        assert_eq!(header.id, CdrId::CdrLe);
        let value = crate::codec::deserialize::deserialize(&ops, &buf[4..], true).unwrap();
        assert_eq!(value, Value::Struct(vec![Value::I32(42)]));
    }

    #[test]
    fn normalize_rejects_truncated_buffer() {
        let ops = single_i32_program();
        let mut buf = vec![0x00, 0x00, 0x00, 0x00, 0x01];
        buf[0..2].copy_from_slice(&CdrId::CdrLe.to_u16().to_be_bytes());
        assert!(normalize(&ops, &mut buf).is_err());
    }
}
