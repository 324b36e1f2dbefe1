// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CDR payload -> sample. Mirrors [`super::serialize`] exactly, reading
//! instead of writing; every bounds check failure returns
//! [`Error::DeserializationFailed`] rather than panicking or reading out of
//! range. Recursive types terminate because every `Seq`/`Arr` step consumes
//! at least one length word from the input before recursing.

use super::opcode::{Op, OpFlags, OpKind, Subtype};
use super::value::Value;
use crate::error::{Error, Result};

fn need(input: &[u8], pos: usize, n: usize) -> Result<()> {
    let ok = matches!(pos.checked_add(n), Some(end) if end <= input.len());
    if !ok {
        return Err(Error::DeserializationFailed(format!(
            "need {n} bytes at offset {pos}, have {}",
            input.len().saturating_sub(pos)
        )));
    }
    Ok(())
}

fn align_read(input: &[u8], pos: &mut usize, n: usize) -> Result<()> {
    let padded = (*pos + n - 1) / n * n;
    need(input, padded, 0)?;
    *pos = padded;
    Ok(())
}

fn read_primitive(input: &[u8], pos: &mut usize, subtype: Subtype, flags: OpFlags, le: bool) -> Result<Value> {
    Ok(match subtype {
        Subtype::By1 => {
            need(input, *pos, 1)?;
            let b = input[*pos];
            *pos += 1;
            if flags.contains(OpFlags::SGN) {
                Value::I8(b as i8)
            } else {
                Value::U8(b)
            }
        }
        Subtype::By2 => {
            align_read(input, pos, 2)?;
            need(input, *pos, 2)?;
            let bytes = [input[*pos], input[*pos + 1]];
            *pos += 2;
            let v = if le { u16::from_le_bytes(bytes) } else { u16::from_be_bytes(bytes) };
            if flags.contains(OpFlags::SGN) {
                Value::I16(v as i16)
            } else {
                Value::U16(v)
            }
        }
        Subtype::By4 if flags.contains(OpFlags::FP) => {
            align_read(input, pos, 4)?;
            need(input, *pos, 4)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&input[*pos..*pos + 4]);
            *pos += 4;
            let bits = if le { u32::from_le_bytes(bytes) } else { u32::from_be_bytes(bytes) };
            Value::F32(f32::from_bits(bits))
        }
        Subtype::By4 | Subtype::Enu => {
            align_read(input, pos, 4)?;
            need(input, *pos, 4)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&input[*pos..*pos + 4]);
            *pos += 4;
            let v = if le { u32::from_le_bytes(bytes) } else { u32::from_be_bytes(bytes) };
            if matches!(subtype, Subtype::Enu) {
                Value::Enum(v as i32)
            } else if flags.contains(OpFlags::SGN) {
                Value::I32(v as i32)
            } else {
                Value::U32(v)
            }
        }
        Subtype::By8 if flags.contains(OpFlags::FP) => {
            align_read(input, pos, 8)?;
            need(input, *pos, 8)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[*pos..*pos + 8]);
            *pos += 8;
            let bits = if le { u64::from_le_bytes(bytes) } else { u64::from_be_bytes(bytes) };
            Value::F64(f64::from_bits(bits))
        }
        Subtype::By8 => {
            align_read(input, pos, 8)?;
            need(input, *pos, 8)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[*pos..*pos + 8]);
            *pos += 8;
            let v = if le { u64::from_le_bytes(bytes) } else { u64::from_be_bytes(bytes) };
            if flags.contains(OpFlags::SGN) {
                Value::I64(v as i64)
            } else {
                Value::U64(v)
            }
        }
        other => {
            return Err(Error::DeserializationFailed(format!(
                "{other:?} is not a primitive subtype"
            )))
        }
    })
}

fn read_string(input: &[u8], pos: &mut usize, bound: Option<u32>, le: bool) -> Result<String> {
    align_read(input, pos, 4)?;
    need(input, *pos, 4)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&input[*pos..*pos + 4]);
    *pos += 4;
    let len = if le { u32::from_le_bytes(bytes) } else { u32::from_be_bytes(bytes) };
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
    let byte_len = (len - 1) as usize;
    need(input, *pos, byte_len + 1)?;
    let s = std::str::from_utf8(&input[*pos..*pos + byte_len])
        .map_err(|e| Error::DeserializationFailed(format!("invalid UTF-8 string: {e}")))?
        .to_string();
    *pos += byte_len + 1;
    Ok(s)
}

/// Deserialize a whole sample from `input`, starting at opcode index 0.
///
/// # Errors
///
/// Returns [`Error::DeserializationFailed`] on any bounds, union-case or
/// bad-discriminant violation.
pub fn deserialize(ops: &[u32], input: &[u8], le: bool) -> Result<Value> {
    let mut pos = 0usize;
    run_subprogram(ops, 0, input, &mut pos, le)
}

fn run_subprogram(ops: &[u32], mut pc: usize, input: &[u8], pos: &mut usize, le: bool) -> Result<Value> {
    let mut fields = Vec::new();
    loop {
        if pc >= ops.len() {
            return Ok(Value::Struct(fields));
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => return Ok(Value::Struct(fields)),
            OpKind::Jsr => {
                let target = (pc as i64 + op.signed_offset() as i64) as usize;
                if let Value::Struct(more) = run_subprogram(ops, target, input, pos, le)? {
                    fields.extend(more);
                }
                pc += 1;
            }
            OpKind::Adr => {
                let (new_pc, value) = deserialize_adr(ops, pc + 1, op, input, pos, le)?;
                fields.push(value);
                pc = new_pc;
            }
            OpKind::Dlc | OpKind::XcdrDlh => {
                need(input, *pos, 4)?;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&input[*pos..*pos + 4]);
                *pos += 4;
                let len = if le { u32::from_le_bytes(bytes) } else { u32::from_be_bytes(bytes) } as usize;
                let end = pos.checked_add(len).ok_or_else(|| {
                    Error::DeserializationFailed("DHEADER length overflows buffer".into())
                })?;
                need(input, *pos, len)?;
                if let Value::Struct(more) = run_subprogram(ops, pc + 1, input, pos, le)? {
                    fields.extend(more);
                }
                // Appendable: tolerate (skip) trailing bytes the reader's
                // older type descriptor doesn't know about.
                *pos = end;
                return Ok(Value::Struct(fields));
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

fn deserialize_adr(
    ops: &[u32],
    pc: usize,
    op: Op,
    input: &[u8],
    pos: &mut usize,
    le: bool,
) -> Result<(usize, Value)> {
    match op.subtype() {
        Subtype::By1 | Subtype::By2 | Subtype::By4 | Subtype::By8 | Subtype::Enu => {
            Ok((pc, read_primitive(input, pos, op.subtype(), op.flags(), le)?))
        }
        Subtype::Str => Ok((pc, Value::Str(read_string(input, pos, None, le)?))),
        Subtype::Bst => {
            let bound = ops[pc];
            Ok((pc + 1, Value::Str(read_string(input, pos, Some(bound), le)?)))
        }
        Subtype::Seq => {
            let target = ops[pc] as usize;
            align_read(input, pos, 4)?;
            need(input, *pos, 4)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&input[*pos..*pos + 4]);
            *pos += 4;
            let count = if le { u32::from_le_bytes(bytes) } else { u32::from_be_bytes(bytes) };
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(run_one(ops, target, input, pos, le)?);
            }
            Ok((pc + 1, Value::Seq(items)))
        }
        Subtype::Arr => {
            let declared_len = ops[pc] as usize;
            let target = ops[pc + 1] as usize;
            let mut items = Vec::with_capacity(declared_len);
            for _ in 0..declared_len {
                items.push(run_one(ops, target, input, pos, le)?);
            }
            Ok((pc + 2, Value::Arr(items)))
        }
        Subtype::Uni => {
            let case_list = ops[pc] as usize;
            align_read(input, pos, 4)?;
            need(input, *pos, 4)?;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&input[*pos..*pos + 4]);
            *pos += 4;
            let discriminant = if le { i32::from_le_bytes(bytes) } else { i32::from_be_bytes(bytes) };
            let value = dispatch_union_read(ops, case_list, discriminant, input, pos, le)?;
            Ok((
                pc + 1,
                Value::Union {
                    discriminant,
                    value: Box::new(value),
                },
            ))
        }
        Subtype::Stu | Subtype::Ext => {
            let target = ops[pc] as usize;
            let value = run_subprogram(ops, target, input, pos, le)?;
            Ok((pc + 1, value))
        }
    }
}

/// A single sequence/array element is itself a whole subprogram result; for
/// primitive element types the subprogram is a single `Adr` and this
/// unwraps the one-field struct it produces back into a scalar [`Value`].
fn run_one(ops: &[u32], target: usize, input: &[u8], pos: &mut usize, le: bool) -> Result<Value> {
    match run_subprogram(ops, target, input, pos, le)? {
        Value::Struct(mut fields) if fields.len() == 1 => Ok(fields.remove(0)),
        other => Ok(other),
    }
}

fn dispatch_union_read(
    ops: &[u32],
    mut pc: usize,
    discriminant: i32,
    input: &[u8],
    pos: &mut usize,
    le: bool,
) -> Result<Value> {
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
                    return run_one(ops, op.offset() as usize, input, pos, le);
                }
                let constant = ops[pc] as i32;
                pc += 1;
                if constant == discriminant {
                    return run_one(ops, op.offset() as usize, input, pos, le);
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
