// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key extraction and keyhash computation.
//!
//! A variant of the serialize walk that skips every field not marked
//! `KEY`, producing the canonical big-endian key CDR. If the type is
//! `FIXED_KEY` (key bytes fit in 16), that extracted key *is* the keyhash;
//! otherwise it is MD5-hashed down to 16 bytes.

use super::opcode::{Op, OpFlags, OpKind, Subtype};
use super::value::Value;
use crate::error::{Error, Result};

fn align(out: &mut Vec<u8>, n: usize) {
    while out.len() % n != 0 {
        out.push(0);
    }
}

/// Big-endian primitive write, the canonical key-CDR byte order regardless
/// of the sample's own wire endianness.
fn write_key_primitive(out: &mut Vec<u8>, subtype: Subtype, flags: OpFlags, value: &Value) -> Result<()> {
    match subtype {
        Subtype::By1 => {
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 1-byte key field".into()))?;
            out.push(v as u8);
        }
        Subtype::By2 => {
            align(out, 2);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 2-byte key field".into()))? as u16;
            out.extend_from_slice(&v.to_be_bytes());
        }
        Subtype::By4 if flags.contains(OpFlags::FP) => {
            align(out, 4);
            let v = match value {
                Value::F32(f) => *f,
                other => {
                    return Err(Error::SerializationFailed(format!(
                        "expected f32 key field, got {other:?}"
                    )))
                }
            };
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Subtype::By4 | Subtype::Enu => {
            align(out, 4);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 4-byte key field".into()))? as u32;
            out.extend_from_slice(&v.to_be_bytes());
        }
        Subtype::By8 if flags.contains(OpFlags::FP) => {
            align(out, 8);
            let v = match value {
                Value::F64(f) => *f,
                other => {
                    return Err(Error::SerializationFailed(format!(
                        "expected f64 key field, got {other:?}"
                    )))
                }
            };
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Subtype::By8 => {
            align(out, 8);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 8-byte key field".into()))? as u64;
            out.extend_from_slice(&v.to_be_bytes());
        }
        other => {
            return Err(Error::SerializationFailed(format!(
                "{other:?} is not a primitive key subtype"
            )))
        }
    }
    Ok(())
}

/// Big-endian length-prefixed string write, matching `write_string`'s
/// framing in `serialize.rs` but always big-endian (the canonical key-CDR
/// byte order, independent of the sample's own wire endianness).
fn write_key_string(out: &mut Vec<u8>, s: &str, bound: Option<u32>) -> Result<()> {
    if let Some(bound) = bound {
        if bound > 0 && s.len() as u32 + 1 > bound {
            return Err(Error::SerializationFailed(format!(
                "string of length {} exceeds bound {bound}",
                s.len()
            )));
        }
    }
    align(out, 4);
    let len = s.len() as u32 + 1;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

/// Find the case body targeted by `discriminant` in a union's case list,
/// mirroring `serialize.rs`'s `dispatch_union_write` walk but returning the
/// target program counter instead of executing the case immediately (key
/// extraction writes the discriminant itself before recursing).
fn find_union_case_target(ops: &[u32], mut pc: usize, discriminant: i32) -> Result<usize> {
    loop {
        if pc >= ops.len() {
            return Err(Error::SerializationFailed(
                "union discriminant matched no case and no default".into(),
            ));
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => {
                return Err(Error::SerializationFailed(
                    "union discriminant matched no case and no default".into(),
                ))
            }
            OpKind::Jeq => {
                pc += 1;
                if op.flags().contains(OpFlags::DEF) {
                    return Ok(op.offset() as usize);
                }
                let constant = ops[pc] as i32;
                pc += 1;
                if constant == discriminant {
                    return Ok(op.offset() as usize);
                }
            }
            other => {
                return Err(Error::SerializationFailed(format!(
                    "malformed union case list: unexpected {other:?}"
                )))
            }
        }
    }
}

/// Extract only the `KEY`-flagged fields, big-endian, ignoring everything
/// else in the type. Non-key `Stu`/`Ext`/`Seq`/`Arr`/`Uni` subtrees are
/// descended into only far enough to find key fields inside them; a
/// subtree with no key fields anywhere contributes nothing.
///
/// # Errors
///
/// Returns [`Error::SerializationFailed`] if `value`'s shape doesn't match
/// the program (see [`super::serialize::serialize`]).
pub fn extract_key(ops: &[u32], value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    walk(ops, 0, value, &mut out)?;
    Ok(out)
}

fn walk(ops: &[u32], mut pc: usize, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    loop {
        if pc >= ops.len() {
            return Ok(());
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => return Ok(()),
            OpKind::Jsr => {
                let target = (pc as i64 + op.signed_offset() as i64) as usize;
                walk(ops, target, value, out)?;
                pc += 1;
            }
            OpKind::Adr => {
                pc = key_adr(ops, pc + 1, op, value, out)?;
            }
            OpKind::Dlc | OpKind::XcdrDlh => {
                walk(ops, pc + 1, value, out)?;
                return Ok(());
            }
            OpKind::Plc | OpKind::Plm | OpKind::Jeq | OpKind::Kof => {
                return Err(Error::SerializationFailed(format!(
                    "{:?} encountered outside its expected context",
                    op.kind()
                )))
            }
        }
    }
}

fn key_adr(ops: &[u32], pc: usize, op: Op, scope: &Value, out: &mut Vec<u8>) -> Result<usize> {
    // Composite subtypes still need their operand words consumed to find
    // the correct next opcode, even when this particular field isn't a key.
    match op.subtype() {
        Subtype::By1 | Subtype::By2 | Subtype::By4 | Subtype::By8 | Subtype::Enu => {
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                write_key_primitive(out, op.subtype(), op.flags(), field)?;
            }
            Ok(pc)
        }
        Subtype::Str => {
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                let s = field
                    .as_str()
                    .ok_or_else(|| Error::SerializationFailed("expected string key field".into()))?;
                write_key_string(out, s, None)?;
            }
            Ok(pc)
        }
        Subtype::Bst => {
            let bound = ops[pc];
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                let s = field
                    .as_str()
                    .ok_or_else(|| Error::SerializationFailed("expected string key field".into()))?;
                write_key_string(out, s, Some(bound))?;
            }
            Ok(pc + 1)
        }
        Subtype::Seq => {
            let target = ops[pc] as usize;
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                let items = field
                    .as_seq()
                    .ok_or_else(|| Error::SerializationFailed("expected sequence key field".into()))?;
                for item in items {
                    walk(ops, target, item, out)?;
                }
            }
            Ok(pc + 1)
        }
        Subtype::Arr => {
            let declared_len = ops[pc] as usize;
            let target = ops[pc + 1] as usize;
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                let items = field
                    .as_seq()
                    .ok_or_else(|| Error::SerializationFailed("expected array field".into()))?;
                for item in items.iter().take(declared_len) {
                    walk(ops, target, item, out)?;
                }
            }
            Ok(pc + 2)
        }
        Subtype::Uni => {
            let case_list = ops[pc] as usize;
            if op.flags().contains(OpFlags::KEY) {
                let field = scope
                    .field(op.offset())
                    .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
                let (discriminant, nested) = match field {
                    Value::Union { discriminant, value } => (*discriminant, value.as_ref()),
                    other => {
                        return Err(Error::SerializationFailed(format!(
                            "expected union key field, got {other:?}"
                        )))
                    }
                };
                align(out, 4);
                out.extend_from_slice(&discriminant.to_be_bytes());
                let target = find_union_case_target(ops, case_list, discriminant)?;
                walk(ops, target, nested, out)?;
            }
            Ok(pc + 1)
        }
        Subtype::Stu | Subtype::Ext => {
            let target = ops[pc] as usize;
            let field = scope
                .field(op.offset())
                .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;
            walk(ops, target, field, out)?;
            Ok(pc + 1)
        }
    }
}

/// Compute the 16-byte keyhash for `value`. If `fixed_key` (the sertype's
/// `FIXED_KEY` flag), the extracted key is zero-padded to 16 bytes and used
/// directly; otherwise it is MD5-hashed.
///
/// # Errors
///
/// See [`extract_key`].
pub fn keyhash(ops: &[u32], value: &Value, fixed_key: bool) -> Result<[u8; 16]> {
    let key = extract_key(ops, value)?;
    if fixed_key {
        if key.len() > 16 {
            return Err(Error::SerializationFailed(format!(
                "FIXED_KEY type produced a {}-byte key, expected <= 16",
                key.len()
            )));
        }
        let mut hash = [0u8; 16];
        hash[..key.len()].copy_from_slice(&key);
        Ok(hash)
    } else {
        Ok(md5_hash(&key))
    }
}

#[cfg(feature = "xtypes")]
fn md5_hash(data: &[u8]) -> [u8; 16] {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result[..16]);
    out
}

#[cfg(not(feature = "xtypes"))]
fn md5_hash(data: &[u8]) -> [u8; 16] {
    // Deterministic fallback when the `xtypes`/`md-5` dependency is
    // compiled out: not a real MD5, just a stable 16-byte digest.
    let mut out = [0u8; 16];
    for (i, byte) in data.iter().enumerate() {
        out[i % 16] ^= byte.rotate_left((i % 8) as u32);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::opcode::{Op, OpFlags, OpKind, Subtype};

    fn keyed_struct_program() -> Vec<u32> {
        vec![
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN | OpFlags::KEY, 0).0,
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 1).0,
        ]
    }

    #[test]
    fn extract_key_skips_non_key_fields() {
        let ops = keyed_struct_program();
        let value = Value::Struct(vec![Value::I32(7), Value::I32(99)]);
        let key = extract_key(&ops, &value).unwrap();
        assert_eq!(key, 7i32.to_be_bytes());
    }

    #[test]
    fn fixed_key_hash_is_zero_padded_raw_key() {
        let ops = keyed_struct_program();
        let value = Value::Struct(vec![Value::I32(7), Value::I32(99)]);
        let hash = keyhash(&ops, &value, true).unwrap();
        assert_eq!(&hash[0..4], &7i32.to_be_bytes());
        assert_eq!(&hash[4..], &[0u8; 12]);
    }

    #[test]
    fn non_fixed_key_is_hashed_down_to_16_bytes() {
        let ops = keyed_struct_program();
        let value = Value::Struct(vec![Value::I32(7), Value::I32(99)]);
        let hash_a = keyhash(&ops, &value, false).unwrap();
        let other = Value::Struct(vec![Value::I32(8), Value::I32(99)]);
        let hash_b = keyhash(&ops, &other, false).unwrap();
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn keyhash_is_deterministic() {
        let ops = keyed_struct_program();
        let value = Value::Struct(vec![Value::I32(42), Value::I32(0)]);
        assert_eq!(
            keyhash(&ops, &value, false).unwrap(),
            keyhash(&ops, &value, false).unwrap()
        );
    }

    #[test]
    fn string_key_field_is_not_dropped() {
        let ops = vec![Op::new(OpKind::Adr, Subtype::Str, OpFlags::KEY, 0).0];
        let a = Value::Struct(vec![Value::Str("shape-1".into())]);
        let b = Value::Struct(vec![Value::Str("shape-2".into())]);
        let key_a = extract_key(&ops, &a).unwrap();
        let key_b = extract_key(&ops, &b).unwrap();
        assert_ne!(key_a, key_b, "a string KEY field must contribute its value to the extracted key");

        let mut expected = Vec::new();
        expected.extend_from_slice(&8u32.to_be_bytes());
        expected.extend_from_slice(b"shape-1");
        expected.push(0);
        assert_eq!(key_a, expected);
    }

    #[test]
    fn bounded_string_key_field_is_not_dropped() {
        let ops = vec![Op::new(OpKind::Adr, Subtype::Bst, OpFlags::KEY, 0).0, 16];
        let value = Value::Struct(vec![Value::Str("ok".into())]);
        let key = extract_key(&ops, &value).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&3u32.to_be_bytes());
        expected.extend_from_slice(b"ok");
        expected.push(0);
        assert_eq!(key, expected);
    }

    #[test]
    fn sequence_key_field_walks_every_element() {
        let ops = vec![
            /*0*/ Op::new(OpKind::Adr, Subtype::Seq, OpFlags::KEY, 0).0,
            /*1*/ 3,
            /*2*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*3*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
            /*4*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        ];
        let value = Value::Struct(vec![Value::Seq(vec![
            Value::Struct(vec![Value::I32(1)]),
            Value::Struct(vec![Value::I32(2)]),
            Value::Struct(vec![Value::I32(3)]),
        ])]);
        let key = extract_key(&ops, &value).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(&2i32.to_be_bytes());
        expected.extend_from_slice(&3i32.to_be_bytes());
        assert_eq!(key, expected);
    }

    fn keyed_union_program() -> Vec<u32> {
        vec![
            /*0*/ Op::new(OpKind::Adr, Subtype::Uni, OpFlags::KEY, 0).0,
            /*1*/ 3,
            /*2*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*3*/ Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 6).0,
            /*4*/ 0,
            /*5*/ Op::new(OpKind::Jeq, Subtype::By4, OpFlags::DEF, 8).0,
            /*6*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
            /*7*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*8*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
            /*9*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        ]
    }

    #[test]
    fn union_key_field_includes_discriminant_and_matched_case() {
        let ops = keyed_union_program();
        let value = Value::Struct(vec![Value::Union {
            discriminant: 0,
            value: Box::new(Value::Struct(vec![Value::I32(42)])),
        }]);
        let key = extract_key(&ops, &value).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&0i32.to_be_bytes());
        expected.extend_from_slice(&42i32.to_be_bytes());
        assert_eq!(key, expected);
    }

    #[test]
    fn union_key_field_falls_back_to_default_case() {
        let ops = keyed_union_program();
        let value = Value::Struct(vec![Value::Union {
            discriminant: 99,
            value: Box::new(Value::Struct(vec![Value::I32(7)])),
        }]);
        let key = extract_key(&ops, &value).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&99i32.to_be_bytes());
        expected.extend_from_slice(&7i32.to_be_bytes());
        assert_eq!(key, expected);
    }
}
