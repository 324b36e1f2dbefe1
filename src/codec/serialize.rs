// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample -> CDR payload. Walks the opcode program against a [`Value`]
//! tree, writing into an output buffer with the endianness carried by the
//! representation identifier the caller is encoding under.

use super::opcode::{Op, OpFlags, OpKind, Subtype};
use super::value::Value;
use crate::error::{Error, Result};

fn align(out: &mut Vec<u8>, n: usize) {
    while out.len() % n != 0 {
        out.push(0);
    }
}

fn write_primitive(out: &mut Vec<u8>, subtype: Subtype, flags: OpFlags, value: &Value, le: bool) -> Result<()> {
    match subtype {
        Subtype::By1 => {
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 1-byte field".into()))?;
            out.push(v as u8);
        }
        Subtype::By2 => {
            align(out, 2);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 2-byte field".into()))? as u16;
            out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
        }
        Subtype::By4 if flags.contains(OpFlags::FP) => {
            align(out, 4);
            let v = match value {
                Value::F32(f) => *f,
                other => {
                    return Err(Error::SerializationFailed(format!(
                        "expected f32 field, got {other:?}"
                    )))
                }
            };
            let bits = v.to_bits();
            out.extend_from_slice(&if le { bits.to_le_bytes() } else { bits.to_be_bytes() });
        }
        Subtype::By4 | Subtype::Enu => {
            align(out, 4);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 4-byte field".into()))? as u32;
            out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
        }
        Subtype::By8 if flags.contains(OpFlags::FP) => {
            align(out, 8);
            let v = match value {
                Value::F64(f) => *f,
                other => {
                    return Err(Error::SerializationFailed(format!(
                        "expected f64 field, got {other:?}"
                    )))
                }
            };
            let bits = v.to_bits();
            out.extend_from_slice(&if le { bits.to_le_bytes() } else { bits.to_be_bytes() });
        }
        Subtype::By8 => {
            align(out, 8);
            let v = value
                .as_i64()
                .ok_or_else(|| Error::SerializationFailed("expected 8-byte field".into()))? as u64;
            out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
        }
        other => {
            return Err(Error::SerializationFailed(format!(
                "{other:?} is not a primitive subtype"
            )))
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str, bound: Option<u32>, le: bool) -> Result<()> {
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
    out.extend_from_slice(&if le { len.to_le_bytes() } else { len.to_be_bytes() });
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

/// Serialize `value` through `ops`, starting at opcode index 0, appending
/// to `out`. `le` selects the wire endianness (true for the `*_LE`
/// representation identifiers).
///
/// # Errors
///
/// Returns [`Error::SerializationFailed`] if `value`'s shape doesn't match
/// what the program expects (wrong [`Value`] variant, bound violation,
/// unmatched union discriminant).
pub fn serialize(ops: &[u32], value: &Value, le: bool, out: &mut Vec<u8>) -> Result<()> {
    run_subprogram(ops, 0, value, le, out)
}

fn run_subprogram(ops: &[u32], mut pc: usize, value: &Value, le: bool, out: &mut Vec<u8>) -> Result<()> {
    loop {
        if pc >= ops.len() {
            return Ok(());
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => return Ok(()),
            OpKind::Jsr => {
                let target = (pc as i64 + op.signed_offset() as i64) as usize;
                run_subprogram(ops, target, value, le, out)?;
                pc += 1;
            }
            OpKind::Adr => {
                pc = serialize_adr(ops, pc + 1, op, value, le, out)?;
            }
            OpKind::Dlc | OpKind::XcdrDlh => {
                // Appendable container: reserve the DHEADER, recurse over the
                // rest of this subprogram, then patch in the byte length.
                align(out, 4);
                let dheader_at = out.len();
                out.extend_from_slice(&[0u8; 4]);
                let body_start = out.len();
                run_subprogram(ops, pc + 1, value, le, out)?;
                let len = (out.len() - body_start) as u32;
                let bytes = if le { len.to_le_bytes() } else { len.to_be_bytes() };
                out[dheader_at..dheader_at + 4].copy_from_slice(&bytes);
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

fn serialize_adr(
    ops: &[u32],
    pc: usize,
    op: Op,
    scope: &Value,
    le: bool,
    out: &mut Vec<u8>,
) -> Result<usize> {
    let field = scope
        .field(op.offset())
        .ok_or_else(|| Error::SerializationFailed(format!("missing field {}", op.offset())))?;

    match op.subtype() {
        Subtype::By1 | Subtype::By2 | Subtype::By4 | Subtype::By8 | Subtype::Enu => {
            write_primitive(out, op.subtype(), op.flags(), field, le)?;
            Ok(pc)
        }
        Subtype::Str => {
            let s = field
                .as_str()
                .ok_or_else(|| Error::SerializationFailed("expected string field".into()))?;
            write_string(out, s, None, le)?;
            Ok(pc)
        }
        Subtype::Bst => {
            let bound = ops[pc];
            let s = field
                .as_str()
                .ok_or_else(|| Error::SerializationFailed("expected string field".into()))?;
            write_string(out, s, Some(bound), le)?;
            Ok(pc + 1)
        }
        Subtype::Seq => {
            let target = ops[pc] as usize;
            let items = field
                .as_seq()
                .ok_or_else(|| Error::SerializationFailed("expected sequence field".into()))?;
            align(out, 4);
            let count = items.len() as u32;
            out.extend_from_slice(&if le { count.to_le_bytes() } else { count.to_be_bytes() });
            for item in items {
                run_subprogram(ops, target, item, le, out)?;
            }
            Ok(pc + 1)
        }
        Subtype::Arr => {
            let declared_len = ops[pc] as usize;
            let target = ops[pc + 1] as usize;
            let items = field
                .as_seq()
                .ok_or_else(|| Error::SerializationFailed("expected array field".into()))?;
            if items.len() != declared_len {
                return Err(Error::SerializationFailed(format!(
                    "array field has {} elements, expected {declared_len}",
                    items.len()
                )));
            }
            for item in items {
                run_subprogram(ops, target, item, le, out)?;
            }
            Ok(pc + 2)
        }
        Subtype::Uni => {
            let case_list = ops[pc] as usize;
            let (discriminant, nested) = match field {
                Value::Union { discriminant, value } => (*discriminant, value.as_ref()),
                other => {
                    return Err(Error::SerializationFailed(format!(
                        "expected union field, got {other:?}"
                    )))
                }
            };
            align(out, 4);
            out.extend_from_slice(&if le {
                discriminant.to_le_bytes()
            } else {
                discriminant.to_be_bytes()
            });
            dispatch_union_write(ops, case_list, discriminant, nested, le, out)?;
            Ok(pc + 1)
        }
        Subtype::Stu | Subtype::Ext => {
            let target = ops[pc] as usize;
            run_subprogram(ops, target, field, le, out)?;
            Ok(pc + 1)
        }
    }
}

fn dispatch_union_write(
    ops: &[u32],
    mut pc: usize,
    discriminant: i32,
    value: &Value,
    le: bool,
    out: &mut Vec<u8>,
) -> Result<()> {
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
                    return run_subprogram(ops, op.offset() as usize, value, le, out);
                }
                let constant = ops[pc] as i32;
                pc += 1;
                if constant == discriminant {
                    return run_subprogram(ops, op.offset() as usize, value, le, out);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::deserialize::deserialize;

    fn flat_struct_program() -> Vec<u32> {
        vec![
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0, // a: u32
            Op::new(OpKind::Adr, Subtype::Str, OpFlags::NONE, 1).0, // b: string
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 2).0,  // c: i32
        ]
    }

    #[test]
    fn flat_struct_round_trips() {
        let ops = flat_struct_program();
        let value = Value::Struct(vec![Value::U32(7), Value::Str("hi".into()), Value::I32(-3)]);
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn bounded_string_rejects_overlong_value() {
        let ops = vec![Op::new(OpKind::Adr, Subtype::Bst, OpFlags::NONE, 0).0, 4];
        let value = Value::Struct(vec![Value::Str("toolong".into())]);
        let mut bytes = Vec::new();
        let err = serialize(&ops, &value, true, &mut bytes).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }

    #[test]
    fn array_length_mismatch_is_rejected() {
        let ops = vec![
            Op::new(OpKind::Adr, Subtype::Arr, OpFlags::NONE, 0).0,
            3, // declared length
            2, // element sub-program target (unused: error fires first)
            Op::new(OpKind::Adr, Subtype::By1, OpFlags::NONE, 0).0,
        ];
        let value = Value::Struct(vec![Value::Arr(vec![Value::U8(1), Value::U8(2)])]);
        let mut bytes = Vec::new();
        let err = serialize(&ops, &value, true, &mut bytes).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }

    #[test]
    fn recursive_type_round_trips_through_several_levels() {
        // struct Msg { u32 a; sequence<Msg> children; i32 b; } — the
        // sequence element sub-program jumps back to index 0, the same
        // four words serving every nesting depth.
        let ops = vec![
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0, // a
            Op::new(OpKind::Adr, Subtype::Seq, OpFlags::NONE, 1).0, // children
            0,                                                      // target: recurse to index 0
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 2).0,  // b
        ];

        fn leaf(a: u32, b: i32) -> Value {
            Value::Struct(vec![Value::U32(a), Value::Seq(vec![]), Value::I32(b)])
        }

        let value = Value::Struct(vec![
            Value::U32(1),
            Value::Seq(vec![
                Value::Struct(vec![
                    Value::U32(2),
                    Value::Seq(vec![leaf(4, 40)]),
                    Value::I32(20),
                ]),
                leaf(3, 30),
            ]),
            Value::I32(10),
        ]);

        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    /// `union U switch(long) { case 0: long x; case 1: Inner y; case 2:
    /// default: sequence<octet> z; }` nested inside a one-field struct, with
    /// `Inner { unsigned long p, q; }`.
    fn nested_union_program() -> Vec<u32> {
        vec![
            /*0*/ Op::new(OpKind::Adr, Subtype::Uni, OpFlags::NONE, 0).0,
            /*1*/ 3, // case-list target
            /*2*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*3*/ Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 9).0,
            /*4*/ 0, // case 0
            /*5*/ Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 11).0,
            /*6*/ 1, // case 1
            /*7*/ Op::new(OpKind::Jeq, Subtype::By4, OpFlags::DEF, 17).0,
            /*8*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*9*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0, // case 0: x
            /*10*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*11*/ Op::new(OpKind::Adr, Subtype::Ext, OpFlags::NONE, 0).0, // case 1: y
            /*12*/ 14,
            /*13*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*14*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0, // Inner.p
            /*15*/ Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 1).0, // Inner.q
            /*16*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*17*/ Op::new(OpKind::Adr, Subtype::Seq, OpFlags::NONE, 0).0, // default: z
            /*18*/ 20,
            /*19*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            /*20*/ Op::new(OpKind::Adr, Subtype::By1, OpFlags::NONE, 0).0, // octet element
            /*21*/ Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        ]
    }

    #[test]
    fn union_case_zero_round_trips() {
        let ops = nested_union_program();
        let value = Value::Struct(vec![Value::Union {
            discriminant: 0,
            value: Box::new(Value::Struct(vec![Value::I32(42)])),
        }]);
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn union_case_one_nested_struct_round_trips() {
        let ops = nested_union_program();
        let value = Value::Struct(vec![Value::Union {
            discriminant: 1,
            value: Box::new(Value::Struct(vec![Value::Struct(vec![Value::U32(7), Value::U32(9)])])),
        }]);
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn union_default_case_round_trips_for_unlisted_discriminant() {
        let ops = nested_union_program();
        let value = Value::Struct(vec![Value::Union {
            discriminant: 99,
            value: Box::new(Value::Struct(vec![Value::Seq(vec![
                Value::Struct(vec![Value::U8(1)]),
                Value::Struct(vec![Value::U8(2)]),
                Value::Struct(vec![Value::U8(3)]),
            ])])),
        }]);
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn union_with_no_matching_case_and_no_default_is_rejected() {
        // Same shape as `nested_union_program` but without the DEF case.
        let ops = vec![
            Op::new(OpKind::Adr, Subtype::Uni, OpFlags::NONE, 0).0,
            3,
            Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            Op::new(OpKind::Jeq, Subtype::By4, OpFlags::NONE, 6).0,
            0,
            Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
            Op::new(OpKind::Rts, Subtype::By4, OpFlags::NONE, 0).0,
        ];
        let value = Value::Struct(vec![Value::Union {
            discriminant: 5,
            value: Box::new(Value::Struct(vec![Value::I32(1)])),
        }]);
        let mut bytes = Vec::new();
        let err = serialize(&ops, &value, true, &mut bytes).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }

    #[test]
    fn appendable_dheader_wraps_byte_length_of_body() {
        let ops = vec![
            Op::new(OpKind::Dlc, Subtype::By4, OpFlags::NONE, 0).0,
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::NONE, 0).0,
        ];
        let value = Value::Struct(vec![Value::U32(0x1122_3344)]);
        let mut bytes = Vec::new();
        serialize(&ops, &value, true, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 8);
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len, 4);
        let decoded = deserialize(&ops, &bytes, true).unwrap();
        assert_eq!(decoded, value);
    }
}
