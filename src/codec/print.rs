// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Total (never-panicking) textual rendering of a decoded [`Value`], for log
//! lines and trace output. Shape mismatches against the program render
//! inline as `<?>` rather than aborting the walk — a malformed or partially
//! decoded sample should still produce *something* readable.

use std::fmt::Write as _;

use super::opcode::{Op, OpFlags, OpKind, Subtype};
use super::value::Value;

/// Render `value` as a single-line, human-readable string following the
/// field structure described by `ops`.
#[must_use]
pub fn format_sample(ops: &[u32], value: &Value) -> String {
    let mut out = String::new();
    walk(ops, 0, value, &mut out);
    out
}

fn walk(ops: &[u32], mut pc: usize, value: &Value, out: &mut String) {
    out.push('{');
    let mut first = true;
    loop {
        if pc >= ops.len() {
            break;
        }
        let op = Op(ops[pc]);
        match op.kind() {
            OpKind::Rts => break,
            OpKind::Jsr => {
                let target = (pc as i64 + op.signed_offset() as i64) as usize;
                walk(ops, target, value, out);
                pc += 1;
            }
            OpKind::Adr => {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                pc = print_adr(ops, pc + 1, op, value, out);
            }
            OpKind::Dlc | OpKind::XcdrDlh => {
                walk(ops, pc + 1, value, out);
                break;
            }
            OpKind::Plc | OpKind::Plm | OpKind::Jeq | OpKind::Kof => {
                let _ = write!(out, "<unsupported {:?}>", op.kind());
                break;
            }
        }
    }
    out.push('}');
}

fn print_adr(ops: &[u32], pc: usize, op: Op, scope: &Value, out: &mut String) -> usize {
    let Some(field) = scope.field(op.offset()) else {
        out.push_str("<?>");
        return match op.subtype() {
            Subtype::By1 | Subtype::By2 | Subtype::By4 | Subtype::By8 | Subtype::Enu | Subtype::Str => pc,
            Subtype::Bst | Subtype::Seq | Subtype::Uni | Subtype::Stu | Subtype::Ext => pc + 1,
            Subtype::Arr => pc + 2,
        };
    };

    match op.subtype() {
        Subtype::By1 | Subtype::By2 | Subtype::By4 | Subtype::By8 | Subtype::Enu => {
            print_scalar(field, out);
            pc
        }
        Subtype::Str => {
            print_scalar(field, out);
            pc
        }
        Subtype::Bst => {
            print_scalar(field, out);
            pc + 1
        }
        Subtype::Seq => {
            let target = ops[pc] as usize;
            print_seq(ops, target, field, out);
            pc + 1
        }
        Subtype::Arr => {
            let target = ops[pc + 1] as usize;
            print_seq(ops, target, field, out);
            pc + 2
        }
        Subtype::Uni => {
            match field {
                Value::Union { discriminant, value } => {
                    let _ = write!(out, "<{discriminant}: ");
                    print_scalar(value, out);
                    out.push('>');
                }
                other => print_scalar(other, out),
            }
            pc + 1
        }
        Subtype::Stu | Subtype::Ext => {
            let target = ops[pc] as usize;
            walk(ops, target, field, out);
            pc + 1
        }
    }
}

fn print_seq(ops: &[u32], target: usize, field: &Value, out: &mut String) {
    out.push('[');
    if let Some(items) = field.as_seq() {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            walk(ops, target, item, out);
        }
    } else {
        out.push_str("<?>");
    }
    out.push(']');
}

fn print_scalar(value: &Value, out: &mut String) {
    match value {
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::I8(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U8(v) => {
            let _ = write!(out, "{v}");
        }
        Value::I16(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U16(v) => {
            let _ = write!(out, "{v}");
        }
        Value::I32(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U32(v) => {
            let _ = write!(out, "{v}");
        }
        Value::I64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::F32(v) => {
            let _ = write!(out, "{v}");
        }
        Value::F64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Enum(v) => {
            let _ = write!(out, "#{v}");
        }
        Value::Str(s) => {
            let _ = write!(out, "{s:?}");
        }
        _ => out.push_str("<?>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::opcode::{Op, OpFlags, OpKind, Subtype};

    #[test]
    fn format_sample_renders_scalar_struct() {
        let ops = vec![
            Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0,
            Op::new(OpKind::Adr, Subtype::Str, OpFlags::NONE, 1).0,
        ];
        let value = Value::Struct(vec![Value::I32(7), Value::Str("hi".into())]);
        assert_eq!(format_sample(&ops, &value), "{7, \"hi\"}");
    }

    #[test]
    fn format_sample_renders_sequences() {
        let inner = vec![Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0, Op::new(OpKind::Rts, Subtype::By1, OpFlags::NONE, 0).0];
        let mut ops = vec![Op::new(OpKind::Adr, Subtype::Seq, OpFlags::NONE, 0).0, 2u32];
        ops.extend(inner);
        let value = Value::Struct(vec![Value::Seq(vec![Value::I32(1), Value::I32(2)])]);
        assert_eq!(format_sample(&ops, &value), "{[1, 2]}");
    }

    #[test]
    fn format_sample_never_panics_on_missing_field() {
        let ops = vec![Op::new(OpKind::Adr, Subtype::By4, OpFlags::SGN, 0).0];
        let value = Value::Struct(vec![]);
        assert_eq!(format_sample(&ops, &value), "{<?>}");
    }
}
