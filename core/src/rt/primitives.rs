//! Primitive operations over tagged values and heap objects.

use anyhow::Result;

use crate::fault::{Fault, fault};
use crate::rt::heap::{Heap, HeapObject, ObjKind};
use crate::rt::tag::{de_hash, tag_hash};
use crate::value::{ObjRef, Value, box_bool, box_int};

const CONS_TAG: &str = "cons";

/// Heap kind of `value`, or `None` for scalars and addresses.
pub fn kind_of(heap: &Heap, value: Value) -> Result<Option<ObjKind>> {
    match value {
        Value::Ref(r) => Ok(Some(heap.get(r)?.kind())),
        _ => Ok(None),
    }
}

pub(crate) fn expect_object(heap: &Heap, value: Value) -> Result<&HeapObject> {
    match value {
        Value::Ref(r) => heap.get(r),
        other => fault!(Fault::TypeMismatch {
            expected: "heap object",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn expect_int(value: Value) -> Result<i32> {
    match value {
        Value::Int(n) => Ok(n),
        other => fault!(Fault::TypeMismatch {
            expected: "boxed scalar",
            found: other.type_name(),
        }),
    }
}

fn checked_index(index: i32, len: usize) -> Result<usize> {
    if index < 0 || index as usize >= len {
        return fault!(Fault::ElementOutOfRange { index, len });
    }
    Ok(index as usize)
}

pub fn length(heap: &Heap, value: Value) -> Result<Value> {
    let obj = expect_object(heap, value)?;
    Ok(box_int(obj.len() as i32))
}

/// Element `index` of a string, array, s-expression or closure. String
/// elements are returned as boxed byte values.
pub fn elem(heap: &Heap, aggregate: Value, index: Value) -> Result<Value> {
    let index = expect_int(index)?;
    let obj = expect_object(heap, aggregate)?;
    let idx = checked_index(index, obj.len())?;
    Ok(match obj.kind() {
        ObjKind::String => box_int(obj.bytes()[idx] as i32),
        _ => obj.fields()[idx],
    })
}

/// Indexed store into `aggregate`; returns the stored value.
pub fn store_indexed(heap: &mut Heap, value: Value, index: Value, aggregate: Value) -> Result<Value> {
    let index = expect_int(index)?;
    let Value::Ref(r) = aggregate else {
        return fault!(Fault::TypeMismatch {
            expected: "heap object",
            found: aggregate.type_name(),
        });
    };
    let obj = heap.get_mut(r)?;
    let idx = checked_index(index, obj.len())?;
    if obj.kind() == ObjKind::String {
        obj.bytes_mut()[idx] = expect_int(value)? as u8;
    } else {
        obj.fields_mut()[idx] = value;
    }
    Ok(value)
}

/// `=str` pattern: both operands are strings with equal contents.
pub fn string_patt(heap: &Heap, lhs: Value, rhs: Value) -> Result<Value> {
    let (Value::Ref(a), Value::Ref(b)) = (lhs, rhs) else {
        return Ok(box_bool(false));
    };
    let (a, b) = (heap.get(a)?, heap.get(b)?);
    let equal = a.kind() == ObjKind::String && b.kind() == ObjKind::String && a.bytes() == b.bytes();
    Ok(box_bool(equal))
}

/// Array-shape pattern: an array of exactly `len` elements.
pub fn array_patt(heap: &Heap, value: Value, len: i32) -> Result<Value> {
    let matches = match kind_of(heap, value)? {
        Some(ObjKind::Array) => expect_object(heap, value)?.len() == len as usize,
        _ => false,
    };
    Ok(box_bool(matches))
}

/// Variant test: an s-expression with the given hashed tag and field count.
pub fn tag_check(heap: &Heap, value: Value, tag: i32, arity: i32) -> Result<Value> {
    let matches = match kind_of(heap, value)? {
        Some(ObjKind::Sexp) => {
            let obj = expect_object(heap, value)?;
            obj.tag() == tag && obj.len() == arity as usize
        }
        _ => false,
    };
    Ok(box_bool(matches))
}

/// Printable representation of `value`, as produced by the `Lstring` builtin.
/// An aggregate reached again while it is still being printed renders as
/// `<cycle>`.
pub fn stringify(heap: &Heap, value: Value) -> Result<String> {
    let mut out = String::new();
    let mut path = Vec::new();
    write_value(heap, value, &mut path, &mut out)?;
    Ok(out)
}

const CYCLE_MARKER: &str = "<cycle>";

/// `path` holds the aggregates currently being printed, outermost first.
fn write_value(heap: &Heap, value: Value, path: &mut Vec<ObjRef>, out: &mut String) -> Result<()> {
    let r = match value {
        Value::Int(n) => {
            out.push_str(itoa::Buffer::new().format(n));
            return Ok(());
        }
        Value::Addr(_) => {
            out.push_str(&value.to_string());
            return Ok(());
        }
        Value::Ref(r) => r,
    };
    if path.contains(&r) {
        out.push_str(CYCLE_MARKER);
        return Ok(());
    }
    let obj = heap.get(r)?;
    let mark = path.len();
    path.push(r);
    match obj.kind() {
        ObjKind::String => {
            out.push('"');
            out.push_str(&String::from_utf8_lossy(obj.bytes()));
            out.push('"');
        }
        ObjKind::Array => {
            out.push('[');
            write_separated(heap, obj.fields(), path, out)?;
            out.push(']');
        }
        ObjKind::Closure => {
            let entry = obj.closure_entry().unwrap_or_default();
            out.push_str(&format!("<closure 0x{entry:08x}>"));
        }
        ObjKind::Sexp if obj.len() == 2 && obj.tag() == tag_hash(CONS_TAG)? => {
            out.push('{');
            write_list(heap, obj, path, out)?;
            out.push('}');
        }
        ObjKind::Sexp => {
            out.push_str(&de_hash(obj.tag()));
            if !obj.is_empty() {
                out.push_str(" (");
                write_separated(heap, obj.fields(), path, out)?;
                out.push(')');
            }
        }
    }
    path.truncate(mark);
    Ok(())
}

fn write_separated(heap: &Heap, values: &[Value], path: &mut Vec<ObjRef>, out: &mut String) -> Result<()> {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(heap, *value, path, out)?;
    }
    Ok(())
}

/// Walks a `cons` chain starting at `head` (already on `path`), printing heads
/// until the tail stops being a cons cell. Every cell walked stays on `path`
/// until the caller truncates it, so a tail pointing back into the chain ends
/// the walk with the cycle marker.
fn write_list(heap: &Heap, head: &HeapObject, path: &mut Vec<ObjRef>, out: &mut String) -> Result<()> {
    let cons = tag_hash(CONS_TAG)?;
    let mut obj = head;
    loop {
        write_value(heap, obj.fields()[0], path, out)?;
        let tail = obj.fields()[1];
        let r = match tail {
            Value::Ref(r) => r,
            _ => return Ok(()),
        };
        out.push_str(", ");
        if path.contains(&r) {
            out.push_str(CYCLE_MARKER);
            return Ok(());
        }
        let next = heap.get(r)?;
        if next.kind() != ObjKind::Sexp || next.tag() != cons || next.len() != 2 {
            return write_value(heap, tail, path, out);
        }
        path.push(r);
        obj = next;
    }
}
