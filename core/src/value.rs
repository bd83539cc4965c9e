//! Tagged words stored in stack slots and heap fields.
//!
//! A slot holds either a boxed scalar, a reference to a heap object, or a raw
//! address produced by `LDA`. Boxed scalars carry a signed 32-bit payload; the
//! machine-word encoding `(n << 1) | 1` is kept for display and interop.

use std::fmt;

/// Stable handle to a heap object. The collector may move the object body but
/// never changes the handle while the object is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Target of an `LDA` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Slot in the memory block shared by the operand stack and the globals.
    Slot(usize),
    /// Field `index` of a heap object's contents.
    Field(ObjRef, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Ref(ObjRef),
    Addr(Location),
}

pub const EMPTY_BOX: Value = Value::Int(0);

#[inline]
pub const fn box_int(n: i32) -> Value {
    Value::Int(n)
}

#[inline]
pub const fn box_bool(b: bool) -> Value {
    Value::Int(b as i32)
}

impl Value {
    /// `true` for boxed scalars, i.e. anything that is not a pointer.
    #[inline]
    pub fn is_boxed(self) -> bool {
        matches!(self, Value::Int(_))
    }

    #[inline]
    pub fn as_int(self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_obj(self) -> Option<ObjRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Heap object kept alive by this value, if any. Addresses into heap fields
    /// keep their owning object alive as well.
    #[inline]
    pub fn heap_ref(self) -> Option<ObjRef> {
        match self {
            Value::Ref(r) | Value::Addr(Location::Field(r, _)) => Some(r),
            _ => None,
        }
    }

    /// Machine-word encoding of a boxed scalar.
    #[inline]
    pub fn word(self) -> Option<i32> {
        self.as_int().map(|n| n.wrapping_shl(1) | 1)
    }

    /// Decode a machine word produced by [`Value::word`]. Even words are not
    /// scalars and yield `None`.
    #[inline]
    pub fn from_word(word: i32) -> Option<Value> {
        if word & 1 == 1 { Some(Value::Int(word >> 1)) } else { None }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Ref(_) => "Ref",
            Value::Addr(_) => "Addr",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Ref(r) => write!(f, "<ref #{}>", r.0),
            Value::Addr(Location::Slot(slot)) => write!(f, "<addr slot {slot}>"),
            Value::Addr(Location::Field(r, idx)) => write!(f, "<addr #{}[{idx}]>", r.0),
        }
    }
}
