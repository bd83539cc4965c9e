//! Heap-touching instructions: construction, indexed access, patterns and
//! the builtins that allocate.

use anyhow::Result;

use crate::bytecode::{Loc, PattKind};
use crate::fault::{Fault, fault};
use crate::rt::{ObjKind, primitives, tag_hash};
use crate::value::{Value, box_bool};

use super::Vm;

fn count(n: i32) -> Result<usize> {
    if n < 0 {
        return fault!(Fault::NegativeIndex { index: n });
    }
    Ok(n as usize)
}

impl Vm {
    /// `STRING s`: copy a pooled string into a fresh heap string.
    pub(super) fn push_string(&mut self, text: &str) -> Result<()> {
        let bytes = text.as_bytes().to_vec();
        let r = self.heap.alloc_string(bytes, &self.state.stack);
        self.state.stack.push(Value::Ref(r))
    }

    /// `Barray n`: the first pushed operand becomes element 0.
    pub(super) fn build_array(&mut self, n: i32) -> Result<()> {
        let elements = self.state.stack.pop_n(count(n)?)?;
        let mut scope = self.heap.root_scope();
        scope.root_all(&elements);
        let r = scope.alloc_array(elements, &self.state.stack);
        drop(scope);
        self.state.stack.push(Value::Ref(r))
    }

    /// `SEXP tag n`: the tag is applied after every field is in place.
    pub(super) fn build_sexp(&mut self, tag: &str, n: i32) -> Result<()> {
        let hash = tag_hash(tag)?;
        let fields = self.state.stack.pop_n(count(n)?)?;
        let mut scope = self.heap.root_scope();
        scope.root_all(&fields);
        let r = scope.alloc_sexp(fields, &self.state.stack);
        scope.get_mut(r)?.set_tag(hash);
        drop(scope);
        self.state.stack.push(Value::Ref(r))
    }

    /// `CLOSURE target n (kind idx)*`: captures are copied by value.
    pub(super) fn build_closure(&mut self, target: i32, captures: &[Loc]) -> Result<()> {
        let mut values = Vec::with_capacity(captures.len());
        for loc in captures {
            let location = self.resolve(*loc)?;
            values.push(self.load(location)?);
        }
        let mut scope = self.heap.root_scope();
        scope.root_all(&values);
        let r = scope.alloc_closure(target as u32, &values, &self.state.stack);
        drop(scope);
        self.state.stack.push(Value::Ref(r))
    }

    /// `STA`: store through an `LDA` address, or into `aggregate[index]`
    /// when the destination is a boxed index.
    pub(super) fn store_any(&mut self) -> Result<()> {
        let value = self.state.stack.pop()?;
        let dest = self.state.stack.pop()?;
        match dest {
            Value::Int(_) => {
                let aggregate = self.state.stack.pop()?;
                primitives::store_indexed(&mut self.heap, value, dest, aggregate)?;
            }
            Value::Addr(location) => self.store(location, value)?,
            Value::Ref(_) => {
                return fault!(Fault::TypeMismatch {
                    expected: "address or index",
                    found: dest.type_name(),
                });
            }
        }
        self.state.stack.push(value)
    }

    pub(super) fn elem(&mut self) -> Result<()> {
        let index = self.state.stack.pop()?;
        let aggregate = self.state.stack.pop()?;
        let value = primitives::elem(&self.heap, aggregate, index)?;
        self.state.stack.push(value)
    }

    pub(super) fn pattern(&mut self, kind: PattKind) -> Result<()> {
        let subject = self.state.stack.pop()?;
        let result = match kind {
            PattKind::Val => box_bool(subject.is_boxed()),
            PattKind::StrLiteral => {
                let other = self.state.stack.pop()?;
                primitives::string_patt(&self.heap, other, subject)?
            }
            PattKind::Ref => box_bool(!subject.is_boxed()),
            PattKind::String => self.kind_is(subject, ObjKind::String)?,
            PattKind::Array => self.kind_is(subject, ObjKind::Array)?,
            PattKind::Sexp => self.kind_is(subject, ObjKind::Sexp)?,
            PattKind::Closure => self.kind_is(subject, ObjKind::Closure)?,
        };
        self.state.stack.push(result)
    }

    fn kind_is(&self, subject: Value, kind: ObjKind) -> Result<Value> {
        Ok(box_bool(primitives::kind_of(&self.heap, subject)? == Some(kind)))
    }

    /// `TAG name n`.
    pub(super) fn check_tag(&mut self, tag: &str, arity: i32) -> Result<()> {
        let hash = tag_hash(tag)?;
        let subject = self.state.stack.pop()?;
        let result = primitives::tag_check(&self.heap, subject, hash, arity)?;
        self.state.stack.push(result)
    }

    /// `ARRAY n`.
    pub(super) fn check_array(&mut self, len: i32) -> Result<()> {
        let subject = self.state.stack.pop()?;
        let result = primitives::array_patt(&self.heap, subject, len)?;
        self.state.stack.push(result)
    }

    pub(super) fn length(&mut self) -> Result<()> {
        let subject = self.state.stack.pop()?;
        let len = primitives::length(&self.heap, subject)?;
        self.state.stack.push(len)
    }

    /// `Lstring`: render the operand into a new heap string.
    pub(super) fn stringify_top(&mut self) -> Result<()> {
        let subject = self.state.stack.pop()?;
        let text = primitives::stringify(&self.heap, subject)?;
        let r = self.heap.alloc_string(text, &self.state.stack);
        self.state.stack.push(Value::Ref(r))
    }
}
