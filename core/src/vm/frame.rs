//! Frame establishment, teardown and frame-relative addressing.
//!
//! Layout of a frame on the operand stack (indices grow upward, the stack
//! grows downward):
//!
//! ```text
//! fp + n_args + 1   closure reference (closure calls only)
//! fp + n_args       argument 0
//! ...
//! fp + 1            argument n_args - 1
//! fp                local 0
//! fp - 1            local 1
//! ```

use anyhow::Result;
use tracing::trace;

use crate::bytecode::decoder::check_target;
use crate::bytecode::{Loc, LocKind};
use crate::fault::{Fault, fault};
use crate::rt::ObjKind;
use crate::value::{EMPTY_BOX, Location, ObjRef, Value};

use super::Vm;

fn non_negative(index: i32) -> Result<usize> {
    if index < 0 {
        return fault!(Fault::NegativeIndex { index });
    }
    Ok(index as usize)
}

impl Vm {
    /// `CALL`: the return address is the current ip (just past the call).
    pub(super) fn call(&mut self, target: i32) -> Result<()> {
        let entry = check_target(&self.image, target)?;
        self.state.is_closure = false;
        self.state.calls.push(self.state.ip)?;
        self.state.ip = entry;
        Ok(())
    }

    /// `CALLC n`: the closure sits right below the `n` arguments.
    pub(super) fn call_closure(&mut self, args: i32) -> Result<()> {
        let args = non_negative(args)?;
        let closure = self.state.stack.peek(args)?;
        let entry = self.closure_entry(closure)?;
        let entry = check_target(&self.image, entry as i32)?;
        self.state.is_closure = true;
        self.state.calls.push(self.state.ip)?;
        self.state.ip = entry;
        Ok(())
    }

    fn closure_entry(&self, closure: Value) -> Result<u32> {
        let obj = self.expect_closure(closure)?;
        let entry = self.heap.get(obj)?.closure_entry();
        match entry {
            Some(entry) => Ok(entry),
            None => fault!(Fault::TypeMismatch {
                expected: "closure",
                found: "malformed closure",
            }),
        }
    }

    fn expect_closure(&self, value: Value) -> Result<ObjRef> {
        match value {
            Value::Ref(r) => {
                let kind = self.heap.get(r)?.kind();
                if kind != ObjKind::Closure {
                    return fault!(Fault::TypeMismatch {
                        expected: "closure",
                        found: kind.name(),
                    });
                }
                Ok(r)
            }
            other => fault!(Fault::TypeMismatch {
                expected: "closure",
                found: other.type_name(),
            }),
        }
    }

    /// `BEGIN` / `CBEGIN`: save the caller's frame registers and reserve
    /// `locals` boxed zeros.
    pub(super) fn begin(&mut self, args: i32, locals: i32) -> Result<()> {
        let args = non_negative(args)?;
        let locals = non_negative(locals)?;
        let state = &mut self.state;
        state.calls.push(state.fp)?;
        state.calls.push(state.n_args)?;
        state.calls.push(state.n_locals)?;
        state.calls.push(state.is_closure as usize)?;

        state.fp = state.stack.sp();
        state.n_args = args;
        state.n_locals = locals;
        for _ in 0..locals {
            state.stack.push(EMPTY_BOX)?;
        }
        trace!(
            target: "smvm::vm",
            ip = state.ip,
            fp = state.fp,
            args,
            locals,
            closure = state.is_closure,
            depth = state.calls.depth(),
            "frame.enter"
        );
        Ok(())
    }

    /// `END`: tear down the current frame and leave the return value on the
    /// stack. Returns the value when the program is finished.
    pub(super) fn end(&mut self) -> Result<Option<Value>> {
        let state = &mut self.state;
        let ret = state.stack.pop()?;
        if state.calls.is_empty() {
            return Ok(Some(ret));
        }
        state.stack.discard(state.n_args + state.n_locals)?;
        let closure_frame = state.calls.pop()? != 0;
        if closure_frame {
            state.stack.pop()?;
        }
        state.stack.push(ret)?;
        state.n_locals = state.calls.pop()?;
        state.n_args = state.calls.pop()?;
        state.fp = state.calls.pop()?;
        trace!(
            target: "smvm::vm",
            fp = state.fp,
            closure = closure_frame,
            depth = state.calls.depth(),
            "frame.exit"
        );
        if state.calls.is_empty() {
            return Ok(Some(ret));
        }
        state.ip = state.calls.pop()?;
        Ok(None)
    }

    /// Resolve a location operand against the current frame.
    pub(super) fn resolve(&self, loc: Loc) -> Result<Location> {
        let index = loc.index;
        let idx = non_negative(index)?;
        let state = &self.state;
        match loc.kind {
            LocKind::Global => match state.stack.global_slot(idx) {
                Some(slot) => Ok(Location::Slot(slot)),
                None => fault!(Fault::GlobalOutOfRange { index }),
            },
            LocKind::Local => {
                if idx >= state.n_locals {
                    return fault!(Fault::LocalOutOfRange {
                        index,
                        count: state.n_locals,
                    });
                }
                Ok(Location::Slot(state.fp - idx))
            }
            LocKind::Arg => {
                if idx >= state.n_args {
                    return fault!(Fault::ArgumentOutOfRange {
                        index,
                        count: state.n_args,
                    });
                }
                Ok(Location::Slot(state.fp + state.n_args - idx))
            }
            LocKind::Capture => {
                let closure = self.expect_closure(state.stack.slot(state.fp + state.n_args + 1)?)?;
                let len = self.heap.get(closure)?.len();
                if idx + 1 >= len {
                    return fault!(Fault::CaptureOutOfRange {
                        index,
                        count: len.saturating_sub(1),
                    });
                }
                Ok(Location::Field(closure, idx + 1))
            }
        }
    }

    pub(super) fn load(&self, location: Location) -> Result<Value> {
        match location {
            Location::Slot(slot) => self.state.stack.slot(slot),
            Location::Field(obj, idx) => {
                let fields = self.heap.get(obj)?.fields();
                match fields.get(idx) {
                    Some(value) => Ok(*value),
                    None => fault!(Fault::ElementOutOfRange {
                        index: idx as i32,
                        len: fields.len(),
                    }),
                }
            }
        }
    }

    pub(super) fn store(&mut self, location: Location, value: Value) -> Result<()> {
        match location {
            Location::Slot(slot) => self.state.stack.set_slot(slot, value),
            Location::Field(obj, idx) => {
                let fields = self.heap.get_mut(obj)?.fields_mut();
                let len = fields.len();
                match fields.get_mut(idx) {
                    Some(field) => {
                        *field = value;
                        Ok(())
                    }
                    None => fault!(Fault::ElementOutOfRange { index: idx as i32, len }),
                }
            }
        }
    }
}
