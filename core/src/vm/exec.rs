//! The dispatch loop.

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::bytecode::decoder::{Decoder, check_target};
use crate::bytecode::{BinOp, Builtin, Instruction};
use crate::fault::{Fault, fault};
use crate::rt::Console;
use crate::rt::primitives::expect_int;
use crate::value::{EMPTY_BOX, Value, box_bool, box_int};

use super::Vm;

pub(super) enum Flow {
    Next,
    Halt(Value),
}

impl Vm {
    /// Execute from offset 0 until `STOP`, the entry frame's `END` or a
    /// fault. `STOP` yields the top operand, or boxed zero on an empty stack.
    pub fn run(&mut self, console: &mut dyn Console) -> Result<Value> {
        debug!(
            target: "smvm::vm",
            code = self.image.code().len(),
            globals = self.image.global_area_size(),
            "run.start"
        );
        loop {
            let at = self.state.ip;
            let flow = self.step(console).with_context(|| match self.state.line {
                Some(line) => format!("at offset 0x{at:08x} (line {line})"),
                None => format!("at offset 0x{at:08x}"),
            });
            match flow {
                Ok(Flow::Next) => {}
                Ok(Flow::Halt(value)) => {
                    let gc = self.heap.stats();
                    debug!(
                        target: "smvm::vm",
                        steps = self.steps,
                        collections = gc.collections,
                        allocated = gc.allocated,
                        freed = gc.freed,
                        "run.halt"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    debug!(target: "smvm::vm", steps = self.steps, error = %format!("{err:#}"), "run.fault");
                    return Err(err);
                }
            }
        }
    }

    pub(super) fn step(&mut self, console: &mut dyn Console) -> Result<Flow> {
        let mut cursor = Decoder::at(&self.image, self.state.ip);
        let insn = cursor.decode()?;
        self.state.ip = cursor.ip();
        self.steps += 1;
        trace!(target: "smvm::vm::dispatch", ip = self.state.ip, insn = %insn);

        match insn {
            Instruction::Binop(op) => {
                let rhs = self.state.stack.pop()?;
                let lhs = self.state.stack.pop()?;
                let result = binop(op, lhs, rhs)?;
                self.state.stack.push(result)?;
            }
            Instruction::Const(n) => self.state.stack.push(box_int(n))?,
            Instruction::String(s) => {
                let s = s.to_owned();
                self.push_string(&s)?;
            }
            Instruction::Sexp { tag, arity } => {
                let tag = tag.to_owned();
                self.build_sexp(&tag, arity)?;
            }
            Instruction::Sti => return fault!(Fault::Unsupported("STI")),
            Instruction::Sta => self.store_any()?,
            Instruction::Jmp(target) => self.state.ip = check_target(&self.image, target)?,
            Instruction::End => {
                if let Some(value) = self.end()? {
                    return Ok(Flow::Halt(value));
                }
            }
            Instruction::Ret => return fault!(Fault::Unsupported("RET")),
            Instruction::Drop => {
                self.state.stack.pop()?;
            }
            Instruction::Dup => {
                let top = self.state.stack.peek(0)?;
                self.state.stack.push(top)?;
            }
            Instruction::Swap => return fault!(Fault::Unsupported("SWAP")),
            Instruction::Elem => self.elem()?,
            Instruction::Ld(loc) => {
                let value = self.load(self.resolve(loc)?)?;
                self.state.stack.push(value)?;
            }
            Instruction::Lda(loc) => {
                let location = self.resolve(loc)?;
                self.state.stack.push(Value::Addr(location))?;
            }
            Instruction::St(loc) => {
                let value = self.state.stack.peek(0)?;
                let location = self.resolve(loc)?;
                self.store(location, value)?;
            }
            Instruction::CJmpZ(target) => self.branch(target, false)?,
            Instruction::CJmpNz(target) => self.branch(target, true)?,
            Instruction::Begin { args, locals } | Instruction::CBegin { args, locals } => self.begin(args, locals)?,
            Instruction::Closure { target, captures } => self.build_closure(target, &captures)?,
            Instruction::CallC { args } => self.call_closure(args)?,
            Instruction::Call { target, .. } => self.call(target)?,
            Instruction::Tag { tag, arity } => {
                let tag = tag.to_owned();
                self.check_tag(&tag, arity)?;
            }
            Instruction::Array(len) => self.check_array(len)?,
            Instruction::Fail { line, column } => return fault!(Fault::MatchFailure { line, column }),
            Instruction::Line(line) => self.state.line = Some(line),
            Instruction::Patt(kind) => self.pattern(kind)?,
            Instruction::Builtin(builtin) => self.builtin(builtin, console)?,
            Instruction::Stop => {
                let top = self.state.stack.peek(0).unwrap_or(EMPTY_BOX);
                return Ok(Flow::Halt(top));
            }
        }
        Ok(Flow::Next)
    }

    fn branch(&mut self, target: i32, when_nonzero: bool) -> Result<()> {
        let cond = expect_int(self.state.stack.pop()?)?;
        if (cond != 0) == when_nonzero {
            self.state.ip = check_target(&self.image, target)?;
        }
        Ok(())
    }

    fn builtin(&mut self, builtin: Builtin, console: &mut dyn Console) -> Result<()> {
        match builtin {
            Builtin::Read => {
                let n = console.read_int()?;
                self.state.stack.push(box_int(n))
            }
            Builtin::Write => {
                let n = expect_int(self.state.stack.pop()?)?;
                console.write_int(n)?;
                self.state.stack.push(EMPTY_BOX)
            }
            Builtin::Length => self.length(),
            Builtin::String => self.stringify_top(),
            Builtin::Array(n) => self.build_array(n),
        }
    }
}

/// Integer arithmetic with wrapping overflow. `==` and `!=` fall back to
/// identity when either side is not a scalar.
pub(crate) fn binop(op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinOp::Eq if !(lhs.is_boxed() && rhs.is_boxed()) => return Ok(box_bool(lhs == rhs)),
        BinOp::Ne if !(lhs.is_boxed() && rhs.is_boxed()) => return Ok(box_bool(lhs != rhs)),
        _ => {}
    }
    let a = expect_int(lhs)?;
    let b = expect_int(rhs)?;
    let result = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return fault!(Fault::DivisionByZero),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::Lt => (a < b) as i32,
        BinOp::Le => (a <= b) as i32,
        BinOp::Gt => (a > b) as i32,
        BinOp::Ge => (a >= b) as i32,
        BinOp::Eq => (a == b) as i32,
        BinOp::Ne => (a != b) as i32,
        BinOp::And => (a != 0 && b != 0) as i32,
        BinOp::Or => (a != 0 || b != 0) as i32,
    };
    Ok(box_int(result))
}
