//! The two bounded stacks of the engine.
//!
//! Both grow toward lower indices. The operand stack shares its memory block
//! with the global area, which sits at the top of the block right above the
//! stack's initial position.

use anyhow::{Result, ensure};

use crate::fault::{Fault, fault};
use crate::rt::Trace;
use crate::value::{EMPTY_BOX, ObjRef, Value};

pub struct OperandStack {
    mem: Vec<Value>,
    /// Next free slot; the live region is `sp + 1 .. globals_base`.
    sp: usize,
    globals_base: usize,
}

impl OperandStack {
    /// Block of `words` slots with the top `globals` of them reserved for
    /// the global area. Slot 0 is a guard and is never written.
    pub fn new(words: usize, globals: usize) -> Result<Self> {
        ensure!(
            words >= globals + 2,
            "operand stack of {words} words cannot hold {globals} globals and the guard slot"
        );
        let globals_base = words - globals;
        Ok(Self {
            mem: vec![EMPTY_BOX; words],
            sp: globals_base - 1,
            globals_base,
        })
    }

    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of live operands.
    #[inline]
    pub fn depth(&self) -> usize {
        self.globals_base - 1 - self.sp
    }

    #[inline]
    pub fn global_count(&self) -> usize {
        self.mem.len() - self.globals_base
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.sp == 0 {
            return fault!(Fault::OperandStackOverflow);
        }
        self.mem[self.sp] = value;
        self.sp -= 1;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        if self.sp + 1 >= self.globals_base {
            return fault!(Fault::OperandStackUnderflow);
        }
        self.sp += 1;
        Ok(self.mem[self.sp])
    }

    /// Operand `depth` slots below the top without popping it.
    pub fn peek(&self, depth: usize) -> Result<Value> {
        let idx = self.sp + 1 + depth;
        if idx >= self.globals_base {
            return fault!(Fault::OperandStackUnderflow);
        }
        Ok(self.mem[idx])
    }

    /// Pop `n` operands, returned in the order they were pushed.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if n > self.depth() {
            return fault!(Fault::OperandStackUnderflow);
        }
        let start = self.sp + 1;
        let mut values = self.mem[start..start + n].to_vec();
        values.reverse();
        self.sp += n;
        Ok(values)
    }

    /// Discard `n` operands.
    pub fn discard(&mut self, n: usize) -> Result<()> {
        if n > self.depth() {
            return fault!(Fault::OperandStackUnderflow);
        }
        self.sp += n;
        Ok(())
    }

    /// Index of global `index` in the block.
    pub fn global_slot(&self, index: usize) -> Option<usize> {
        (index < self.global_count()).then(|| self.globals_base + index)
    }

    /// Read a live stack slot or a global.
    pub fn slot(&self, idx: usize) -> Result<Value> {
        self.check_slot(idx)?;
        Ok(self.mem[idx])
    }

    pub fn set_slot(&mut self, idx: usize, value: Value) -> Result<()> {
        self.check_slot(idx)?;
        self.mem[idx] = value;
        Ok(())
    }

    fn check_slot(&self, idx: usize) -> Result<()> {
        if idx <= self.sp || idx >= self.mem.len() {
            return fault!(Fault::OperandStackUnderflow);
        }
        Ok(())
    }

    /// Live operands (top first) followed by the globals.
    pub fn live(&self) -> &[Value] {
        &self.mem[self.sp + 1..]
    }

    pub fn globals(&self) -> &[Value] {
        &self.mem[self.globals_base..]
    }
}

impl Trace for OperandStack {
    fn trace(&self, visit: &mut dyn FnMut(ObjRef)) {
        self.live().trace(visit);
    }
}

/// Return addresses and saved frame records.
pub struct CallStack {
    words: Vec<usize>,
    /// Index of the top word; `words.len()` when empty.
    top: usize,
}

impl CallStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity],
            top: capacity,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top == self.words.len()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.words.len() - self.top
    }

    #[inline]
    pub fn push(&mut self, word: usize) -> Result<()> {
        if self.top == 0 {
            return fault!(Fault::CallStackOverflow);
        }
        self.top -= 1;
        self.words[self.top] = word;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<usize> {
        if self.is_empty() {
            return fault!(Fault::CallStackUnderflow);
        }
        let word = self.words[self.top];
        self.top += 1;
        Ok(word)
    }
}
