//! Execution engine.
//!
//! [`Vm`] owns the loaded image, the heap and the [`EngineState`]: the
//! instruction pointer, the frame registers and both stacks. `run` drives the
//! dispatch loop until the program stops, returns from its entry frame or
//! hits a fault.

mod data;
mod exec;
mod frame;
mod stack;

use anyhow::Result;

use crate::bytecode::BytecodeImage;
use crate::config::VmConfig;
use crate::rt::{Heap, primitives};
use crate::value::{EMPTY_BOX, Value};

pub use stack::{CallStack, OperandStack};

/// Registers and stacks of the engine.
pub struct EngineState {
    pub(crate) ip: usize,
    pub(crate) fp: usize,
    pub(crate) n_args: usize,
    pub(crate) n_locals: usize,
    /// Flavour of the call being set up: set by CALL/CALLC, saved by BEGIN.
    pub(crate) is_closure: bool,
    pub(crate) line: Option<i32>,
    pub(crate) stack: OperandStack,
    pub(crate) calls: CallStack,
}

impl EngineState {
    fn new(config: &VmConfig, globals: usize) -> Result<Self> {
        let stack = OperandStack::new(config.operand_stack_words, globals)?;
        Ok(Self {
            ip: 0,
            fp: stack.sp(),
            n_args: 0,
            n_locals: 0,
            is_closure: false,
            line: None,
            stack,
            calls: CallStack::new(config.call_stack_words),
        })
    }

    #[inline]
    pub fn ip(&self) -> usize {
        self.ip
    }

    #[inline]
    pub fn fp(&self) -> usize {
        self.fp
    }

    #[inline]
    pub fn n_args(&self) -> usize {
        self.n_args
    }

    #[inline]
    pub fn n_locals(&self) -> usize {
        self.n_locals
    }

    /// Last `LINE` marker executed.
    #[inline]
    pub fn line(&self) -> Option<i32> {
        self.line
    }

    #[inline]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.calls.depth()
    }
}

pub struct Vm {
    image: BytecodeImage,
    state: EngineState,
    heap: Heap,
    steps: u64,
}

impl Vm {
    pub fn new(image: BytecodeImage, config: &VmConfig) -> Result<Self> {
        config.validate()?;
        let mut state = EngineState::new(config, image.global_area_size())?;
        // Arguments of the entry function, as if its caller pushed them.
        for _ in 0..config.entry_args {
            state.stack.push(EMPTY_BOX)?;
        }
        state.fp = state.stack.sp();
        let heap = Heap::new(config.gc_threshold).with_stress(config.gc_stress);
        Ok(Self {
            image,
            state,
            heap,
            steps: 0,
        })
    }

    #[inline]
    pub fn image(&self) -> &BytecodeImage {
        &self.image
    }

    #[inline]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Instructions executed so far.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Printable form of a value produced by this VM.
    pub fn stringify(&self, value: Value) -> Result<String> {
        primitives::stringify(&self.heap, value)
    }

    /// Force a collection over the current roots.
    pub fn collect_garbage(&mut self) {
        self.heap.collect(&self.state.stack);
    }
}
