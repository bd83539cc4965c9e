//! Instruction set, file container, decoder and assembler.

pub mod builder;
pub mod decoder;
pub mod image;
pub mod opcode;

pub use builder::{CodeBuilder, Label};
pub use decoder::Decoder;
pub use image::{BytecodeImage, PublicSymbol};
pub use opcode::{BinOp, Builtin, Instruction, Loc, LocKind, PattKind};
