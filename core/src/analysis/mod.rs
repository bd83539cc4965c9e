//! Read-only views over a bytecode image: the file dump and the instruction
//! frequency report. Nothing here executes code.

pub mod disasm;
pub mod frequency;

pub use disasm::{disassemble, dump};
pub use frequency::{FrequencyEntry, FrequencyReport};
