pub mod analysis;
pub mod bytecode;
pub mod config;
pub mod fault;
pub mod rt;
pub mod util;
pub mod value;

// Stack-machine execution engine
pub mod vm;

pub use bytecode::{BytecodeImage, CodeBuilder};
pub use config::VmConfig;
pub use fault::Fault;
pub use value::Value;
pub use vm::Vm;
