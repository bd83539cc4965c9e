use std::fmt;

/// Fatal conditions raised while decoding or executing bytecode.
///
/// Every fault ends the run. They travel as `anyhow::Error` so callers can add
/// context, and can be recovered with `err.downcast_ref::<Fault>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    OperandStackOverflow,
    OperandStackUnderflow,
    CallStackOverflow,
    CallStackUnderflow,
    IpOutOfBounds { offset: i64 },
    InvalidOpcode { class: u8, op: u8 },
    Unsupported(&'static str),
    NegativeIndex { index: i32 },
    GlobalOutOfRange { index: i32 },
    LocalOutOfRange { index: i32, count: usize },
    ArgumentOutOfRange { index: i32, count: usize },
    CaptureOutOfRange { index: i32, count: usize },
    UnknownLocation(u8),
    UnknownOperator(u8),
    UnknownPattern(u8),
    StringIndexOutOfRange { offset: i32 },
    DivisionByZero,
    TypeMismatch { expected: &'static str, found: &'static str },
    ElementOutOfRange { index: i32, len: usize },
    MatchFailure { line: i32, column: u8 },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::OperandStackOverflow => write!(f, "operands stack overflow"),
            Fault::OperandStackUnderflow => write!(f, "try to access empty operands stack"),
            Fault::CallStackOverflow => write!(f, "call stack overflow"),
            Fault::CallStackUnderflow => write!(f, "try to access empty call stack"),
            Fault::IpOutOfBounds { offset } => {
                write!(f, "instruction pointer points out of bytecode area (offset {offset})")
            }
            Fault::InvalidOpcode { class, op } => write!(f, "invalid opcode {class}-{op}"),
            Fault::Unsupported(name) => write!(f, "bytecode {name} is unsupported"),
            Fault::NegativeIndex { index } => write!(f, "index less than zero ({index})"),
            Fault::GlobalOutOfRange { index } => write!(f, "out of memory (global {index})"),
            Fault::LocalOutOfRange { index, count } => {
                write!(f, "local {index} out of range ({count} locals)")
            }
            Fault::ArgumentOutOfRange { index, count } => {
                write!(f, "arguments overflow (argument {index} of {count})")
            }
            Fault::CaptureOutOfRange { index, count } => {
                write!(f, "closure capture {index} out of range ({count} captured)")
            }
            Fault::UnknownLocation(kind) => write!(f, "unknown location {kind}"),
            Fault::UnknownOperator(code) => write!(f, "unknown operator code: {code}"),
            Fault::UnknownPattern(code) => write!(f, "unknown tag {code}"),
            Fault::StringIndexOutOfRange { offset } => {
                write!(f, "no such index in string pool ({offset})")
            }
            Fault::DivisionByZero => write!(f, "division by zero"),
            Fault::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Fault::ElementOutOfRange { index, len } => {
                write!(f, "index {index} out of range for aggregate of length {len}")
            }
            Fault::MatchFailure { line, column } => write!(f, "FAIL at {line}:{column}"),
        }
    }
}

impl std::error::Error for Fault {}

/// Shorthand for `Err(Fault::X.into())`.
macro_rules! fault {
    ($fault:expr) => {
        ::anyhow::Result::Err(::anyhow::Error::from($fault))
    };
}
pub(crate) use fault;
