use std::fmt;

/// Opcode classes (high nibble).
pub const CLASS_BINOP: u8 = 0;
pub const CLASS_BASIC: u8 = 1;
pub const CLASS_LD: u8 = 2;
pub const CLASS_LDA: u8 = 3;
pub const CLASS_ST: u8 = 4;
pub const CLASS_CONTROL: u8 = 5;
pub const CLASS_PATT: u8 = 6;
pub const CLASS_BUILTIN: u8 = 7;
pub const CLASS_STOP: u8 = 15;

/// Operations of [`CLASS_BASIC`].
pub mod basic {
    pub const CONST: u8 = 0;
    pub const STRING: u8 = 1;
    pub const SEXP: u8 = 2;
    pub const STI: u8 = 3;
    pub const STA: u8 = 4;
    pub const JMP: u8 = 5;
    pub const END: u8 = 6;
    pub const RET: u8 = 7;
    pub const DROP: u8 = 8;
    pub const DUP: u8 = 9;
    pub const SWAP: u8 = 10;
    pub const ELEM: u8 = 11;
}

/// Operations of [`CLASS_CONTROL`].
pub mod control {
    pub const CJMPZ: u8 = 0;
    pub const CJMPNZ: u8 = 1;
    pub const BEGIN: u8 = 2;
    pub const CBEGIN: u8 = 3;
    pub const CLOSURE: u8 = 4;
    pub const CALLC: u8 = 5;
    pub const CALL: u8 = 6;
    pub const TAG: u8 = 7;
    pub const ARRAY: u8 = 8;
    pub const FAIL: u8 = 9;
    pub const LINE: u8 = 10;
}

/// Operations of [`CLASS_BUILTIN`].
pub mod builtin {
    pub const READ: u8 = 0;
    pub const WRITE: u8 = 1;
    pub const LENGTH: u8 = 2;
    pub const STRING: u8 = 3;
    pub const ARRAY: u8 = 4;
}

pub const STOP: u8 = 0xFF;

#[inline]
pub const fn opcode(class: u8, op: u8) -> u8 {
    (class << 4) | (op & 0x0F)
}

#[inline]
pub const fn split(byte: u8) -> (u8, u8) {
    ((byte & 0xF0) >> 4, byte & 0x0F)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add = 1,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub const ALL: [BinOp; 13] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Mod,
        BinOp::Lt,
        BinOp::Le,
        BinOp::Gt,
        BinOp::Ge,
        BinOp::Eq,
        BinOp::Ne,
        BinOp::And,
        BinOp::Or,
    ];

    pub fn from_code(code: u8) -> Option<BinOp> {
        Self::ALL.get((code as usize).checked_sub(1)?).copied()
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "!!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocKind {
    Global = 0,
    Local,
    Arg,
    Capture,
}

impl LocKind {
    pub fn from_code(code: u8) -> Option<LocKind> {
        match code {
            0 => Some(LocKind::Global),
            1 => Some(LocKind::Local),
            2 => Some(LocKind::Arg),
            3 => Some(LocKind::Capture),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    fn letter(self) -> char {
        match self {
            LocKind::Global => 'G',
            LocKind::Local => 'L',
            LocKind::Arg => 'A',
            LocKind::Capture => 'C',
        }
    }
}

/// A frame-relative location operand: kind plus (unchecked) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub kind: LocKind,
    pub index: i32,
}

impl Loc {
    pub const fn new(kind: LocKind, index: i32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.letter(), self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PattKind {
    StrLiteral = 0,
    String,
    Array,
    Sexp,
    Ref,
    Val,
    Closure,
}

impl PattKind {
    pub fn from_code(code: u8) -> Option<PattKind> {
        match code {
            0 => Some(PattKind::StrLiteral),
            1 => Some(PattKind::String),
            2 => Some(PattKind::Array),
            3 => Some(PattKind::Sexp),
            4 => Some(PattKind::Ref),
            5 => Some(PattKind::Val),
            6 => Some(PattKind::Closure),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PattKind::StrLiteral => "=str",
            PattKind::String => "#string",
            PattKind::Array => "#array",
            PattKind::Sexp => "#sexp",
            PattKind::Ref => "#ref",
            PattKind::Val => "#val",
            PattKind::Closure => "#fun",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Read,
    Write,
    Length,
    String,
    Array(i32),
}

/// One decoded instruction. String operands borrow from the image's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    Binop(BinOp),
    Const(i32),
    String(&'a str),
    Sexp { tag: &'a str, arity: i32 },
    Sti,
    Sta,
    Jmp(i32),
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,
    Ld(Loc),
    Lda(Loc),
    St(Loc),
    CJmpZ(i32),
    CJmpNz(i32),
    Begin { args: i32, locals: i32 },
    CBegin { args: i32, locals: i32 },
    Closure { target: i32, captures: Vec<Loc> },
    CallC { args: i32 },
    Call { target: i32, args: i32 },
    Tag { tag: &'a str, arity: i32 },
    Array(i32),
    Fail { line: i32, column: u8 },
    Line(i32),
    Patt(PattKind),
    Builtin(Builtin),
    Stop,
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Binop(op) => write!(f, "BINOP\t{}", op.symbol()),
            Instruction::Const(n) => write!(f, "CONST\t{n}"),
            Instruction::String(s) => write!(f, "STRING\t{s}"),
            Instruction::Sexp { tag, arity } => write!(f, "SEXP\t{tag} {arity}"),
            Instruction::Sti => write!(f, "STI"),
            Instruction::Sta => write!(f, "STA"),
            Instruction::Jmp(target) => write!(f, "JMP\t0x{target:08x}"),
            Instruction::End => write!(f, "END"),
            Instruction::Ret => write!(f, "RET"),
            Instruction::Drop => write!(f, "DROP"),
            Instruction::Dup => write!(f, "DUP"),
            Instruction::Swap => write!(f, "SWAP"),
            Instruction::Elem => write!(f, "ELEM"),
            Instruction::Ld(loc) => write!(f, "LD\t{loc}"),
            Instruction::Lda(loc) => write!(f, "LDA\t{loc}"),
            Instruction::St(loc) => write!(f, "ST\t{loc}"),
            Instruction::CJmpZ(target) => write!(f, "CJMPz\t0x{target:08x}"),
            Instruction::CJmpNz(target) => write!(f, "CJMPnz\t0x{target:08x}"),
            Instruction::Begin { args, locals } => write!(f, "BEGIN\t{args} {locals}"),
            Instruction::CBegin { args, locals } => write!(f, "CBEGIN\t{args} {locals}"),
            Instruction::Closure { target, captures } => {
                write!(f, "CLOSURE\t0x{target:08x}")?;
                for loc in captures {
                    write!(f, " {loc}")?;
                }
                Ok(())
            }
            Instruction::CallC { args } => write!(f, "CALLC\t{args}"),
            Instruction::Call { target, args } => write!(f, "CALL\t0x{target:08x} {args}"),
            Instruction::Tag { tag, arity } => write!(f, "TAG\t{tag} {arity}"),
            Instruction::Array(n) => write!(f, "ARRAY\t{n}"),
            Instruction::Fail { line, column } => write!(f, "FAIL\t{line} {column}"),
            Instruction::Line(n) => write!(f, "LINE\t{n}"),
            Instruction::Patt(kind) => write!(f, "PATT\t{}", kind.symbol()),
            Instruction::Builtin(Builtin::Read) => write!(f, "CALL\tLread"),
            Instruction::Builtin(Builtin::Write) => write!(f, "CALL\tLwrite"),
            Instruction::Builtin(Builtin::Length) => write!(f, "CALL\tLlength"),
            Instruction::Builtin(Builtin::String) => write!(f, "CALL\tLstring"),
            Instruction::Builtin(Builtin::Array(n)) => write!(f, "CALL\tBarray\t{n}"),
            Instruction::Stop => write!(f, "STOP"),
        }
    }
}
