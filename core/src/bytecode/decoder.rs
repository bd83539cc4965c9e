//! Bounds-checked cursor over an image's code segment.

use anyhow::Result;

use crate::bytecode::image::BytecodeImage;
use crate::bytecode::opcode::{
    BinOp, Builtin, CLASS_BASIC, CLASS_BINOP, CLASS_BUILTIN, CLASS_CONTROL, CLASS_LD, CLASS_LDA, CLASS_PATT, CLASS_ST,
    CLASS_STOP, Instruction, Loc, LocKind, PattKind, STOP, basic, builtin, control, split,
};
use crate::fault::{Fault, fault};

pub struct Decoder<'a> {
    image: &'a BytecodeImage,
    ip: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(image: &'a BytecodeImage) -> Self {
        Self { image, ip: 0 }
    }

    /// Cursor positioned at `ip`. The position is checked on the first read.
    pub fn at(image: &'a BytecodeImage, ip: usize) -> Self {
        Self { image, ip }
    }

    #[inline]
    pub fn ip(&self) -> usize {
        self.ip
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.ip >= self.image.code().len()
    }

    /// Move to `target`, which must lie inside the code segment.
    pub fn jump(&mut self, target: i32) -> Result<()> {
        self.ip = check_target(self.image, target)?;
        Ok(())
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        let code = self.image.code();
        let end = self.ip + width;
        if end > code.len() {
            return fault!(Fault::IpOutOfBounds { offset: end as i64 });
        }
        let bytes = &code[self.ip..end];
        self.ip = end;
        Ok(bytes)
    }

    fn next_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn next_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(buf))
    }

    fn next_string(&mut self) -> Result<&'a str> {
        let offset = self.next_i32()?;
        self.image.string_at(offset)
    }

    fn next_loc(&mut self, kind: u8) -> Result<Loc> {
        let Some(kind) = LocKind::from_code(kind) else {
            return fault!(Fault::UnknownLocation(kind));
        };
        Ok(Loc::new(kind, self.next_i32()?))
    }

    /// Decode the instruction at the cursor and advance past it.
    pub fn decode(&mut self) -> Result<Instruction<'a>> {
        let byte = self.next_u8()?;
        let (class, op) = split(byte);
        let insn = match class {
            CLASS_BINOP => match BinOp::from_code(op) {
                Some(op) => Instruction::Binop(op),
                None => return fault!(Fault::UnknownOperator(op)),
            },
            CLASS_BASIC => match op {
                basic::CONST => Instruction::Const(self.next_i32()?),
                basic::STRING => Instruction::String(self.next_string()?),
                basic::SEXP => Instruction::Sexp {
                    tag: self.next_string()?,
                    arity: self.next_i32()?,
                },
                basic::STI => Instruction::Sti,
                basic::STA => Instruction::Sta,
                basic::JMP => Instruction::Jmp(self.next_i32()?),
                basic::END => Instruction::End,
                basic::RET => Instruction::Ret,
                basic::DROP => Instruction::Drop,
                basic::DUP => Instruction::Dup,
                basic::SWAP => Instruction::Swap,
                basic::ELEM => Instruction::Elem,
                _ => return fault!(Fault::InvalidOpcode { class, op }),
            },
            CLASS_LD => Instruction::Ld(self.next_loc(op)?),
            CLASS_LDA => Instruction::Lda(self.next_loc(op)?),
            CLASS_ST => Instruction::St(self.next_loc(op)?),
            CLASS_CONTROL => match op {
                control::CJMPZ => Instruction::CJmpZ(self.next_i32()?),
                control::CJMPNZ => Instruction::CJmpNz(self.next_i32()?),
                control::BEGIN => Instruction::Begin {
                    args: self.next_i32()?,
                    locals: self.next_i32()?,
                },
                control::CBEGIN => Instruction::CBegin {
                    args: self.next_i32()?,
                    locals: self.next_i32()?,
                },
                control::CLOSURE => {
                    let target = self.next_i32()?;
                    let count = self.next_i32()?;
                    if count < 0 {
                        return fault!(Fault::NegativeIndex { index: count });
                    }
                    // a capture is five bytes, so the segment bounds the capacity
                    let fits = (self.image.code().len() - self.ip) / 5;
                    let mut captures = Vec::with_capacity((count as usize).min(fits));
                    for _ in 0..count {
                        let kind = self.next_u8()?;
                        captures.push(self.next_loc(kind)?);
                    }
                    Instruction::Closure { target, captures }
                }
                control::CALLC => Instruction::CallC { args: self.next_i32()? },
                control::CALL => Instruction::Call {
                    target: self.next_i32()?,
                    args: self.next_i32()?,
                },
                control::TAG => Instruction::Tag {
                    tag: self.next_string()?,
                    arity: self.next_i32()?,
                },
                control::ARRAY => Instruction::Array(self.next_i32()?),
                control::FAIL => Instruction::Fail {
                    line: self.next_i32()?,
                    column: self.next_u8()?,
                },
                control::LINE => Instruction::Line(self.next_i32()?),
                _ => return fault!(Fault::InvalidOpcode { class, op }),
            },
            CLASS_PATT => match PattKind::from_code(op) {
                Some(kind) => Instruction::Patt(kind),
                None => return fault!(Fault::UnknownPattern(op)),
            },
            CLASS_BUILTIN => match op {
                builtin::READ => Instruction::Builtin(Builtin::Read),
                builtin::WRITE => Instruction::Builtin(Builtin::Write),
                builtin::LENGTH => Instruction::Builtin(Builtin::Length),
                builtin::STRING => Instruction::Builtin(Builtin::String),
                builtin::ARRAY => Instruction::Builtin(Builtin::Array(self.next_i32()?)),
                _ => return fault!(Fault::InvalidOpcode { class, op }),
            },
            CLASS_STOP if byte == STOP => Instruction::Stop,
            _ => return fault!(Fault::InvalidOpcode { class, op }),
        };
        Ok(insn)
    }
}

/// Validate a jump or call target against the code segment.
pub fn check_target(image: &BytecodeImage, target: i32) -> Result<usize> {
    if target < 0 || target as usize >= image.code().len() {
        return fault!(Fault::IpOutOfBounds { offset: target as i64 });
    }
    Ok(target as usize)
}
