//! Assembler for bytecode images.
//!
//! Emits the binary encoding directly; jump and call targets are written as
//! placeholders and patched when their label is bound.

use anyhow::{Result, bail};

use crate::bytecode::image::{BytecodeImage, PublicSymbol};
use crate::bytecode::opcode::{
    BinOp, CLASS_BASIC, CLASS_BINOP, CLASS_BUILTIN, CLASS_CONTROL, CLASS_LD, CLASS_LDA, CLASS_PATT, CLASS_ST, LocKind,
    PattKind, STOP, basic, builtin, control, opcode,
};
use crate::util::fast_map::{FastHashMap, fast_hash_map_new};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

pub struct CodeBuilder {
    code: Vec<u8>,
    strings: Vec<u8>,
    interned: FastHashMap<String, i32>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
    publics: Vec<(i32, Label)>,
    globals: usize,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            strings: Vec::new(),
            interned: fast_hash_map_new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            publics: Vec::new(),
            globals: 0,
        }
    }

    pub fn globals(&mut self, count: usize) -> &mut Self {
        self.globals = count;
        self
    }

    /// Current code offset.
    pub fn here(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.here());
        self
    }

    /// Export `label` under `name` in the public symbol table.
    pub fn public(&mut self, name: &str, label: Label) -> &mut Self {
        let offset = self.intern(name);
        self.publics.push((offset, label));
        self
    }

    /// Offset of `s` in the string pool, adding it on first use.
    pub fn intern(&mut self, s: &str) -> i32 {
        if let Some(&offset) = self.interned.get(s) {
            return offset;
        }
        let offset = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.interned.insert(s.to_string(), offset);
        offset
    }

    fn op(&mut self, class: u8, op: u8) -> &mut Self {
        self.code.push(opcode(class, op));
        self
    }

    fn int(&mut self, value: i32) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn byte(&mut self, value: u8) -> &mut Self {
        self.code.push(value);
        self
    }

    fn target(&mut self, label: Label) -> &mut Self {
        self.fixups.push((self.code.len(), label));
        self.int(0)
    }

    fn str_operand(&mut self, s: &str) -> &mut Self {
        let offset = self.intern(s);
        self.int(offset)
    }

    /// Append raw bytes, for encodings the typed emitters cannot express.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn binop(&mut self, op: BinOp) -> &mut Self {
        self.op(CLASS_BINOP, op.code())
    }

    pub fn konst(&mut self, value: i32) -> &mut Self {
        self.op(CLASS_BASIC, basic::CONST).int(value)
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.op(CLASS_BASIC, basic::STRING).str_operand(s)
    }

    pub fn sexp(&mut self, tag: &str, arity: i32) -> &mut Self {
        self.op(CLASS_BASIC, basic::SEXP).str_operand(tag).int(arity)
    }

    pub fn sti(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::STI)
    }

    pub fn sta(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::STA)
    }

    pub fn jmp(&mut self, label: Label) -> &mut Self {
        self.op(CLASS_BASIC, basic::JMP).target(label)
    }

    pub fn end(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::END)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::RET)
    }

    pub fn drop_top(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::DROP)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::DUP)
    }

    pub fn swap(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::SWAP)
    }

    pub fn elem(&mut self) -> &mut Self {
        self.op(CLASS_BASIC, basic::ELEM)
    }

    pub fn ld(&mut self, kind: LocKind, index: i32) -> &mut Self {
        self.op(CLASS_LD, kind.code()).int(index)
    }

    pub fn lda(&mut self, kind: LocKind, index: i32) -> &mut Self {
        self.op(CLASS_LDA, kind.code()).int(index)
    }

    pub fn st(&mut self, kind: LocKind, index: i32) -> &mut Self {
        self.op(CLASS_ST, kind.code()).int(index)
    }

    pub fn cjmpz(&mut self, label: Label) -> &mut Self {
        self.op(CLASS_CONTROL, control::CJMPZ).target(label)
    }

    pub fn cjmpnz(&mut self, label: Label) -> &mut Self {
        self.op(CLASS_CONTROL, control::CJMPNZ).target(label)
    }

    pub fn begin(&mut self, args: i32, locals: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::BEGIN).int(args).int(locals)
    }

    pub fn cbegin(&mut self, args: i32, locals: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::CBEGIN).int(args).int(locals)
    }

    pub fn closure(&mut self, label: Label, captures: &[(LocKind, i32)]) -> &mut Self {
        self.op(CLASS_CONTROL, control::CLOSURE)
            .target(label)
            .int(captures.len() as i32);
        for &(kind, index) in captures {
            self.byte(kind.code()).int(index);
        }
        self
    }

    pub fn callc(&mut self, args: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::CALLC).int(args)
    }

    pub fn call(&mut self, label: Label, args: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::CALL).target(label).int(args)
    }

    pub fn tag(&mut self, name: &str, arity: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::TAG).str_operand(name).int(arity)
    }

    /// Array-shape check (`ARRAY n`).
    pub fn array_patt(&mut self, len: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::ARRAY).int(len)
    }

    pub fn fail(&mut self, line: i32, column: u8) -> &mut Self {
        self.op(CLASS_CONTROL, control::FAIL).int(line).byte(column)
    }

    pub fn line(&mut self, line: i32) -> &mut Self {
        self.op(CLASS_CONTROL, control::LINE).int(line)
    }

    pub fn patt(&mut self, kind: PattKind) -> &mut Self {
        self.op(CLASS_PATT, kind.code())
    }

    pub fn read(&mut self) -> &mut Self {
        self.op(CLASS_BUILTIN, builtin::READ)
    }

    pub fn write(&mut self) -> &mut Self {
        self.op(CLASS_BUILTIN, builtin::WRITE)
    }

    pub fn length(&mut self) -> &mut Self {
        self.op(CLASS_BUILTIN, builtin::LENGTH)
    }

    pub fn stringify(&mut self) -> &mut Self {
        self.op(CLASS_BUILTIN, builtin::STRING)
    }

    /// Array construction from the top `len` operands (`Barray n`).
    pub fn barray(&mut self, len: i32) -> &mut Self {
        self.op(CLASS_BUILTIN, builtin::ARRAY).int(len)
    }

    pub fn stop(&mut self) -> &mut Self {
        self.code.push(STOP);
        self
    }

    /// Patch label references and assemble the image.
    pub fn finish(&self) -> Result<BytecodeImage> {
        let resolve = |label: Label| -> Result<i32> {
            match self.labels.get(label.0).copied().flatten() {
                Some(offset) => Ok(offset as i32),
                None => bail!("label #{} referenced but never bound", label.0),
            }
        };
        let mut code = self.code.clone();
        for &(pos, label) in &self.fixups {
            code[pos..pos + 4].copy_from_slice(&resolve(label)?.to_le_bytes());
        }
        let publics = self
            .publics
            .iter()
            .map(|&(name_offset, label)| {
                Ok(PublicSymbol {
                    name_offset,
                    code_offset: resolve(label)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BytecodeImage::new(self.strings.clone(), publics, self.globals, code))
    }
}
