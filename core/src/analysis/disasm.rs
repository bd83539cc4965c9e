use std::fmt::Write;

use anyhow::Result;

use crate::bytecode::{BytecodeImage, Decoder, Instruction};

/// Header, public symbols and the full code listing.
pub fn dump(image: &BytecodeImage) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "String table size       : {}", image.strings().len())?;
    writeln!(out, "Global area size        : {}", image.global_area_size())?;
    writeln!(out, "Number of public symbols: {}", image.publics().len())?;
    writeln!(out, "Public symbols          :")?;
    for (idx, public) in image.publics().iter().enumerate() {
        writeln!(out, "   0x{:08x}: {}", public.code_offset, image.public_name(idx)?)?;
    }
    writeln!(out, "Code:")?;
    out.push_str(&disassemble(image)?);
    Ok(out)
}

/// One `0x%08x:\t<instruction>` line per instruction, up to the first `STOP`
/// (rendered as `<end>`) or the end of the code segment.
pub fn disassemble(image: &BytecodeImage) -> Result<String> {
    let mut out = String::new();
    let mut decoder = Decoder::new(image);
    while !decoder.is_at_end() {
        write!(out, "0x{:08x}:\t", decoder.ip())?;
        match decoder.decode()? {
            Instruction::Stop => {
                writeln!(out, "<end>")?;
                break;
            }
            insn => writeln!(out, "{insn}")?,
        }
    }
    Ok(out)
}
