//! Bytecode file container.
//!
//! Layout, all integers little-endian `i32`:
//! string table size, global area size, public symbol count, then
//! `(name offset, code offset)` per public symbol, the string pool and
//! finally the code segment which runs to the end of the file.

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use tracing::debug;

use crate::fault::{Fault, fault};

const HEADER_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    pub name_offset: i32,
    pub code_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeImage {
    strings: Vec<u8>,
    publics: Vec<PublicSymbol>,
    global_area_size: usize,
    code: Vec<u8>,
}

impl BytecodeImage {
    pub fn new(strings: Vec<u8>, publics: Vec<PublicSymbol>, global_area_size: usize, code: Vec<u8>) -> Self {
        Self {
            strings,
            publics,
            global_area_size,
            code,
        }
    }

    /// Read and decode an image from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read bytecode file {}", path.display()))?;
        let image = Self::decode(&bytes).with_context(|| format!("malformed bytecode file {}", path.display()))?;
        debug!(
            target: "smvm::loader",
            path = %path.display(),
            strings = image.strings.len(),
            globals = image.global_area_size,
            publics = image.publics.len(),
            code = image.code.len(),
            "loaded bytecode image"
        );
        Ok(image)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = 0usize;
        let string_table_size = read_size(bytes, &mut cursor, "string table size")?;
        let global_area_size = read_size(bytes, &mut cursor, "global area size")?;
        let public_count = read_size(bytes, &mut cursor, "public symbol count")?;

        let public_bytes = public_count
            .checked_mul(8)
            .context("public symbol table size overflows")?;
        ensure!(
            bytes.len().saturating_sub(cursor) >= public_bytes,
            "public symbol table overruns the file ({public_count} entries)"
        );
        let mut publics = Vec::with_capacity(public_count);
        for _ in 0..public_count {
            let name_offset = read_i32(bytes, &mut cursor)?;
            let code_offset = read_i32(bytes, &mut cursor)?;
            publics.push(PublicSymbol {
                name_offset,
                code_offset,
            });
        }

        if cursor + string_table_size > bytes.len() {
            bail!(
                "string table overruns the file ({} bytes declared, {} available)",
                string_table_size,
                bytes.len() - cursor
            );
        }
        let strings = bytes[cursor..cursor + string_table_size].to_vec();
        cursor += string_table_size;
        let code = bytes[cursor..].to_vec();

        Ok(Self {
            strings,
            publics,
            global_area_size,
            code,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_WORDS * 4 + self.publics.len() * 8 + self.strings.len() + self.code.len());
        write_i32(&mut out, self.strings.len() as i32);
        write_i32(&mut out, self.global_area_size as i32);
        write_i32(&mut out, self.publics.len() as i32);
        for public in &self.publics {
            write_i32(&mut out, public.name_offset);
            write_i32(&mut out, public.code_offset);
        }
        out.extend_from_slice(&self.strings);
        out.extend_from_slice(&self.code);
        out
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn strings(&self) -> &[u8] {
        &self.strings
    }

    #[inline]
    pub fn global_area_size(&self) -> usize {
        self.global_area_size
    }

    #[inline]
    pub fn publics(&self) -> &[PublicSymbol] {
        &self.publics
    }

    /// NUL-terminated string starting at `offset` in the string pool.
    pub fn string_at(&self, offset: i32) -> Result<&str> {
        if offset < 0 || offset as usize >= self.strings.len() {
            return fault!(Fault::StringIndexOutOfRange { offset });
        }
        let tail = &self.strings[offset as usize..];
        let Some(len) = tail.iter().position(|&b| b == 0) else {
            bail!("string at pool offset {offset} is not NUL-terminated");
        };
        std::str::from_utf8(&tail[..len]).with_context(|| format!("invalid UTF-8 in string pool at offset {offset}"))
    }

    pub fn public_name(&self, index: usize) -> Result<&str> {
        let Some(public) = self.publics.get(index) else {
            bail!("no public symbol #{index}");
        };
        self.string_at(public.name_offset)
    }
}

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32> {
    if *cursor + 4 > bytes.len() {
        bail!("unexpected end of input while reading i32");
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(i32::from_le_bytes(buf))
}

fn read_size(bytes: &[u8], cursor: &mut usize, what: &str) -> Result<usize> {
    let value = read_i32(bytes, cursor).with_context(|| format!("truncated header: missing {what}"))?;
    ensure!(value >= 0, "negative {what}: {value}");
    Ok(value as usize)
}
