//! Instruction frequency analysis.
//!
//! Two instructions are the same idiom when their encodings are byte for byte
//! equal, so `LD G(0)` and `LD G(1)` are counted separately.

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::bytecode::{BytecodeImage, Decoder};
use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    pub instruction: String,
    pub count: u32,
    /// Offset of the first occurrence.
    pub first_offset: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FrequencyReport {
    pub total: u32,
    pub entries: Vec<FrequencyEntry>,
}

impl FrequencyReport {
    /// Decode the whole code segment and count every distinct encoding.
    /// Entries are sorted by count, most frequent first; ties keep code order.
    pub fn analyze(image: &BytecodeImage) -> Result<Self> {
        let code = image.code();
        let mut counts: FastHashMap<&[u8], usize> = fast_hash_map_with_capacity(code.len() / 4);
        let mut entries: Vec<FrequencyEntry> = Vec::new();
        let mut decoder = Decoder::new(image);
        let mut total = 0u32;

        while !decoder.is_at_end() {
            let start = decoder.ip();
            let insn = decoder.decode()?;
            let bytes = &code[start..decoder.ip()];
            total += 1;
            match counts.get(bytes) {
                Some(&idx) => entries[idx].count += 1,
                None => {
                    counts.insert(bytes, entries.len());
                    entries.push(FrequencyEntry {
                        instruction: insn.to_string(),
                        count: 1,
                        first_offset: start,
                    });
                }
            }
        }

        // stable sort: equal counts stay in first-occurrence order
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        debug!(target: "smvm::analysis", total, distinct = entries.len(), "frequency.done");
        Ok(Self { total, entries })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for FrequencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = itoa::Buffer::new();
        for entry in &self.entries {
            writeln!(f, "{:<24}\t{}", entry.instruction, buf.format(entry.count))?;
        }
        Ok(())
    }
}
