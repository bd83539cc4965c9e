//! Variant tag hashing for s-expressions.
//!
//! A tag name is packed six bits per character, using the character's index in
//! [`TAG_ALPHABET`]. Only the first [`TAG_HASH_CHARS`] characters participate,
//! so [`de_hash`] recovers names up to that length exactly.

use anyhow::{Result, bail};

pub const TAG_ALPHABET: &[u8; 64] = b"_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ'0123456789";
pub const TAG_HASH_CHARS: usize = 5;

pub fn tag_hash(name: &str) -> Result<i32> {
    let mut hash: i32 = 0;
    for ch in name.bytes().take(TAG_HASH_CHARS) {
        let Some(pos) = TAG_ALPHABET.iter().position(|&c| c == ch) else {
            bail!("tagHash: character not found: {}", ch as char);
        };
        hash = (hash << 6) | pos as i32;
    }
    Ok(hash)
}

pub fn de_hash(mut hash: i32) -> String {
    let mut out = Vec::with_capacity(TAG_HASH_CHARS);
    while hash != 0 {
        out.push(TAG_ALPHABET[(hash & 0x3F) as usize]);
        hash >>= 6;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
