//! Fx-hashed maps for the assembler's string interning and the frequency
//! analyser's instruction keys.

pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[inline]
pub fn fast_hash_map_new<K, V>() -> FastHashMap<K, V> {
    FastHashMap::default()
}

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, Default::default())
}
