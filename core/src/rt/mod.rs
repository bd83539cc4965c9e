//! Runtime consumed by the execution engine: the heap and its collector, tag
//! hashing, the primitive library and console I/O.

pub mod console;
pub mod heap;
pub mod primitives;
pub mod tag;

pub use console::{BufferConsole, Console, IoConsole, StdConsole};
pub use heap::{GcStats, Heap, HeapObject, ObjKind, RootScope, Trace};
pub use tag::{de_hash, tag_hash};
