//! Handle-based heap with a relocating collector.
//!
//! Object bodies live in a dense `space`; values refer to them through stable
//! [`ObjRef`] handles. A collection marks from the caller's root set plus the
//! extra roots, copies the survivors into a fresh space and rewrites the handle
//! table. Handles of dead objects are recycled.
//!
//! Anything the engine holds outside the operand stack across an allocation
//! must be registered through a [`RootScope`], otherwise a collection
//! triggered by that allocation may free it.

use std::ops::{Deref, DerefMut};

use anyhow::{Result, anyhow};
use tracing::trace;

use crate::value::{ObjRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    String,
    Array,
    Sexp,
    Closure,
}

impl ObjKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::String => "String",
            ObjKind::Array => "Array",
            ObjKind::Sexp => "Sexp",
            ObjKind::Closure => "Closure",
        }
    }
}

#[derive(Debug, Clone)]
enum Body {
    Bytes(Vec<u8>),
    Fields(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    kind: ObjKind,
    /// Hashed variant tag; only meaningful for s-expressions.
    tag: i32,
    body: Body,
}

impl HeapObject {
    pub fn string(bytes: Vec<u8>) -> Self {
        Self {
            kind: ObjKind::String,
            tag: 0,
            body: Body::Bytes(bytes),
        }
    }

    pub fn array(fields: Vec<Value>) -> Self {
        Self {
            kind: ObjKind::Array,
            tag: 0,
            body: Body::Fields(fields),
        }
    }

    /// An untagged s-expression. The tag is applied with [`HeapObject::set_tag`]
    /// once every field is in place.
    pub fn sexp(fields: Vec<Value>) -> Self {
        Self {
            kind: ObjKind::Sexp,
            tag: 0,
            body: Body::Fields(fields),
        }
    }

    /// Closure contents: slot 0 is the code offset, the rest are captures.
    pub fn closure(entry: u32, captured: &[Value]) -> Self {
        let mut fields = Vec::with_capacity(captured.len() + 1);
        fields.push(Value::Int(entry as i32));
        fields.extend_from_slice(captured);
        Self {
            kind: ObjKind::Closure,
            tag: 0,
            body: Body::Fields(fields),
        }
    }

    #[inline]
    pub fn kind(&self) -> ObjKind {
        self.kind
    }

    #[inline]
    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: i32) {
        self.tag = tag;
    }

    pub fn len(&self) -> usize {
        match &self.body {
            Body::Bytes(bytes) => bytes.len(),
            Body::Fields(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contents of arrays, s-expressions and closures; empty for strings.
    pub fn fields(&self) -> &[Value] {
        match &self.body {
            Body::Fields(fields) => fields,
            Body::Bytes(_) => &[],
        }
    }

    pub fn fields_mut(&mut self) -> &mut [Value] {
        match &mut self.body {
            Body::Fields(fields) => fields,
            Body::Bytes(_) => &mut [],
        }
    }

    /// Contents of strings; empty for everything else.
    pub fn bytes(&self) -> &[u8] {
        match &self.body {
            Body::Bytes(bytes) => bytes,
            Body::Fields(_) => &[],
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.body {
            Body::Bytes(bytes) => bytes,
            Body::Fields(_) => &mut [],
        }
    }

    /// Code offset stored in slot 0 of a closure.
    pub fn closure_entry(&self) -> Option<u32> {
        if self.kind != ObjKind::Closure {
            return None;
        }
        self.fields().first().and_then(|v| v.as_int()).map(|n| n as u32)
    }
}

/// Source of roots handed to the collector by whoever triggers an allocation.
pub trait Trace {
    fn trace(&self, visit: &mut dyn FnMut(ObjRef));
}

impl Trace for Value {
    fn trace(&self, visit: &mut dyn FnMut(ObjRef)) {
        if let Some(r) = self.heap_ref() {
            visit(r);
        }
    }
}

impl Trace for [Value] {
    fn trace(&self, visit: &mut dyn FnMut(ObjRef)) {
        for value in self {
            value.trace(visit);
        }
    }
}

impl Trace for () {
    fn trace(&self, _visit: &mut dyn FnMut(ObjRef)) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: u64,
    pub allocated: u64,
    pub freed: u64,
    pub relocated: u64,
}

struct Slot {
    handle: ObjRef,
    object: HeapObject,
}

pub struct Heap {
    space: Vec<Slot>,
    /// Handle -> index into `space`; `None` for recycled handles.
    handles: Vec<Option<u32>>,
    free_handles: Vec<u32>,
    extra_roots: Vec<ObjRef>,
    threshold: usize,
    stress: bool,
    stats: GcStats,
}

impl Heap {
    pub fn new(threshold: usize) -> Self {
        Self {
            space: Vec::new(),
            handles: Vec::new(),
            free_handles: Vec::new(),
            extra_roots: Vec::new(),
            threshold: threshold.max(1),
            stress: false,
            stats: GcStats::default(),
        }
    }

    /// Collect before every allocation. Used to shake out missing roots.
    pub fn with_stress(mut self, stress: bool) -> Self {
        self.stress = stress;
        self
    }

    pub fn live_objects(&self) -> usize {
        self.space.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn extra_root_depth(&self) -> usize {
        self.extra_roots.len()
    }

    pub fn contains(&self, r: ObjRef) -> bool {
        matches!(self.handles.get(r.index()), Some(Some(_)))
    }

    pub fn get(&self, r: ObjRef) -> Result<&HeapObject> {
        let idx = self.slot_index(r)?;
        Ok(&self.space[idx].object)
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Result<&mut HeapObject> {
        let idx = self.slot_index(r)?;
        Ok(&mut self.space[idx].object)
    }

    fn slot_index(&self, r: ObjRef) -> Result<usize> {
        self.handles
            .get(r.index())
            .copied()
            .flatten()
            .map(|idx| idx as usize)
            .ok_or_else(|| anyhow!("dangling heap reference #{}", r.0))
    }

    /// Allocate `object`, collecting first if the threshold is reached.
    /// `roots` must cover every heap reference the caller still needs that is
    /// not registered as an extra root.
    pub fn alloc<R: Trace + ?Sized>(&mut self, object: HeapObject, roots: &R) -> ObjRef {
        if self.stress || self.space.len() >= self.threshold {
            self.collect(roots);
        }
        let handle = match self.free_handles.pop() {
            Some(h) => ObjRef(h),
            None => {
                self.handles.push(None);
                ObjRef((self.handles.len() - 1) as u32)
            }
        };
        self.handles[handle.index()] = Some(self.space.len() as u32);
        self.space.push(Slot { handle, object });
        self.stats.allocated += 1;
        handle
    }

    pub fn alloc_string<R: Trace + ?Sized>(&mut self, bytes: impl Into<Vec<u8>>, roots: &R) -> ObjRef {
        self.alloc(HeapObject::string(bytes.into()), roots)
    }

    pub fn alloc_array<R: Trace + ?Sized>(&mut self, elements: Vec<Value>, roots: &R) -> ObjRef {
        self.alloc(HeapObject::array(elements), roots)
    }

    pub fn alloc_sexp<R: Trace + ?Sized>(&mut self, fields: Vec<Value>, roots: &R) -> ObjRef {
        self.alloc(HeapObject::sexp(fields), roots)
    }

    pub fn alloc_closure<R: Trace + ?Sized>(&mut self, entry: u32, captured: &[Value], roots: &R) -> ObjRef {
        self.alloc(HeapObject::closure(entry, captured), roots)
    }

    /// Open a scope of extra roots. Everything registered through the returned
    /// guard is unregistered when it drops.
    pub fn root_scope(&mut self) -> RootScope<'_> {
        let mark = self.extra_roots.len();
        RootScope { heap: self, mark }
    }

    pub fn collect<R: Trace + ?Sized>(&mut self, roots: &R) {
        let mut marked = vec![false; self.handles.len()];
        let mut worklist: Vec<ObjRef> = Vec::new();
        roots.trace(&mut |r| worklist.push(r));
        worklist.extend_from_slice(&self.extra_roots);

        while let Some(r) = worklist.pop() {
            let Some(Some(idx)) = self.handles.get(r.index()).copied() else {
                continue;
            };
            if std::mem::replace(&mut marked[r.index()], true) {
                continue;
            }
            self.space[idx as usize].object.fields().trace(&mut |child| worklist.push(child));
        }

        let before = self.space.len();
        let mut to_space = Vec::with_capacity(before);
        let mut relocated = 0u64;
        for (old_idx, slot) in std::mem::take(&mut self.space).into_iter().enumerate() {
            let h = slot.handle.index();
            if marked[h] {
                let new_idx = to_space.len();
                if new_idx != old_idx {
                    relocated += 1;
                }
                self.handles[h] = Some(new_idx as u32);
                to_space.push(slot);
            } else {
                self.handles[h] = None;
                self.free_handles.push(h as u32);
            }
        }
        self.space = to_space;

        let live = self.space.len();
        let freed = (before - live) as u64;
        self.stats.collections += 1;
        self.stats.freed += freed;
        self.stats.relocated += relocated;
        if live * 2 > self.threshold {
            self.threshold = self.threshold.saturating_mul(2);
        }
        trace!(
            target: "smvm::gc",
            live,
            freed,
            relocated,
            threshold = self.threshold,
            "heap.collect"
        );
    }
}

/// Guard over a nested block of extra roots.
pub struct RootScope<'h> {
    heap: &'h mut Heap,
    mark: usize,
}

impl RootScope<'_> {
    pub fn root(&mut self, value: Value) {
        if let Some(r) = value.heap_ref() {
            self.heap.extra_roots.push(r);
        }
    }

    pub fn root_all(&mut self, values: &[Value]) {
        for value in values {
            self.root(*value);
        }
    }
}

impl Deref for RootScope<'_> {
    type Target = Heap;

    fn deref(&self) -> &Heap {
        self.heap
    }
}

impl DerefMut for RootScope<'_> {
    fn deref_mut(&mut self) -> &mut Heap {
        self.heap
    }
}

impl Drop for RootScope<'_> {
    fn drop(&mut self) {
        self.heap.extra_roots.truncate(self.mark);
    }
}
