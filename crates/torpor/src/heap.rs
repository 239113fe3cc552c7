//! The object registry: an arena of mutable compound objects.
//!
//! Every compound value (list, dict, set, record, coroutine, …) lives here and
//! is referenced by a [`HeapId`]. Ids are monotonically increasing and stable
//! for the lifetime of the interpreter; slots are never reused or freed
//! individually — the whole arena is released when the interpreter is
//! dropped. That makes cycles harmless and lets `Value` be a plain `Clone`
//! type with no reference counting.

use std::cell::Cell;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    asyncio::{Coroutine, GatherFuture},
    exception_private::ExcType,
    os::StatResult,
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceError, ResourceTracker},
    types::{BoundMethod, Dict, Iter, PyPath, Range, Record, Set},
    value::Value,
};

/// Stable identifier of an object in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeapId(u64);

impl HeapId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A raised exception instance carrying its argument tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExcInstance {
    /// The exception type.
    pub exc_type: ExcType,
    /// Constructor arguments, as in `exc.args`.
    pub args: Vec<Value>,
}

/// Payload of one registry slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum HeapData {
    Str(String),
    Bytes(Vec<u8>),
    LongInt(BigInt),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Dict),
    Set(Set),
    Range(Range),
    Path(PyPath),
    Stat(StatResult),
    Record(Record),
    Exception(ExcInstance),
    BoundMethod(BoundMethod),
    Coroutine(Coroutine),
    Gather(GatherFuture),
    Iter(Iter),
}

impl HeapData {
    /// Rough per-allocation size estimate reported to the resource tracker.
    fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::LongInt(i) => i.bits() as usize / 8,
            Self::Tuple(items) | Self::List(items) => items.len() * size_of::<Value>(),
            Self::Dict(d) => d.len() * 3 * size_of::<Value>(),
            Self::Set(s) => s.len() * 2 * size_of::<Value>(),
            Self::Path(p) => p.as_str().len(),
            Self::Record(r) => (r.fields.len() + r.extra.len()) * size_of::<Value>(),
            Self::Coroutine(c) => c.locals.len() * size_of::<Value>(),
            Self::Gather(g) => g.items.len() * 2 * size_of::<Value>(),
            Self::Range(_) | Self::Stat(_) | Self::Exception(_) | Self::BoundMethod(_) | Self::Iter(_) => 0,
        };
        size_of::<Self>() + payload
    }
}

/// The registry itself, generic over the resource tracker.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: serde::de::DeserializeOwned"))]
pub(crate) struct Heap<T: ResourceTracker> {
    entries: Vec<HeapData>,
    tracker: T,
    /// Depth counter guarding recursive data operations (eq, repr, hash).
    #[serde(skip)]
    data_depth: Cell<u32>,
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates an empty registry with the given tracker.
    pub fn new(tracker: T) -> Self {
        Self {
            entries: Vec::new(),
            tracker,
            data_depth: Cell::new(0),
        }
    }

    /// Allocates a new object, returning its stable id.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(data.estimate_size())?;
        let id = HeapId(self.entries.len() as u64);
        self.entries.push(data);
        Ok(id)
    }

    /// Allocates and wraps the id in a `Value::Ref`.
    pub fn allocate_value(&mut self, data: HeapData) -> Result<Value, ResourceError> {
        self.allocate(data).map(Value::Ref)
    }

    /// Returns the object behind an id.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap; ids are never dangling.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.0 as usize]
    }

    /// Mutable access to the object behind an id.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.0 as usize]
    }

    /// Number of live objects.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// The resource tracker, for frame-depth checks.
    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Enters one level of nested data recursion.
    ///
    /// Returns false when the depth ceiling is reached; callers then fall back
    /// to a non-recursive answer instead of overflowing the host stack.
    #[must_use]
    pub fn data_depth_enter(&self) -> bool {
        let depth = self.data_depth.get();
        if depth >= MAX_DATA_RECURSION_DEPTH {
            return false;
        }
        self.data_depth.set(depth + 1);
        true
    }

    /// Leaves one level of nested data recursion.
    pub fn data_depth_exit(&self) {
        let depth = self.data_depth.get();
        debug_assert!(depth > 0, "data depth underflow");
        self.data_depth.set(depth.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoLimitTracker;

    #[test]
    fn ids_are_monotonic_and_stable() {
        let mut heap = Heap::new(NoLimitTracker);
        let a = heap.allocate(HeapData::Str("a".to_owned())).unwrap();
        let b = heap.allocate(HeapData::List(vec![Value::Int(1)])).unwrap();
        assert!(a.raw() < b.raw());
        assert!(matches!(heap.get(a), HeapData::Str(s) if s == "a"));
        let HeapData::List(items) = heap.get_mut(b) else {
            panic!("expected list");
        };
        items.push(Value::Int(2));
        assert!(matches!(heap.get(b), HeapData::List(items) if items.len() == 2));
    }

    #[test]
    fn data_depth_guard_saturates() {
        let heap = Heap::new(NoLimitTracker);
        let mut entered = 0;
        while heap.data_depth_enter() {
            entered += 1;
            assert!(entered <= 10_000, "depth guard never tripped");
        }
        assert_eq!(entered, MAX_DATA_RECURSION_DEPTH);
        for _ in 0..entered {
            heap.data_depth_exit();
        }
    }
}
