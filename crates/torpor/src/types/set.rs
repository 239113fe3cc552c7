//! Insertion-ordered set, structured like [`super::dict::Dict`] without
//! values.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// One set element with its hash cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SetEntry {
    pub hash: i64,
    pub value: Value,
}

/// Insertion-ordered Python set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Set {
    entries: Vec<SetEntry>,
    index: AHashMap<i64, SmallVec<[u32; 1]>>,
}

impl Set {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Elements in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[SetEntry] {
        &self.entries
    }

    /// Element at a position (used by iterators).
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<&SetEntry> {
        self.entries.get(index)
    }

    fn candidates(&self, hash: i64) -> &[u32] {
        self.index.get(&hash).map_or(&[], SmallVec::as_slice)
    }

    fn push_entry(&mut self, hash: i64, value: Value) {
        let position = u32::try_from(self.entries.len()).expect("set exceeds u32 entries");
        self.entries.push(SetEntry { hash, value });
        self.index.entry(hash).or_default().push(position);
    }

    fn remove_at(&mut self, position: usize) -> SetEntry {
        let entry = self.entries.remove(position);
        let position = position as u32;
        if let Some(bucket) = self.index.get_mut(&entry.hash) {
            bucket.retain(|&mut p| p != position);
            if bucket.is_empty() {
                self.index.remove(&entry.hash);
            }
        }
        for bucket in self.index.values_mut() {
            for p in bucket.iter_mut() {
                if *p > position {
                    *p -= 1;
                }
            }
        }
        entry
    }

    /// Drops every element.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Finds the position of an equal element.
pub(crate) fn set_find(
    heap: &Heap<impl ResourceTracker>,
    set_id: HeapId,
    hash: i64,
    value: &Value,
    interns: &Interns,
) -> Option<usize> {
    let HeapData::Set(set) = heap.get(set_id) else {
        return None;
    };
    for &position in set.candidates(hash) {
        if set.entries[position as usize].value.py_eq(value, heap, interns) {
            return Some(position as usize);
        }
    }
    None
}

/// Adds an element; no-op when an equal element is already present.
pub(crate) fn set_insert(
    heap: &mut Heap<impl ResourceTracker>,
    set_id: HeapId,
    value: Value,
    interns: &Interns,
) -> RunResult<()> {
    let hash = value
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&value.type_name(heap, interns)))?;
    if set_find(heap, set_id, hash, &value, interns).is_some() {
        return Ok(());
    }
    let HeapData::Set(set) = heap.get_mut(set_id) else {
        return Err(RunError::internal("set_insert on non-set"));
    };
    set.push_entry(hash, value);
    Ok(())
}

/// Membership test.
pub(crate) fn set_contains(
    heap: &Heap<impl ResourceTracker>,
    set_id: HeapId,
    value: &Value,
    interns: &Interns,
) -> RunResult<bool> {
    let hash = value
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&value.type_name(heap, interns)))?;
    Ok(set_find(heap, set_id, hash, value, interns).is_some())
}

/// Removes an element, reporting whether it was present.
pub(crate) fn set_discard(
    heap: &mut Heap<impl ResourceTracker>,
    set_id: HeapId,
    value: &Value,
    interns: &Interns,
) -> RunResult<bool> {
    let hash = value
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&value.type_name(heap, interns)))?;
    let found = set_find(heap, set_id, hash, value, interns);
    let HeapData::Set(set) = heap.get_mut(set_id) else {
        return Err(RunError::internal("set_discard on non-set"));
    };
    match found {
        Some(position) => {
            set.remove_at(position);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Calls a `set` method on a heap set.
pub(crate) fn call_set_method(
    heap: &mut Heap<impl ResourceTracker>,
    set_id: HeapId,
    method: &str,
    args: crate::args::ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    match method {
        "add" => {
            let item = args.get_one_arg("set.add")?;
            set_insert(heap, set_id, item, interns)?;
            Ok(Value::None)
        }
        "remove" => {
            let item = args.get_one_arg("set.remove")?;
            if set_discard(heap, set_id, &item, interns)? {
                Ok(Value::None)
            } else {
                Err(ExcType::key_error(item.py_repr(heap, interns)))
            }
        }
        "discard" => {
            let item = args.get_one_arg("set.discard")?;
            set_discard(heap, set_id, &item, interns)?;
            Ok(Value::None)
        }
        "clear" => {
            args.check_zero_args("set.clear")?;
            let HeapData::Set(set) = heap.get_mut(set_id) else {
                return Err(RunError::internal("set method on non-set"));
            };
            set.clear();
            Ok(Value::None)
        }
        "union" | "intersection" => {
            let other = args.get_one_arg(if method == "union" { "set.union" } else { "set.intersection" })?;
            let other_items = crate::types::list::iterable_to_vec(heap, &other, interns, method)?;
            let own_items: Vec<Value> = match heap.get(set_id) {
                HeapData::Set(set) => set.entries().iter().map(|entry| entry.value.clone()).collect(),
                _ => return Err(RunError::internal("set method on non-set")),
            };
            let result = heap.allocate_value(HeapData::Set(Set::new()))?;
            let Value::Ref(result_id) = result else { unreachable!() };
            if method == "union" {
                for item in own_items.into_iter().chain(other_items) {
                    set_insert(heap, result_id, item, interns)?;
                }
            } else {
                // Intersection keeps own ordering; probe the other side.
                let probe = heap.allocate_value(HeapData::Set(Set::new()))?;
                let Value::Ref(probe_id) = probe else { unreachable!() };
                for item in other_items {
                    set_insert(heap, probe_id, item, interns)?;
                }
                for item in own_items {
                    if set_contains(heap, probe_id, &item, interns)? {
                        set_insert(heap, result_id, item, interns)?;
                    }
                }
            }
            Ok(result)
        }
        _ => Err(ExcType::attribute_error("set", method)),
    }
}

/// Structural equality: same length and mutual containment.
pub(crate) fn set_eq(heap: &Heap<impl ResourceTracker>, left_id: HeapId, right_id: HeapId, interns: &Interns) -> bool {
    let (HeapData::Set(left), HeapData::Set(right)) = (heap.get(left_id), heap.get(right_id)) else {
        return false;
    };
    if left.len() != right.len() {
        return false;
    }
    left.entries()
        .iter()
        .all(|entry| set_find(heap, right_id, entry.hash, &entry.value, interns).is_some())
}
