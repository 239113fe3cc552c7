//! Insertion-ordered mapping keyed by Python hash and equality.
//!
//! Entries live in a plain vector preserving insertion order; a side index
//! maps Python hash values to entry positions so lookups stay O(1) without
//! needing `Hash`/`Eq` on `Value` itself (key comparison requires the heap).
//!
//! Mutation is two-phase at the call sites: the hash and the matching entry
//! position are computed against `&Heap`, then the dict is mutated through
//! `&mut Heap` without further key comparisons.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// One key/value entry, with the key's hash cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DictEntry {
    pub hash: i64,
    pub key: Value,
    pub value: Value,
}

/// Insertion-ordered Python dict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Dict {
    entries: Vec<DictEntry>,
    /// Hash -> positions in `entries`; more than one position only on hash
    /// collision.
    index: AHashMap<i64, SmallVec<[u32; 1]>>,
}

impl Dict {
    /// Creates an empty dict.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the dict has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[DictEntry] {
        &self.entries
    }

    /// Entry at a position (used by iterators).
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<&DictEntry> {
        self.entries.get(index)
    }

    /// Candidate entry positions for a hash.
    fn candidates(&self, hash: i64) -> &[u32] {
        self.index.get(&hash).map_or(&[], SmallVec::as_slice)
    }

    /// Replaces the value at an existing position.
    pub fn set_value_at(&mut self, position: usize, value: Value) {
        self.entries[position].value = value;
    }

    /// Appends a new entry; the caller has verified no equal key exists.
    pub fn push_entry(&mut self, hash: i64, key: Value, value: Value) {
        let position = u32::try_from(self.entries.len()).expect("dict exceeds u32 entries");
        self.entries.push(DictEntry { hash, key, value });
        self.index.entry(hash).or_default().push(position);
    }

    /// Removes the entry at a position, preserving the order of the rest.
    pub fn remove_at(&mut self, position: usize) -> DictEntry {
        let entry = self.entries.remove(position);
        let position = position as u32;
        if let Some(bucket) = self.index.get_mut(&entry.hash) {
            bucket.retain(|&mut p| p != position);
            if bucket.is_empty() {
                self.index.remove(&entry.hash);
            }
        }
        // All later entries shifted down by one.
        for bucket in self.index.values_mut() {
            for p in bucket.iter_mut() {
                if *p > position {
                    *p -= 1;
                }
            }
        }
        entry
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Finds the position of an equal key, comparing against `&Heap`.
///
/// `hash` must be the Python hash of `key`.
pub(crate) fn dict_find(
    heap: &Heap<impl ResourceTracker>,
    dict_id: HeapId,
    hash: i64,
    key: &Value,
    interns: &Interns,
) -> Option<usize> {
    let HeapData::Dict(dict) = heap.get(dict_id) else {
        return None;
    };
    for &position in dict.candidates(hash) {
        let entry = &dict.entries[position as usize];
        if entry.key.py_eq(key, heap, interns) {
            return Some(position as usize);
        }
    }
    None
}

/// Inserts or replaces a key, raising `TypeError` for unhashable keys.
pub(crate) fn dict_insert(
    heap: &mut Heap<impl ResourceTracker>,
    dict_id: HeapId,
    key: Value,
    value: Value,
    interns: &Interns,
) -> RunResult<()> {
    let hash = key
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&key.type_name(heap, interns)))?;
    let existing = dict_find(heap, dict_id, hash, &key, interns);
    let HeapData::Dict(dict) = heap.get_mut(dict_id) else {
        return Err(crate::exception_private::RunError::internal("dict_insert on non-dict"));
    };
    match existing {
        Some(position) => dict.set_value_at(position, value),
        None => dict.push_entry(hash, key, value),
    }
    Ok(())
}

/// Looks up a key, returning a clone of the value.
pub(crate) fn dict_get(
    heap: &Heap<impl ResourceTracker>,
    dict_id: HeapId,
    key: &Value,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let hash = key
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&key.type_name(heap, interns)))?;
    Ok(dict_find(heap, dict_id, hash, key, interns).map(|position| {
        let HeapData::Dict(dict) = heap.get(dict_id) else {
            unreachable!("dict_find verified the id");
        };
        dict.entries[position].value.clone()
    }))
}

/// Removes a key, returning its value if present.
pub(crate) fn dict_remove(
    heap: &mut Heap<impl ResourceTracker>,
    dict_id: HeapId,
    key: &Value,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let hash = key
        .py_hash(heap, interns)
        .map_err(|_| ExcType::unhashable(&key.type_name(heap, interns)))?;
    let found = dict_find(heap, dict_id, hash, key, interns);
    let HeapData::Dict(dict) = heap.get_mut(dict_id) else {
        return Err(crate::exception_private::RunError::internal("dict_remove on non-dict"));
    };
    Ok(found.map(|position| dict.remove_at(position).value))
}

/// Calls a `dict` method on a heap dict.
pub(crate) fn call_dict_method(
    heap: &mut Heap<impl ResourceTracker>,
    dict_id: HeapId,
    method: &str,
    args: crate::args::ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    use crate::types::iter::Iter;
    match method {
        "get" => {
            let (key, default) = args.get_one_two_args("dict.get")?;
            match dict_get(heap, dict_id, &key, interns)? {
                Some(value) => Ok(value),
                None => Ok(default.unwrap_or(Value::None)),
            }
        }
        "keys" => {
            args.check_zero_args("dict.keys")?;
            let len = dict_len(heap, dict_id)?;
            Ok(heap.allocate_value(HeapData::Iter(Iter::DictKeys {
                id: dict_id,
                index: 0,
                len,
            }))?)
        }
        "values" => {
            args.check_zero_args("dict.values")?;
            let len = dict_len(heap, dict_id)?;
            Ok(heap.allocate_value(HeapData::Iter(Iter::DictValues {
                id: dict_id,
                index: 0,
                len,
            }))?)
        }
        "items" => {
            args.check_zero_args("dict.items")?;
            let len = dict_len(heap, dict_id)?;
            Ok(heap.allocate_value(HeapData::Iter(Iter::DictItems {
                id: dict_id,
                index: 0,
                len,
            }))?)
        }
        "pop" => {
            let (key, default) = args.get_one_two_args("dict.pop")?;
            match dict_remove(heap, dict_id, &key, interns)? {
                Some(value) => Ok(value),
                None => default.ok_or_else(|| ExcType::key_error(key.py_repr(heap, interns))),
            }
        }
        "setdefault" => {
            let (key, default) = args.get_one_two_args("dict.setdefault")?;
            match dict_get(heap, dict_id, &key, interns)? {
                Some(value) => Ok(value),
                None => {
                    let value = default.unwrap_or(Value::None);
                    dict_insert(heap, dict_id, key, value.clone(), interns)?;
                    Ok(value)
                }
            }
        }
        "update" => {
            let other = args.get_one_arg("dict.update")?;
            let Value::Ref(other_id) = &other else {
                return Err(ExcType::type_error(format!(
                    "'{}' object is not a mapping",
                    other.type_name(heap, interns)
                )));
            };
            let HeapData::Dict(other_dict) = heap.get(*other_id) else {
                return Err(ExcType::type_error(format!(
                    "'{}' object is not a mapping",
                    other.type_name(heap, interns)
                )));
            };
            let pairs: Vec<(Value, Value)> = other_dict
                .entries()
                .iter()
                .map(|entry| (entry.key.clone(), entry.value.clone()))
                .collect();
            for (key, value) in pairs {
                dict_insert(heap, dict_id, key, value, interns)?;
            }
            Ok(Value::None)
        }
        "clear" => {
            args.check_zero_args("dict.clear")?;
            let HeapData::Dict(dict) = heap.get_mut(dict_id) else {
                return Err(crate::exception_private::RunError::internal("dict method on non-dict"));
            };
            dict.clear();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("dict", method)),
    }
}

/// The length of a heap dict.
fn dict_len(heap: &Heap<impl ResourceTracker>, dict_id: HeapId) -> RunResult<usize> {
    match heap.get(dict_id) {
        HeapData::Dict(dict) => Ok(dict.len()),
        _ => Err(crate::exception_private::RunError::internal("dict method on non-dict")),
    }
}

/// Structural equality of two dicts: same length and equal value per key.
pub(crate) fn dict_eq(
    heap: &Heap<impl ResourceTracker>,
    left_id: HeapId,
    right_id: HeapId,
    interns: &Interns,
) -> bool {
    let (HeapData::Dict(left), HeapData::Dict(right)) = (heap.get(left_id), heap.get(right_id)) else {
        return false;
    };
    if left.len() != right.len() {
        return false;
    }
    for entry in left.entries() {
        let Some(position) = dict_find(heap, right_id, entry.hash, &entry.key, interns) else {
            return false;
        };
        let HeapData::Dict(right) = heap.get(right_id) else {
            return false;
        };
        if !entry.value.py_eq(&right.entries()[position].value, heap, interns) {
            return false;
        }
    }
    true
}
