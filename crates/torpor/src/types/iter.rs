//! Iterator objects and the advance operation.
//!
//! Iterators are heap objects so `for` loops survive suspension: the loop's
//! `Iter` sits on the operand stack as a `Value::Ref` and its position is part
//! of the serialized interpreter state. Advancing yields `Some(value)` or
//! `None` for exhaustion; dict and set iterators detect size changes and
//! raise `RuntimeError` instead of yielding corrupt positions.

use serde::{Deserialize, Serialize};

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::{BytesId, Interns, StringId},
    resource::ResourceTracker,
    value::Value,
};

/// State of one iterator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Iter {
    /// Over a heap list; index-based, tolerates mutation like CPython.
    List { id: HeapId, index: usize },
    /// Over a heap tuple.
    Tuple { id: HeapId, index: usize },
    /// Over the chars of a heap string; `byte` is a char boundary.
    Str { id: HeapId, byte: usize },
    /// Over the chars of an interned string.
    InternStr { id: StringId, byte: usize },
    /// Over heap bytes, yielding ints.
    Bytes { id: HeapId, index: usize },
    /// Over interned bytes, yielding ints.
    InternBytes { id: BytesId, index: usize },
    /// Over dict keys in insertion order; `len` detects mutation.
    DictKeys { id: HeapId, index: usize, len: usize },
    /// Over dict values.
    DictValues { id: HeapId, index: usize, len: usize },
    /// Over dict `(key, value)` tuples.
    DictItems { id: HeapId, index: usize, len: usize },
    /// Over set elements in insertion order.
    Set { id: HeapId, index: usize, len: usize },
    /// Over a range, keeping only the cursor.
    Range { next: i64, stop: i64, step: i64 },
    /// `enumerate(inner)`: wraps another heap iterator.
    Enumerate { inner: HeapId, count: i64 },
    /// `zip(...)`: advances every inner iterator, stops at the shortest.
    Zip { inners: Vec<HeapId> },
    /// Pre-materialized values (reversed, map, filter, stat fields).
    Vec { items: Vec<Value>, index: usize },
}

/// Creates an iterator over a value, or `TypeError` if it is not iterable.
pub(crate) fn make_iter(
    heap: &mut Heap<impl ResourceTracker>,
    value: Value,
    interns: &Interns,
) -> RunResult<Value> {
    // Iterators pass through unchanged (iter(it) is it).
    if let Value::Ref(id) = &value
        && matches!(heap.get(*id), HeapData::Iter(_))
    {
        return Ok(value);
    }
    let iter = match &value {
        Value::InternString(id) => Iter::InternStr { id: *id, byte: 0 },
        Value::InternBytes(id) => Iter::InternBytes { id: *id, index: 0 },
        Value::Ref(id) => match heap.get(*id) {
            HeapData::List(_) => Iter::List { id: *id, index: 0 },
            HeapData::Tuple(_) => Iter::Tuple { id: *id, index: 0 },
            HeapData::Str(_) => Iter::Str { id: *id, byte: 0 },
            HeapData::Bytes(_) => Iter::Bytes { id: *id, index: 0 },
            HeapData::Dict(dict) => Iter::DictKeys {
                id: *id,
                index: 0,
                len: dict.len(),
            },
            HeapData::Set(set) => Iter::Set {
                id: *id,
                index: 0,
                len: set.len(),
            },
            HeapData::Range(range) => Iter::Range {
                next: range.start,
                stop: range.stop,
                step: range.step,
            },
            HeapData::Stat(stat) => Iter::Vec {
                items: stat.values(),
                index: 0,
            },
            _ => {
                return Err(not_iterable(&value, heap, interns));
            }
        },
        _ => return Err(not_iterable(&value, heap, interns)),
    };
    Ok(heap.allocate_value(HeapData::Iter(iter))?)
}

fn not_iterable(value: &Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunError {
    ExcType::type_error(format!("'{}' object is not iterable", value.type_name(heap, interns)))
}

/// Advances the iterator at `iter_id`, returning the next value or `None`.
pub(crate) fn advance(
    heap: &mut Heap<impl ResourceTracker>,
    iter_id: HeapId,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    // Copy the small state out so container reads don't alias the iterator.
    let HeapData::Iter(state) = heap.get(iter_id) else {
        return Err(RunError::internal("advance on non-iterator"));
    };
    match state.clone() {
        Iter::List { id, index } => {
            let HeapData::List(items) = heap.get(id) else {
                return Err(RunError::internal("list iterator over non-list"));
            };
            let next = items.get(index).cloned();
            if next.is_some() {
                store_state(heap, iter_id, Iter::List { id, index: index + 1 });
            }
            Ok(next)
        }
        Iter::Tuple { id, index } => {
            let HeapData::Tuple(items) = heap.get(id) else {
                return Err(RunError::internal("tuple iterator over non-tuple"));
            };
            let next = items.get(index).cloned();
            if next.is_some() {
                store_state(heap, iter_id, Iter::Tuple { id, index: index + 1 });
            }
            Ok(next)
        }
        Iter::Str { id, byte } => {
            let HeapData::Str(s) = heap.get(id) else {
                return Err(RunError::internal("str iterator over non-str"));
            };
            match s[byte..].chars().next() {
                Some(ch) => {
                    let next_byte = byte + ch.len_utf8();
                    let piece = ch.to_string();
                    store_state(heap, iter_id, Iter::Str { id, byte: next_byte });
                    Ok(Some(heap.allocate_value(HeapData::Str(piece))?))
                }
                None => Ok(None),
            }
        }
        Iter::InternStr { id, byte } => {
            let s = interns.get_str(id);
            match s[byte..].chars().next() {
                Some(ch) => {
                    let next_byte = byte + ch.len_utf8();
                    let piece = ch.to_string();
                    store_state(heap, iter_id, Iter::InternStr { id, byte: next_byte });
                    Ok(Some(heap.allocate_value(HeapData::Str(piece))?))
                }
                None => Ok(None),
            }
        }
        Iter::Bytes { id, index } => {
            let HeapData::Bytes(bytes) = heap.get(id) else {
                return Err(RunError::internal("bytes iterator over non-bytes"));
            };
            let next = bytes.get(index).map(|&b| Value::Int(i64::from(b)));
            if next.is_some() {
                store_state(heap, iter_id, Iter::Bytes { id, index: index + 1 });
            }
            Ok(next)
        }
        Iter::InternBytes { id, index } => {
            let next = interns.get_bytes(id).get(index).map(|&b| Value::Int(i64::from(b)));
            if next.is_some() {
                store_state(heap, iter_id, Iter::InternBytes { id, index: index + 1 });
            }
            Ok(next)
        }
        Iter::DictKeys { id, index, len } => {
            let entry = dict_entry(heap, id, index, len, |entry| entry.0)?;
            if entry.is_some() {
                store_state(heap, iter_id, Iter::DictKeys { id, index: index + 1, len });
            }
            Ok(entry)
        }
        Iter::DictValues { id, index, len } => {
            let entry = dict_entry(heap, id, index, len, |entry| entry.1)?;
            if entry.is_some() {
                store_state(heap, iter_id, Iter::DictValues { id, index: index + 1, len });
            }
            Ok(entry)
        }
        Iter::DictItems { id, index, len } => {
            let Some((key, value)) = dict_entry(heap, id, index, len, |entry| entry)?.map(|(k, v)| (k, v)) else {
                return Ok(None);
            };
            store_state(heap, iter_id, Iter::DictItems { id, index: index + 1, len });
            Ok(Some(heap.allocate_value(HeapData::Tuple(vec![key, value]))?))
        }
        Iter::Set { id, index, len } => {
            let HeapData::Set(set) = heap.get(id) else {
                return Err(RunError::internal("set iterator over non-set"));
            };
            if set.len() != len {
                return Err(ExcType::runtime_error("set changed size during iteration"));
            }
            let next = set.entry_at(index).map(|entry| entry.value.clone());
            if next.is_some() {
                store_state(heap, iter_id, Iter::Set { id, index: index + 1, len });
            }
            Ok(next)
        }
        Iter::Range { next, stop, step } => {
            let exhausted = if step > 0 { next >= stop } else { next <= stop };
            if exhausted {
                return Ok(None);
            }
            store_state(
                heap,
                iter_id,
                Iter::Range {
                    next: next + step,
                    stop,
                    step,
                },
            );
            Ok(Some(Value::Int(next)))
        }
        Iter::Enumerate { inner, count } => {
            let Some(item) = advance(heap, inner, interns)? else {
                return Ok(None);
            };
            store_state(heap, iter_id, Iter::Enumerate { inner, count: count + 1 });
            Ok(Some(heap.allocate_value(HeapData::Tuple(vec![Value::Int(count), item]))?))
        }
        Iter::Zip { inners } => {
            let mut items = Vec::with_capacity(inners.len());
            for inner in &inners {
                match advance(heap, *inner, interns)? {
                    Some(item) => items.push(item),
                    None => return Ok(None),
                }
            }
            if items.is_empty() {
                // zip() with no arguments is empty.
                return Ok(None);
            }
            Ok(Some(heap.allocate_value(HeapData::Tuple(items))?))
        }
        Iter::Vec { items, index } => {
            let next = items.get(index).cloned();
            if next.is_some() {
                store_state(heap, iter_id, Iter::Vec { items, index: index + 1 });
            }
            Ok(next)
        }
    }
}

/// Reads a dict entry with size-change detection.
fn dict_entry<R>(
    heap: &Heap<impl ResourceTracker>,
    dict_id: HeapId,
    index: usize,
    expected_len: usize,
    project: impl FnOnce((Value, Value)) -> R,
) -> RunResult<Option<R>> {
    let HeapData::Dict(dict) = heap.get(dict_id) else {
        return Err(RunError::internal("dict iterator over non-dict"));
    };
    if dict.len() != expected_len {
        return Err(ExcType::runtime_error("dictionary changed size during iteration"));
    }
    Ok(dict
        .entry_at(index)
        .map(|entry| project((entry.key.clone(), entry.value.clone()))))
}

/// Replaces an iterator's state after a successful advance.
fn store_state(heap: &mut Heap<impl ResourceTracker>, iter_id: HeapId, state: Iter) {
    *heap.get_mut(iter_id) = HeapData::Iter(state);
}

/// Drains an iterator value into a vector (used by `list()`, `sorted`, …).
pub(crate) fn collect_iter(
    heap: &mut Heap<impl ResourceTracker>,
    iterable: Value,
    interns: &Interns,
) -> RunResult<Vec<Value>> {
    let iter_value = make_iter(heap, iterable, interns)?;
    let Value::Ref(iter_id) = iter_value else {
        return Err(RunError::internal("make_iter returned non-ref"));
    };
    let mut items = Vec::new();
    while let Some(item) = advance(heap, iter_id, interns)? {
        items.push(item);
    }
    Ok(items)
}
