//! List methods and sorting.

use std::cmp::Ordering;

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Reads the elements of a heap list.
fn list_items(heap: &Heap<impl ResourceTracker>, list_id: HeapId) -> RunResult<&Vec<Value>> {
    match heap.get(list_id) {
        HeapData::List(items) => Ok(items),
        _ => Err(RunError::internal("expected list")),
    }
}

/// Mutable access to the elements of a heap list.
fn list_items_mut(heap: &mut Heap<impl ResourceTracker>, list_id: HeapId) -> RunResult<&mut Vec<Value>> {
    match heap.get_mut(list_id) {
        HeapData::List(items) => Ok(items),
        _ => Err(RunError::internal("expected list")),
    }
}

/// Finds the first position of an equal element.
fn find_position(
    heap: &Heap<impl ResourceTracker>,
    list_id: HeapId,
    needle: &Value,
    interns: &Interns,
) -> RunResult<Option<usize>> {
    let items = list_items(heap, list_id)?;
    Ok(items.iter().position(|item| item.py_eq(needle, heap, interns)))
}

/// Calls a `list` method on a heap list.
pub(crate) fn call_list_method(
    heap: &mut Heap<impl ResourceTracker>,
    list_id: HeapId,
    method: &str,
    args: ArgValues,
    interns: &Interns,
) -> RunResult<Value> {
    match method {
        "append" => {
            let item = args.get_one_arg("list.append")?;
            list_items_mut(heap, list_id)?.push(item);
            Ok(Value::None)
        }
        "extend" => {
            let iterable = args.get_one_arg("list.extend")?;
            let new_items = iterable_to_vec(heap, &iterable, interns, "list.extend")?;
            list_items_mut(heap, list_id)?.extend(new_items);
            Ok(Value::None)
        }
        "pop" => {
            let index = match args.get_zero_one_arg("list.pop")? {
                None => None,
                Some(Value::Int(i)) => Some(i),
                Some(other) => {
                    return Err(ExcType::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name(heap, interns)
                    )));
                }
            };
            let items = list_items_mut(heap, list_id)?;
            if items.is_empty() {
                return Err(ExcType::index_error("pop from empty list"));
            }
            let len = items.len() as i64;
            let position = match index {
                None => len - 1,
                Some(i) if i < 0 => i + len,
                Some(i) => i,
            };
            if position < 0 || position >= len {
                return Err(ExcType::index_error("pop index out of range"));
            }
            Ok(items.remove(position as usize))
        }
        "insert" => {
            let (index, item) = args.get_two_args("list.insert")?;
            let Value::Int(index) = index else {
                return Err(ExcType::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    index.type_name(heap, interns)
                )));
            };
            let items = list_items_mut(heap, list_id)?;
            let len = items.len() as i64;
            let position = if index < 0 {
                (index + len).max(0)
            } else {
                index.min(len)
            };
            items.insert(position as usize, item);
            Ok(Value::None)
        }
        "remove" => {
            let needle = args.get_one_arg("list.remove")?;
            match find_position(heap, list_id, &needle, interns)? {
                Some(position) => {
                    list_items_mut(heap, list_id)?.remove(position);
                    Ok(Value::None)
                }
                None => Err(ExcType::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            let needle = args.get_one_arg("list.index")?;
            match find_position(heap, list_id, &needle, interns)? {
                Some(position) => Ok(Value::Int(position as i64)),
                None => Err(ExcType::value_error(format!(
                    "{} is not in list",
                    needle.py_repr(heap, interns)
                ))),
            }
        }
        "count" => {
            let needle = args.get_one_arg("list.count")?;
            let items = list_items(heap, list_id)?;
            let count = items.iter().filter(|item| item.py_eq(&needle, heap, interns)).count();
            Ok(Value::Int(count as i64))
        }
        "reverse" => {
            args.check_zero_args("list.reverse")?;
            list_items_mut(heap, list_id)?.reverse();
            Ok(Value::None)
        }
        "clear" => {
            args.check_zero_args("list.clear")?;
            list_items_mut(heap, list_id)?.clear();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("list", method)),
    }
}

/// Materializes a list/tuple/set/range/dict-keys iterable into a vector.
///
/// Used by methods that consume an iterable argument eagerly. Strings are
/// intentionally excluded here; the VM's general iteration path handles them.
pub(crate) fn iterable_to_vec(
    heap: &mut Heap<impl ResourceTracker>,
    iterable: &Value,
    interns: &Interns,
    context: &str,
) -> RunResult<Vec<Value>> {
    match iterable {
        Value::Ref(id) => match heap.get(*id) {
            HeapData::List(items) | HeapData::Tuple(items) => Ok(items.clone()),
            HeapData::Set(set) => Ok(set.entries().iter().map(|entry| entry.value.clone()).collect()),
            HeapData::Dict(dict) => Ok(dict.entries().iter().map(|entry| entry.key.clone()).collect()),
            HeapData::Range(range) => {
                let range = *range;
                Ok((0..range.len())
                    .map(|i| Value::Int(range.get(i).expect("index in range")))
                    .collect())
            }
            _ => Err(ExcType::type_error(format!(
                "{context}() argument must be an iterable, not '{}'",
                iterable.type_name(heap, interns)
            ))),
        },
        _ => Err(ExcType::type_error(format!(
            "{context}() argument must be an iterable, not '{}'",
            iterable.type_name(heap, interns)
        ))),
    }
}

/// Stable-sorts values in place with Python ordering semantics.
///
/// `keys` parallels `values` when a key function was applied; comparison
/// errors (unorderable types) are deferred out of the sort closure.
pub(crate) fn sort_values(
    values: &mut [Value],
    keys: Option<&mut Vec<Value>>,
    reverse: bool,
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
) -> RunResult<()> {
    let mut error: Option<RunError> = None;

    let compare = |a: &Value, b: &Value, error: &mut Option<RunError>| -> Ordering {
        match a.py_cmp(b, heap, interns) {
            Some(ordering) => ordering,
            None => {
                if error.is_none() {
                    *error = Some(ExcType::type_error(format!(
                        "'<' not supported between instances of '{}' and '{}'",
                        a.type_name(heap, interns),
                        b.type_name(heap, interns)
                    )));
                }
                Ordering::Equal
            }
        }
    };

    if let Some(keys) = keys {
        // Decorate-sort-undecorate: sort index permutation by key.
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&i, &j| {
            let ordering = compare(&keys[i], &keys[j], &mut error);
            if reverse { ordering.reverse() } else { ordering }
        });
        if let Some(err) = error {
            return Err(err);
        }
        let sorted_values: Vec<Value> = order.iter().map(|&i| values[i].clone()).collect();
        values.clone_from_slice(&sorted_values);
        let sorted_keys: Vec<Value> = order.iter().map(|&i| keys[i].clone()).collect();
        *keys = sorted_keys;
    } else {
        values.sort_by(|a, b| {
            let ordering = compare(a, b, &mut error);
            if reverse { ordering.reverse() } else { ordering }
        });
        if let Some(err) = error {
            return Err(err);
        }
    }
    Ok(())
}
